//! Planner configuration.
//!
//! The defaults reproduce the behaviour expected by hosts that never supply
//! a configuration: batches of at most 1000 occurrences and 1000 alternative
//! plans spanning at most two days. Alternative plans are ranked by total
//! lateness, then by the priorities of the resources used, then by the number
//! of sources per resource and finally by how widely sources are spread.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default number of occurrences processed before a planning batch is closed.
pub const DEFAULT_MAXIMUM_RECORDINGS_IN_PLAN: usize = 1000;

/// Default maximum span of a planning batch, in hours.
pub const DEFAULT_MAXIMUM_PLAN_SPAN_HOURS: i64 = 48;

/// Default number of alternative plans kept before a batch is closed.
pub const DEFAULT_MAXIMUM_ALTERNATIVES_IN_PLAN: usize = 1000;

/// Rules ranking the alternative plans of a batch, applied in order.
///
/// Plans letting a recording start on time always replace plans delaying
/// it; these rules choose among the survivors when the batch is closed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Least recording time lost to late starts.
    TotalCut,
    /// Highest priority resources for the earliest recordings.
    Priority,
    /// Most recordings on the highest priority resources.
    RecordingCount,
    /// Fewest distinct sources on the highest priority resources.
    SourceCount,
    /// Each source on as few resources as possible.
    SourceSpread,
    /// Fewest resources in use.
    ResourceCount,
    /// Fewest violations of [`SchedulerConfig::start_order`].
    StartOrder,
}

/// Asks that `leading` is started before any of `followers`: whenever the
/// leading resource starts up, none of the followers may be busy already.
///
/// An empty follower list stands for every other resource. Names are
/// compared ASCII case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartOrderRule {
    pub leading: String,
    #[serde(default)]
    pub followers: Vec<String>,
}

impl StartOrderRule {
    pub fn new(leading: impl Into<String>) -> Self {
        Self {
            leading: leading.into(),
            followers: Vec::new(),
        }
    }

    pub fn with_follower(mut self, follower: impl Into<String>) -> Self {
        self.followers.push(follower.into());
        self
    }
}

/// Tuning knobs for the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Occurrences processed before the current batch is closed.
    pub max_recordings_in_plan: usize,
    /// A batch is closed once it spans more than this many hours.
    pub max_plan_span_hours: i64,
    /// A batch is closed once it holds more alternative plans than this.
    pub max_alternatives_in_plan: usize,
    /// Plan ranking rules, most significant first.
    pub tie_breaks: Vec<TieBreak>,
    /// Resource start order used by [`TieBreak::StartOrder`].
    pub start_order: Vec<StartOrderRule>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_recordings_in_plan: DEFAULT_MAXIMUM_RECORDINGS_IN_PLAN,
            max_plan_span_hours: DEFAULT_MAXIMUM_PLAN_SPAN_HOURS,
            max_alternatives_in_plan: DEFAULT_MAXIMUM_ALTERNATIVES_IN_PLAN,
            tie_breaks: vec![
                TieBreak::TotalCut,
                TieBreak::Priority,
                TieBreak::SourceCount,
                TieBreak::SourceSpread,
            ],
            start_order: Vec::new(),
        }
    }
}

impl SchedulerConfig {
    /// Parse and validate a JSON configuration. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::config(format!("invalid scheduler configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn with_tie_breaks(mut self, tie_breaks: impl IntoIterator<Item = TieBreak>) -> Self {
        self.tie_breaks = tie_breaks.into_iter().collect();
        self
    }

    pub fn with_max_recordings_in_plan(mut self, limit: usize) -> Self {
        self.max_recordings_in_plan = limit;
        self
    }

    pub fn with_max_alternatives_in_plan(mut self, limit: usize) -> Self {
        self.max_alternatives_in_plan = limit;
        self
    }

    pub fn with_start_order(mut self, rule: StartOrderRule) -> Self {
        self.start_order.push(rule);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_recordings_in_plan == 0 {
            return Err(Error::out_of_range(
                "max_recordings_in_plan",
                "must be positive",
            ));
        }
        if self.max_plan_span_hours <= 0 {
            return Err(Error::out_of_range("max_plan_span_hours", "must be positive"));
        }
        if self.max_alternatives_in_plan == 0 {
            return Err(Error::out_of_range(
                "max_alternatives_in_plan",
                "must be positive",
            ));
        }
        if self.start_order.iter().any(|rule| rule.leading.is_empty()) {
            return Err(Error::missing_value("start_order.leading"));
        }
        for (index, rule) in self.tie_breaks.iter().enumerate() {
            if self.tie_breaks[..index].contains(rule) {
                return Err(Error::inconsistent(format!(
                    "tie-break rule {rule} listed twice"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn max_plan_span(&self) -> chrono::TimeDelta {
        chrono::TimeDelta::hours(self.max_plan_span_hours)
    }
}
