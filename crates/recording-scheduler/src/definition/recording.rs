//! Recording requests.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeDelta, Utc, Weekday};
use chrono_tz::Tz;
use uuid::Uuid;

use super::recurrence::Occurrences;
use crate::domain::{ResourceRef, Source};
use crate::{Error, Result};

/// Earliest accepted start year.
pub const MINIMUM_START_YEAR: i32 = 2000;

/// Weekly repetition of a recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatPattern {
    /// Last local date an occurrence may start on.
    pub end: NaiveDate,
    pub weekdays: Vec<Weekday>,
}

/// Override for the occurrence planned on one local date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanException {
    pub date: NaiveDate,
    pub start_delta: TimeDelta,
    pub duration_delta: TimeDelta,
}

impl PlanException {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            start_delta: TimeDelta::zero(),
            duration_delta: TimeDelta::zero(),
        }
    }

    pub fn shift_start(mut self, delta: TimeDelta) -> Self {
        self.start_delta = delta;
        self
    }

    pub fn change_duration(mut self, delta: TimeDelta) -> Self {
        self.duration_delta = delta;
        self
    }
}

/// An immutable, validated recording request.
///
/// Repeating definitions keep their local wall clock time across daylight
/// saving changes in their timezone.
#[derive(Debug, Clone)]
pub struct RecordingDefinition {
    id: Uuid,
    name: String,
    resources: Vec<ResourceRef>,
    source: Source,
    start: DateTime<Utc>,
    duration: TimeDelta,
    repeat: Option<RepeatPattern>,
    exceptions: BTreeMap<NaiveDate, PlanException>,
    timezone: Tz,
}

impl RecordingDefinition {
    pub fn builder() -> RecordingDefinitionBuilder {
        RecordingDefinitionBuilder::default()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Explicitly allowed resources. Empty means any capable resource.
    pub fn resources(&self) -> &[ResourceRef] {
        &self.resources
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn duration(&self) -> TimeDelta {
        self.duration
    }

    pub fn repeat(&self) -> Option<&RepeatPattern> {
        self.repeat.as_ref()
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn has_exceptions(&self) -> bool {
        !self.exceptions.is_empty()
    }

    pub fn exceptions(&self) -> impl Iterator<Item = &PlanException> {
        self.exceptions.values()
    }

    pub(crate) fn exception_on(&self, date: NaiveDate) -> Option<&PlanException> {
        self.exceptions.get(&date)
    }

    pub(crate) fn local_start(&self) -> NaiveDateTime {
        self.to_local(self.start)
    }

    pub(crate) fn to_local(&self, time: DateTime<Utc>) -> NaiveDateTime {
        time.with_timezone(&self.timezone).naive_local()
    }

    /// Lazily expand the definition into its occurrences ending after
    /// `not_before`, in planned order.
    pub fn times(&self, not_before: DateTime<Utc>) -> Occurrences<'_> {
        Occurrences::new(self, not_before)
    }
}

#[derive(Debug, Default)]
pub struct RecordingDefinitionBuilder {
    id: Option<Uuid>,
    name: Option<String>,
    resources: Vec<ResourceRef>,
    source: Option<Source>,
    start: Option<DateTime<Utc>>,
    duration: Option<TimeDelta>,
    repeat_end: Option<NaiveDate>,
    weekdays: Vec<Weekday>,
    exceptions: Vec<PlanException>,
    timezone: Option<Tz>,
}

impl RecordingDefinitionBuilder {
    /// Use a fixed identifier instead of a fresh one.
    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn resource(mut self, resource: ResourceRef) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn resources(mut self, resources: impl IntoIterator<Item = ResourceRef>) -> Self {
        self.resources.extend(resources);
        self
    }

    pub fn source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    pub fn start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn duration(mut self, duration: TimeDelta) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Repeat on `weekdays` up to and including the local date `end`.
    pub fn repeat(mut self, end: NaiveDate, weekdays: impl IntoIterator<Item = Weekday>) -> Self {
        self.repeat_end = Some(end);
        self.weekdays = weekdays.into_iter().collect();
        self
    }

    pub fn exception(mut self, exception: PlanException) -> Self {
        self.exceptions.push(exception);
        self
    }

    pub fn timezone(mut self, timezone: Tz) -> Self {
        self.timezone = Some(timezone);
        self
    }

    pub fn build(self) -> Result<RecordingDefinition> {
        let source = self.source.ok_or_else(|| Error::missing_value("source"))?;
        let start = self.start.ok_or_else(|| Error::missing_value("start"))?;
        let duration = self.duration.ok_or_else(|| Error::missing_value("duration"))?;

        if start.year() < MINIMUM_START_YEAR {
            return Err(Error::out_of_range(
                "start",
                format!("{start} is before the year {MINIMUM_START_YEAR}"),
            ));
        }
        if duration <= TimeDelta::zero() {
            return Err(Error::out_of_range("duration", "must be positive"));
        }

        let timezone = self.timezone.unwrap_or(Tz::UTC);
        let repeat = match self.repeat_end {
            None => None,
            Some(end) => {
                if self.weekdays.is_empty() {
                    return Err(Error::inconsistent("repeating requires at least one weekday"));
                }
                for (index, day) in self.weekdays.iter().enumerate() {
                    if self.weekdays[..index].contains(day) {
                        return Err(Error::inconsistent(format!("weekday {day} listed twice")));
                    }
                }
                let first_day = start.with_timezone(&timezone).date_naive();
                if end < first_day {
                    return Err(Error::inconsistent(format!(
                        "repeat end {end} lies before the first start {first_day}"
                    )));
                }
                Some(RepeatPattern {
                    end,
                    weekdays: self.weekdays,
                })
            }
        };

        let mut exceptions = BTreeMap::new();
        for exception in self.exceptions {
            if exceptions.insert(exception.date, exception).is_some() {
                return Err(Error::inconsistent(format!(
                    "more than one exception for {}",
                    exception.date
                )));
            }
        }

        let id = self.id.unwrap_or_else(Uuid::new_v4);
        Ok(RecordingDefinition {
            id,
            name: self.name.unwrap_or_else(|| id.to_string()),
            resources: self.resources,
            source,
            start,
            duration,
            repeat,
            exceptions,
            timezone,
        })
    }
}
