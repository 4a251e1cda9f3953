//! Periodic background tasks.

use chrono::{DateTime, NaiveTime, TimeDelta, Timelike, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

use crate::domain::{PlannedTime, ResourceRef, local_to_utc};

/// How often a task wants to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunInterval {
    Every(TimeDelta),
    /// Runs only when triggered from outside, which resets the last run.
    Manual,
}

/// A background job that occupies a resource without recording a source.
///
/// Tasks never displace recordings. They are placed into the gaps left
/// by the recording plan and may therefore start later than requested.
#[derive(Debug, Clone)]
pub struct PeriodicTask {
    id: Uuid,
    name: String,
    resources: Vec<ResourceRef>,
    interval: RunInterval,
    duration: TimeDelta,
    enabled: bool,
    join_threshold: Option<TimeDelta>,
    last_run: Option<DateTime<Utc>>,
    preferred_hours: Vec<u32>,
    timezone: Tz,
}

impl PeriodicTask {
    pub fn new(name: impl Into<String>, interval: RunInterval, duration: TimeDelta) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            resources: Vec::new(),
            interval,
            duration,
            enabled: true,
            join_threshold: None,
            last_run: None,
            preferred_hours: Vec::new(),
            timezone: Tz::UTC,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_resource(mut self, resource: ResourceRef) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_join_threshold(mut self, threshold: TimeDelta) -> Self {
        self.join_threshold = Some(threshold);
        self
    }

    pub fn with_last_run(mut self, last_run: DateTime<Utc>) -> Self {
        self.last_run = Some(last_run);
        self
    }

    /// Local hours of day a run should be moved to. Values of 24 and above
    /// are ignored.
    pub fn with_preferred_hours(mut self, hours: impl IntoIterator<Item = u32>) -> Self {
        self.preferred_hours = hours.into_iter().collect();
        self
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Eligible resources. Empty means every registered resource.
    pub fn resources(&self) -> &[ResourceRef] {
        &self.resources
    }

    pub fn interval(&self) -> RunInterval {
        self.interval
    }

    pub fn duration(&self) -> TimeDelta {
        self.duration
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn join_threshold(&self) -> Option<TimeDelta> {
        self.join_threshold
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        self.last_run
    }

    pub fn preferred_hours(&self) -> &[u32] {
        &self.preferred_hours
    }

    /// Next run as seen at `now`.
    pub fn next_run(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.next_schedule(self.last_run, now)
    }

    /// Start of the run following one that ended at `last_run`.
    pub fn next_schedule(
        &self,
        last_run: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        if !self.enabled {
            return None;
        }
        if let RunInterval::Every(interval) = self.interval
            && interval <= TimeDelta::zero()
        {
            return None;
        }

        let Some(last_run) = last_run else {
            return Some(now);
        };
        let RunInterval::Every(interval) = self.interval else {
            return None;
        };

        if let Some(join) = self.join_threshold
            && join > TimeDelta::zero()
            && last_run < now - join
        {
            return Some(now);
        }

        let mut next = last_run + interval;

        let hours = self.preferred_hours.iter().copied().filter(|hour| *hour < 24);
        let local = next.with_timezone(&self.timezone).naive_local();
        // Round up to the next full local hour.
        let hour = if local.minute() != 0 || local.second() != 0 || local.nanosecond() != 0 {
            local.hour() + 1
        } else {
            local.hour()
        };
        let best = hours
            .map(|preferred| if preferred < hour { preferred + 24 } else { preferred })
            .min();
        if let Some(best) = best {
            let midnight = local.date().and_time(NaiveTime::MIN);
            next = local_to_utc(self.timezone, midnight + TimeDelta::hours(i64::from(best)));
        }

        Some(next.max(now))
    }

    /// Lazily list the runs following the last one, each computed from the
    /// end of its predecessor.
    pub fn times(&self, now: DateTime<Utc>) -> impl Iterator<Item = PlannedTime> + '_ {
        let mut state = (self.duration > TimeDelta::zero()).then_some((self.last_run, now));
        std::iter::from_fn(move || {
            let (last_run, now) = state?;
            match self.next_schedule(last_run, now) {
                Some(start) => {
                    let time = PlannedTime::new(start, self.duration);
                    state = Some((Some(time.end), time.end));
                    Some(time)
                }
                None => {
                    state = None;
                    None
                }
            }
        })
    }
}
