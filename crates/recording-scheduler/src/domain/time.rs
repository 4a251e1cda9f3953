//! Time intervals and local time conversion.

use chrono::{DateTime, LocalResult, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// A half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlannedTime {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl PlannedTime {
    pub fn new(start: DateTime<Utc>, duration: TimeDelta) -> Self {
        Self {
            start,
            end: start + duration,
        }
    }

    pub fn from_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &PlannedTime) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Convert a wall clock time in `tz` to UTC.
///
/// Ambiguous times (clocks turned back) resolve to the earlier instant;
/// times skipped by a forward change move one hour ahead.
pub fn local_to_utc(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(time) => time.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => match tz.from_local_datetime(&(local + TimeDelta::hours(1))) {
            LocalResult::Single(time) | LocalResult::Ambiguous(time, _) => {
                time.with_timezone(&Utc)
            }
            LocalResult::None => Utc.from_utc_datetime(&local),
        },
    }
}
