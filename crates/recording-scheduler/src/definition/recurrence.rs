//! Expansion of recording definitions into concrete occurrences.

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeDelta, Utc};

use super::recording::RecordingDefinition;
use crate::domain::{PlannedTime, local_to_utc};

/// One expanded occurrence of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    /// Interval produced by the repeat pattern alone.
    pub original: PlannedTime,
    /// Interval after applying the exception for its date, if any.
    pub planned: PlannedTime,
}

#[derive(Debug, Clone, Copy)]
enum Scan {
    Once,
    Daily(NaiveDate),
    Done,
}

/// Cursor over the occurrences of one definition.
///
/// The cursor owns no reference to the definition so that long lived
/// planners can keep it next to a shared handle. Every call to
/// [`OccurrenceCursor::next`] must pass the definition the cursor was
/// created for.
#[derive(Debug, Clone)]
pub struct OccurrenceCursor {
    not_before: DateTime<Utc>,
    scan_from: DateTime<Utc>,
    scan: Scan,
}

impl OccurrenceCursor {
    pub fn new(definition: &RecordingDefinition, not_before: DateTime<Utc>) -> Self {
        // Exceptions may move an occurrence of the previous day past `not_before`.
        let scan_from = if definition.has_exceptions() {
            not_before - TimeDelta::days(1)
        } else {
            not_before
        };

        let scan = match definition.repeat() {
            None => Scan::Once,
            Some(_) => {
                let first_day = definition.local_start().date();
                if definition.start() < scan_from {
                    let skip_to = definition
                        .to_local(scan_from)
                        .date()
                        .checked_sub_days(Days::new(2))
                        .unwrap_or(first_day);
                    Scan::Daily(skip_to.max(first_day))
                } else {
                    Scan::Daily(first_day)
                }
            }
        };

        Self {
            not_before,
            scan_from,
            scan,
        }
    }

    fn next_raw(&mut self, definition: &RecordingDefinition) -> Option<PlannedTime> {
        match self.scan {
            Scan::Done => None,
            Scan::Once => {
                self.scan = Scan::Done;
                let time = PlannedTime::new(definition.start(), definition.duration());
                (time.end > self.scan_from).then_some(time)
            }
            Scan::Daily(mut day) => {
                let Some(pattern) = definition.repeat() else {
                    self.scan = Scan::Done;
                    return None;
                };
                let time_of_day = definition.local_start().time();

                loop {
                    if day > pattern.end {
                        self.scan = Scan::Done;
                        return None;
                    }
                    let current = day;
                    match current.succ_opt() {
                        Some(next) => {
                            day = next;
                            self.scan = Scan::Daily(next);
                        }
                        None => self.scan = Scan::Done,
                    }

                    if pattern.weekdays.contains(&current.weekday()) {
                        let start = local_to_utc(definition.timezone(), current.and_time(time_of_day));
                        let time = PlannedTime::new(start, definition.duration());
                        if time.end > self.scan_from {
                            return Some(time);
                        }
                    }

                    if matches!(self.scan, Scan::Done) {
                        return None;
                    }
                }
            }
        }
    }

    /// Next occurrence ending after the cursor's lower bound.
    pub fn next(&mut self, definition: &RecordingDefinition) -> Option<Occurrence> {
        while let Some(original) = self.next_raw(definition) {
            let date = definition.to_local(original.start).date();
            let planned = match definition.exception_on(date) {
                Some(exception) => PlannedTime::new(
                    original.start + exception.start_delta,
                    original.duration() + exception.duration_delta,
                ),
                None => original,
            };

            if planned.end > self.not_before && planned.duration() > TimeDelta::zero() {
                return Some(Occurrence { original, planned });
            }
        }
        None
    }
}

/// Lazy, restartable iterator over a definition's occurrences.
#[derive(Debug, Clone)]
pub struct Occurrences<'a> {
    definition: &'a RecordingDefinition,
    cursor: OccurrenceCursor,
}

impl<'a> Occurrences<'a> {
    pub(crate) fn new(definition: &'a RecordingDefinition, not_before: DateTime<Utc>) -> Self {
        Self {
            definition,
            cursor: OccurrenceCursor::new(definition, not_before),
        }
    }
}

impl Iterator for Occurrences<'_> {
    type Item = Occurrence;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next(self.definition)
    }
}
