//! Disjoint, time-ordered interval store.
//!
//! A [`Timeline`] accumulates weighted intervals. Whenever a new interval
//! overlaps stored ranges, the affected ranges are split at the interval's
//! boundaries and the overlapping parts carry `merge(existing, added)`.
//! Parts of the new interval that fall into gaps keep the added data as is.

use chrono::{DateTime, Utc};

use crate::{Error, Result};

/// Combines the data of an existing range with the data being added.
pub type MergeFn<T> = fn(&T, &T) -> T;

/// One stored range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range<T> {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub data: T,
}

impl<T> Range<T> {
    fn new(start: DateTime<Utc>, end: DateTime<Utc>, data: T) -> Self {
        Self { start, end, data }
    }

    /// True if the range shares at least one instant with `[start, end)`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }
}

/// Sorted, non-overlapping ranges with caller supplied merging.
#[derive(Debug, Clone)]
pub struct Timeline<T> {
    ranges: Vec<Range<T>>,
    merge: MergeFn<T>,
}

impl<T: Clone> Timeline<T> {
    pub fn new(merge: MergeFn<T>) -> Self {
        Self {
            ranges: Vec::new(),
            merge,
        }
    }

    /// Add `data` for `[start, end)`.
    ///
    /// Empty or inverted intervals are rejected.
    pub fn add(&mut self, start: DateTime<Utc>, end: DateTime<Utc>, data: T) -> Result<()> {
        if end <= start {
            return Err(Error::out_of_range(
                "end",
                format!("{end} must be after start {start}"),
            ));
        }

        let existing = std::mem::take(&mut self.ranges);
        let mut ranges = Vec::with_capacity(existing.len() + 3);
        // Part of [start, end) not yet written.
        let mut cursor = start;

        for range in existing {
            if range.end <= start {
                ranges.push(range);
                continue;
            }

            if range.start >= end {
                if cursor < end {
                    ranges.push(Range::new(cursor, end, data.clone()));
                    cursor = end;
                }
                ranges.push(range);
                continue;
            }

            if range.start < cursor {
                ranges.push(Range::new(range.start, cursor, range.data.clone()));
            } else if range.start > cursor {
                ranges.push(Range::new(cursor, range.start, data.clone()));
            }

            let overlap_start = range.start.max(cursor);
            let overlap_end = range.end.min(end);
            ranges.push(Range::new(
                overlap_start,
                overlap_end,
                (self.merge)(&range.data, &data),
            ));

            if range.end > end {
                ranges.push(Range::new(end, range.end, range.data));
            }

            cursor = overlap_end;
        }

        if cursor < end {
            ranges.push(Range::new(cursor, end, data));
        }

        self.ranges = ranges;
        Ok(())
    }

    /// Ranges overlapping `[start, end)`, in time order.
    pub fn overlapping(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Iterator<Item = &Range<T>> + '_ {
        // Ranges are sorted and disjoint, so their ends are sorted as well.
        let first = self.ranges.partition_point(|range| range.end <= start);
        self.ranges[first..]
            .iter()
            .take_while(move |range| range.start < end)
    }

    /// Drop every range that ends at or before `time`.
    pub fn prune_before(&mut self, time: DateTime<Utc>) {
        self.ranges.retain(|range| range.end > time);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Range<T>> {
        self.ranges.iter()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }
}

impl<'a, T> IntoIterator for &'a Timeline<T> {
    type Item = &'a Range<T>;
    type IntoIter = std::slice::Iter<'a, Range<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter()
    }
}
