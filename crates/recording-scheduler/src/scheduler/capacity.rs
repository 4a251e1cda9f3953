//! Per-resource load and decryption bookkeeping.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::trace;

use super::resources::ResourceCollection;
use crate::domain::{PlannedTime, Source};
use crate::manager::Allocation;
use crate::timeline::{MergeFn, Timeline};
use crate::{Error, Result};

#[allow(clippy::ptr_arg)]
fn union(existing: &Vec<Source>, added: &Vec<Source>) -> Vec<Source> {
    let mut merged = existing.clone();
    for source in added {
        if !merged.iter().any(|known| known.is_same_as(source)) {
            merged.push(source.clone());
        }
    }
    merged
}

fn source_timeline() -> Timeline<Vec<Source>> {
    Timeline::new(union as MergeFn<Vec<Source>>)
}

fn within(limit: Option<u32>, count: usize) -> bool {
    match limit {
        None | Some(0) => true,
        Some(limit) => count < limit as usize,
    }
}

/// Sources a resource carries over time.
#[derive(Debug, Clone)]
struct ResourceLoad {
    sources: Timeline<Vec<Source>>,
    source_limit: Option<u32>,
    /// Decryption counters this resource draws from, own counter first.
    counters: Vec<usize>,
    /// Set by a task-only allocation: the resource is busy until then.
    reserved_until: Option<DateTime<Utc>>,
}

impl ResourceLoad {
    fn accepts(&self, carried: &[Source], source: &Source) -> bool {
        if carried.iter().any(|known| known.is_same_as(source)) {
            return true;
        }
        match carried.first() {
            None => true,
            Some(first) => {
                first.belongs_to_same_group(source) && within(self.source_limit, carried.len())
            }
        }
    }
}

/// Encrypted sources decrypted at once under one limit.
#[derive(Debug, Clone)]
struct DecryptionCounter {
    limit: Option<u32>,
    sources: Timeline<Vec<Source>>,
}

impl DecryptionCounter {
    fn accepts(&self, decrypted: &[Source], source: &Source) -> bool {
        decrypted.iter().any(|known| known.is_same_as(source))
            || self.limit.is_none_or(|limit| decrypted.len() < limit as usize)
    }
}

/// Committed usage of every registered resource.
///
/// Positions refer to the [`ResourceCollection`] the plan was created for.
#[derive(Debug, Clone)]
pub(crate) struct CapacityPlan {
    loads: Vec<ResourceLoad>,
    counters: Vec<DecryptionCounter>,
}

impl CapacityPlan {
    pub fn new(resources: &ResourceCollection) -> Self {
        let mut counters: Vec<DecryptionCounter> = resources
            .iter()
            .map(|resource| DecryptionCounter {
                limit: resource.decryption_limit(),
                sources: source_timeline(),
            })
            .collect();
        let mut loads: Vec<ResourceLoad> = resources
            .iter()
            .enumerate()
            .map(|(index, resource)| ResourceLoad {
                sources: source_timeline(),
                source_limit: resource.source_limit(),
                counters: vec![index],
                reserved_until: None,
            })
            .collect();

        for ceiling in resources.ceilings() {
            let counter = counters.len();
            counters.push(DecryptionCounter {
                limit: ceiling.limit,
                sources: source_timeline(),
            });
            for member in &ceiling.members {
                if let Some(index) = resources.position(member.as_ref()) {
                    loads[index].counters.push(counter);
                }
            }
        }

        Self { loads, counters }
    }

    /// Rebuild the plan of `allocations`, applied in order.
    ///
    /// Returns `None` if any allocation conflicts with those before it.
    pub fn from_allocations(resources: &ResourceCollection, allocations: &[Allocation]) -> Option<Self> {
        let mut plan = Self::new(resources);
        for allocation in allocations {
            plan.apply(resources, allocation)?;
        }
        Some(plan)
    }

    /// Add one running allocation. A task-only allocation needs an unused
    /// resource, a recording must be able to start exactly as allocated.
    pub fn apply(&mut self, resources: &ResourceCollection, allocation: &Allocation) -> Option<()> {
        let index = resources.position(allocation.resource.as_ref())?;
        let time = allocation.time;
        match &allocation.source {
            None => self.reserve(index, time.end).then_some(()),
            Some(source) => {
                if !allocation.resource.can_receive(source)
                    || self.earliest_start(index, source, time.start, time.end) != Some(time.start)
                {
                    return None;
                }
                self.commit(index, source, time.start, time.end).ok()
            }
        }
    }

    /// Earliest `t >= start` such that `source` can use resource `index`
    /// throughout `[t, end)`, or `None` if there is no such `t` before `end`.
    pub fn earliest_start(
        &self,
        index: usize,
        source: &Source,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let load = self.loads.get(index)?;
        let mut earliest = start;
        if let Some(reserved) = load.reserved_until {
            earliest = earliest.max(reserved);
        }

        for range in load.sources.overlapping(start, end) {
            if !load.accepts(&range.data, source) {
                earliest = earliest.max(range.end);
            }
        }

        if source.is_encrypted() {
            for &counter in &load.counters {
                let counter = &self.counters[counter];
                if counter.limit == Some(0) {
                    trace!(resource = index, "Resource cannot decrypt");
                    return None;
                }
                for range in counter.sources.overlapping(start, end) {
                    if !counter.accepts(&range.data, source) {
                        earliest = earliest.max(range.end);
                    }
                }
            }
        }

        (earliest < end).then_some(earliest)
    }

    /// Record `source` on resource `index` for `[start, end)`.
    ///
    /// Fails without touching the plan for an unknown resource or an empty
    /// interval.
    pub fn commit(
        &mut self,
        index: usize,
        source: &Source,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<()> {
        debug_assert!(start < end, "committed interval must not be empty");
        let load = self
            .loads
            .get_mut(index)
            .ok_or_else(|| Error::not_found("resource", index.to_string()))?;
        load.sources.add(start, end, vec![source.clone()])?;
        if source.is_encrypted() {
            for &counter in &load.counters {
                self.counters[counter]
                    .sources
                    .add(start, end, vec![source.clone()])?;
            }
        }
        Ok(())
    }

    /// Block resource `index` until `until`. Only an unused resource can be
    /// reserved, and only once.
    pub fn reserve(&mut self, index: usize, until: DateTime<Utc>) -> bool {
        match self.loads.get_mut(index) {
            Some(load) if load.sources.is_empty() && load.reserved_until.is_none() => {
                load.reserved_until = Some(until);
                true
            }
            _ => false,
        }
    }

    /// End of the last committed use of resource `index`.
    pub fn plan_end(&self, index: usize) -> Option<DateTime<Utc>> {
        let load = self.loads.get(index)?;
        let last = load.sources.iter().last().map(|range| range.end);
        match (last, load.reserved_until) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    /// Number of resources the plan covers.
    pub fn resource_count(&self) -> usize {
        self.loads.len()
    }

    /// Uninterrupted stretches of use on resource `index`.
    pub fn busy_periods(&self, index: usize) -> Vec<PlannedTime> {
        let mut periods: Vec<PlannedTime> = Vec::new();
        for range in self.loads.iter().skip(index).take(1).flat_map(|load| load.sources.iter()) {
            match periods.last_mut() {
                Some(last) if last.end == range.start => last.end = range.end,
                _ => periods.push(PlannedTime::from_range(range.start, range.end)),
            }
        }
        periods
    }

    /// Forget usage ending at or before `time`.
    pub fn prune_before(&mut self, time: DateTime<Utc>) {
        for load in &mut self.loads {
            load.sources.prune_before(time);
        }
        for counter in &mut self.counters {
            counter.sources.prune_before(time);
        }
    }

    /// Distance between the first start and the last end still tracked.
    pub fn span(&self) -> TimeDelta {
        let starts = self.loads.iter().filter_map(|load| load.sources.iter().next());
        let ends = self.loads.iter().filter_map(|load| load.sources.iter().last());
        match (
            starts.map(|range| range.start).min(),
            ends.map(|range| range.end).max(),
        ) {
            (Some(first), Some(last)) => last - first,
            _ => TimeDelta::zero(),
        }
    }
}
