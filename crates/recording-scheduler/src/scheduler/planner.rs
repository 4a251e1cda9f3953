//! Placement of recording occurrences.
//!
//! Every occurrence is tried on every resource of every plan still in the
//! running, so a batch holds a set of alternative plans. Plans starting the
//! occurrence on time replace those delaying it. When the batch closes, the
//! configured rules pick the best plan and its placements are reported.

use std::cmp::{Ordering, Reverse};
use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use itertools::Itertools;
use tracing::{debug, trace};

use super::capacity::CapacityPlan;
use super::resources::ResourceCollection;
use super::schedule::{ScheduleDefinition, ScheduleInformation};
use crate::config::{SchedulerConfig, StartOrderRule, TieBreak};
use crate::definition::{Occurrence, OccurrenceCursor, RecordingDefinition};
use crate::domain::{PlannedTime, ScheduleResource, Source};

/// Pending occurrences of one recording definition.
#[derive(Debug)]
struct RecordingCursor {
    definition: Arc<RecordingDefinition>,
    cursor: OccurrenceCursor,
    current: Occurrence,
}

impl RecordingCursor {
    fn new(definition: Arc<RecordingDefinition>, reference: DateTime<Utc>) -> Option<Self> {
        let mut cursor = OccurrenceCursor::new(&definition, reference);
        let current = cursor.next(&definition)?;
        Some(Self {
            definition,
            cursor,
            current,
        })
    }

    fn advance(&mut self) -> bool {
        match self.cursor.next(&self.definition) {
            Some(next) => {
                self.current = next;
                true
            }
            None => false,
        }
    }
}

/// An occurrence placed in one alternative plan.
#[derive(Debug, Clone)]
struct Placed {
    info: ScheduleInformation,
    source: Source,
    index: usize,
    priority: i32,
    /// Recording time lost to a late start.
    cut: TimeDelta,
    arrival: usize,
}

/// One way of placing the occurrences of the current batch.
#[derive(Debug, Clone)]
struct Alternative {
    plan: CapacityPlan,
    placed: Vec<Placed>,
}

/// Resolved [`StartOrderRule`]: resource positions instead of names.
#[derive(Debug)]
struct StartOrder {
    leading: usize,
    followers: Vec<usize>,
}

impl StartOrder {
    fn resolve(rule: &StartOrderRule, resources: &ResourceCollection) -> Option<Self> {
        let position = |name: &str| {
            resources
                .find(name)
                .and_then(|resource| resources.position(resource.as_ref()))
        };
        let leading = position(rule.leading.as_str())?;
        let followers = if rule.followers.is_empty() {
            (0..resources.len()).filter(|&index| index != leading).collect()
        } else {
            rule.followers
                .iter()
                .filter_map(|name| position(name.as_str()))
                .filter(|&index| index != leading)
                .collect()
        };
        Some(Self { leading, followers })
    }

    /// Follower busy stretches already running when the leading resource
    /// starts up.
    fn violations(&self, plan: &CapacityPlan) -> usize {
        let starts: Vec<DateTime<Utc>> = plan
            .busy_periods(self.leading)
            .iter()
            .map(|period| period.start)
            .collect();
        self.followers
            .iter()
            .flat_map(|&follower| plan.busy_periods(follower))
            .map(|period| {
                starts
                    .iter()
                    .filter(|&&start| period.start <= start && start < period.end)
                    .count()
            })
            .sum()
    }
}

/// Figures of merit of an alternative. Per-resource lists run from the
/// highest to the lowest priority resource.
#[derive(Debug)]
struct Score {
    total_cut: TimeDelta,
    priorities: Vec<i32>,
    recordings: Vec<usize>,
    sources: Vec<usize>,
    spread: usize,
    resources_in_use: usize,
    start_order_violations: usize,
    indices: Vec<usize>,
}

impl Score {
    fn compare(&self, other: &Self, rules: &[TieBreak]) -> Ordering {
        rules
            .iter()
            .fold(Ordering::Equal, |order, rule| {
                order.then_with(|| match rule {
                    TieBreak::TotalCut => self.total_cut.cmp(&other.total_cut),
                    TieBreak::Priority => other.priorities.cmp(&self.priorities),
                    TieBreak::RecordingCount => other.recordings.cmp(&self.recordings),
                    TieBreak::SourceCount => self.sources.cmp(&other.sources),
                    TieBreak::SourceSpread => self.spread.cmp(&other.spread),
                    TieBreak::ResourceCount => self.resources_in_use.cmp(&other.resources_in_use),
                    TieBreak::StartOrder => self
                        .start_order_violations
                        .cmp(&other.start_order_violations),
                })
            })
            .then_with(|| self.indices.cmp(&other.indices))
    }
}

#[derive(Debug)]
pub(crate) struct Planner {
    config: SchedulerConfig,
    resources: ResourceCollection,
    start_order: Vec<StartOrder>,
    reference: DateTime<Utc>,
    cursors: Vec<RecordingCursor>,
    /// Never empty. All alternatives hold the same occurrences.
    alternatives: Vec<Alternative>,
    unplaced: Vec<(usize, ScheduleInformation)>,
    batch_end: Option<DateTime<Utc>>,
    steps: usize,
    arrivals: usize,
    ready: VecDeque<ScheduleInformation>,
}

impl Planner {
    pub fn new(
        config: SchedulerConfig,
        resources: ResourceCollection,
        plan: CapacityPlan,
        recordings: impl IntoIterator<Item = Arc<RecordingDefinition>>,
        reference: DateTime<Utc>,
    ) -> Self {
        let cursors = recordings
            .into_iter()
            .filter_map(|definition| RecordingCursor::new(definition, reference))
            .collect();
        let start_order = config
            .start_order
            .iter()
            .filter_map(|rule| {
                let resolved = StartOrder::resolve(rule, &resources);
                if resolved.is_none() {
                    debug!(leading = %rule.leading, "Ignoring start order of unknown resource");
                }
                resolved
            })
            .collect();
        Self {
            config,
            resources,
            start_order,
            reference,
            cursors,
            alternatives: vec![Alternative {
                plan,
                placed: Vec::new(),
            }],
            unplaced: Vec::new(),
            batch_end: None,
            steps: 0,
            arrivals: 0,
            ready: VecDeque::new(),
        }
    }

    pub fn position(&self, resource: &dyn ScheduleResource) -> Option<usize> {
        self.resources.position(resource)
    }

    /// Next decision in report order.
    pub fn next(&mut self) -> Option<ScheduleInformation> {
        loop {
            if let Some(info) = self.ready.pop_front() {
                return Some(info);
            }

            // Earliest planned start; ties go to the definition added first.
            let Some(position) = self
                .cursors
                .iter()
                .position_min_by_key(|cursor| cursor.current.planned.start)
            else {
                if self.batch_is_empty() {
                    return None;
                }
                self.close_batch(None);
                continue;
            };

            let start = self.cursors[position].current.planned.start;
            if self.batch_is_due(start) {
                self.close_batch(Some(start));
            }

            let cursor = &mut self.cursors[position];
            let definition = Arc::clone(&cursor.definition);
            let occurrence = cursor.current;
            if !cursor.advance() {
                self.cursors.remove(position);
            }
            self.place(definition, occurrence.planned);
        }
    }

    fn batch_is_empty(&self) -> bool {
        self.unplaced.is_empty() && self.alternatives.iter().all(|alternative| alternative.placed.is_empty())
    }

    fn batch_is_due(&mut self, start: DateTime<Utc>) -> bool {
        let mut due = false;
        self.steps += 1;
        if self.steps > self.config.max_recordings_in_plan {
            self.steps = 1;
            due = true;
        }
        if self.batch_end.is_some_and(|end| start >= end) {
            due = true;
        }
        let max_span = self.config.max_plan_span();
        if self.alternatives.iter().any(|alternative| alternative.plan.span() > max_span) {
            due = true;
        }
        if self.alternatives.len() > self.config.max_alternatives_in_plan {
            due = true;
        }
        due
    }

    fn score(&self, alternative: &Alternative) -> Score {
        let count = alternative.plan.resource_count();
        let mut recordings = vec![0usize; count];
        let mut sources: Vec<Vec<&Source>> = vec![Vec::new(); count];
        let mut total_cut = TimeDelta::zero();
        for placed in &alternative.placed {
            total_cut += placed.cut;
            if let Some(carried) = sources.get_mut(placed.index) {
                recordings[placed.index] += 1;
                if !carried.iter().any(|known| known.is_same_as(&placed.source)) {
                    carried.push(&placed.source);
                }
            }
        }

        Score {
            total_cut,
            priorities: alternative.placed.iter().map(|placed| placed.priority).collect(),
            recordings: recordings.iter().rev().copied().collect(),
            sources: sources.iter().rev().map(Vec::len).collect(),
            spread: sources.iter().map(Vec::len).sum(),
            resources_in_use: recordings.iter().filter(|&&count| count > 0).count(),
            start_order_violations: self
                .start_order
                .iter()
                .map(|order| order.violations(&alternative.plan))
                .sum(),
            indices: alternative.placed.iter().map(|placed| placed.index).collect(),
        }
    }

    /// Report the best plan of the current batch together with the
    /// occurrences no plan could take, sorted by start and then by
    /// descending resource priority. Usage ending before `next_start` is
    /// forgotten.
    fn close_batch(&mut self, next_start: Option<DateTime<Utc>>) {
        let rules = &self.config.tie_breaks;
        let Some(best) = self
            .alternatives
            .iter()
            .map(|alternative| self.score(alternative))
            .position_min_by(|a, b| a.compare(b, rules))
        else {
            return;
        };
        let alternatives = self.alternatives.len();
        let mut chosen = self.alternatives.swap_remove(best);
        self.alternatives.clear();

        let placed = std::mem::take(&mut chosen.placed);
        let unplaced = std::mem::take(&mut self.unplaced);
        debug!(
            alternatives,
            placed = placed.len(),
            unplaced = unplaced.len(),
            "Closing planning batch"
        );
        self.ready.extend(
            placed
                .into_iter()
                .map(|placed| (placed.info, Some(placed.priority), placed.arrival))
                .chain(unplaced.into_iter().map(|(arrival, info)| (info, None, arrival)))
                .sorted_by_key(|(info, priority, arrival)| (info.time.start, Reverse(*priority), *arrival))
                .map(|(info, _, _)| info),
        );

        if let Some(start) = next_start {
            chosen.plan.prune_before(start);
        }
        self.alternatives.push(chosen);
        self.batch_end = None;
    }

    fn place(&mut self, definition: Arc<RecordingDefinition>, planned: PlannedTime) {
        let source = definition.source();
        let start = planned.start.max(self.reference);
        let arrival = self.arrivals;
        self.arrivals += 1;
        self.batch_end = Some(self.batch_end.map_or(planned.end, |end| end.max(planned.end)));

        let candidates: Vec<(usize, i32)> = self
            .resources
            .select(definition.resources())
            .into_iter()
            .filter_map(|index| {
                let resource = self.resources.get(index)?;
                resource
                    .can_receive(source)
                    .then(|| (index, resource.absolute_priority()))
            })
            .collect();

        let mut on_time = Vec::new();
        let mut late = Vec::new();
        for alternative in &self.alternatives {
            for &(index, priority) in &candidates {
                let Some(earliest) = alternative.plan.earliest_start(index, source, start, planned.end)
                else {
                    continue;
                };
                let Some(resource) = self.resources.get(index) else {
                    continue;
                };
                let starts_late = earliest > planned.start;
                if starts_late && !on_time.is_empty() {
                    continue;
                }

                let mut plan = alternative.plan.clone();
                if let Err(error) = plan.commit(index, source, earliest, planned.end) {
                    trace!(recording = definition.name(), %error, "Discarded alternative");
                    continue;
                }
                let mut placed = alternative.placed.clone();
                placed.push(Placed {
                    info: ScheduleInformation {
                        definition: ScheduleDefinition::Recording(Arc::clone(&definition)),
                        resource: Some(Arc::clone(resource)),
                        time: PlannedTime::from_range(earliest, planned.end),
                        starts_late,
                    },
                    source: source.clone(),
                    index,
                    priority,
                    cut: earliest - planned.start,
                    arrival,
                });
                let extended = Alternative { plan, placed };
                if starts_late {
                    late.push(extended);
                } else {
                    on_time.push(extended);
                }
            }
        }

        let extended = if on_time.is_empty() { late } else { on_time };
        if extended.is_empty() {
            debug!(recording = definition.name(), start = %planned.start, "No resource available");
            self.unplaced.push((
                arrival,
                ScheduleInformation {
                    definition: ScheduleDefinition::Recording(definition),
                    resource: None,
                    time: planned,
                    starts_late: false,
                },
            ));
            return;
        }

        trace!(
            recording = definition.name(),
            alternatives = extended.len(),
            "Extended plans"
        );
        self.alternatives = extended;
    }
}
