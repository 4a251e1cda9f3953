//! Placement of periodic tasks into resource idle time.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use super::capacity::CapacityPlan;
use super::resources::ResourceCollection;
use super::schedule::{ScheduleDefinition, ScheduleInformation};
use crate::definition::PeriodicTask;
use crate::domain::{PlannedTime, ResourceRef};

/// The next pending run of one task.
#[derive(Debug, Clone)]
struct TaskCursor {
    task: Arc<PeriodicTask>,
    /// Resource positions the task may run on, in preference order.
    allowed: Vec<usize>,
    current: PlannedTime,
}

impl TaskCursor {
    fn new(task: Arc<PeriodicTask>, allowed: Vec<usize>, reference: DateTime<Utc>) -> Option<Self> {
        if allowed.is_empty() || task.duration() <= TimeDelta::zero() {
            return None;
        }
        let start = task.next_run(reference)?;
        Some(Self {
            current: PlannedTime::new(start, task.duration()),
            task,
            allowed,
        })
    }

    /// Move to the run following one that ended at `end`.
    fn advance(&mut self, end: DateTime<Utc>) -> bool {
        match self.task.next_schedule(Some(end), end) {
            Some(start) => {
                self.current = PlannedTime::new(start, self.task.duration());
                true
            }
            None => false,
        }
    }

    fn allows(&self, index: usize) -> bool {
        self.allowed.contains(&index)
    }
}

/// Tracks when each resource becomes idle and hands out task runs.
#[derive(Debug, Clone)]
pub(crate) struct TaskDispatcher {
    resources: Vec<ResourceRef>,
    tasks: Vec<TaskCursor>,
    last_ends: Vec<DateTime<Utc>>,
    /// Resources still considered once no recordings are left.
    open: Vec<usize>,
}

impl TaskDispatcher {
    pub fn new(
        resources: &ResourceCollection,
        tasks: impl IntoIterator<Item = Arc<PeriodicTask>>,
        plan: &CapacityPlan,
        reference: DateTime<Utc>,
    ) -> Self {
        let tasks = tasks
            .into_iter()
            .filter_map(|task| {
                let allowed = resources.select(task.resources());
                TaskCursor::new(task, allowed, reference)
            })
            .collect();
        let last_ends = (0..resources.len())
            .map(|index| plan.plan_end(index).map_or(reference, |end| end.max(reference)))
            .collect();

        Self {
            resources: resources.iter().cloned().collect(),
            tasks,
            last_ends,
            open: (0..resources.len()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Resource `index` is busy until `end`.
    pub fn occupy(&mut self, index: usize, end: DateTime<Utc>) {
        if let Some(last) = self.last_ends.get_mut(index) {
            *last = (*last).max(end);
        }
    }

    /// Place every task run that fits into the idle time of a resource
    /// before `until`.
    pub fn fill_gaps(&mut self, until: DateTime<Utc>, out: &mut VecDeque<ScheduleInformation>) {
        for index in 0..self.last_ends.len() {
            let mut gap_start = self.last_ends[index];
            if gap_start >= until {
                continue;
            }

            loop {
                let gap = until - gap_start;
                let fitting = self
                    .tasks
                    .iter()
                    .enumerate()
                    .filter(|(_, cursor)| {
                        cursor.allows(index)
                            && cursor.current.duration() <= gap
                            && cursor.current.end <= until
                    })
                    .min_by_key(|(_, cursor)| cursor.current.start)
                    .map(|(position, _)| position);

                let Some(position) = fitting else {
                    break;
                };
                let info = self.dispatch(position, index, gap_start);
                gap_start = info.time.end;
                out.push_back(info);
            }

            self.last_ends[index] = gap_start;
        }
    }

    /// Next task run once all recordings are placed: always on the resource
    /// that becomes idle first.
    pub fn next_tail(&mut self) -> Option<ScheduleInformation> {
        loop {
            if self.tasks.is_empty() {
                return None;
            }
            let best_end = self.open.iter().map(|&index| self.last_ends[index]).min()?;
            let idle: Vec<usize> = self
                .open
                .iter()
                .copied()
                .filter(|&index| self.last_ends[index] == best_end)
                .collect();

            let choice = self.tasks.iter().enumerate().find_map(|(position, cursor)| {
                cursor
                    .allowed
                    .iter()
                    .find(|index| idle.contains(index))
                    .map(|&index| (position, index))
            });

            match choice {
                Some((position, index)) => {
                    let info = self.dispatch(position, index, best_end);
                    self.last_ends[index] = info.time.end;
                    return Some(info);
                }
                None => self.open.retain(|index| !idle.contains(index)),
            }
        }
    }

    fn dispatch(&mut self, position: usize, index: usize, not_before: DateTime<Utc>) -> ScheduleInformation {
        let cursor = &mut self.tasks[position];
        let planned = cursor.current;
        let time = PlannedTime::new(planned.start.max(not_before), planned.duration());
        let info = ScheduleInformation {
            definition: ScheduleDefinition::Task(Arc::clone(&cursor.task)),
            resource: Some(Arc::clone(&self.resources[index])),
            time,
            starts_late: time.start > planned.start,
        };
        debug!(
            task = cursor.task.name(),
            resource = self.resources[index].name(),
            start = %time.start,
            late = info.starts_late,
            "Dispatched task"
        );

        if !cursor.advance(time.end) {
            self.tasks.remove(position);
        }
        info
    }
}
