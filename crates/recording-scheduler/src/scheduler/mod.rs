//! The recording planner.
//!
//! A [`RecordingScheduler`] collects resources, decryption groups, recording
//! definitions and periodic tasks. [`RecordingScheduler::schedules`] then
//! lazily merges all occurrences by planned start and assigns each one to
//! the resource that can begin it first. Scheduled recordings are reported
//! in batches sorted by start; periodic tasks are slotted into the idle time
//! between them.

mod capacity;
mod planner;
pub mod resources;
pub mod schedule;
mod tasks;

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::definition::{PeriodicTask, RecordingDefinition};
use crate::domain::{DecryptionGroup, ResourceRef};
use crate::manager::Allocation;
use crate::{Error, Result};

pub(crate) use capacity::CapacityPlan;
use planner::Planner;
pub use resources::ResourceCollection;
pub use schedule::{ScheduleDefinition, ScheduleInformation};
use tasks::TaskDispatcher;

/// Plans recordings and periodic tasks onto registered resources.
#[derive(Debug, Clone, Default)]
pub struct RecordingScheduler {
    config: SchedulerConfig,
    resources: ResourceCollection,
    recordings: Vec<Arc<RecordingDefinition>>,
    tasks: Vec<Arc<PeriodicTask>>,
    /// Running allocations that already hold capacity.
    seeds: Vec<Allocation>,
    /// Definitions never to be planned.
    forbidden: HashSet<Uuid>,
}

impl RecordingScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub(crate) fn seeded(
        config: SchedulerConfig,
        resources: ResourceCollection,
        seeds: Vec<Allocation>,
        forbidden: HashSet<Uuid>,
    ) -> Self {
        Self {
            config,
            resources,
            seeds,
            forbidden,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn resources(&self) -> &ResourceCollection {
        &self.resources
    }

    pub fn add_resource(&mut self, resource: ResourceRef) -> Result<()> {
        self.resources.add(resource)
    }

    pub fn add_decryption_group(&mut self, group: DecryptionGroup) -> Result<()> {
        self.resources.add_decryption_group(group)
    }

    /// Add a recording. Each identifier may be added once.
    pub fn add_recording(&mut self, definition: impl Into<Arc<RecordingDefinition>>) -> Result<()> {
        let definition = definition.into();
        if self.recordings.iter().any(|known| known.id() == definition.id()) {
            return Err(Error::duplicate("recording", definition.id().to_string()));
        }
        self.recordings.push(definition);
        Ok(())
    }

    /// Add a periodic task. Each identifier may be added once.
    pub fn add_task(&mut self, task: impl Into<Arc<PeriodicTask>>) -> Result<()> {
        let task = task.into();
        if self.tasks.iter().any(|known| known.id() == task.id()) {
            return Err(Error::duplicate("task", task.id().to_string()));
        }
        self.tasks.push(task);
        Ok(())
    }

    /// Lazily produce the plan from `reference` on.
    ///
    /// Occurrences ending at or before `reference` are never reported, and
    /// nothing starts before it. The iterator owns its state and leaves the
    /// scheduler untouched, so it may be called again with another reference.
    pub fn schedules(&self, reference: DateTime<Utc>) -> Schedules {
        let mut plan = CapacityPlan::new(&self.resources);
        for seed in &self.seeds {
            if plan.apply(&self.resources, seed).is_none() {
                debug!(id = %seed.id, name = %seed.name, "Running allocation does not fit the plan");
            }
        }

        let recordings = self
            .recordings
            .iter()
            .filter(|definition| !self.forbidden.contains(&definition.id()))
            .cloned();
        let tasks = self
            .tasks
            .iter()
            .filter(|task| !self.forbidden.contains(&task.id()))
            .cloned();

        let dispatcher = TaskDispatcher::new(&self.resources, tasks, &plan, reference);
        Schedules {
            planner: Planner::new(
                self.config.clone(),
                self.resources.clone(),
                plan,
                recordings,
                reference,
            ),
            dispatcher,
            pending: VecDeque::new(),
        }
    }
}

/// Lazy stream of planning decisions, in time order per batch.
///
/// Without periodic tasks the stream ends after the last recording
/// occurrence; with tasks it is unbounded.
#[derive(Debug)]
pub struct Schedules {
    planner: Planner,
    dispatcher: TaskDispatcher,
    pending: VecDeque<ScheduleInformation>,
}

impl Iterator for Schedules {
    type Item = ScheduleInformation;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(info) = self.pending.pop_front() {
            return Some(info);
        }

        let Some(recording) = self.planner.next() else {
            return self.dispatcher.next_tail();
        };

        if let Some(resource) = &recording.resource
            && !self.dispatcher.is_empty()
        {
            self.dispatcher
                .fill_gaps(recording.time.start, &mut self.pending);
            if let Some(index) = self.planner.position(resource.as_ref()) {
                self.dispatcher.occupy(index, recording.time.end);
            }
        }

        if self.pending.is_empty() {
            Some(recording)
        } else {
            self.pending.push_back(recording);
            self.pending.pop_front()
        }
    }
}
