//! Bookkeeping of running allocations.
//!
//! The [`AllocationManager`] owns the registered resources and the table of
//! allocations currently running on them. Every change to the table is
//! checked by rebuilding the capacity plan of all allocations; a change that
//! does not fit is rolled back and reported as `Ok(false)`.

mod activity;
mod allocation;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use activity::ResourceActivity;
pub use allocation::Allocation;

use crate::config::SchedulerConfig;
use crate::domain::{DecryptionGroup, PlannedTime, ResourceRef, Source};
use crate::scheduler::{CapacityPlan, RecordingScheduler, ResourceCollection, ScheduleInformation};
use crate::{Error, Result};

#[derive(Debug, Default)]
pub struct AllocationManager {
    config: SchedulerConfig,
    resources: ResourceCollection,
    allocations: Vec<Allocation>,
}

impl AllocationManager {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn resources(&self) -> &ResourceCollection {
        &self.resources
    }

    /// Register a resource. Not allowed while allocations are running.
    pub fn add_resource(&mut self, resource: ResourceRef) -> Result<()> {
        self.ensure_idle()?;
        self.resources.add(resource)
    }

    /// Register a decryption group. Not allowed while allocations are running.
    pub fn add_decryption_group(&mut self, group: DecryptionGroup) -> Result<()> {
        self.ensure_idle()?;
        self.resources.add_decryption_group(group)
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.allocations.is_empty() {
            Ok(())
        } else {
            Err(Error::inconsistent(
                "resources cannot change while allocations are active",
            ))
        }
    }

    pub fn current_allocations(&self) -> &[Allocation] {
        &self.allocations
    }

    /// Latest end of all running allocations.
    pub fn end_of_allocation(&self) -> Option<DateTime<Utc>> {
        self.allocations.iter().map(|a| a.time.end).max()
    }

    fn fits(&self) -> bool {
        CapacityPlan::from_allocations(&self.resources, &self.allocations).is_some()
    }

    /// Begin a running allocation.
    ///
    /// Returns `Ok(false)` if it conflicts with the allocations already
    /// running. A `None` source allocates the resource for a task, which
    /// requires the resource to be otherwise unused.
    pub fn start(
        &mut self,
        resource: &ResourceRef,
        source: Option<Source>,
        id: Uuid,
        name: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(resource) = self
            .resources
            .position(resource.as_ref())
            .and_then(|index| self.resources.get(index))
            .cloned()
        else {
            return Err(Error::not_found("resource", resource.name()));
        };
        if start >= end {
            return Err(Error::out_of_range(
                "end",
                format!("{end} must be after start {start}"),
            ));
        }
        if self.allocations.iter().any(|a| a.id == id) {
            return Err(Error::duplicate("allocation", id.to_string()));
        }

        let allocation = Allocation::new(id, name, resource, source, PlannedTime::from_range(start, end));
        self.allocations.push(allocation);
        if !self.fits() {
            if let Some(rejected) = self.allocations.pop() {
                warn!(id = %rejected.id, name = %rejected.name, resource = rejected.resource.name(), "Allocation conflicts with running allocations");
            }
            return Ok(false);
        }

        if let Some(started) = self.allocations.last() {
            info!(
                id = %started.id,
                name = %started.name,
                resource = started.resource.name(),
                start = %start,
                end = %end,
                task = started.is_task(),
                "Started allocation"
            );
        }
        Ok(true)
    }

    /// Start the allocation a schedule entry asks for.
    pub fn start_schedule(&mut self, schedule: &ScheduleInformation) -> Result<bool> {
        let resource = schedule
            .resource
            .as_ref()
            .ok_or_else(|| Error::missing_value("resource"))?;
        self.start(
            resource,
            schedule.definition.source().cloned(),
            schedule.definition.id(),
            schedule.definition.name(),
            schedule.time.start,
            schedule.time.end,
        )
    }

    /// End a running allocation.
    pub fn stop(&mut self, id: Uuid) -> Result<()> {
        let position = self
            .allocations
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| Error::not_found("allocation", id.to_string()))?;
        let removed = self.allocations.remove(position);
        info!(id = %removed.id, name = %removed.name, resource = removed.resource.name(), "Stopped allocation");
        Ok(())
    }

    /// Move the end of a running allocation.
    ///
    /// Returns `Ok(false)` and leaves the allocation unchanged if the new
    /// end conflicts with other allocations.
    pub fn modify(&mut self, id: Uuid, new_end: DateTime<Utc>) -> Result<bool> {
        let allocation = self
            .allocations
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::not_found("allocation", id.to_string()))?;
        if new_end <= allocation.time.start {
            return Err(Error::out_of_range(
                "end",
                format!("{new_end} must be after start {}", allocation.time.start),
            ));
        }

        let previous = allocation.time.end;
        allocation.time.end = new_end;
        if self.fits() {
            info!(id = %id, end = %new_end, "Modified allocation");
            return Ok(true);
        }

        if let Some(allocation) = self.allocations.iter_mut().find(|a| a.id == id) {
            allocation.time.end = previous;
        }
        warn!(id = %id, end = %new_end, "Allocation change conflicts with running allocations");
        Ok(false)
    }

    /// A scheduler knowing every resource and seeded with the running
    /// allocations. With `exclude_active`, definitions of running
    /// allocations are not planned again.
    pub fn create_scheduler(&self, exclude_active: bool) -> RecordingScheduler {
        let forbidden: HashSet<Uuid> = if exclude_active {
            self.allocations.iter().map(|a| a.id).collect()
        } else {
            HashSet::new()
        };
        RecordingScheduler::seeded(
            self.config.clone(),
            self.resources.clone(),
            self.allocations.clone(),
            forbidden,
        )
    }

    /// Schedules produced by `loader`, without the occurrences already
    /// being served by a running allocation.
    pub fn get_schedules<F, I>(
        &self,
        now: DateTime<Utc>,
        loader: F,
    ) -> Result<impl Iterator<Item = ScheduleInformation> + use<F, I>>
    where
        F: FnOnce(RecordingScheduler, DateTime<Utc>) -> Result<I>,
        I: IntoIterator<Item = ScheduleInformation>,
    {
        let running: Vec<(Uuid, DateTime<Utc>)> =
            self.allocations.iter().map(|a| (a.id, a.time.end)).collect();
        let schedules = loader(self.create_scheduler(false), now)?;

        Ok(schedules.into_iter().filter(move |schedule| {
            let id = schedule.definition.id();
            !running
                .iter()
                .any(|&(active, end)| active == id && schedule.time.start < end)
        }))
    }

    /// The next thing the host has to do at `now`.
    pub fn next_activity<F, I>(&self, now: DateTime<Utc>, loader: F) -> Result<Option<ResourceActivity>>
    where
        F: FnOnce(RecordingScheduler, DateTime<Utc>) -> Result<I>,
        I: IntoIterator<Item = ScheduleInformation>,
    {
        let stop_time = self.allocations.iter().map(|a| a.time.end).min();
        if let Some(stop_time) = stop_time
            && stop_time <= now
            && let Some(due) = self.allocations.iter().find(|a| a.time.end == stop_time)
        {
            debug!(id = %due.id, "Allocation due to stop");
            return Ok(Some(ResourceActivity::Stop { id: due.id }));
        }

        // Entries no resource could take are never started.
        let next = loader(self.create_scheduler(true), now)?
            .into_iter()
            .find(ScheduleInformation::is_scheduled);
        let retest_at = match next {
            Some(schedule) if schedule.time.start <= now => {
                debug!(schedule = %schedule, "Schedule due to start");
                return Ok(Some(ResourceActivity::Start(schedule)));
            }
            Some(schedule) => Some(stop_time.map_or(schedule.time.start, |stop| stop.min(schedule.time.start))),
            None => stop_time,
        };

        Ok(retest_at.map(|retest_at| ResourceActivity::Wait { retest_at }))
    }
}

/// An [`AllocationManager`] behind a lock, for hosts driving it from more
/// than one thread.
#[derive(Debug, Clone, Default)]
pub struct SharedAllocationManager {
    inner: Arc<Mutex<AllocationManager>>,
}

impl SharedAllocationManager {
    pub fn new(manager: AllocationManager) -> Self {
        Self {
            inner: Arc::new(Mutex::new(manager)),
        }
    }

    /// Run `f` with exclusive access to the manager.
    pub fn with<R>(&self, f: impl FnOnce(&mut AllocationManager) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }

    pub fn start_schedule(&self, schedule: &ScheduleInformation) -> Result<bool> {
        self.with(|manager| manager.start_schedule(schedule))
    }

    pub fn stop(&self, id: Uuid) -> Result<()> {
        self.with(|manager| manager.stop(id))
    }

    pub fn modify(&self, id: Uuid, new_end: DateTime<Utc>) -> Result<bool> {
        self.with(|manager| manager.modify(id, new_end))
    }

    pub fn current_allocations(&self) -> Vec<Allocation> {
        self.with(|manager| manager.current_allocations().to_vec())
    }

    pub fn next_activity<F, I>(&self, now: DateTime<Utc>, loader: F) -> Result<Option<ResourceActivity>>
    where
        F: FnOnce(RecordingScheduler, DateTime<Utc>) -> Result<I>,
        I: IntoIterator<Item = ScheduleInformation>,
    {
        self.with(|manager| manager.next_activity(now, loader))
    }
}
