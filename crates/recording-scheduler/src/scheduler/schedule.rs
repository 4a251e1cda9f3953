//! Planner output.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::definition::{PeriodicTask, RecordingDefinition};
use crate::domain::{PlannedTime, ResourceRef, Source};

/// The request a schedule entry was produced for.
#[derive(Debug, Clone)]
pub enum ScheduleDefinition {
    Recording(Arc<RecordingDefinition>),
    Task(Arc<PeriodicTask>),
}

impl ScheduleDefinition {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Recording(definition) => definition.id(),
            Self::Task(task) => task.id(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Recording(definition) => definition.name(),
            Self::Task(task) => task.name(),
        }
    }

    /// Source to record. Tasks have none.
    pub fn source(&self) -> Option<&Source> {
        match self {
            Self::Recording(definition) => Some(definition.source()),
            Self::Task(_) => None,
        }
    }

    pub fn is_task(&self) -> bool {
        matches!(self, Self::Task(_))
    }
}

/// One planning decision.
#[derive(Debug, Clone)]
pub struct ScheduleInformation {
    pub definition: ScheduleDefinition,
    /// Assigned resource, `None` if the occurrence could not be placed.
    pub resource: Option<ResourceRef>,
    pub time: PlannedTime,
    /// The interval starts after the time originally requested.
    pub starts_late: bool,
}

impl ScheduleInformation {
    pub fn is_scheduled(&self) -> bool {
        self.resource.is_some()
    }

    pub fn resource_name(&self) -> Option<&str> {
        self.resource.as_ref().map(|resource| resource.name())
    }
}

impl fmt::Display for ScheduleInformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} - {}] on {}{}",
            self.definition.name(),
            self.time.start,
            self.time.end,
            self.resource_name().unwrap_or("<none>"),
            if self.starts_late { " (late)" } else { "" }
        )
    }
}
