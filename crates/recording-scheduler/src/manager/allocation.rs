use std::fmt;

use uuid::Uuid;

use crate::domain::{PlannedTime, ResourceRef, Source};

/// A running use of a resource.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub id: Uuid,
    pub name: String,
    pub resource: ResourceRef,
    /// `None` for a task occupying the resource without recording.
    pub source: Option<Source>,
    pub time: PlannedTime,
}

impl Allocation {
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        resource: ResourceRef,
        source: Option<Source>,
        time: PlannedTime,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            resource,
            source,
            time,
        }
    }

    pub fn is_task(&self) -> bool {
        self.source.is_none()
    }
}

impl fmt::Display for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) on {} [{} - {}]",
            self.name,
            self.id,
            self.resource.name(),
            self.time.start,
            self.time.end
        )
    }
}
