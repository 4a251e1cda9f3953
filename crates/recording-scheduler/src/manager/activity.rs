use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::scheduler::ScheduleInformation;

/// What a host should do next.
#[derive(Debug, Clone)]
pub enum ResourceActivity {
    /// Nothing is due before `retest_at`.
    Wait { retest_at: DateTime<Utc> },
    /// Start this entry now.
    Start(ScheduleInformation),
    /// The allocation with this id has reached its end.
    Stop { id: Uuid },
}

impl ResourceActivity {
    pub fn is_wait(&self) -> bool {
        matches!(self, Self::Wait { .. })
    }
}
