//! Resource planning for unattended broadcast recording devices.
//!
//! Recording requests, possibly repeating weekly with per-day exceptions,
//! are expanded into occurrences and greedily assigned to the resource able
//! to start them first, respecting per-resource source limits and shared
//! decryption ceilings. Running allocations are tracked by the
//! [`AllocationManager`], which also tells a host what to do next.

pub mod config;
pub mod definition;
pub mod domain;
pub mod error;
pub mod logging;
pub mod manager;
pub mod scheduler;
pub mod timeline;

pub use config::{SchedulerConfig, StartOrderRule, TieBreak};
pub use definition::{PeriodicTask, PlanException, RecordingDefinition, RunInterval};
pub use domain::{DecryptionGroup, Device, PlannedTime, ResourceRef, ScheduleResource, Source, SourceGroupId};
pub use error::{Error, Result};
pub use manager::{Allocation, AllocationManager, ResourceActivity, SharedAllocationManager};
pub use scheduler::{RecordingScheduler, ScheduleDefinition, ScheduleInformation, Schedules};
