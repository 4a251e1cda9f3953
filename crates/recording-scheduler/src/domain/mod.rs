//! Sources, resources and the capacity limits they declare.

pub mod decryption_group;
pub mod resource;
pub mod source;
pub mod time;

pub use decryption_group::DecryptionGroup;
pub use resource::{Device, ResourceRef, ScheduleResource, same_resource};
pub use source::{Source, SourceGroupId};
pub use time::{PlannedTime, local_to_utc};
