//! Recording resources.

use std::fmt;
use std::sync::Arc;

use super::source::Source;

/// Capabilities of a device the planner may assign recordings to.
///
/// Implementations are supplied by the host. The planner only asks the
/// questions below and never inspects a source beyond its identity.
pub trait ScheduleResource: fmt::Debug + Send + Sync {
    /// Stable name, compared case-insensitively.
    fn name(&self) -> &str;

    /// Higher values win ties between otherwise equal resources.
    fn absolute_priority(&self) -> i32 {
        0
    }

    /// Maximum number of distinct sources carried at once. `None` and
    /// `Some(0)` mean unbounded.
    fn source_limit(&self) -> Option<u32> {
        None
    }

    /// Maximum number of encrypted sources decrypted at once. `None` means
    /// unbounded, `Some(0)` means the resource cannot decrypt at all.
    fn decryption_limit(&self) -> Option<u32> {
        None
    }

    fn can_receive(&self, source: &Source) -> bool;
}

/// Shared handle to a registered resource.
pub type ResourceRef = Arc<dyn ScheduleResource>;

/// True if both handles name the same resource.
pub fn same_resource(a: &dyn ScheduleResource, b: &dyn ScheduleResource) -> bool {
    a.name().eq_ignore_ascii_case(b.name())
}

/// A resource receiving a fixed list of sources.
#[derive(Debug, Clone)]
pub struct Device {
    name: String,
    priority: i32,
    source_limit: Option<u32>,
    decryption_limit: Option<u32>,
    sources: Vec<Source>,
}

impl Device {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            source_limit: None,
            decryption_limit: None,
            sources: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_source_limit(mut self, limit: u32) -> Self {
        self.source_limit = Some(limit);
        self
    }

    pub fn with_decryption_limit(mut self, limit: u32) -> Self {
        self.decryption_limit = Some(limit);
        self
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_sources<'a>(mut self, sources: impl IntoIterator<Item = &'a Source>) -> Self {
        self.sources.extend(sources.into_iter().cloned());
        self
    }

    pub fn into_ref(self) -> ResourceRef {
        Arc::new(self)
    }
}

impl ScheduleResource for Device {
    fn name(&self) -> &str {
        &self.name
    }

    fn absolute_priority(&self) -> i32 {
        self.priority
    }

    fn source_limit(&self) -> Option<u32> {
        self.source_limit
    }

    fn decryption_limit(&self) -> Option<u32> {
        self.decryption_limit
    }

    fn can_receive(&self, source: &Source) -> bool {
        self.sources.iter().any(|known| known.is_same_as(source))
    }
}
