//! Shared decryption ceilings.

use super::resource::ResourceRef;

/// Resources sharing one decryption ceiling.
///
/// The ceiling applies across all member resources, including those of
/// nested groups, on top of each resource's own decryption limit.
#[derive(Debug, Clone)]
pub struct DecryptionGroup {
    pub name: String,
    pub resources: Vec<ResourceRef>,
    pub groups: Vec<DecryptionGroup>,
    /// `None` means unbounded.
    pub maximum_parallel_sources: Option<u32>,
}

impl DecryptionGroup {
    pub fn new(name: impl Into<String>, maximum_parallel_sources: u32) -> Self {
        Self {
            name: name.into(),
            resources: Vec::new(),
            groups: Vec::new(),
            maximum_parallel_sources: Some(maximum_parallel_sources),
        }
    }

    pub fn with_resource(mut self, resource: ResourceRef) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_group(mut self, group: DecryptionGroup) -> Self {
        self.groups.push(group);
        self
    }

    /// All resources of this group and its nested groups.
    pub fn all_resources(&self) -> Vec<&ResourceRef> {
        let mut resources: Vec<&ResourceRef> = self.resources.iter().collect();
        for group in &self.groups {
            resources.extend(group.all_resources());
        }
        resources
    }
}
