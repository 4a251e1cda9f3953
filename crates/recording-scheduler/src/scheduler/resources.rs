//! Registered resources and decryption ceilings.

use tracing::debug;

use crate::domain::{DecryptionGroup, ResourceRef, ScheduleResource, same_resource};
use crate::{Error, Result};

/// One decryption ceiling shared by a set of resources.
#[derive(Debug, Clone)]
pub(crate) struct DecryptionCeiling {
    pub name: String,
    pub limit: Option<u32>,
    pub members: Vec<ResourceRef>,
}

/// Resources ordered by ascending absolute priority. Resources of equal
/// priority keep their registration order.
#[derive(Debug, Clone, Default)]
pub struct ResourceCollection {
    resources: Vec<ResourceRef>,
    ceilings: Vec<DecryptionCeiling>,
}

impl ResourceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, resource: ResourceRef) -> Result<()> {
        if resource.name().is_empty() {
            return Err(Error::missing_value("resource name"));
        }
        if self.position(resource.as_ref()).is_some() {
            return Err(Error::duplicate("resource", resource.name()));
        }

        let priority = resource.absolute_priority();
        let index = self
            .resources
            .partition_point(|known| known.absolute_priority() <= priority);
        debug!(resource = resource.name(), priority, index, "Registered resource");
        self.resources.insert(index, resource);
        Ok(())
    }

    /// Register a decryption group and all of its nested groups.
    ///
    /// Every resource reachable through the group must already be registered.
    pub fn add_decryption_group(&mut self, group: DecryptionGroup) -> Result<()> {
        if let Some(unknown) = group
            .all_resources()
            .into_iter()
            .find(|resource| self.position(resource.as_ref()).is_none())
        {
            return Err(Error::not_found("resource", unknown.name()));
        }

        let mut pending = vec![group];
        while let Some(group) = pending.pop() {
            let members = group.all_resources().into_iter().cloned().collect();
            debug!(group = %group.name, limit = ?group.maximum_parallel_sources, "Registered decryption group");
            self.ceilings.push(DecryptionCeiling {
                name: group.name,
                limit: group.maximum_parallel_sources,
                members,
            });
            pending.extend(group.groups);
        }
        Ok(())
    }

    /// Position of the registered resource with the same name.
    pub fn position(&self, resource: &dyn ScheduleResource) -> Option<usize> {
        self.resources
            .iter()
            .position(|known| same_resource(known.as_ref(), resource))
    }

    pub fn find(&self, name: &str) -> Option<&ResourceRef> {
        self.resources
            .iter()
            .find(|known| known.name().eq_ignore_ascii_case(name))
    }

    pub fn get(&self, index: usize) -> Option<&ResourceRef> {
        self.resources.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResourceRef> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Positions of `wanted` among the registered resources, in the order
    /// given. An empty list selects every resource.
    pub(crate) fn select(&self, wanted: &[ResourceRef]) -> Vec<usize> {
        if wanted.is_empty() {
            return (0..self.resources.len()).collect();
        }
        let mut selected = Vec::with_capacity(wanted.len());
        for resource in wanted {
            if let Some(index) = self.position(resource.as_ref())
                && !selected.contains(&index)
            {
                selected.push(index);
            }
        }
        selected
    }

    pub(crate) fn ceilings(&self) -> &[DecryptionCeiling] {
        &self.ceilings
    }
}
