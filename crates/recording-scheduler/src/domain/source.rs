//! Receivable signals.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a carrier. Sources sharing it can be received together at no
/// extra cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceGroupId(pub Uuid);

impl SourceGroupId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SourceGroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SourceGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// A receivable signal.
///
/// Two sources are the same when they share group and name; the
/// encryption flag is a property of the source, not part of its identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    name: String,
    group: SourceGroupId,
    encrypted: bool,
}

impl Source {
    pub fn new(name: impl Into<String>, group: SourceGroupId) -> Self {
        Self {
            name: name.into(),
            group,
            encrypted: false,
        }
    }

    pub fn encrypted(name: impl Into<String>, group: SourceGroupId) -> Self {
        Self {
            encrypted: true,
            ..Self::new(name, group)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> SourceGroupId {
        self.group
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    pub fn belongs_to_same_group(&self, other: &Source) -> bool {
        self.group == other.group
    }

    pub fn is_same_as(&self, other: &Source) -> bool {
        self.belongs_to_same_group(other) && self.name == other.name
    }
}

impl PartialEq for Source {
    fn eq(&self, other: &Self) -> bool {
        self.is_same_as(other)
    }
}

impl Eq for Source {}

impl Hash for Source {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.group.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{} {}",
            self.name,
            self.group,
            if self.encrypted { "Pay" } else { "Free" }
        )
    }
}
