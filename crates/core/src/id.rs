//! Unique identifiers for delivman entities.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentId(Uuid);

impl ComponentId {
    /// Generate a new ComponentId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Identity reserved for the invisible tree root.
    pub fn root() -> Self {
        Self(Uuid::nil())
    }

    /// Whether this is the root identity
    pub fn is_root(&self) -> bool {
        self.0.is_nil()
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ComponentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for ComponentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Composite key of a cached delivery information entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InfoKey {
    /// Delivery name
    pub delivery: String,

    /// Plugin name
    pub plugin: String,
}

impl InfoKey {
    /// Create a new key.
    pub fn new(delivery: impl Into<String>, plugin: impl Into<String>) -> Self {
        Self {
            delivery: delivery.into(),
            plugin: plugin.into(),
        }
    }
}

impl std::fmt::Display for InfoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.delivery, self.plugin)
    }
}
