//! Delivery model - named, timestamped snapshots of the component tree.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::Time;

/// A delivery is a snapshot event across the whole component tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    /// Unique name within the open project
    pub name: String,

    /// Who integrated the delivery
    pub integrator: String,

    /// When the delivery was created
    pub created: Time,
}

impl Delivery {
    /// Create a new delivery.
    pub fn new(name: impl Into<String>, integrator: impl Into<String>, created: Time) -> Self {
        Self {
            name: name.into(),
            integrator: integrator.into(),
            created,
        }
    }
}

/// Deliveries of a project, newest first.
///
/// The collection is re-sorted on every insertion, so iteration always yields
/// creation times in descending order.
#[derive(Debug, Clone, Default)]
pub struct Deliveries {
    items: Vec<Delivery>,
}

impl Deliveries {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a delivery, rejecting a name that is already taken.
    pub fn insert(&mut self, delivery: Delivery) -> Result<()> {
        if self.contains(&delivery.name) {
            return Err(CoreError::DuplicateName(delivery.name));
        }
        // Equal timestamps keep insertion order.
        let pos = self
            .items
            .iter()
            .position(|d| d.created < delivery.created)
            .unwrap_or(self.items.len());
        self.items.insert(pos, delivery);
        Ok(())
    }

    /// Remove a delivery by name.
    pub fn remove(&mut self, name: &str) -> Option<Delivery> {
        let pos = self.items.iter().position(|d| d.name == name)?;
        Some(self.items.remove(pos))
    }

    /// Get a delivery by name.
    pub fn get(&self, name: &str) -> Option<&Delivery> {
        self.items.iter().find(|d| d.name == name)
    }

    /// Whether a delivery with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The nearest delivery strictly older than `name`.
    pub fn older_than(&self, name: &str) -> Result<Option<&Delivery>> {
        let current = self
            .get(name)
            .ok_or_else(|| CoreError::UnknownDelivery(name.to_string()))?;
        Ok(self.items.iter().find(|d| d.created < current.created))
    }

    /// Iterate newest first.
    pub fn iter(&self) -> std::slice::Iter<'_, Delivery> {
        self.items.iter()
    }

    /// Newest delivery.
    pub fn latest(&self) -> Option<&Delivery> {
        self.items.first()
    }

    /// Number of deliveries.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there are no deliveries.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'a> IntoIterator for &'a Deliveries {
    type Item = &'a Delivery;
    type IntoIter = std::slice::Iter<'a, Delivery>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Information a plugin recorded for one component in one delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryInformation {
    /// Plugin-defined content
    pub content: serde_json::Value,

    /// Whether the content changed since the previous delivery
    pub is_new: bool,
}

impl DeliveryInformation {
    /// Wrap plugin content. Novelty is decided by the novelty engine.
    pub fn new(content: serde_json::Value) -> Self {
        Self {
            content,
            is_new: false,
        }
    }

    /// Inline payload for a failed collection.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(serde_json::json!({ "error": message.into() }))
    }

    /// The message of an inline error payload.
    pub fn error_message(&self) -> Option<&str> {
        self.content.get("error").and_then(|v| v.as_str())
    }
}
