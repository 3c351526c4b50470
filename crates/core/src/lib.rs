//! delivman core document model.
//!
//! This crate defines typed values, settings, the component tree and the
//! delivery records that the storage crate persists.

#![warn(missing_docs)]

// Identities and errors
mod id;
mod error;

// Values and settings
mod value;
mod settings;

// Tree and deliveries
mod component;
mod tree;
mod delivery;
pub mod novelty;

// Collaborators
mod plugin;
mod event;

// Re-exports
pub use id::{ComponentId, InfoKey};
pub use error::{CoreError, PluginError, Result};

pub use value::{CellElement, ContentKind, ValueCell};
pub use settings::{Partition, SettingsDocument, SettingsStore, LOG_FILTER_SETTING, SETTINGS_MARKER};

pub use component::{Component, ImporterState};
pub use tree::{Ancestors, ComponentTree, Descendants};
pub use delivery::{Deliveries, Delivery, DeliveryInformation};

pub use plugin::{find_parameter, CollectRequest, ImportPlugin, Parameter, PluginRegistry, StrategyDescriptor};
pub use event::ProjectEvent;

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
