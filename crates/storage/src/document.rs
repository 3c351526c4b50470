//! On-disk shape of a project file.
//!
//! Importer entries stay raw JSON fragments until their plugin is resolved.
//! An entry whose plugin is not loaded is written back exactly as it was read.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use delivman_core::{CellElement, Delivery};

/// Default root marker of a project document.
pub const PROJECT_FORMAT: &str = "delivman-project";

/// A project file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDocument {
    /// Root marker
    pub format: String,

    /// Application version that wrote the file
    pub version: String,

    /// Deliveries, newest first
    #[serde(default)]
    pub deliveries: Vec<Delivery>,

    /// Top-level components
    #[serde(default)]
    pub components: Vec<ComponentRecord>,
}

impl ProjectDocument {
    /// Top-level component record with this name.
    pub fn component(&self, name: &str) -> Option<&ComponentRecord> {
        self.components.iter().find(|c| c.name == name)
    }

    /// Component record at a name path.
    pub fn component_at<S: AsRef<str>>(&self, path: &[S]) -> Option<&ComponentRecord> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.component(first.as_ref())?, |record, name| record.child(name.as_ref()))
    }
}

/// A component and its subtree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentRecord {
    /// Component name, unique among its siblings
    pub name: String,

    /// Shown in customer-facing documents
    #[serde(default = "default_true")]
    pub customer_relevant: bool,

    /// One raw entry per plugin
    #[serde(default)]
    pub importers: Vec<Box<RawValue>>,

    /// Child components
    #[serde(default)]
    pub components: Vec<ComponentRecord>,
}

impl ComponentRecord {
    /// Direct child record with this name.
    pub fn child(&self, name: &str) -> Option<&ComponentRecord> {
        self.components.iter().find(|c| c.name == name)
    }

    /// Raw importer entry written by `plugin`.
    pub fn importer(&self, plugin: &str) -> Option<&RawValue> {
        self.importers
            .iter()
            .find(|raw| {
                serde_json::from_str::<ImporterHeader>(raw.get())
                    .map(|h| h.name == plugin)
                    .unwrap_or(false)
            })
            .map(|raw| &**raw)
    }
}

fn default_true() -> bool {
    true
}

/// Just enough of an importer entry to find its plugin.
#[derive(Debug, Clone, Deserialize)]
pub struct ImporterHeader {
    /// Plugin name
    pub name: String,

    /// Plugin version that wrote the entry
    #[serde(default)]
    pub version: String,
}

/// Importer entry of a loaded plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImporterRecord {
    /// Plugin name
    pub name: String,

    /// Plugin version that wrote the entry
    pub version: String,

    /// Selected strategy
    #[serde(default)]
    pub strategy: String,

    /// Strategy parameters
    #[serde(default)]
    pub parameters: Vec<CellElement>,

    /// Delivery information, newest delivery first
    #[serde(default)]
    pub infos: Vec<InfoRecord>,
}

/// Delivery information of one delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoRecord {
    /// Delivery name
    pub delivery: String,

    /// Cached novelty flag
    #[serde(default)]
    pub is_new: bool,

    /// Plugin-defined content
    #[serde(default)]
    pub content: serde_json::Value,
}
