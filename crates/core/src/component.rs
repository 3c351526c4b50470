//! Component model - a node of the documented subject-matter tree.

use std::collections::BTreeMap;

use crate::delivery::DeliveryInformation;
use crate::id::{ComponentId, InfoKey};
use crate::plugin::{ImportPlugin, Parameter};

/// Strategy selection and parameters a component keeps for one plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImporterState {
    /// Selected assignment strategy
    pub strategy: String,

    /// Parameters of the selected strategy
    pub parameters: Vec<Parameter>,
}

impl ImporterState {
    /// Seed state from the plugin's default (first) strategy.
    pub fn for_plugin(plugin: &dyn ImportPlugin) -> Self {
        match plugin.strategies().into_iter().next() {
            Some(strategy) => Self {
                strategy: strategy.name,
                parameters: strategy.default_parameters,
            },
            None => Self {
                strategy: String::new(),
                parameters: Vec::new(),
            },
        }
    }

    /// Set a parameter, adding it when absent.
    pub fn set_parameter(&mut self, parameter: Parameter) {
        match self.parameters.iter_mut().find(|p| p.name == parameter.name) {
            Some(existing) => existing.value = parameter.value,
            None => self.parameters.push(parameter),
        }
    }
}

/// A component of the tree.
///
/// Structure (parent and children) is owned by [`crate::ComponentTree`]; the
/// parent link is a plain id and never keeps the parent alive.
#[derive(Debug, Clone)]
pub struct Component {
    pub(crate) id: ComponentId,
    pub(crate) name: String,
    pub(crate) parent: Option<ComponentId>,
    pub(crate) children: Vec<ComponentId>,

    /// Whether the component is relevant for customer-facing documents
    pub customer_relevant: bool,

    /// Per-plugin strategy selection and parameters
    pub importers: BTreeMap<String, ImporterState>,

    /// Cached delivery information by delivery and plugin
    pub infos: BTreeMap<InfoKey, DeliveryInformation>,
}

impl Component {
    pub(crate) fn new(id: ComponentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            parent: None,
            children: Vec::new(),
            customer_relevant: true,
            importers: BTreeMap::new(),
            infos: BTreeMap::new(),
        }
    }

    /// Component id.
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Display name, unique among siblings.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent id; `None` only for the root and detached nodes.
    pub fn parent(&self) -> Option<ComponentId> {
        self.parent
    }

    /// Child ids in display order.
    pub fn children(&self) -> &[ComponentId] {
        &self.children
    }

    /// Importer state of a plugin.
    pub fn importer(&self, plugin: &str) -> Option<&ImporterState> {
        self.importers.get(plugin)
    }

    /// Mutable importer state of a plugin.
    pub fn importer_mut(&mut self, plugin: &str) -> Option<&mut ImporterState> {
        self.importers.get_mut(plugin)
    }

    /// Cached information for a delivery and plugin.
    pub fn info(&self, delivery: &str, plugin: &str) -> Option<&DeliveryInformation> {
        self.infos.get(&InfoKey::new(delivery, plugin))
    }

    /// Mutable cached information for a delivery and plugin.
    pub fn info_mut(&mut self, delivery: &str, plugin: &str) -> Option<&mut DeliveryInformation> {
        self.infos.get_mut(&InfoKey::new(delivery, plugin))
    }

    /// Store information, returning the replaced entry.
    pub fn set_info(
        &mut self,
        delivery: impl Into<String>,
        plugin: impl Into<String>,
        info: DeliveryInformation,
    ) -> Option<DeliveryInformation> {
        self.infos.insert(InfoKey::new(delivery, plugin), info)
    }

    /// Drop every entry recorded for a delivery. Returns the number removed.
    pub fn remove_delivery(&mut self, delivery: &str) -> usize {
        let before = self.infos.len();
        self.infos.retain(|key, _| key.delivery != delivery);
        before - self.infos.len()
    }

    /// Whether any delivery information is recorded.
    pub fn has_infos(&self) -> bool {
        !self.infos.is_empty()
    }
}
