//! Project context - the open project and its entry points.
//!
//! A context owns the component tree, the deliveries, the settings and the
//! plugin registry of one project. Every mutation goes through it so that the
//! dirty flag and change events stay consistent.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use delivman_core::novelty::{mark_if_new, refresh_novelty};
use delivman_core::{
    CollectRequest, Component, ComponentId, ComponentTree, CoreError, Deliveries, Delivery,
    DeliveryInformation, ImportPlugin, ImporterState, Parameter, Partition, PluginError,
    PluginRegistry, ProjectEvent, SettingsStore, Time,
};

use crate::engine::{EngineConfig, PersistenceEngine};
use crate::error::{Result, StorageError};
use crate::report::{CreationFailure, CreationReport};
use crate::settings_file::{load_if_present, project_settings_path, SettingsFiles};

const EVENT_CAPACITY: usize = 256;

/// A component whose information is new in a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInformation {
    /// Component id
    pub component: ComponentId,

    /// Names from the top level down to the component
    pub path: Vec<String>,

    /// Plugin that recorded the information
    pub plugin: String,
}

/// An open project.
pub struct ProjectContext {
    tree: ComponentTree,
    deliveries: Deliveries,
    settings: SettingsStore,
    plugins: PluginRegistry,
    engine: PersistenceEngine,
    dirty: bool,
    events: broadcast::Sender<ProjectEvent>,
}

impl ProjectContext {
    /// Create an empty project.
    pub fn new(plugins: PluginRegistry, config: EngineConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            tree: ComponentTree::new(),
            deliveries: Deliveries::new(),
            settings: SettingsStore::new(),
            plugins,
            engine: PersistenceEngine::new(config),
            dirty: false,
            events,
        }
    }

    /// The component tree.
    pub fn tree(&self) -> &ComponentTree {
        &self.tree
    }

    /// Mutable tree access. Marks the project as modified.
    pub fn tree_mut(&mut self) -> &mut ComponentTree {
        self.dirty = true;
        &mut self.tree
    }

    /// Deliveries, newest first.
    pub fn deliveries(&self) -> &Deliveries {
        &self.deliveries
    }

    /// Settings of all partitions.
    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// Mutable settings. Settings are saved with the project.
    pub fn settings_mut(&mut self) -> &mut SettingsStore {
        &mut self.settings
    }

    /// Loaded plugins.
    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// The persistence engine.
    pub fn engine(&self) -> &PersistenceEngine {
        &self.engine
    }

    /// File the project was loaded from or last saved to.
    pub fn open_path(&self) -> Option<&Path> {
        self.engine.open_path()
    }

    /// Whether there are unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Plugins referenced by loaded files but not available.
    pub fn missing_plugins(&self) -> &BTreeSet<String> {
        self.engine.missing_plugins()
    }

    /// Receive change events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ProjectEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: ProjectEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    fn changed(&mut self, event: ProjectEvent) {
        self.dirty = true;
        self.emit(event);
    }

    fn component(&self, id: ComponentId) -> Result<&Component> {
        Ok(self.tree.get(id).ok_or(CoreError::UnknownComponent(id))?)
    }

    fn component_mut(&mut self, id: ComponentId) -> Result<&mut Component> {
        Ok(self.tree.get_mut(id).ok_or(CoreError::UnknownComponent(id))?)
    }

    fn plugin(&self, name: &str) -> Result<Arc<dyn ImportPlugin>> {
        Ok(self
            .plugins
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::UnknownPlugin(name.to_string()))?)
    }

    /// Create a component under `parent`.
    pub fn create_component(&mut self, parent: ComponentId, name: &str) -> Result<ComponentId> {
        let id = self.tree.create_component(parent, name, &self.plugins)?;
        self.changed(ProjectEvent::ComponentAdded { id });
        Ok(id)
    }

    /// Give a component a new name.
    pub fn rename_component(&mut self, id: ComponentId, name: &str) -> Result<()> {
        self.tree.rename(id, name)?;
        self.changed(ProjectEvent::ComponentRenamed {
            id,
            name: name.to_string(),
        });
        Ok(())
    }

    /// Move a component below another parent.
    pub fn move_component(&mut self, id: ComponentId, parent: ComponentId) -> Result<()> {
        self.tree.move_component(id, parent)?;
        self.changed(ProjectEvent::ComponentChanged { id });
        Ok(())
    }

    /// Destroy a component without children or delivery information.
    pub fn remove_component(&mut self, id: ComponentId) -> Result<Component> {
        let component = self.tree.remove_component(id)?;
        self.changed(ProjectEvent::ComponentRemoved { id });
        Ok(component)
    }

    /// Select a strategy of `plugin` for a component, resetting its
    /// parameters to the strategy defaults.
    pub fn select_strategy(&mut self, id: ComponentId, plugin: &str, strategy: &str) -> Result<()> {
        let descriptor = self
            .plugin(plugin)?
            .strategies()
            .into_iter()
            .find(|s| s.name == strategy)
            .ok_or_else(|| CoreError::UnknownStrategy {
                plugin: plugin.to_string(),
                strategy: strategy.to_string(),
            })?;
        let component = self.component_mut(id)?;
        component.importers.insert(
            plugin.to_string(),
            ImporterState {
                strategy: descriptor.name,
                parameters: descriptor.default_parameters,
            },
        );
        self.changed(ProjectEvent::ComponentChanged { id });
        Ok(())
    }

    /// Set one parameter of the selected strategy of `plugin`.
    pub fn set_parameter(&mut self, id: ComponentId, plugin: &str, parameter: Parameter) -> Result<()> {
        let plugin = self.plugin(plugin)?;
        let component = self.component_mut(id)?;
        component
            .importers
            .entry(plugin.name().to_string())
            .or_insert_with(|| ImporterState::for_plugin(plugin.as_ref()))
            .set_parameter(parameter);
        self.changed(ProjectEvent::ComponentChanged { id });
        Ok(())
    }

    /// Run `plugin` for one component and delivery.
    ///
    /// Returns the strategy that was run with the plugin outcome.
    async fn collect(
        &self,
        id: ComponentId,
        delivery: &str,
        plugin: &dyn ImportPlugin,
    ) -> Result<(String, std::result::Result<Value, PluginError>)> {
        let component = self.component(id)?;
        let delivery = self
            .deliveries
            .get(delivery)
            .ok_or_else(|| CoreError::UnknownDelivery(delivery.to_string()))?;
        let since = self.deliveries.older_than(&delivery.name)?;
        let state = component
            .importer(plugin.name())
            .cloned()
            .unwrap_or_else(|| ImporterState::for_plugin(plugin));
        let path = self.tree.path(id);
        let request = CollectRequest {
            component: id,
            path: &path,
            delivery,
            since,
            strategy: &state.strategy,
            parameters: &state.parameters,
        };
        let outcome = plugin.collect(&request).await;
        Ok((state.strategy, outcome))
    }

    /// Store freshly collected information with its novelty flag.
    fn record(
        &mut self,
        id: ComponentId,
        delivery: &str,
        plugin: &dyn ImportPlugin,
        mut info: DeliveryInformation,
    ) -> Result<()> {
        mark_if_new(&self.deliveries, self.component(id)?, delivery, plugin, &mut info)?;
        self.component_mut(id)?.set_info(delivery, plugin.name(), info);
        Ok(())
    }

    /// Add a delivery and collect its information for every component and
    /// loaded plugin.
    ///
    /// Plugin failures are stored inline and listed in the report. With
    /// `rollback_on_failure` any failure withdraws the delivery.
    pub async fn add_delivery(
        &mut self,
        name: &str,
        integrator: &str,
        created: Time,
    ) -> Result<CreationReport> {
        self.deliveries.insert(Delivery::new(name, integrator, created))?;
        info!(delivery = %name, "Collecting delivery");

        let report = match self.collect_delivery(name).await {
            Ok(report) => report,
            Err(e) => {
                self.withdraw_delivery(name);
                return Err(e);
            }
        };

        if self.engine.config().rollback_on_failure && !report.is_success() {
            warn!(delivery = %name, failures = report.failures.len(), "withdrawing delivery");
            self.withdraw_delivery(name);
            refresh_novelty(&self.deliveries, &mut self.tree, &self.plugins)?;
            return Err(StorageError::DeliveryFailed(report));
        }

        refresh_novelty(&self.deliveries, &mut self.tree, &self.plugins)?;
        info!(delivery = %name, "{}", report);
        self.changed(ProjectEvent::DeliveryAdded {
            name: name.to_string(),
        });
        Ok(report)
    }

    async fn collect_delivery(&mut self, name: &str) -> Result<CreationReport> {
        let mut report = CreationReport::new(name);
        let ids: Vec<ComponentId> = self.tree.descendants(self.tree.root()).collect();
        let plugins: Vec<Arc<dyn ImportPlugin>> = self.plugins.iter().cloned().collect();

        for id in ids {
            for plugin in &plugins {
                let (strategy, outcome) = self.collect(id, name, plugin.as_ref()).await?;
                let info = match outcome {
                    Ok(content) => DeliveryInformation::new(content),
                    Err(e) => {
                        let component = self.tree.path(id);
                        warn!(
                            plugin = %plugin.name(),
                            component = %component.join("/"),
                            "collection failed: {}", e
                        );
                        report.failures.push(CreationFailure {
                            component,
                            plugin: plugin.name().to_string(),
                            strategy,
                            message: e.to_string(),
                        });
                        DeliveryInformation::error(e.to_string())
                    }
                };
                self.record(id, name, plugin.as_ref(), info)?;
                report.collected += 1;
            }
        }
        Ok(report)
    }

    fn withdraw_delivery(&mut self, name: &str) -> Option<Delivery> {
        let removed = self.deliveries.remove(name);
        let root = self.tree.root();
        let mut entries = 0;
        self.tree.walk_mut(root, |c| entries += c.remove_delivery(name));
        debug!(delivery = %name, entries, "removed delivery information");
        removed
    }

    /// Remove a delivery and every piece of information recorded for it.
    pub fn remove_delivery(&mut self, name: &str) -> Result<Delivery> {
        let removed = self
            .withdraw_delivery(name)
            .ok_or_else(|| CoreError::UnknownDelivery(name.to_string()))?;
        refresh_novelty(&self.deliveries, &mut self.tree, &self.plugins)?;
        info!(delivery = %name, "Removed delivery");
        self.changed(ProjectEvent::DeliveryRemoved {
            name: name.to_string(),
        });
        Ok(removed)
    }

    /// Information of a component for a delivery and plugin.
    ///
    /// Collected on first access and cached on the component.
    pub async fn delivery_information(
        &mut self,
        id: ComponentId,
        delivery: &str,
        plugin: &str,
    ) -> Result<&DeliveryInformation> {
        let cached = self.component(id)?.info(delivery, plugin).is_some();
        if !cached {
            let plugin = self.plugin(plugin)?;
            let (_, outcome) = self.collect(id, delivery, plugin.as_ref()).await?;
            let info = outcome.map(DeliveryInformation::new).unwrap_or_else(|e| {
                warn!(plugin = %plugin.name(), %id, "collection failed: {}", e);
                DeliveryInformation::error(e.to_string())
            });
            self.record(id, delivery, plugin.as_ref(), info)?;
            // Newer deliveries compare against this entry now.
            refresh_novelty(&self.deliveries, &mut self.tree, &self.plugins)?;
            self.changed(ProjectEvent::ComponentChanged { id });
        }
        self.component(id)?
            .info(delivery, plugin)
            .ok_or_else(|| CoreError::UnknownPlugin(plugin.to_string()).into())
    }

    /// Components whose information is new in `delivery`, in tree order.
    pub fn new_deliveries_for(&self, delivery: &str) -> Result<Vec<NewInformation>> {
        if !self.deliveries.contains(delivery) {
            return Err(CoreError::UnknownDelivery(delivery.to_string()).into());
        }
        let mut found = Vec::new();
        for id in self.tree.descendants(self.tree.root()) {
            let component = self.component(id)?;
            for (key, info) in &component.infos {
                if key.delivery == delivery && info.is_new {
                    found.push(NewInformation {
                        component: id,
                        path: self.tree.path(id),
                        plugin: key.plugin.clone(),
                    });
                }
            }
        }
        Ok(found)
    }

    /// Merge a project file into this project, along with its settings file.
    ///
    /// A project without unsaved changes is clean after the load; one with
    /// unsaved changes stays modified.
    pub async fn load(&mut self, path: &Path) -> Result<BTreeSet<String>> {
        let was_dirty = self.dirty;
        let missing = self
            .engine
            .load(path, &mut self.tree, &mut self.deliveries, &self.plugins)
            .await?;
        refresh_novelty(&self.deliveries, &mut self.tree, &self.plugins)?;

        let settings = project_settings_path(path);
        if let Err(e) = load_if_present(&mut self.settings, &settings, Partition::Project).await {
            warn!("ignoring project settings {}: {}", settings.display(), e);
        }

        self.dirty = was_dirty;
        self.emit(ProjectEvent::ProjectLoaded {
            path: path.to_path_buf(),
        });
        Ok(missing)
    }

    /// Write the project and its settings file.
    pub async fn save(&mut self, path: &Path) -> Result<()> {
        self.engine
            .save(path, &self.tree, &self.deliveries, &self.plugins)
            .await?;
        if !self.settings.partition(Partition::Project).is_empty() {
            self.settings
                .save(&project_settings_path(path), Partition::Project)
                .await?;
        }
        self.dirty = false;
        self.emit(ProjectEvent::ProjectSaved {
            path: path.to_path_buf(),
        });
        Ok(())
    }
}
