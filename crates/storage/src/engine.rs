//! Persistence engine - project files to and from the in-memory model.
//!
//! Loading merges a file into the open project: deliveries are added,
//! components are matched by name or created. A load that fails after it
//! started adding deliveries withdraws everything it added and restores the
//! components it matched before returning the error. Importer entries of plugins that are not loaded are skipped on
//! load and copied back verbatim from the previously opened file on save.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde_json::value::to_raw_value;
use tokio::fs;
use tracing::{debug, error, info, warn};

use delivman_core::{
    ComponentId, ComponentTree, Deliveries, DeliveryInformation, ImportPlugin, ImporterState,
    InfoKey, Parameter, PluginRegistry, ValueCell,
};

use crate::document::{
    ComponentRecord, ImporterHeader, ImporterRecord, InfoRecord, ProjectDocument, PROJECT_FORMAT,
};
use crate::error::{Result, StorageError};
use crate::version::check_version;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Expected root marker of project documents
    pub format_marker: String,

    /// Version written into saved documents
    pub app_version: String,

    /// Accept old files: skips the root marker and plugin version gates
    pub legacy: bool,

    /// Withdraw a new delivery when any plugin fails to collect it
    pub rollback_on_failure: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            format_marker: PROJECT_FORMAT.to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            legacy: false,
            rollback_on_failure: false,
        }
    }
}

/// Stages of a load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadState {
    /// No load in progress
    #[default]
    Idle,
    /// Reading and parsing the file
    ParsingDocument,
    /// Checking the root marker
    ValidatingFormat,
    /// Adding deliveries
    LoadingDeliveries,
    /// Matching and creating components
    LoadingComponents,
    /// Last load succeeded
    Committed,
    /// Undoing a failed load
    RollingBack,
}

/// State of a pre-existing component before a load touched it.
#[derive(Debug)]
struct ComponentSnapshot {
    id: ComponentId,
    customer_relevant: bool,
    importers: BTreeMap<String, ImporterState>,
    infos: BTreeMap<InfoKey, DeliveryInformation>,
}

/// Changes applied by a load in progress.
#[derive(Debug, Default)]
struct LoadTransaction {
    deliveries: Vec<String>,
    components: Vec<ComponentId>,
    matched: Vec<ComponentSnapshot>,
}

impl LoadTransaction {
    /// Remember a matched component before the load changes it.
    fn snapshot(&mut self, tree: &ComponentTree, id: ComponentId) {
        if self.matched.iter().any(|s| s.id == id) {
            return;
        }
        if let Some(component) = tree.get(id) {
            self.matched.push(ComponentSnapshot {
                id,
                customer_relevant: component.customer_relevant,
                importers: component.importers.clone(),
                infos: component.infos.clone(),
            });
        }
    }

    /// Restore matched components, withdraw added deliveries everywhere, then
    /// drop created components that are left empty.
    fn rollback(self, tree: &mut ComponentTree, deliveries: &mut Deliveries) {
        let restored = self.matched.len();
        for snapshot in self.matched {
            if let Some(component) = tree.get_mut(snapshot.id) {
                component.customer_relevant = snapshot.customer_relevant;
                component.importers = snapshot.importers;
                component.infos = snapshot.infos;
            }
        }
        let root = tree.root();
        for name in &self.deliveries {
            deliveries.remove(name);
            tree.walk_mut(root, |c| {
                c.remove_delivery(name);
            });
        }
        for id in self.components.into_iter().rev() {
            if let Err(e) = tree.remove_component(id) {
                debug!(%id, "kept component during rollback: {}", e);
            }
        }
        info!(deliveries = self.deliveries.len(), restored, "rolled back load");
    }
}

/// Reads and writes project documents.
#[derive(Debug, Default)]
pub struct PersistenceEngine {
    config: EngineConfig,
    open_path: Option<PathBuf>,
    missing: BTreeSet<String>,
    state: LoadState,
}

impl PersistenceEngine {
    /// Create an engine.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// File the project was last loaded from or saved to.
    pub fn open_path(&self) -> Option<&Path> {
        self.open_path.as_deref()
    }

    /// Plugins referenced by loaded files but not available.
    pub fn missing_plugins(&self) -> &BTreeSet<String> {
        &self.missing
    }

    /// Stage of the last load.
    pub fn state(&self) -> LoadState {
        self.state
    }

    fn enter(&mut self, state: LoadState) {
        debug!(from = ?self.state, to = ?state, "load state");
        self.state = state;
    }

    /// Load a project file into the tree and delivery collection.
    ///
    /// Returns the names of plugins the file references but which are not
    /// loaded.
    pub async fn load(
        &mut self,
        path: &Path,
        tree: &mut ComponentTree,
        deliveries: &mut Deliveries,
        plugins: &PluginRegistry,
    ) -> Result<BTreeSet<String>> {
        info!("Loading project {}", path.display());
        self.enter(LoadState::ParsingDocument);
        let text = match fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) => {
                self.enter(LoadState::Idle);
                return Err(e.into());
            }
        };
        let missing = self.load_str(&text, tree, deliveries, plugins)?;
        self.open_path = Some(path.to_path_buf());
        Ok(missing)
    }

    /// Load a project document from text.
    pub fn load_str(
        &mut self,
        text: &str,
        tree: &mut ComponentTree,
        deliveries: &mut Deliveries,
        plugins: &PluginRegistry,
    ) -> Result<BTreeSet<String>> {
        self.enter(LoadState::ParsingDocument);
        let document: ProjectDocument = match serde_json::from_str(text) {
            Ok(document) => document,
            Err(e) => {
                self.enter(LoadState::Idle);
                return Err(e.into());
            }
        };

        self.enter(LoadState::ValidatingFormat);
        if !self.config.legacy && document.format != self.config.format_marker {
            self.enter(LoadState::Idle);
            return Err(StorageError::Format {
                expected: self.config.format_marker.clone(),
                found: document.format,
            });
        }
        if !check_version(&self.config.app_version, &document.version) {
            warn!(
                "document written by version {}, running {}",
                document.version, self.config.app_version
            );
        }

        let mut txn = LoadTransaction::default();
        let mut missing = BTreeSet::new();
        match self.load_sections(&document, tree, deliveries, plugins, &mut txn, &mut missing) {
            Ok(()) => {
                self.enter(LoadState::Committed);
                for name in &missing {
                    warn!(plugin = %name, "plugin not available; its data is kept unchanged");
                }
                self.missing.extend(missing.iter().cloned());
                info!(
                    deliveries = txn.deliveries.len(),
                    components = txn.components.len(),
                    "project loaded"
                );
                Ok(missing)
            }
            Err(e) => {
                self.enter(LoadState::RollingBack);
                txn.rollback(tree, deliveries);
                self.enter(LoadState::Idle);
                Err(e)
            }
        }
    }

    fn load_sections(
        &mut self,
        document: &ProjectDocument,
        tree: &mut ComponentTree,
        deliveries: &mut Deliveries,
        plugins: &PluginRegistry,
        txn: &mut LoadTransaction,
        missing: &mut BTreeSet<String>,
    ) -> Result<()> {
        self.enter(LoadState::LoadingDeliveries);
        for delivery in &document.deliveries {
            deliveries.insert(delivery.clone())?;
            txn.deliveries.push(delivery.name.clone());
        }

        self.enter(LoadState::LoadingComponents);
        let root = tree.root();
        for record in &document.components {
            self.load_component(record, root, tree, deliveries, plugins, txn, missing)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn load_component(
        &self,
        record: &ComponentRecord,
        parent: ComponentId,
        tree: &mut ComponentTree,
        deliveries: &Deliveries,
        plugins: &PluginRegistry,
        txn: &mut LoadTransaction,
        missing: &mut BTreeSet<String>,
    ) -> Result<()> {
        let id = match tree.find_child(parent, &record.name) {
            Some(id) => {
                txn.snapshot(tree, id);
                id
            }
            None => {
                let id = tree.create_component(parent, &record.name, plugins)?;
                txn.components.push(id);
                id
            }
        };

        for raw in &record.importers {
            let header: ImporterHeader = serde_json::from_str(raw.get())?;
            let Some(plugin) = plugins.get(&header.name) else {
                debug!(plugin = %header.name, component = %record.name, "skipping importer of missing plugin");
                missing.insert(header.name);
                continue;
            };
            if !self.config.legacy && !check_version(plugin.version(), &header.version) {
                let component = tree.path(id).join("/");
                error!(
                    plugin = %header.name,
                    %component,
                    current = plugin.version(),
                    recorded = %header.version,
                    "plugin is older than the file"
                );
                return Err(StorageError::VersionIncompatible {
                    plugin: header.name,
                    component,
                    current: plugin.version().to_string(),
                    recorded: header.version,
                });
            }

            let importer: ImporterRecord = serde_json::from_str(raw.get())?;
            let component = tree
                .get_mut(id)
                .ok_or(delivman_core::CoreError::UnknownComponent(id))?;
            component.importers.insert(
                importer.name.clone(),
                ImporterState {
                    strategy: importer.strategy.clone(),
                    parameters: importer
                        .parameters
                        .iter()
                        .map(|p| Parameter {
                            name: p.name.clone(),
                            value: ValueCell::from_element(p),
                        })
                        .collect(),
                },
            );
            for info in importer.infos {
                if !deliveries.contains(&info.delivery) {
                    warn!(delivery = %info.delivery, component = %record.name, "information for unknown delivery dropped");
                    continue;
                }
                component.set_info(
                    info.delivery,
                    importer.name.clone(),
                    DeliveryInformation {
                        content: info.content,
                        is_new: info.is_new,
                    },
                );
            }
        }

        if let Some(component) = tree.get_mut(id) {
            component.customer_relevant = record.customer_relevant;
        }

        for child in &record.components {
            self.load_component(child, id, tree, deliveries, plugins, txn, missing)?;
        }
        Ok(())
    }

    /// Save the project.
    ///
    /// Importer entries of missing plugins are copied from the previously
    /// opened file. The open path only changes when the write succeeded.
    pub async fn save(
        &mut self,
        path: &Path,
        tree: &ComponentTree,
        deliveries: &Deliveries,
        plugins: &PluginRegistry,
    ) -> Result<()> {
        let original = match (&self.open_path, self.missing.is_empty()) {
            (Some(open), false) => {
                let text = fs::read_to_string(open).await?;
                Some(serde_json::from_str::<ProjectDocument>(&text)?)
            }
            _ => None,
        };
        let document = self.to_document(tree, deliveries, plugins, original.as_ref())?;
        let mut text = serde_json::to_string_pretty(&document)?;
        text.push('\n');
        fs::write(path, text.as_bytes()).await?;

        self.open_path = Some(path.to_path_buf());
        info!("Saved project {}", path.display());
        Ok(())
    }

    /// Build the document for the current state.
    pub fn to_document(
        &self,
        tree: &ComponentTree,
        deliveries: &Deliveries,
        plugins: &PluginRegistry,
        original: Option<&ProjectDocument>,
    ) -> Result<ProjectDocument> {
        let root = tree.root();
        let components = tree
            .get(root)
            .map(|r| r.children().to_vec())
            .unwrap_or_default()
            .into_iter()
            .map(|id| {
                let name = tree.get(id).map(|c| c.name()).unwrap_or_default();
                let original = original.and_then(|doc| doc.component(name));
                self.component_record(id, tree, deliveries, plugins, original)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ProjectDocument {
            format: self.config.format_marker.clone(),
            version: self.config.app_version.clone(),
            deliveries: deliveries.iter().cloned().collect(),
            components,
        })
    }

    fn component_record(
        &self,
        id: ComponentId,
        tree: &ComponentTree,
        deliveries: &Deliveries,
        plugins: &PluginRegistry,
        original: Option<&ComponentRecord>,
    ) -> Result<ComponentRecord> {
        let component = tree
            .get(id)
            .ok_or(delivman_core::CoreError::UnknownComponent(id))?;

        let mut importers = Vec::new();
        for plugin in plugins.iter().filter(|p| !self.missing.contains(p.name())) {
            if let Some(record) = importer_record(component, plugin.as_ref(), deliveries) {
                importers.push(to_raw_value(&record)?);
            }
        }
        for name in &self.missing {
            match original.and_then(|o| o.importer(name)) {
                Some(raw) => importers.push(raw.to_owned()),
                None => debug!(plugin = %name, component = %component.name(), "no stored entry to carry over"),
            }
        }

        let components = component
            .children()
            .iter()
            .map(|child| {
                let name = tree.get(*child).map(|c| c.name()).unwrap_or_default();
                let original = original.and_then(|o| o.child(name));
                self.component_record(*child, tree, deliveries, plugins, original)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ComponentRecord {
            name: component.name().to_string(),
            customer_relevant: component.customer_relevant,
            importers,
            components,
        })
    }
}

fn importer_record(
    component: &delivman_core::Component,
    plugin: &dyn ImportPlugin,
    deliveries: &Deliveries,
) -> Option<ImporterRecord> {
    let infos: Vec<InfoRecord> = deliveries
        .iter()
        .filter_map(|d| {
            component.info(&d.name, plugin.name()).map(|info| InfoRecord {
                delivery: d.name.clone(),
                is_new: info.is_new,
                content: info.content.clone(),
            })
        })
        .collect();
    let state = match component.importer(plugin.name()) {
        Some(state) => state.clone(),
        None if infos.is_empty() => return None,
        None => ImporterState::for_plugin(plugin),
    };
    Some(ImporterRecord {
        name: plugin.name().to_string(),
        version: plugin.version().to_string(),
        strategy: state.strategy,
        parameters: state
            .parameters
            .iter()
            .map(|p| p.value.to_element(p.name.clone()))
            .collect(),
        infos,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use delivman_core::{CollectRequest, Delivery, PluginError, StrategyDescriptor};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::Arc;

    struct Vcs {
        version: &'static str,
    }

    #[async_trait]
    impl ImportPlugin for Vcs {
        fn name(&self) -> &str {
            "vcs"
        }

        fn version(&self) -> &str {
            self.version
        }

        fn strategies(&self) -> Vec<StrategyDescriptor> {
            vec![StrategyDescriptor {
                name: "log".into(),
                description: "commit log".into(),
                default_parameters: vec![Parameter::new("branch", "main")],
            }]
        }

        async fn collect(&self, _request: &CollectRequest<'_>) -> std::result::Result<Value, PluginError> {
            Ok(json!([]))
        }
    }

    fn registry(version: &'static str) -> PluginRegistry {
        let mut plugins = PluginRegistry::new();
        plugins.register(Arc::new(Vcs { version }));
        plugins
    }

    const GHOST: &str = r#"{"name": "ghost", "version": "9.1",  "strategy": "scan", "infos": [{"delivery": "d1", "content": {"files":  [3, 1]}}]}"#;

    fn document(format: &str, vcs_version: &str) -> String {
        format!(
            r#"{{"format": "{format}", "version": "0.0.1",
  "deliveries": [{{"name": "d1", "integrator": "ann", "created": "2024-01-01T00:00:00Z"}}],
  "components": [{{"name": "app", "importers": [{ghost},
    {{"name": "vcs", "version": "{vcs_version}", "strategy": "log", "infos": [{{"delivery": "d1", "is_new": true, "content": "abc"}}]}}]}}]}}"#,
            format = format,
            ghost = GHOST,
            vcs_version = vcs_version,
        )
    }

    fn write(dir: &tempfile::TempDir, name: &str, text: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[tokio::test]
    async fn test_save_load_save_is_identical() {
        let plugins = registry("1.0");
        let mut tree = ComponentTree::new();
        let mut deliveries = Deliveries::new();
        let root = tree.root();
        let app = tree.create_component(root, "app", &plugins).unwrap();
        let ui = tree.create_component(app, "ui", &plugins).unwrap();
        tree.create_component(root, "lib", &plugins).unwrap();

        deliveries
            .insert(Delivery::new("d1", "ann", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()))
            .unwrap();
        deliveries
            .insert(Delivery::new("d2", "bob", Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()))
            .unwrap();
        {
            let app = tree.get_mut(app).unwrap();
            app.importer_mut("vcs")
                .unwrap()
                .set_parameter(Parameter::new("paths", vec!["src", "docs"]));
            app.set_info("d1", "vcs", DeliveryInformation { content: json!(["a"]), is_new: true });
            app.set_info("d2", "vcs", DeliveryInformation { content: json!(["a", "b"]), is_new: true });
        }
        tree.get_mut(ui).unwrap().customer_relevant = false;

        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.json");
        let second = dir.path().join("second.json");

        let mut engine = PersistenceEngine::default();
        engine.save(&first, &tree, &deliveries, &plugins).await.unwrap();

        let mut loaded_tree = ComponentTree::new();
        let mut loaded_deliveries = Deliveries::new();
        let mut engine = PersistenceEngine::default();
        let missing = engine
            .load(&first, &mut loaded_tree, &mut loaded_deliveries, &plugins)
            .await
            .unwrap();
        assert!(missing.is_empty());
        assert_eq!(engine.state(), LoadState::Committed);
        assert_eq!(loaded_tree.len(), 3);

        let app = loaded_tree.find_by_path(&["app"]).unwrap();
        let state = loaded_tree.get(app).unwrap().importer("vcs").unwrap();
        assert_eq!(
            find_parameter_value(&state.parameters, "paths"),
            Some(ValueCell::from(vec!["src", "docs"]))
        );

        engine
            .save(&second, &loaded_tree, &loaded_deliveries, &plugins)
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(&first).unwrap(),
            std::fs::read_to_string(&second).unwrap()
        );
        assert_eq!(engine.open_path(), Some(second.as_path()));
    }

    fn find_parameter_value(parameters: &[Parameter], name: &str) -> Option<ValueCell> {
        delivman_core::find_parameter(parameters, name).cloned()
    }

    #[tokio::test]
    async fn test_missing_plugin_entry_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let source = write(&dir, "in.json", &document(PROJECT_FORMAT, "1.0"));
        let target = dir.path().join("out.json");

        let plugins = registry("1.0");
        let mut tree = ComponentTree::new();
        let mut deliveries = Deliveries::new();
        let mut engine = PersistenceEngine::default();
        let missing = engine.load(&source, &mut tree, &mut deliveries, &plugins).await.unwrap();
        assert_eq!(missing.into_iter().collect::<Vec<_>>(), vec!["ghost".to_string()]);

        let app = tree.find_by_name("app").unwrap();
        assert_eq!(
            tree.get(app).unwrap().info("d1", "vcs").unwrap().content,
            json!("abc")
        );
        assert!(tree.get(app).unwrap().info("d1", "ghost").is_none());

        engine.save(&target, &tree, &deliveries, &plugins).await.unwrap();
        let saved = std::fs::read_to_string(&target).unwrap();
        assert!(saved.contains(GHOST));
        assert!(saved.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_format_marker_is_checked() {
        let plugins = registry("1.0");
        let mut tree = ComponentTree::new();
        let mut deliveries = Deliveries::new();
        let mut engine = PersistenceEngine::default();

        let err = engine
            .load_str(&document("other-tool", "1.0"), &mut tree, &mut deliveries, &plugins)
            .unwrap_err();
        assert!(matches!(err, StorageError::Format { found, .. } if found == "other-tool"));
        assert_eq!(engine.state(), LoadState::Idle);

        let err = engine
            .load_str("{ not json", &mut tree, &mut deliveries, &plugins)
            .unwrap_err();
        assert!(matches!(err, StorageError::Json(_)));
        assert!(deliveries.is_empty());
        assert!(tree.is_empty());
    }

    #[tokio::test]
    async fn test_legacy_skips_gates_but_keeps_missing_plugins() {
        let dir = tempfile::tempdir().unwrap();
        let source = write(&dir, "old.json", &document("old-tool", "5.0"));
        let target = dir.path().join("new.json");

        let plugins = registry("1.0");
        let mut tree = ComponentTree::new();
        let mut deliveries = Deliveries::new();
        let mut engine = PersistenceEngine::new(EngineConfig {
            legacy: true,
            ..Default::default()
        });
        let missing = engine.load(&source, &mut tree, &mut deliveries, &plugins).await.unwrap();
        assert!(missing.contains("ghost"));
        assert!(engine.missing_plugins().contains("ghost"));

        engine.save(&target, &tree, &deliveries, &plugins).await.unwrap();
        let saved = std::fs::read_to_string(&target).unwrap();
        assert!(saved.contains(GHOST));
        let reread: ProjectDocument = serde_json::from_str(&saved).unwrap();
        assert_eq!(reread.format, PROJECT_FORMAT);
    }

    const BASE: &str = r#"{"format": "delivman-project", "version": "0.1.0",
  "deliveries": [{"name": "d1", "integrator": "ann", "created": "2024-01-01T00:00:00Z"}],
  "components": [{"name": "app", "importers": [
    {"name": "vcs", "version": "1.0", "strategy": "log", "infos": [{"delivery": "d1", "content": "base"}]}]}]}"#;

    fn base() -> (ComponentTree, Deliveries, PluginRegistry) {
        let plugins = registry("1.0");
        let mut tree = ComponentTree::new();
        let mut deliveries = Deliveries::new();
        PersistenceEngine::default()
            .load_str(BASE, &mut tree, &mut deliveries, &plugins)
            .unwrap();
        (tree, deliveries, plugins)
    }

    #[test]
    fn test_duplicate_delivery_rolls_back() {
        let (mut tree, mut deliveries, plugins) = base();
        let incoming = r#"{"format": "delivman-project", "version": "0.1.0", "deliveries": [
  {"name": "d9", "integrator": "ann", "created": "2024-05-01T00:00:00Z"},
  {"name": "d1", "integrator": "bob", "created": "2024-06-01T00:00:00Z"}]}"#;

        let mut engine = PersistenceEngine::default();
        let err = engine
            .load_str(incoming, &mut tree, &mut deliveries, &plugins)
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateName(name) if name == "d1"));
        assert_eq!(
            deliveries.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
            vec!["d1"]
        );
        assert_eq!(deliveries.get("d1").unwrap().integrator, "ann");
    }

    #[test]
    fn test_version_failure_rolls_back() {
        let (mut tree, mut deliveries, plugins) = base();
        let incoming = r#"{"format": "delivman-project", "version": "0.1.0",
  "deliveries": [
    {"name": "d2", "integrator": "ann", "created": "2024-02-01T00:00:00Z"},
    {"name": "d3", "integrator": "ann", "created": "2024-03-01T00:00:00Z"}],
  "components": [
    {"name": "app", "importers": [
      {"name": "vcs", "version": "1.0", "strategy": "log", "infos": [{"delivery": "d2", "content": "x"}]}]},
    {"name": "fresh", "components": [
      {"name": "deep", "importers": [{"name": "vcs", "version": "2.0", "strategy": "log"}]}]}]}"#;

        let mut engine = PersistenceEngine::default();
        let err = engine
            .load_str(incoming, &mut tree, &mut deliveries, &plugins)
            .unwrap_err();
        match err {
            StorageError::VersionIncompatible {
                plugin,
                component,
                current,
                recorded,
            } => {
                assert_eq!(plugin, "vcs");
                assert_eq!(component, "fresh/deep");
                assert_eq!(current, "1.0");
                assert_eq!(recorded, "2.0");
            }
            other => panic!("unexpected error {other}"),
        }

        assert_eq!(deliveries.len(), 1);
        assert!(deliveries.contains("d1"));
        let app = tree.get(tree.find_by_name("app").unwrap()).unwrap();
        assert!(app.info("d2", "vcs").is_none());
        assert_eq!(app.info("d1", "vcs").unwrap().content, json!("base"));
        assert!(tree.find_by_name("fresh").is_none());
        assert!(tree.find_by_name("deep").is_none());
        assert_eq!(tree.len(), 1);
        assert_eq!(engine.state(), LoadState::Idle);
    }

    #[test]
    fn test_failed_load_restores_matched_components() {
        let (mut tree, mut deliveries, plugins) = base();
        let app = tree.find_by_name("app").unwrap();
        let before = tree.get(app).unwrap().clone();

        let incoming = r#"{"format": "delivman-project", "version": "0.1.0",
  "components": [
    {"name": "app", "customer_relevant": false, "importers": [
      {"name": "vcs", "version": "1.0", "strategy": "tags",
       "parameters": [{"name": "branch", "content-kind": "string", "value": "rewritten"}],
       "infos": [{"delivery": "d1", "is_new": true, "content": "rewritten"}]}]},
    {"name": "bad", "importers": [{"name": "vcs", "version": "9.0", "strategy": "log"}]}]}"#;

        let err = PersistenceEngine::default()
            .load_str(incoming, &mut tree, &mut deliveries, &plugins)
            .unwrap_err();
        assert!(matches!(err, StorageError::VersionIncompatible { .. }));

        let after = tree.get(app).unwrap();
        assert!(after.customer_relevant);
        assert_eq!(after.importers, before.importers);
        assert_eq!(after.infos, before.infos);
        assert_eq!(after.info("d1", "vcs").unwrap().content, json!("base"));
        assert!(tree.find_by_name("bad").is_none());
    }

    #[test]
    fn test_unknown_delivery_info_is_dropped() {
        let plugins = registry("1.0");
        let mut tree = ComponentTree::new();
        let mut deliveries = Deliveries::new();
        let text = r#"{"format": "delivman-project", "version": "0.1.0", "components": [
  {"name": "app", "importers": [{"name": "vcs", "version": "0.9", "infos": [{"delivery": "gone", "content": 1}]}]}]}"#;
        PersistenceEngine::default()
            .load_str(text, &mut tree, &mut deliveries, &plugins)
            .unwrap();
        let app = tree.get(tree.find_by_name("app").unwrap()).unwrap();
        assert!(!app.has_infos());
    }
}
