//! Plugin abstraction.
//!
//! Plugins produce the delivery information stored on components. Each plugin
//! offers one or more assignment strategies; a component selects one strategy
//! per plugin and keeps a parameter list for it.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::delivery::Delivery;
use crate::error::PluginError;
use crate::id::ComponentId;
use crate::value::ValueCell;

/// A named, typed strategy parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Parameter name
    pub name: String,

    /// Parameter value
    pub value: ValueCell,
}

impl Parameter {
    /// Create a parameter, boxing the value.
    pub fn new(name: impl Into<String>, value: impl Into<ValueCell>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Look up a parameter by name.
pub fn find_parameter<'a>(parameters: &'a [Parameter], name: &str) -> Option<&'a ValueCell> {
    parameters.iter().find(|p| p.name == name).map(|p| &p.value)
}

/// An assignment strategy offered by a plugin.
#[derive(Debug, Clone)]
pub struct StrategyDescriptor {
    /// Strategy name
    pub name: String,

    /// Human readable description
    pub description: String,

    /// Parameters a new component starts with
    pub default_parameters: Vec<Parameter>,
}

/// Everything a plugin gets to know when asked for delivery information.
#[derive(Debug)]
pub struct CollectRequest<'a> {
    /// Component being documented
    pub component: ComponentId,

    /// Names from the top-level component down to this one
    pub path: &'a [String],

    /// Delivery being collected
    pub delivery: &'a Delivery,

    /// The nearest older delivery, if any
    pub since: Option<&'a Delivery>,

    /// Selected strategy name
    pub strategy: &'a str,

    /// Parameters of the selected strategy
    pub parameters: &'a [Parameter],
}

/// A data-collection plugin.
#[async_trait]
pub trait ImportPlugin: Send + Sync {
    /// Unique plugin name.
    fn name(&self) -> &str;

    /// Dot-separated plugin version.
    fn version(&self) -> &str;

    /// Strategies offered; the first one is the default.
    fn strategies(&self) -> Vec<StrategyDescriptor>;

    /// Produce the delivery information content for one component.
    async fn collect(&self, request: &CollectRequest<'_>) -> Result<Value, PluginError>;

    /// Whether content carries anything worth reporting.
    fn has_content(&self, content: &Value) -> bool {
        match content {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
            _ => true,
        }
    }

    /// Whether `newer` differs from `older`. Plugins that can tell override this.
    fn differs(&self, _older: &Value, _newer: &Value) -> bool {
        false
    }
}

/// Plugins currently loaded, by name.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, Arc<dyn ImportPlugin>>,
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin, replacing any plugin of the same name.
    pub fn register(&mut self, plugin: Arc<dyn ImportPlugin>) -> Option<Arc<dyn ImportPlugin>> {
        self.plugins.insert(plugin.name().to_string(), plugin)
    }

    /// Unregister a plugin.
    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn ImportPlugin>> {
        self.plugins.remove(name)
    }

    /// Get a plugin by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ImportPlugin>> {
        self.plugins.get(name)
    }

    /// Plugin names in registry order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    /// Iterate plugins in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ImportPlugin>> {
        self.plugins.values()
    }

    /// Number of registered plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether no plugin is registered.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.plugins.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl ImportPlugin for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn version(&self) -> &str {
            "1.0"
        }

        fn strategies(&self) -> Vec<StrategyDescriptor> {
            vec![StrategyDescriptor {
                name: "constant".to_string(),
                description: "Echo a parameter".to_string(),
                default_parameters: vec![Parameter::new("text", "")],
            }]
        }

        async fn collect(&self, request: &CollectRequest<'_>) -> Result<Value, PluginError> {
            find_parameter(request.parameters, "text")
                .map(|v| Value::String(v.to_string()))
                .ok_or_else(|| PluginError::InvalidParameter("text".to_string()))
        }
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = PluginRegistry::new();
        assert!(registry.register(Arc::new(Echo)).is_none());
        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["echo"]);
        assert!(registry.unregister("echo").is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_default_content_checks() {
        let echo = Echo;
        assert!(!echo.has_content(&Value::Null));
        assert!(!echo.has_content(&Value::String(String::new())));
        assert!(echo.has_content(&serde_json::json!({"a": 1})));
        assert!(!echo.differs(&serde_json::json!(1), &serde_json::json!(2)));
    }

    #[tokio::test]
    async fn test_collect_reads_parameters() {
        let delivery = Delivery::new("d1", "ann", chrono::Utc::now());
        let parameters = vec![Parameter::new("text", "hello")];
        let path = vec!["app".to_string()];
        let request = CollectRequest {
            component: ComponentId::new(),
            path: &path,
            delivery: &delivery,
            since: None,
            strategy: "constant",
            parameters: &parameters,
        };
        assert_eq!(Echo.collect(&request).await.unwrap(), Value::String("hello".to_string()));
    }
}
