//! Novelty - whether delivery information changed since the previous delivery.

use serde_json::Value;
use tracing::debug;

use crate::component::Component;
use crate::delivery::{Deliveries, DeliveryInformation};
use crate::error::Result;
use crate::plugin::{ImportPlugin, PluginRegistry};
use crate::tree::ComponentTree;

/// Decide the novelty of `content` for `component` in `delivery`.
///
/// Content is new when it carries anything and either no older delivery
/// holds information for the same plugin, or the plugin reports a difference
/// against the nearest older one.
pub fn is_new(
    deliveries: &Deliveries,
    component: &Component,
    delivery: &str,
    plugin: &dyn ImportPlugin,
    content: &Value,
) -> Result<bool> {
    let has_content = plugin.has_content(content);
    let Some(older) = deliveries.older_than(delivery)? else {
        return Ok(has_content);
    };
    let new = match component.info(&older.name, plugin.name()) {
        Some(previous) => has_content && plugin.differs(&previous.content, content),
        None => has_content,
    };
    Ok(new)
}

/// Set `info.is_new` for a component, delivery and plugin.
pub fn mark_if_new(
    deliveries: &Deliveries,
    component: &Component,
    delivery: &str,
    plugin: &dyn ImportPlugin,
    info: &mut DeliveryInformation,
) -> Result<()> {
    info.is_new = is_new(deliveries, component, delivery, plugin, &info.content)?;
    Ok(())
}

/// Recompute every cached novelty flag in the tree.
///
/// Entries of plugins that are not loaded keep their recorded flag.
pub fn refresh_novelty(
    deliveries: &Deliveries,
    tree: &mut ComponentTree,
    plugins: &PluginRegistry,
) -> Result<usize> {
    let mut updates = Vec::new();
    for id in tree.descendants(tree.root()) {
        let Some(component) = tree.get(id) else { continue };
        for (key, info) in &component.infos {
            let Some(plugin) = plugins.get(&key.plugin) else { continue };
            if !deliveries.contains(&key.delivery) {
                continue;
            }
            let flag = is_new(deliveries, component, &key.delivery, plugin.as_ref(), &info.content)?;
            if flag != info.is_new {
                updates.push((id, key.clone(), flag));
            }
        }
    }
    let changed = updates.len();
    for (id, key, flag) in updates {
        if let Some(info) = tree.get_mut(id).and_then(|c| c.infos.get_mut(&key)) {
            info.is_new = flag;
        }
    }
    debug!(changed, "refreshed novelty flags");
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::Delivery;
    use crate::error::PluginError;
    use crate::plugin::{CollectRequest, StrategyDescriptor};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;
    use std::sync::Arc;

    struct Text {
        compare: bool,
    }

    #[async_trait]
    impl ImportPlugin for Text {
        fn name(&self) -> &str {
            "text"
        }

        fn version(&self) -> &str {
            "1.0.0"
        }

        fn strategies(&self) -> Vec<StrategyDescriptor> {
            Vec::new()
        }

        async fn collect(&self, _request: &CollectRequest<'_>) -> std::result::Result<Value, PluginError> {
            Ok(Value::Null)
        }

        fn differs(&self, older: &Value, newer: &Value) -> bool {
            self.compare && older != newer
        }
    }

    fn setup(compare: bool) -> (Deliveries, ComponentTree, PluginRegistry, crate::ComponentId) {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut deliveries = Deliveries::new();
        deliveries.insert(Delivery::new("d1", "ann", base)).unwrap();
        deliveries.insert(Delivery::new("d2", "ann", base + Duration::days(1))).unwrap();

        let mut plugins = PluginRegistry::new();
        plugins.register(Arc::new(Text { compare }));

        let mut tree = ComponentTree::new();
        let root = tree.root();
        let id = tree.create_component(root, "app", &plugins).unwrap();
        (deliveries, tree, plugins, id)
    }

    #[test]
    fn test_oldest_delivery_is_new_when_it_has_content() {
        let (deliveries, tree, plugins, id) = setup(true);
        let plugin = plugins.get("text").unwrap();
        let component = tree.get(id).unwrap();
        assert!(is_new(&deliveries, component, "d1", plugin.as_ref(), &json!("v1")).unwrap());
        assert!(!is_new(&deliveries, component, "d1", plugin.as_ref(), &json!("")).unwrap());
    }

    #[test]
    fn test_changed_content_is_new() {
        let (deliveries, mut tree, plugins, id) = setup(true);
        let plugin = plugins.get("text").unwrap();
        tree.get_mut(id).unwrap().set_info("d1", "text", DeliveryInformation::new(json!("v1")));

        let component = tree.get(id).unwrap();
        let mut changed = DeliveryInformation::new(json!("v2"));
        mark_if_new(&deliveries, component, "d2", plugin.as_ref(), &mut changed).unwrap();
        assert!(changed.is_new);

        let mut same = DeliveryInformation::new(json!("v1"));
        mark_if_new(&deliveries, component, "d2", plugin.as_ref(), &mut same).unwrap();
        assert!(!same.is_new);
    }

    #[test]
    fn test_default_comparator_reports_unchanged() {
        let (deliveries, mut tree, plugins, id) = setup(false);
        let plugin = plugins.get("text").unwrap();
        tree.get_mut(id).unwrap().set_info("d1", "text", DeliveryInformation::new(json!("v1")));
        let component = tree.get(id).unwrap();
        assert!(!is_new(&deliveries, component, "d2", plugin.as_ref(), &json!("v2")).unwrap());
    }

    #[test]
    fn test_missing_previous_information_is_new() {
        let (deliveries, tree, plugins, id) = setup(true);
        let plugin = plugins.get("text").unwrap();
        let component = tree.get(id).unwrap();
        assert!(is_new(&deliveries, component, "d2", plugin.as_ref(), &json!("v2")).unwrap());
    }

    #[test]
    fn test_refresh_after_previous_delivery_removed() {
        let (mut deliveries, mut tree, plugins, id) = setup(true);
        {
            let component = tree.get_mut(id).unwrap();
            component.set_info("d1", "text", DeliveryInformation::new(json!("v1")));
            let mut info = DeliveryInformation::new(json!("v1"));
            info.is_new = false;
            component.set_info("d2", "text", info);
        }

        deliveries.remove("d1");
        tree.get_mut(id).unwrap().remove_delivery("d1");
        assert_eq!(refresh_novelty(&deliveries, &mut tree, &plugins).unwrap(), 1);
        assert!(tree.get(id).unwrap().info("d2", "text").unwrap().is_new);
    }
}
