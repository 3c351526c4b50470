//! Component tree.
//!
//! Components live in an arena keyed by [`ComponentId`]. Each node owns its
//! ordered child list; the parent link is a non-owning id. The root is a
//! hidden node that is never visited by traversals, displayed or serialized.
//!
//! The tree itself carries no algorithm-specific logic: finding, delivery
//! removal and novelty marking are closures run through [`ComponentTree::walk`],
//! [`ComponentTree::walk_mut`] or the [`Descendants`] iterator.

use std::collections::HashMap;

use tracing::debug;

use crate::component::{Component, ImporterState};
use crate::error::{CoreError, Result};
use crate::id::ComponentId;
use crate::plugin::PluginRegistry;

/// Rooted, ordered tree of components.
#[derive(Debug, Clone)]
pub struct ComponentTree {
    nodes: HashMap<ComponentId, Component>,
    root: ComponentId,
}

impl Default for ComponentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentTree {
    /// Create a tree holding only the invisible root.
    pub fn new() -> Self {
        let root = ComponentId::root();
        let mut nodes = HashMap::new();
        nodes.insert(root, Component::new(root, ""));
        Self { nodes, root }
    }

    /// Id of the invisible root.
    pub fn root(&self) -> ComponentId {
        self.root
    }

    /// Component by id.
    pub fn get(&self, id: ComponentId) -> Option<&Component> {
        self.nodes.get(&id)
    }

    /// Mutable component by id.
    pub fn get_mut(&mut self, id: ComponentId) -> Option<&mut Component> {
        self.nodes.get_mut(&id)
    }

    fn node(&self, id: ComponentId) -> Result<&Component> {
        self.nodes.get(&id).ok_or(CoreError::UnknownComponent(id))
    }

    fn node_mut(&mut self, id: ComponentId) -> Result<&mut Component> {
        self.nodes.get_mut(&id).ok_or(CoreError::UnknownComponent(id))
    }

    /// Number of visible components.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Whether the tree holds only the root.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create a component under `parent`, seeded with one importer state per
    /// loaded plugin.
    pub fn create_component(
        &mut self,
        parent: ComponentId,
        name: impl Into<String>,
        plugins: &PluginRegistry,
    ) -> Result<ComponentId> {
        self.node(parent)?;
        let id = ComponentId::new();
        let mut component = Component::new(id, name);
        for plugin in plugins.iter() {
            component
                .importers
                .insert(plugin.name().to_string(), ImporterState::for_plugin(plugin.as_ref()));
        }
        debug!(component = %component.name, %id, "created component");
        self.nodes.insert(id, component);
        self.set_parent(id, parent)?;
        Ok(id)
    }

    /// Link a detached node under `parent`, appending it to the child list.
    ///
    /// The node must have been detached from its previous parent first.
    pub fn set_parent(&mut self, id: ComponentId, parent: ComponentId) -> Result<()> {
        if id.is_root() {
            return Err(CoreError::RootComponent);
        }
        self.node(id)?;
        self.node(parent)?;
        if self.ancestors(parent).any(|a| a == id) || parent == id {
            return Err(CoreError::InvalidParent { id, parent });
        }
        debug_assert!(self.nodes[&id].parent.is_none(), "set_parent on an attached node");
        self.node_mut(id)?.parent = Some(parent);
        self.node_mut(parent)?.children.push(id);
        Ok(())
    }

    /// Unlink a node from its parent's child list. Its subtree is untouched.
    pub fn detach(&mut self, id: ComponentId) -> Result<()> {
        if id.is_root() {
            return Err(CoreError::RootComponent);
        }
        let Some(parent) = self.node_mut(id)?.parent.take() else {
            return Ok(());
        };
        self.node_mut(parent)?.children.retain(|c| *c != id);
        Ok(())
    }

    /// Move a component under another parent.
    pub fn move_component(&mut self, id: ComponentId, parent: ComponentId) -> Result<()> {
        let previous = self.node(id)?.parent;
        self.detach(id)?;
        if let Err(e) = self.set_parent(id, parent) {
            if let Some(previous) = previous {
                self.set_parent(id, previous)?;
            }
            return Err(e);
        }
        Ok(())
    }

    /// Destroy a component. Only leaves without delivery information qualify.
    pub fn remove_component(&mut self, id: ComponentId) -> Result<Component> {
        if id.is_root() {
            return Err(CoreError::RootComponent);
        }
        let node = self.node(id)?;
        if !node.children.is_empty() || node.has_infos() {
            return Err(CoreError::ComponentNotEmpty(node.name.clone()));
        }
        self.detach(id)?;
        self.nodes.remove(&id).ok_or(CoreError::UnknownComponent(id))
    }

    /// Rename a component.
    pub fn rename(&mut self, id: ComponentId, name: impl Into<String>) -> Result<()> {
        if id.is_root() {
            return Err(CoreError::RootComponent);
        }
        self.node_mut(id)?.name = name.into();
        Ok(())
    }

    /// Ids from `id`'s parent up to the root.
    pub fn ancestors(&self, id: ComponentId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.nodes.get(&id).and_then(|c| c.parent),
        }
    }

    /// Pre-order ids of the subtree at `start` (the root itself is skipped).
    pub fn descendants(&self, start: ComponentId) -> Descendants<'_> {
        let stack = if self.nodes.contains_key(&start) { vec![start] } else { Vec::new() };
        Descendants { tree: self, stack }
    }

    /// Pre-order traversal of the subtree at `start`.
    ///
    /// Collects every `Some` the visitor returns; with `quick_return` the walk
    /// stops at the first one.
    pub fn walk<T>(
        &self,
        start: ComponentId,
        quick_return: bool,
        mut visitor: impl FnMut(&Component) -> Option<T>,
    ) -> Vec<T> {
        let mut results = Vec::new();
        for id in self.descendants(start) {
            if let Some(result) = visitor(&self.nodes[&id]) {
                results.push(result);
                if quick_return {
                    break;
                }
            }
        }
        results
    }

    /// Pre-order traversal with mutable access to each node.
    pub fn walk_mut(&mut self, start: ComponentId, mut visitor: impl FnMut(&mut Component)) {
        let ids: Vec<_> = self.descendants(start).collect();
        for id in ids {
            if let Some(node) = self.nodes.get_mut(&id) {
                visitor(node);
            }
        }
    }

    /// First component with this name, in pre-order.
    pub fn find_by_name(&self, name: &str) -> Option<ComponentId> {
        self.walk(self.root, true, |c| (c.name == name).then_some(c.id))
            .into_iter()
            .next()
    }

    /// Direct child of `parent` with this name.
    pub fn find_child(&self, parent: ComponentId, name: &str) -> Option<ComponentId> {
        let parent = self.nodes.get(&parent)?;
        parent
            .children
            .iter()
            .copied()
            .find(|c| self.nodes.get(c).is_some_and(|c| c.name == name))
    }

    /// Component at a name path starting below the root.
    pub fn find_by_path<S: AsRef<str>>(&self, path: &[S]) -> Option<ComponentId> {
        path.iter()
            .try_fold(self.root, |current, name| self.find_child(current, name.as_ref()))
            .filter(|id| !id.is_root())
    }

    /// Names from the top-level ancestor down to `id`.
    pub fn path(&self, id: ComponentId) -> Vec<String> {
        let mut names: Vec<String> = self
            .ancestors(id)
            .filter(|a| !a.is_root())
            .filter_map(|a| self.nodes.get(&a).map(|c| c.name.clone()))
            .collect();
        names.reverse();
        if let Some(node) = self.nodes.get(&id).filter(|_| !id.is_root()) {
            names.push(node.name.clone());
        }
        names
    }
}

/// Iterator over ancestor ids.
pub struct Ancestors<'a> {
    tree: &'a ComponentTree,
    next: Option<ComponentId>,
}

impl Iterator for Ancestors<'_> {
    type Item = ComponentId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.tree.nodes.get(&current).and_then(|c| c.parent);
        Some(current)
    }
}

/// Pre-order iterator over a subtree.
pub struct Descendants<'a> {
    tree: &'a ComponentTree,
    stack: Vec<ComponentId>,
}

impl Iterator for Descendants<'_> {
    type Item = ComponentId;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let id = self.stack.pop()?;
            let Some(node) = self.tree.nodes.get(&id) else {
                continue;
            };
            self.stack.extend(node.children.iter().rev().copied());
            if !id.is_root() {
                return Some(id);
            }
        }
    }
}
