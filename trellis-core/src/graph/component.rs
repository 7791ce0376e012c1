//! Graph Components
//!
//! Nodes and plugs live in a single arena owned by the [`Graph`]. Every
//! component is addressed by a [`ComponentId`]; parent links, children,
//! inputs and outputs are all stored as ids, so there are no reference
//! cycles and a removed component simply stops resolving.
//!
//! [`Graph`]: super::Graph

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::node::Node;
use super::plug::{Direction, PlugFlags};
use crate::error::{Error, Result};
use crate::value::{Value, ValueType};

/// Unique identifier for a component in a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u64);

impl ComponentId {
    /// Generate a new unique component ID.
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a node component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) ComponentId);

/// Identifier of a plug component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlugId(pub(crate) ComponentId);

impl NodeId {
    pub fn component(&self) -> ComponentId {
        self.0
    }
}

impl PlugId {
    pub fn component(&self) -> ComponentId {
        self.0
    }
}

impl From<NodeId> for ComponentId {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl From<PlugId> for ComponentId {
    fn from(id: PlugId) -> Self {
        id.0
    }
}

pub(crate) struct NodeData {
    pub behaviour: Arc<dyn Node>,
}

#[derive(Debug, Clone)]
pub(crate) struct PlugData {
    pub direction: Direction,
    pub flags: PlugFlags,
    pub value_type: ValueType,
    pub input: Option<PlugId>,
    pub outputs: Vec<PlugId>,
    /// `None` for compound plugs, whose value lives in their children.
    pub default: Option<Value>,
    pub value: Option<Value>,
    /// Incremented every time the plug is dirtied. Part of the hash cache
    /// key, so stale hashes are never looked up again.
    pub dirty_count: u64,
}

pub(crate) enum ComponentKind {
    Node(NodeData),
    Plug(PlugData),
}

pub(crate) struct Component {
    pub name: String,
    pub parent: Option<ComponentId>,
    pub children: Vec<ComponentId>,
    pub kind: ComponentKind,
}

impl Component {
    pub fn as_plug(&self) -> Option<&PlugData> {
        match &self.kind {
            ComponentKind::Plug(p) => Some(p),
            ComponentKind::Node(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&NodeData> {
        match &self.kind {
            ComponentKind::Node(n) => Some(n),
            ComponentKind::Plug(_) => None,
        }
    }
}

/// Storage for every component of a graph.
#[derive(Default)]
pub(crate) struct Arena {
    components: HashMap<ComponentId, Component>,
    /// The graph root; it is never part of a path.
    root: Option<ComponentId>,
}

impl Arena {
    pub fn set_root(&mut self, root: ComponentId) {
        self.root = Some(root);
    }

    pub fn root(&self) -> Option<ComponentId> {
        self.root
    }

    pub fn insert(&mut self, id: ComponentId, component: Component) {
        self.components.insert(id, component);
    }

    pub fn remove(&mut self, id: ComponentId) -> Option<Component> {
        self.components.remove(&id)
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.components.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn get(&self, id: ComponentId) -> Result<&Component> {
        self.components
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("component {id}")))
    }

    pub fn get_mut(&mut self, id: ComponentId) -> Result<&mut Component> {
        self.components
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("component {id}")))
    }

    pub fn plug(&self, id: PlugId) -> Result<&PlugData> {
        self.get(id.0)?
            .as_plug()
            .ok_or_else(|| Error::NotFound(format!("plug {}", id.0)))
    }

    pub fn plug_mut(&mut self, id: PlugId) -> Result<&mut PlugData> {
        match &mut self.get_mut(id.0)?.kind {
            ComponentKind::Plug(p) => Ok(p),
            ComponentKind::Node(_) => Err(Error::NotFound(format!("plug {}", id.0))),
        }
    }

    pub fn node(&self, id: NodeId) -> Result<&NodeData> {
        self.get(id.0)?
            .as_node()
            .ok_or_else(|| Error::NotFound(format!("node {}", id.0)))
    }

    pub fn is_plug(&self, id: ComponentId) -> bool {
        self.components
            .get(&id)
            .is_some_and(|c| c.as_plug().is_some())
    }

    pub fn is_node(&self, id: ComponentId) -> bool {
        self.components
            .get(&id)
            .is_some_and(|c| c.as_node().is_some())
    }

    pub fn name(&self, id: ComponentId) -> Result<&str> {
        Ok(&self.get(id)?.name)
    }

    pub fn parent(&self, id: ComponentId) -> Option<ComponentId> {
        self.components.get(&id).and_then(|c| c.parent)
    }

    pub fn children(&self, id: ComponentId) -> &[ComponentId] {
        self.components
            .get(&id)
            .map(|c| c.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn plug_children(&self, id: PlugId) -> impl Iterator<Item = PlugId> + '_ {
        self.children(id.0).iter().map(|c| PlugId(*c))
    }

    pub fn child_named(&self, parent: ComponentId, name: &str) -> Option<ComponentId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|c| self.components.get(c).is_some_and(|c| c.name == name))
    }

    /// Resolve a `.`-separated path below `root`.
    pub fn descendant(&self, root: ComponentId, path: &str) -> Option<ComponentId> {
        if path.is_empty() {
            return Some(root);
        }
        path.split('.')
            .try_fold(root, |current, name| self.child_named(current, name))
    }

    pub fn is_ancestor_of(&self, ancestor: ComponentId, id: ComponentId) -> bool {
        let mut current = self.parent(id);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.parent(c);
        }
        false
    }

    /// The first ancestor satisfying `predicate`.
    pub fn ancestor_where(
        &self,
        id: ComponentId,
        predicate: impl Fn(&Component) -> bool,
    ) -> Option<ComponentId> {
        let mut current = self.parent(id);
        while let Some(c) = current {
            let component = self.components.get(&c)?;
            if predicate(component) {
                return Some(c);
            }
            current = component.parent;
        }
        None
    }

    /// The node a plug belongs to.
    pub fn node_of(&self, plug: PlugId) -> Option<NodeId> {
        self.ancestor_where(plug.0, |c| c.as_node().is_some())
            .map(NodeId)
    }

    /// The parent of a plug, if that parent is itself a plug.
    pub fn parent_plug(&self, plug: PlugId) -> Option<PlugId> {
        self.parent(plug.0)
            .filter(|p| self.is_plug(*p))
            .map(PlugId)
    }

    /// Name relative to `ancestor` (`None` for the full path from the root).
    pub fn relative_name(&self, id: ComponentId, ancestor: Option<ComponentId>) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(c) = current {
            if Some(c) == ancestor {
                break;
            }
            if ancestor.is_none() && Some(c) == self.root {
                break;
            }
            let Some(component) = self.components.get(&c) else {
                break;
            };
            names.push(component.name.as_str());
            current = component.parent;
        }
        names.reverse();
        names.join(".")
    }

    pub fn full_name(&self, id: ComponentId) -> String {
        self.relative_name(id, None)
    }

    /// All plugs of a subtree, depth first, including `id` when it is a plug.
    pub fn subtree_plugs(&self, id: ComponentId) -> Vec<PlugId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(c) = stack.pop() {
            if self.is_plug(c) {
                out.push(PlugId(c));
            }
            stack.extend(self.children(c).iter().rev());
        }
        out
    }

    /// All component ids of a subtree, `id` first.
    pub fn subtree(&self, id: ComponentId) -> Vec<ComponentId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(c) = stack.pop() {
            out.push(c);
            stack.extend(self.children(c).iter().rev());
        }
        out
    }

    /// Leaf plugs below (or equal to) `plug`.
    pub fn leaf_plugs(&self, plug: PlugId) -> Vec<PlugId> {
        self.subtree_plugs(plug.0)
            .into_iter()
            .filter(|p| self.children(p.0).is_empty())
            .collect()
    }

    /// Follow inputs to the ultimate upstream producer.
    pub fn source(&self, plug: PlugId) -> Result<PlugId> {
        let mut current = plug;
        while let Some(input) = self.plug(current)?.input {
            current = input;
        }
        Ok(current)
    }
}
