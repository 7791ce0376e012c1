//! Graph Nodes
//!
//! A node owns plugs and defines how its outputs are derived from its
//! inputs. Node behaviour is supplied by a [`Node`] implementation; the
//! graph stores it as a trait object alongside the node's place in the
//! hierarchy.
//!
//! # Contract
//!
//! - `build()` declares the plugs created with the node.
//! - `affects()` reports, for a changed input, which outputs may change.
//!   It must agree with what `hash()`/`compute()` actually read.
//! - `hash()` appends everything the output depends on; `compute()`
//!   produces the value. Both only see the graph through a read-only
//!   [`ComputeScope`].

use smallvec::SmallVec;

use super::component::{Arena, ComponentId, NodeId, PlugId};
use super::plug::PlugSpec;
use crate::compute::ComputeScope;
use crate::error::{Error, Result};
use crate::hash::Hasher;
use crate::value::Value;

/// Outputs affected by one input. Almost always a handful.
pub type AffectedPlugs = SmallVec<[PlugId; 4]>;

/// How results for an output are cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Always recompute.
    Uncached,
    /// Store in the shared cache and deduplicate concurrent work.
    #[default]
    Standard,
}

/// Plugs declared by [`Node::build`], in creation order.
#[derive(Debug, Default)]
pub struct PlugLayout {
    plugs: Vec<(String, PlugSpec)>,
}

impl PlugLayout {
    pub fn add(&mut self, name: impl Into<String>, spec: PlugSpec) -> &mut Self {
        self.plugs.push((name.into(), spec));
        self
    }

    pub(crate) fn into_plugs(self) -> Vec<(String, PlugSpec)> {
        self.plugs
    }
}

/// Read-only view of a node, handed to `affects()` and `accepts_input()`.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    arena: &'a Arena,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub(crate) fn new(arena: &'a Arena, id: NodeId) -> Self {
        Self { arena, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Look up a plug by path relative to the node (`"p.x"`).
    pub fn plug(&self, path: &str) -> Option<PlugId> {
        self.arena
            .descendant(self.id.0, path)
            .filter(|c| self.arena.is_plug(*c))
            .map(PlugId)
    }

    /// True if `plug` is the plug at `path`.
    pub fn is(&self, plug: PlugId, path: &str) -> bool {
        self.plug(path) == Some(plug)
    }

    /// True if `plug` is the plug at `path` or one of its descendants.
    pub fn is_within(&self, plug: PlugId, path: &str) -> bool {
        match self.plug(path) {
            Some(p) => p == plug || self.arena.is_ancestor_of(p.0, plug.0),
            None => false,
        }
    }

    /// Path of `component` relative to this node.
    pub fn relative_name(&self, component: impl Into<ComponentId>) -> String {
        self.arena.relative_name(component.into(), Some(self.id.0))
    }

    /// True if `component` lives somewhere below this node.
    pub fn contains(&self, component: impl Into<ComponentId>) -> bool {
        self.arena.is_ancestor_of(self.id.0, component.into())
    }
}

/// Behaviour of a node type.
pub trait Node: Send + Sync + 'static {
    /// Registered type name, written by serialisation.
    fn type_name(&self) -> &str;

    /// Declare the plugs created with the node.
    fn build(&self, _plugs: &mut PlugLayout) {}

    /// Outputs that may change when `input` changes.
    fn affects(&self, _node: &NodeRef<'_>, _input: PlugId, _outputs: &mut AffectedPlugs) {}

    /// Append everything `scope.output()` depends on.
    fn hash(&self, _scope: &ComputeScope<'_>, _h: &mut Hasher) -> Result<()> {
        Err(Error::node(format!("{} does not hash outputs", self.type_name())))
    }

    /// Produce the value of `scope.output()`.
    fn compute(&self, _scope: &ComputeScope<'_>) -> Result<Value> {
        Err(Error::node(format!("{} does not compute outputs", self.type_name())))
    }

    fn hash_cache_policy(&self, _node: &NodeRef<'_>, _output: PlugId) -> CachePolicy {
        CachePolicy::Standard
    }

    fn compute_cache_policy(&self, _node: &NodeRef<'_>, _output: PlugId) -> CachePolicy {
        CachePolicy::Standard
    }

    /// Veto a connection into one of this node's plugs.
    fn accepts_input(&self, _node: &NodeRef<'_>, _plug: PlugId, _input: PlugId) -> bool {
        true
    }

    /// False for containers whose output plugs simply hold values.
    fn computes(&self) -> bool {
        true
    }
}
