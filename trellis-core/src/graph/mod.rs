//! Node Graph
//!
//! The graph owns every node and plug in an arena keyed by stable ids.
//!
//! # Overview
//!
//! - Nodes are the units of computation. Their behaviour lives behind the
//!   [`Node`] trait; their structure is a tree of plugs built once when the
//!   node is added.
//! - Plugs carry values. An `In` plug either stores a value or takes its
//!   value from a connected input; an `Out` plug is computed by its node.
//! - Both live in a single hierarchy rooted at a container node, addressed
//!   by `.`-separated paths.
//!
//! # Locking
//!
//! The arena sits behind a `RwLock`. Edits take the write lock for the
//! duration of a single structural change, compute the resulting dirty set
//! and release it before any notification is sent, so observers may read
//! (or edit) the graph from their callbacks. Evaluation only ever takes
//! read locks, and many threads may evaluate at once.

pub(crate) mod component;
mod dirty;
mod events;
mod hierarchy;
mod node;
mod plug;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::compute::Caches;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::nodes::{BoxNode, NodeRegistry};

use component::{Arena, Component, ComponentKind, NodeData};
use dirty::Batch;
use events::GraphEvent;

pub use component::{ComponentId, NodeId, PlugId};
pub use dirty::DirtyPropagationScope;
pub use events::{ChildEvent, GraphSignals, NameChange, ParentChange};
pub use hierarchy::{validate_name, USER_PLUG};
pub use node::{AffectedPlugs, CachePolicy, Node, NodeRef, PlugLayout};
pub use plug::{Direction, PlugFlags, PlugSpec};

const ROOT_NAME: &str = "root";

/// A node graph plus the caches used to evaluate it.
pub struct Graph {
    pub(crate) arena: RwLock<Arena>,
    root: NodeId,
    signals: GraphSignals,
    registry: RwLock<NodeRegistry>,
    pub(crate) batch: Mutex<Batch>,
    caches: Arc<Caches>,
    config: EngineConfig,
    consistency_warnings: AtomicU64,
}

impl Graph {
    /// An empty graph with default cache limits.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// An empty graph with its own caches sized by `config`.
    pub fn with_config(config: EngineConfig) -> Self {
        let caches = Arc::new(Caches::new(&config));
        Self::with_caches(config, caches)
    }

    /// A graph evaluating through caches shared with other graphs.
    pub fn with_caches(config: EngineConfig, caches: Arc<Caches>) -> Self {
        let mut arena = Arena::default();
        let root = NodeId(ComponentId::new());
        arena.insert(
            root.0,
            Component {
                name: ROOT_NAME.to_string(),
                parent: None,
                children: Vec::new(),
                kind: ComponentKind::Node(NodeData {
                    behaviour: Arc::new(BoxNode),
                }),
            },
        );
        arena.set_root(root.0);

        Self {
            arena: RwLock::new(arena),
            root,
            signals: GraphSignals::default(),
            registry: RwLock::new(NodeRegistry::with_builtins()),
            batch: Mutex::new(Batch::default()),
            caches,
            config,
            consistency_warnings: AtomicU64::new(0),
        }
    }

    /// The container every other component descends from.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Notification channels for edits to this graph.
    pub fn signals(&self) -> &GraphSignals {
        &self.signals
    }

    /// The hash and compute caches used for evaluation.
    pub fn caches(&self) -> &Caches {
        &self.caches
    }

    /// The configuration the graph was created with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Defer dirty notifications until the returned guard (and any outer
    /// guard) is dropped.
    pub fn dirty_propagation_scope(&self) -> DirtyPropagationScope<'_> {
        DirtyPropagationScope::new(self)
    }

    /// Number of computes that read inputs their node's `affects()` does
    /// not connect to the output being computed. Only counted in debug
    /// builds.
    pub fn consistency_warnings(&self) -> u64 {
        self.consistency_warnings.load(Ordering::Relaxed)
    }

    pub(crate) fn record_consistency_warning(&self) {
        self.consistency_warnings.fetch_add(1, Ordering::Relaxed);
    }

    /// Make `type_name` available to [`Graph::create_node`] and to scripts.
    pub fn register_node_type<F>(&self, type_name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Node> + Send + Sync + 'static,
    {
        self.registry.write().register(type_name, factory);
    }

    /// True if `type_name` is registered.
    pub fn has_node_type(&self, type_name: &str) -> bool {
        self.registry.read().contains(type_name)
    }

    /// Registered type names, in registration order.
    pub fn node_types(&self) -> Vec<String> {
        self.registry.read().type_names().map(str::to_string).collect()
    }

    /// Create a node of a registered type.
    pub fn create_node(&self, parent: NodeId, type_name: &str, name: &str) -> Result<NodeId> {
        let behaviour = self.registry.read().create(type_name)?;
        self.add_node_arc(parent, name, behaviour)
    }

    /// Apply one structural change under the write lock.
    ///
    /// Dirtiness recorded through [`Edit::dirty`] is propagated before the
    /// lock is released, even when `f` fails part way, since the arena may
    /// already have changed. Events are dispatched after the lock is
    /// released and dirty notifications when the scope closes.
    pub(crate) fn edit<R>(&self, f: impl FnOnce(&mut Edit<'_>) -> Result<R>) -> Result<R> {
        let _scope = self.dirty_propagation_scope();
        let (result, events) = {
            let mut arena = self.arena.write();
            let mut edit = Edit {
                arena: &mut arena,
                events: Vec::new(),
                seeds: Vec::new(),
            };
            let result = f(&mut edit);
            let Edit { events, seeds, .. } = edit;
            if !seeds.is_empty() {
                let dirty = dirty::propagate(&mut arena, &seeds);
                tracing::trace!(seeds = seeds.len(), dirtied = dirty.len(), "propagated dirtiness");
                self.batch.lock().add(dirty);
            }
            (result, events)
        };
        self.signals.dispatch(&events);
        result
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("root", &self.root)
            .field("components", &self.arena.read_recursive().len())
            .field("config", &self.config)
            .finish()
    }
}

/// Mutable access to the arena for the duration of one edit.
pub(crate) struct Edit<'a> {
    pub arena: &'a mut Arena,
    pub events: Vec<GraphEvent>,
    seeds: Vec<PlugId>,
}

impl Edit<'_> {
    /// Mark `plug` (and everything downstream) dirty once the edit ends.
    pub fn dirty(&mut self, plug: PlugId) {
        self.seeds.push(plug);
    }
}
