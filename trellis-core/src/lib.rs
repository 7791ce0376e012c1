//! Trellis Core
//!
//! A lazy, pull-based node graph engine. It implements:
//!
//! - A hierarchy of nodes and typed plugs, with connections between plugs
//! - Dirty propagation when values or connections change
//! - Evaluation parameterised by a [`Context`] of named variables
//! - Two level caching: plug hashes, then computed values keyed by hash
//! - Concurrent evaluation with at most one compute per hash in flight
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: the node/plug hierarchy, connections and dirty propagation
//! - `compute`: hashing, computing and the caches behind them
//! - `context`: evaluation contexts and the per-thread context stack
//! - `nodes`: built-in node types and the type registry
//! - `serialisation`: saving and loading graphs as scripts
//!
//! # Example
//!
//! ```rust
//! use trellis_core::nodes::AddNode;
//! use trellis_core::{Graph, Value};
//!
//! let graph = Graph::new();
//! let add = graph.add_node(graph.root(), "Add", AddNode).unwrap();
//! graph.set_value(graph.plug_of(add, "op1").unwrap(), 2).unwrap();
//! graph.set_value(graph.plug_of(add, "op2").unwrap(), 3).unwrap();
//!
//! let sum = graph.plug_of(add, "sum").unwrap();
//! assert_eq!(graph.get_value(sum).unwrap(), Value::Int(5));
//! ```

pub mod compute;
pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod hash;
pub mod nodes;
pub mod serialisation;
pub mod signal;
pub mod value;

pub use compute::{BackgroundTask, CacheStats, Caches, ComputeScope};
pub use config::EngineConfig;
pub use context::{Canceller, Context, ContextScope};
pub use error::{Error, Result};
pub use graph::{
    ComponentId, Direction, Graph, Node, NodeId, NodeRef, PlugFlags, PlugId, PlugLayout, PlugSpec,
};
pub use hash::{Digest, Hasher};
pub use value::{Value, ValueType};
