//! The read-only view handed to `Node::hash` and `Node::compute`.

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::process;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::graph::component::Arena;
use crate::graph::{Graph, NodeId, NodeRef, PlugId};
use crate::hash::{Digest, Hasher};
use crate::value::{FromValue, Value};

/// Access to plug values, hashes and the context while producing one
/// output. It cannot edit the graph.
pub struct ComputeScope<'a> {
    graph: &'a Graph,
    arena: &'a Arena,
    node: NodeId,
    output: PlugId,
    context: &'a Context,
    reads: Mutex<SmallVec<[PlugId; 8]>>,
}

impl<'a> ComputeScope<'a> {
    pub(crate) fn new(
        graph: &'a Graph,
        arena: &'a Arena,
        node: NodeId,
        output: PlugId,
        context: &'a Context,
    ) -> Self {
        Self {
            graph,
            arena,
            node,
            output,
            context,
            reads: Mutex::new(SmallVec::new()),
        }
    }

    pub fn context(&self) -> &Context {
        self.context
    }

    /// The plug being hashed or computed.
    pub fn output(&self) -> PlugId {
        self.output
    }

    /// True if the output is the plug at `path` (relative to the node).
    pub fn output_is(&self, path: &str) -> bool {
        self.node().is(self.output, path)
    }

    pub fn node(&self) -> NodeRef<'a> {
        NodeRef::new(self.arena, self.node)
    }

    /// The plug at `path` relative to the node.
    pub fn plug(&self, path: &str) -> Result<PlugId> {
        self.node().plug(path).ok_or_else(|| {
            Error::NotFound(format!("{}.{path}", self.arena.full_name(self.node.0)))
        })
    }

    pub fn value(&self, path: &str) -> Result<Value> {
        self.value_of(self.plug(path)?)
    }

    /// Typed read of the plug at `path`.
    pub fn get<T: FromValue>(&self, path: &str) -> Result<T> {
        let plug = self.plug(path)?;
        let value = self.value_of(plug)?;
        T::from_value(&value).ok_or_else(|| Error::TypeMismatch {
            target: self.arena.full_name(plug.0),
            expected: T::TYPE.name().to_string(),
            actual: value.value_type().name().to_string(),
        })
    }

    pub fn value_of(&self, plug: PlugId) -> Result<Value> {
        self.record(plug);
        process::value(self.graph, self.arena, plug, self.context)
    }

    pub fn hash(&self, path: &str) -> Result<Digest> {
        self.hash_of(self.plug(path)?)
    }

    pub fn hash_of(&self, plug: PlugId) -> Result<Digest> {
        self.record(plug);
        process::hash(self.graph, self.arena, plug, self.context)
    }

    /// Append the hash of the plug at `path` to `h`.
    pub fn append_hash(&self, path: &str, h: &mut Hasher) -> Result<()> {
        h.append_digest(self.hash(path)?);
        Ok(())
    }

    /// Evaluate the plug at `path` under a different context.
    pub fn value_in(&self, path: &str, context: &Context) -> Result<Value> {
        let plug = self.plug(path)?;
        self.record(plug);
        let context = self.inherit_canceller(context);
        process::value(self.graph, self.arena, plug, &context)
    }

    /// Hash the plug at `path` under a different context.
    pub fn hash_in(&self, path: &str, context: &Context) -> Result<Digest> {
        let plug = self.plug(path)?;
        self.record(plug);
        let context = self.inherit_canceller(context);
        process::hash(self.graph, self.arena, plug, &context)
    }

    pub fn check_cancellation(&self) -> Result<()> {
        self.context.check_cancellation()
    }

    fn inherit_canceller(&self, context: &Context) -> Context {
        match (context.canceller(), self.context.canceller()) {
            (None, Some(canceller)) => context.with_canceller(canceller.clone()),
            _ => context.clone(),
        }
    }

    fn record(&self, plug: PlugId) {
        let mut reads = self.reads.lock();
        if !reads.contains(&plug) {
            reads.push(plug);
        }
    }

    pub(crate) fn reads(&self) -> SmallVec<[PlugId; 8]> {
        self.reads.lock().clone()
    }
}
