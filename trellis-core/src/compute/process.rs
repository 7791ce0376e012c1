//! Hash and Compute Processes
//!
//! Evaluating a plug in a context goes through the same steps for hashes
//! and values:
//!
//! 1. Follow inputs of the same type to the plug that really provides the
//!    value (connected plugs share one cache entry).
//! 2. A converting connection hashes as its input plus both type tags and
//!    converts the input's value.
//! 3. Compound plugs combine their children.
//! 4. Plugs that are not computed (inputs, and outputs of containers)
//!    provide their stored value.
//! 5. Computed outputs ask their node. Hashes go through the hash cache,
//!    values through the compute cache keyed by that hash.
//!
//! Failures carry the path of the plug where they happened and are never
//! cached.

use std::sync::Arc;

use super::cache::HashKey;
use super::scope::ComputeScope;
use crate::context::{Context, ContextScope};
use crate::error::{Error, Result};
use crate::graph::component::{Arena, PlugData};
use crate::graph::{AffectedPlugs, CachePolicy, Direction, Graph, Node, NodeId, NodeRef, PlugFlags, PlugId};
use crate::hash::{Digest, Hasher};
use crate::value::{FromValue, Value};

/// Follow inputs while the type stays the same.
fn resolve(arena: &Arena, plug: PlugId) -> Result<PlugId> {
    let mut current = plug;
    loop {
        let data = arena.plug(current)?;
        match data.input {
            Some(input) if arena.plug(input)?.value_type == data.value_type => current = input,
            _ => return Ok(current),
        }
    }
}

/// The node computing `plug`, if it is a computed output.
fn computing_node(arena: &Arena, plug: PlugId, data: &PlugData) -> Option<(NodeId, Arc<dyn Node>)> {
    if data.direction != Direction::Out {
        return None;
    }
    let node = arena.node_of(plug)?;
    let behaviour = arena.node(node).ok()?.behaviour.clone();
    behaviour.computes().then_some((node, behaviour))
}

fn stored(arena: &Arena, plug: PlugId, data: &PlugData) -> Result<Value> {
    data.value
        .clone()
        .ok_or_else(|| Error::NotFound(format!("value of {}", arena.full_name(plug.0))))
}

pub(crate) fn hash(graph: &Graph, arena: &Arena, plug: PlugId, context: &Context) -> Result<Digest> {
    let plug = resolve(arena, plug)?;
    let data = arena.plug(plug)?;

    if let Some(input) = data.input {
        let input_type = arena.plug(input)?.value_type;
        let mut h = Hasher::new();
        h.append_digest(hash(graph, arena, input, context)?)
            .append_str(input_type.name())
            .append_str(data.value_type.name());
        return Ok(h.finish());
    }

    if data.value_type.is_compound() {
        let mut h = Hasher::new();
        for child in arena.plug_children(plug) {
            h.append_digest(hash(graph, arena, child, context)?);
        }
        // No children hashes as null: nothing to do.
        return Ok(h.finish());
    }

    match computing_node(arena, plug, data) {
        Some((node, behaviour)) => computed_hash(graph, arena, node, &behaviour, plug, data, context),
        None => {
            let mut h = Hasher::new();
            h.append(&stored(arena, plug, data)?);
            Ok(h.finish())
        }
    }
}

fn computed_hash(
    graph: &Graph,
    arena: &Arena,
    node: NodeId,
    behaviour: &Arc<dyn Node>,
    plug: PlugId,
    data: &PlugData,
    context: &Context,
) -> Result<Digest> {
    let policy = behaviour.hash_cache_policy(&NodeRef::new(arena, node), plug);
    let key = HashKey {
        plug,
        dirty_count: data.dirty_count,
        context: context.hash(),
    };
    if policy == CachePolicy::Standard {
        if let Some(digest) = graph.caches().hashes.get(&key) {
            return Ok(digest);
        }
    }

    context.check_cancellation()?;
    let mut h = Hasher::new();
    h.append_str(behaviour.type_name())
        .append_str(&arena.relative_name(plug.0, Some(node.0)))
        .append_str(data.value_type.name());

    let scope = ComputeScope::new(graph, arena, node, plug, context);
    {
        let _context = ContextScope::enter(context);
        behaviour.hash(&scope, &mut h)
    }
    .map_err(|e| e.in_plug(|| arena.full_name(plug.0)))?;

    let digest = h.finish();
    if policy == CachePolicy::Standard {
        graph.caches().hashes.insert(key, digest);
    }
    Ok(digest)
}

pub(crate) fn value(graph: &Graph, arena: &Arena, plug: PlugId, context: &Context) -> Result<Value> {
    let plug = resolve(arena, plug)?;
    let data = arena.plug(plug)?;

    if let Some(input) = data.input {
        let value = value(graph, arena, input, context)?;
        return value.convert(data.value_type).ok_or_else(|| {
            Error::TypeMismatch {
                target: arena.full_name(plug.0),
                expected: data.value_type.name().to_string(),
                actual: value.value_type().name().to_string(),
            }
            .in_plug(|| arena.full_name(plug.0))
        });
    }

    if data.value_type.is_compound() {
        let parts = arena
            .plug_children(plug)
            .map(|child| value(graph, arena, child, context))
            .collect::<Result<Vec<_>>>()?;
        return Value::from_components(data.value_type, parts)
            .map_err(|e| e.in_plug(|| arena.full_name(plug.0)));
    }

    let Some((node, behaviour)) = computing_node(arena, plug, data) else {
        return stored(arena, plug, data);
    };

    let policy = if data.flags.contains(PlugFlags::CACHEABLE) {
        behaviour.compute_cache_policy(&NodeRef::new(arena, node), plug)
    } else {
        CachePolicy::Uncached
    };

    match policy {
        CachePolicy::Uncached => run_compute(graph, arena, node, &behaviour, plug, data, context),
        CachePolicy::Standard => {
            let digest = computed_hash(graph, arena, node, &behaviour, plug, data, context)?;
            graph.caches().compute.get_or_compute(digest, context, || {
                tracing::trace!(plug = %arena.full_name(plug.0), %digest, "compute cache miss");
                run_compute(graph, arena, node, &behaviour, plug, data, context)
            })
        }
    }
}

fn run_compute(
    graph: &Graph,
    arena: &Arena,
    node: NodeId,
    behaviour: &Arc<dyn Node>,
    plug: PlugId,
    data: &PlugData,
    context: &Context,
) -> Result<Value> {
    context.check_cancellation()?;
    let full_name = || arena.full_name(plug.0);

    let scope = ComputeScope::new(graph, arena, node, plug, context);
    let result = {
        let _context = ContextScope::enter(context);
        behaviour.compute(&scope)
    };
    let value = result.map_err(|e| e.in_plug(full_name))?;

    let value = value.convert(data.value_type).ok_or_else(|| {
        Error::TypeMismatch {
            target: full_name(),
            expected: data.value_type.name().to_string(),
            actual: value.value_type().name().to_string(),
        }
        .in_plug(full_name)
    })?;

    if cfg!(debug_assertions) {
        check_consistency(graph, arena, node, behaviour, plug, &scope);
    }
    Ok(value)
}

/// Warn about reads of the node's own inputs that `affects()` does not
/// declare for the output. Such outputs are not dirtied when the input
/// changes, so their cached values go stale.
fn check_consistency(
    graph: &Graph,
    arena: &Arena,
    node: NodeId,
    behaviour: &Arc<dyn Node>,
    output: PlugId,
    scope: &ComputeScope<'_>,
) {
    let view = NodeRef::new(arena, node);
    let covers = |affected: PlugId| affected == output || arena.is_ancestor_of(affected.0, output.0);

    for read in scope.reads() {
        let is_own_input = arena.node_of(read) == Some(node)
            && arena
                .plug(read)
                .map(|d| d.direction == Direction::In)
                .unwrap_or(false);
        if !is_own_input {
            continue;
        }

        // A compound read is declared if the compound, an enclosing plug
        // or any of its leaves is.
        let mut candidates = arena.leaf_plugs(read);
        let mut current = Some(read);
        while let Some(p) = current {
            candidates.push(p);
            current = arena.parent_plug(p);
        }
        let declared = candidates.into_iter().any(|input| {
            let mut affected = AffectedPlugs::new();
            behaviour.affects(&view, input, &mut affected);
            affected.into_iter().any(covers)
        });

        if !declared {
            graph.record_consistency_warning();
            tracing::warn!(
                input = %arena.full_name(read.0),
                output = %arena.full_name(output.0),
                "ConsistencyWarning: compute read an input that affects() does not declare"
            );
        }
    }
}

impl Graph {
    /// The value of `plug` in the current context.
    pub fn get_value(&self, plug: PlugId) -> Result<Value> {
        self.get_value_in(plug, &Context::current())
    }

    pub fn get_value_in(&self, plug: PlugId, context: &Context) -> Result<Value> {
        let arena = self.arena.read_recursive();
        value(self, &arena, plug, context)
    }

    /// Typed value of `plug` in the current context.
    pub fn get<T: FromValue>(&self, plug: PlugId) -> Result<T> {
        let value = self.get_value(plug)?;
        T::from_value(&value).ok_or_else(|| Error::TypeMismatch {
            target: self.full_name(plug),
            expected: T::TYPE.name().to_string(),
            actual: value.value_type().name().to_string(),
        })
    }

    /// The digest of `plug` in the current context.
    pub fn hash(&self, plug: PlugId) -> Result<Digest> {
        self.hash_in(plug, &Context::current())
    }

    pub fn hash_in(&self, plug: PlugId, context: &Context) -> Result<Digest> {
        let arena = self.arena.read_recursive();
        hash(self, &arena, plug, context)
    }
}
