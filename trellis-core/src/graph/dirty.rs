//! Dirty Propagation
//!
//! When a stored value or a connection changes, every plug whose value
//! could depend on it is marked dirty. Dirtying is cheap: it bumps the
//! plug's dirty count (retiring its hash cache entries) and queues a
//! notification. Nothing is recomputed until somebody asks for a value.
//!
//! # Algorithm
//!
//! 1. Starting from the edited leaf plugs, walk breadth first:
//!    - a plug dirties the plugs connected to its outputs,
//!    - an input plug dirties whatever its node's `affects()` reports,
//!    - a child plug dirties its parent plug.
//! 2. Each plug is visited once, so diamonds notify once.
//! 3. The walk records an edge for every step; the batch is emitted in
//!    topological order over those edges (upstream first, children before
//!    parents), falling back to discovery order for independent plugs.
//!
//! Edits made inside a [`DirtyPropagationScope`] accumulate, and are
//! emitted together when the outermost scope closes.

use std::collections::{HashMap, HashSet, VecDeque};
use std::mem;

use indexmap::IndexSet;

use super::component::{Arena, PlugId};
use super::node::{AffectedPlugs, NodeRef};
use super::plug::Direction;
use super::Graph;

/// Plugs dirtied by one or more edits, plus the ordering constraints
/// discovered while walking.
#[derive(Debug, Default)]
pub(crate) struct DirtySet {
    plugs: IndexSet<PlugId>,
    edges: Vec<(PlugId, PlugId)>,
}

impl DirtySet {
    pub fn is_empty(&self) -> bool {
        self.plugs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.plugs.len()
    }

    pub fn merge(&mut self, other: DirtySet) {
        self.plugs.extend(other.plugs);
        self.edges.extend(other.edges);
    }

    /// Kahn's algorithm over the recorded edges.
    pub fn ordered(&self) -> Vec<PlugId> {
        let mut in_degree: HashMap<PlugId, usize> =
            self.plugs.iter().map(|p| (*p, 0)).collect();
        let mut successors: HashMap<PlugId, Vec<PlugId>> = HashMap::new();
        let mut seen_edges = HashSet::new();

        for &(from, to) in &self.edges {
            if from == to || !seen_edges.insert((from, to)) {
                continue;
            }
            if !in_degree.contains_key(&from) || !in_degree.contains_key(&to) {
                continue;
            }
            successors.entry(from).or_default().push(to);
            *in_degree.entry(to).or_default() += 1;
        }

        let mut queue: VecDeque<PlugId> = self
            .plugs
            .iter()
            .copied()
            .filter(|p| in_degree.get(p) == Some(&0))
            .collect();
        let mut result = Vec::with_capacity(self.plugs.len());

        while let Some(plug) = queue.pop_front() {
            result.push(plug);
            if let Some(next) = successors.get(&plug) {
                for n in next {
                    if let Some(degree) = in_degree.get_mut(n) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(*n);
                        }
                    }
                }
            }
        }

        // Connections are acyclic, but never lose a plug if that breaks.
        if result.len() < self.plugs.len() {
            let emitted: HashSet<PlugId> = result.iter().copied().collect();
            result.extend(self.plugs.iter().filter(|p| !emitted.contains(p)));
        }

        result
    }
}

/// Walk everything downstream of `seeds`, calling `edge` for each step.
fn walk(arena: &Arena, seeds: &[PlugId], mut edge: impl FnMut(PlugId, PlugId)) -> IndexSet<PlugId> {
    let mut visited = IndexSet::new();
    let mut queue: VecDeque<PlugId> = seeds
        .iter()
        .flat_map(|s| arena.leaf_plugs(*s))
        .collect();

    while let Some(plug) = queue.pop_front() {
        if !visited.insert(plug) {
            continue;
        }
        let Ok(data) = arena.plug(plug) else {
            continue;
        };

        for output in &data.outputs {
            edge(plug, *output);
            queue.push_back(*output);
        }

        if data.direction == Direction::In {
            if let Some(node) = arena.node_of(plug) {
                if let Ok(node_data) = arena.node(node) {
                    let mut affected = AffectedPlugs::new();
                    node_data
                        .behaviour
                        .affects(&NodeRef::new(arena, node), plug, &mut affected);
                    for output in affected {
                        // Values live on leaves; dirty those, parents follow.
                        for leaf in arena.leaf_plugs(output) {
                            edge(plug, leaf);
                            queue.push_back(leaf);
                        }
                    }
                }
            }
        }

        if let Some(parent) = arena.parent_plug(plug) {
            edge(plug, parent);
            queue.push_back(parent);
        }
    }

    visited
}

/// Every plug whose value may depend on `seeds`, seeds included.
pub(crate) fn downstream(arena: &Arena, seeds: &[PlugId]) -> HashSet<PlugId> {
    walk(arena, seeds, |_, _| {}).into_iter().collect()
}

/// Mark everything downstream of `seeds` dirty.
pub(crate) fn propagate(arena: &mut Arena, seeds: &[PlugId]) -> DirtySet {
    let mut edges = Vec::new();
    let plugs = walk(arena, seeds, |from, to| edges.push((from, to)));
    for plug in &plugs {
        if let Ok(data) = arena.plug_mut(*plug) {
            data.dirty_count += 1;
        }
    }
    DirtySet { plugs, edges }
}

#[derive(Debug, Default)]
pub(crate) struct Batch {
    depth: usize,
    pending: DirtySet,
}

impl Batch {
    pub fn add(&mut self, dirty: DirtySet) {
        self.pending.merge(dirty);
    }
}

/// Guard that defers dirty notifications until the outermost scope closes.
///
/// Every graph edit opens one internally; open one explicitly to coalesce
/// several edits into a single batch.
#[must_use = "dirtiness is emitted when the scope is dropped"]
pub struct DirtyPropagationScope<'g> {
    graph: &'g Graph,
}

impl<'g> DirtyPropagationScope<'g> {
    pub(crate) fn new(graph: &'g Graph) -> Self {
        graph.batch.lock().depth += 1;
        Self { graph }
    }
}

impl Drop for DirtyPropagationScope<'_> {
    fn drop(&mut self) {
        let pending = {
            let mut batch = self.graph.batch.lock();
            batch.depth -= 1;
            if batch.depth > 0 {
                return;
            }
            mem::take(&mut batch.pending)
        };
        if pending.is_empty() {
            return;
        }

        tracing::debug!(plugs = pending.len(), "emitting dirtied plugs");
        for plug in pending.ordered() {
            self.graph.signals().plug_dirtied.emit(&plug);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::component::ComponentId;

    fn plug() -> PlugId {
        PlugId(ComponentId::new())
    }

    #[test]
    fn ordered_respects_edges() {
        let (a, b, c) = (plug(), plug(), plug());
        let mut set = DirtySet::default();
        // Discovered out of order.
        set.plugs.extend([c, b, a]);
        set.edges.extend([(a, b), (b, c)]);
        assert_eq!(set.ordered(), vec![a, b, c]);
    }

    #[test]
    fn ordered_handles_diamonds_once() {
        let (a, b, c, d) = (plug(), plug(), plug(), plug());
        let mut set = DirtySet::default();
        set.plugs.extend([a, b, c, d]);
        set.edges.extend([(a, b), (a, c), (b, d), (c, d), (b, d)]);
        let order = set.ordered();
        assert_eq!(order.len(), 4);
        assert_eq!(order[0], a);
        assert_eq!(order[3], d);
    }

    #[test]
    fn independent_plugs_keep_insertion_order() {
        let (a, b, c) = (plug(), plug(), plug());
        let mut set = DirtySet::default();
        set.plugs.extend([b, a, c]);
        assert_eq!(set.ordered(), vec![b, a, c]);
    }

    #[test]
    fn merge_deduplicates() {
        let (a, b) = (plug(), plug());
        let mut first = DirtySet::default();
        first.plugs.extend([a, b]);
        let mut second = DirtySet::default();
        second.plugs.extend([b, a]);
        first.merge(second);
        assert_eq!(first.len(), 2);
    }
}
