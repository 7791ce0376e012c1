//! Integration Tests for the Node Graph
//!
//! These tests drive hierarchy edits, connections, dirty propagation and
//! cached evaluation together through the public API.

mod common;

use std::sync::Arc;

use parking_lot::Mutex;
use trellis_core::graph::{CachePolicy, ChildEvent};
use trellis_core::nodes::{AddNode, BoxNode, ContextVariableNode, FrameNode};
use trellis_core::serialisation::{deserialise, serialise};
use trellis_core::{
    Caches, ComputeScope, Context, ContextScope, EngineConfig, Error, Graph, Hasher, Node,
    NodeId, NodeRef, PlugFlags, PlugId, PlugLayout, PlugSpec, Result, Value, ValueType,
};

use common::{counting_add, init_tracing, plug, record_dirtied, Counters, Failing};

/// Add with op1=2, op2=3 computes 5 once; a downstream Add sees edits.
#[test]
fn add_scenario_recomputes_each_node_once() {
    let graph = Graph::new();
    let (a, a_counts) = counting_add(&graph, "A");
    graph.set_value(plug(&graph, a, "op1"), 2).unwrap();
    graph.set_value(plug(&graph, a, "op2"), 3).unwrap();

    let a_sum = plug(&graph, a, "sum");
    assert_eq!(graph.get_value(a_sum).unwrap(), Value::Int(5));
    assert_eq!(a_counts.computes(), 1);

    let (b, b_counts) = counting_add(&graph, "B");
    let b_sum = plug(&graph, b, "sum");
    graph.set_input(plug(&graph, b, "op1"), Some(a_sum)).unwrap();
    assert_eq!(graph.get_value(b_sum).unwrap(), Value::Int(5));
    assert_eq!(b_counts.computes(), 1);

    let (dirtied, _connection) = record_dirtied(&graph);
    graph.set_value(plug(&graph, a, "op1"), 10).unwrap();
    assert_eq!(dirtied.lock().iter().filter(|p| **p == b_sum).count(), 1);

    assert_eq!(graph.get_value(b_sum).unwrap(), Value::Int(13));
    assert_eq!(a_counts.computes(), 2);
    assert_eq!(b_counts.computes(), 2);
}

/// Repeated evaluation without edits neither rehashes nor recomputes.
#[test]
fn repeated_evaluation_hits_the_caches() {
    let graph = Graph::new();
    let (a, counts) = counting_add(&graph, "A");
    let sum = plug(&graph, a, "sum");

    let first = graph.hash(sum).unwrap();
    assert_eq!(graph.hash(sum).unwrap(), first);
    assert_eq!(counts.hashes(), 1);

    assert_eq!(graph.get_value(sum).unwrap(), graph.get_value(sum).unwrap());
    assert_eq!(counts.computes(), 1);
    assert!(graph.caches().stats().compute_hits >= 1);
}

/// Dirtying retires hash cache entries; an edit that restores the old
/// inputs reuses the old compute cache entry.
#[test]
fn cache_is_keyed_by_hash_not_by_dirtiness() {
    let graph = Graph::new();
    let (a, counts) = counting_add(&graph, "A");
    let op1 = plug(&graph, a, "op1");
    let sum = plug(&graph, a, "sum");

    graph.set_value(op1, 1).unwrap();
    assert_eq!(graph.get_value(sum).unwrap(), Value::Int(1));
    graph.set_value(op1, 2).unwrap();
    assert_eq!(graph.get_value(sum).unwrap(), Value::Int(2));
    graph.set_value(op1, 1).unwrap();
    assert_eq!(graph.get_value(sum).unwrap(), Value::Int(1));

    assert_eq!(counts.hashes(), 3);
    assert_eq!(counts.computes(), 2);
}

/// Setting the value a plug already holds is not an edit.
#[test]
fn equal_values_do_not_dirty() {
    let graph = Graph::new();
    let (a, _) = counting_add(&graph, "A");
    let op1 = plug(&graph, a, "op1");
    graph.set_value(op1, 4).unwrap();

    let (dirtied, _connection) = record_dirtied(&graph);
    let sets = Arc::new(Mutex::new(0));
    let s = sets.clone();
    let _set_connection = graph.signals().plug_set.connect(move |_| *s.lock() += 1);

    graph.set_value(op1, 4).unwrap();
    assert!(dirtied.lock().is_empty());
    assert_eq!(*sets.lock(), 0);
}

/// A diamond notifies its tip once; unrelated nodes are never dirtied.
#[test]
fn dirty_propagation_is_complete_and_minimal() {
    let graph = Graph::new();
    let (a, _) = counting_add(&graph, "A");
    let (b, _) = counting_add(&graph, "B");
    let (c, _) = counting_add(&graph, "C");
    let (d, _) = counting_add(&graph, "D");
    let (e, _) = counting_add(&graph, "E");

    let a_sum = plug(&graph, a, "sum");
    graph.set_input(plug(&graph, b, "op1"), Some(a_sum)).unwrap();
    graph.set_input(plug(&graph, c, "op1"), Some(a_sum)).unwrap();
    graph
        .set_input(plug(&graph, d, "op1"), Some(plug(&graph, b, "sum")))
        .unwrap();
    graph
        .set_input(plug(&graph, d, "op2"), Some(plug(&graph, c, "sum")))
        .unwrap();

    let (dirtied, _connection) = record_dirtied(&graph);
    graph.set_value(plug(&graph, a, "op2"), 1).unwrap();

    let dirtied = dirtied.lock();
    let d_sum = plug(&graph, d, "sum");
    for p in [a_sum, plug(&graph, b, "sum"), plug(&graph, c, "sum"), d_sum] {
        assert_eq!(dirtied.iter().filter(|x| **x == p).count(), 1);
    }
    assert_eq!(dirtied.last(), Some(&d_sum));
    assert!(!dirtied.iter().any(|p| graph.node_of(*p) == Some(e)));
    assert!(!dirtied.contains(&plug(&graph, a, "op1")));
}

/// Connecting upstream into downstream is refused and leaves the graph as
/// it was.
#[test]
fn cycles_are_rejected() {
    let graph = Graph::new();
    let a = graph.add_node(graph.root(), "A", AddNode).unwrap();
    let b = graph.add_node(graph.root(), "B", AddNode).unwrap();
    graph
        .set_input(plug(&graph, a, "op1"), Some(plug(&graph, b, "sum")))
        .unwrap();

    let b_op1 = plug(&graph, b, "op1");
    let err = graph
        .set_input(b_op1, Some(plug(&graph, a, "sum")))
        .unwrap_err();
    assert!(matches!(err, Error::CyclicConnection { .. }));
    assert!(err.is_structural());
    assert_eq!(graph.input(b_op1).unwrap(), None);

    let sum = plug(&graph, a, "sum");
    assert!(graph.set_input(plug(&graph, a, "op2"), Some(sum)).is_err());
}

/// `source()` follows a chain of pass-through plugs to its producer.
#[test]
fn source_resolves_chains() {
    let graph = Graph::new();
    let first = graph.add_node(graph.root(), "Add", AddNode).unwrap();
    let producer = plug(&graph, first, "sum");

    let mut previous = producer;
    let mut last = producer;
    for _ in 0..10 {
        let node = graph.add_node(graph.root(), "Add", AddNode).unwrap();
        last = plug(&graph, node, "op1");
        graph.set_input(last, Some(previous)).unwrap();
        previous = last;
    }

    assert_eq!(graph.source(last).unwrap(), producer);
    assert_eq!(graph.source(producer).unwrap(), producer);
    // Connected plugs share the producer's hash.
    assert_eq!(graph.hash(last).unwrap(), graph.hash(producer).unwrap());
}

/// Two frames evaluate independently and occupy two cache entries.
#[test]
fn frame_results_are_cached_per_context() {
    let graph = Graph::new();
    let frame = graph.add_node(graph.root(), "Frame", FrameNode).unwrap();
    let output = plug(&graph, frame, "output");

    let one = Context::new();
    let mut two = Context::new();
    two.set_frame(2.0);

    assert_eq!(graph.get_value_in(output, &one).unwrap(), Value::Float(1.0));
    assert_eq!(graph.get_value_in(output, &two).unwrap(), Value::Float(2.0));
    assert_ne!(
        graph.hash_in(output, &one).unwrap(),
        graph.hash_in(output, &two).unwrap()
    );
    assert_eq!(graph.caches().compute.len(), 2);

    // The current context applies when none is given.
    let _scope = ContextScope::enter(&two);
    assert_eq!(graph.get::<f64>(output).unwrap(), 2.0);
}

/// Nodes that never read the frame share one entry across frames.
#[test]
fn context_invariant_nodes_share_entries() {
    let graph = Graph::new();
    let (a, counts) = counting_add(&graph, "A");
    let sum = plug(&graph, a, "sum");
    for frame in 1..=5 {
        let context = Context::new().with_variable("frame", f64::from(frame));
        graph.get_value_in(sum, &context).unwrap();
    }
    assert_eq!(counts.computes(), 1);
}

#[test]
fn context_variable_node_changes_upstream_context() {
    let graph = Graph::new();
    let frame = graph.add_node(graph.root(), "Frame", FrameNode).unwrap();
    let cv = graph
        .add_node(graph.root(), "Offset", ContextVariableNode)
        .unwrap();
    graph
        .set_input(plug(&graph, cv, "in"), Some(plug(&graph, frame, "output")))
        .unwrap();
    graph.set_value(plug(&graph, cv, "name"), "frame").unwrap();
    graph.set_value(plug(&graph, cv, "value"), 7.0).unwrap();

    let out = plug(&graph, cv, "out");
    for f in [1.0, 2.0, 3.0] {
        let context = Context::new().with_variable("frame", f);
        assert_eq!(graph.get_value_in(out, &context).unwrap(), Value::Int(7));
    }
}

struct UncachedAdd(Arc<Counters>);

impl Node for UncachedAdd {
    fn type_name(&self) -> &str {
        "UncachedAdd"
    }

    fn build(&self, plugs: &mut PlugLayout) {
        plugs.add("out", PlugSpec::output(ValueType::Int));
    }

    fn hash(&self, _scope: &ComputeScope<'_>, _h: &mut Hasher) -> Result<()> {
        Ok(())
    }

    fn compute(&self, _scope: &ComputeScope<'_>) -> Result<Value> {
        self.0.computes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(Value::Int(1))
    }

    fn compute_cache_policy(&self, _node: &NodeRef<'_>, _output: PlugId) -> CachePolicy {
        CachePolicy::Uncached
    }
}

/// Uncached outputs compute on every access but still hash.
#[test]
fn uncached_outputs_always_compute() {
    let graph = Graph::new();
    let counts = Arc::new(Counters::default());
    let node = graph
        .add_node(graph.root(), "Uncached", UncachedAdd(counts.clone()))
        .unwrap();
    let out = plug(&graph, node, "out");
    for _ in 0..3 {
        graph.get_value(out).unwrap();
    }
    assert_eq!(counts.computes(), 3);
    assert!(!graph.hash(out).unwrap().is_null());

    // Clearing the cacheable flag has the same effect on any node.
    let (a, add_counts) = counting_add(&graph, "A");
    let sum = plug(&graph, a, "sum");
    graph.set_flags(sum, PlugFlags::CACHEABLE, false).unwrap();
    graph.get_value(sum).unwrap();
    graph.get_value(sum).unwrap();
    assert_eq!(add_counts.computes(), 2);
}

/// Failures carry the plug path and are retried on the next access.
#[test]
fn compute_errors_are_not_cached() {
    let graph = Graph::new();
    let failing = Failing::default();
    let counts = failing.counters.clone();
    let node = graph.add_node(graph.root(), "Fail", failing).unwrap();
    let out = plug(&graph, node, "out");

    let err = graph.get_value(out).unwrap_err();
    assert_eq!(err.plug(), Some("Fail.out"));
    assert!(err.to_string().contains("boom"));
    assert!(!err.is_cancellation());

    assert!(graph.get_value(out).is_err());
    assert_eq!(counts.computes(), 2);

    // Downstream pass-through plugs re-raise the same failure.
    let add = graph.add_node(graph.root(), "Add", AddNode).unwrap();
    graph.set_input(plug(&graph, add, "op1"), Some(out)).unwrap();
    let err = graph.get_value(plug(&graph, add, "sum")).unwrap_err();
    assert!(err.to_string().contains("boom"));
}

/// Reads `secret` without declaring it in `affects()`.
struct Sloppy;

impl Node for Sloppy {
    fn type_name(&self) -> &str {
        "Sloppy"
    }

    fn build(&self, plugs: &mut PlugLayout) {
        plugs
            .add("declared", PlugSpec::input(ValueType::Int))
            .add("secret", PlugSpec::input(ValueType::Int))
            .add("out", PlugSpec::output(ValueType::Int));
    }

    fn affects(&self, node: &NodeRef<'_>, input: PlugId, outputs: &mut trellis_core::graph::AffectedPlugs) {
        if node.is(input, "declared") {
            outputs.extend(node.plug("out"));
        }
    }

    fn hash(&self, scope: &ComputeScope<'_>, h: &mut Hasher) -> Result<()> {
        scope.append_hash("declared", h)?;
        scope.append_hash("secret", h)
    }

    fn compute(&self, scope: &ComputeScope<'_>) -> Result<Value> {
        let a: i64 = scope.get("declared")?;
        let b: i64 = scope.get("secret")?;
        Ok(Value::Int(a * b))
    }
}

#[test]
fn undeclared_reads_warn_in_debug_builds() {
    init_tracing();
    let graph = Graph::new();
    let node = graph.add_node(graph.root(), "Sloppy", Sloppy).unwrap();
    assert_eq!(graph.get_value(plug(&graph, node, "out")).unwrap(), Value::Int(0));

    let expected = if cfg!(debug_assertions) { 1 } else { 0 };
    assert_eq!(graph.consistency_warnings(), expected);

    let add = graph.add_node(graph.root(), "Add", AddNode).unwrap();
    graph.get_value(plug(&graph, add, "sum")).unwrap();
    assert_eq!(graph.consistency_warnings(), expected);
}

/// Hierarchy edits emit structured events; detaching breaks connections.
#[test]
fn hierarchy_events_and_detach() {
    let graph = Graph::new();
    let container = graph.add_node(graph.root(), "Box", BoxNode).unwrap();
    let inner = graph.add_node(container, "Inner", AddNode).unwrap();
    let outside = graph.add_node(graph.root(), "Outside", AddNode).unwrap();
    graph
        .set_input(plug(&graph, outside, "op1"), Some(plug(&graph, inner, "sum")))
        .unwrap();

    let removed = Arc::new(Mutex::new(Vec::new()));
    let r = removed.clone();
    let _c = graph
        .signals()
        .child_removed
        .connect(move |e: &ChildEvent| r.lock().push(e.child));

    graph.remove_child(container, inner).unwrap();
    assert_eq!(*removed.lock(), vec![inner.component()]);
    assert_eq!(graph.input(plug(&graph, outside, "op1")).unwrap(), None);
    assert_eq!(graph.parent(inner), None);

    // Not a child any more.
    assert!(matches!(
        graph.remove_child(container, inner),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        graph.set_name(outside, ""),
        Err(Error::InvalidName(_))
    ));

    graph.add_child(graph.root(), inner).unwrap();
    assert_eq!(graph.full_name(inner), "Inner");
    assert_eq!(graph.node("Inner"), Some(inner));
}

/// Dynamic plugs on the user plug hold values and survive serialisation.
#[test]
fn user_plugs_round_trip() {
    let graph = Graph::new();
    let add = graph.add_node(graph.root(), "Add", AddNode).unwrap();
    let user = plug(&graph, add, "user");
    let v = graph
        .add_plug(user, "offset", PlugSpec::input(ValueType::V3f))
        .unwrap();
    graph.set_value(v, Value::V3f([1.0, 2.0, 3.0])).unwrap();
    graph
        .set_input(plug(&graph, add, "op1"), Some(plug(&graph, add, "user.offset.y")))
        .unwrap();
    assert_eq!(graph.get_value(plug(&graph, add, "sum")).unwrap(), Value::Int(2));

    let text = serialise(&graph, graph.root(), None).unwrap();
    let copy = Graph::new();
    deserialise(&copy, copy.root(), &text).unwrap();
    let sum = copy.plug("Add.sum").unwrap();
    assert_eq!(copy.get_value(sum).unwrap(), Value::Int(2));
    assert_eq!(serialise(&copy, copy.root(), None).unwrap(), text);
}

/// Serialising M nodes and reloading keeps types, values and topology.
#[test]
fn round_trip_preserves_topology() {
    let graph = Graph::new();
    let mut nodes = Vec::new();
    for i in 0..6 {
        let type_name = if i % 2 == 0 { "Add" } else { "Multiply" };
        let node = graph.create_node(graph.root(), type_name, type_name).unwrap();
        nodes.push(node);
    }
    for (i, node) in nodes.iter().enumerate() {
        let op2 = plug(&graph, *node, "op2");
        if i % 2 == 0 {
            graph.set_value(op2, i as i64).unwrap();
        } else {
            graph.set_value(op2, i as f64 * 0.5).unwrap();
        }
        if i > 0 {
            let out = if (i - 1) % 2 == 0 { "sum" } else { "product" };
            graph
                .set_input(plug(&graph, *node, "op1"), Some(plug(&graph, nodes[i - 1], out)))
                .unwrap();
        }
    }

    let text = serialise(&graph, graph.root(), None).unwrap();
    let copy = Graph::new();
    let created = deserialise(&copy, copy.root(), &text).unwrap();
    assert_eq!(created.len(), nodes.len());

    for (original, loaded) in nodes.iter().zip(&created) {
        assert_eq!(graph.node_type(*original).unwrap(), copy.node_type(*loaded).unwrap());
        assert_eq!(graph.name(*original).unwrap(), copy.name(*loaded).unwrap());
        for name in ["op1", "op2"] {
            let a = plug(&graph, *original, name);
            let b = plug(&copy, *loaded, name);
            assert_eq!(graph.get_value(a).unwrap(), copy.get_value(b).unwrap());
            assert_eq!(
                graph.input(a).unwrap().map(|p| graph.full_name(p)),
                copy.input(b).unwrap().map(|p| copy.full_name(p))
            );
        }
    }
}

/// Plugs a compound's children so it can be wired pairwise.
fn v3f_plugs(graph: &Graph) -> (NodeId, PlugId, PlugId, PlugId) {
    let container = graph.add_node(graph.root(), "Box", BoxNode).unwrap();
    let src = graph
        .add_plug(container, "src", PlugSpec::input(ValueType::V3f))
        .unwrap();
    let inp = graph
        .add_plug(container, "inp", PlugSpec::input(ValueType::V3f))
        .unwrap();
    let other = graph
        .add_plug(container, "other", PlugSpec::input(ValueType::Float))
        .unwrap();
    graph.set_value(src, Value::V3f([1.0, 2.0, 3.0])).unwrap();
    graph.set_value(other, 9.0).unwrap();
    (container, src, inp, other)
}

/// Connecting compounds wires their children pairwise, and disconnecting
/// unwires them.
#[test]
fn compounds_connect_pairwise() {
    let graph = Graph::new();
    let (_, src, inp, _) = v3f_plugs(&graph);

    graph.set_input(inp, Some(src)).unwrap();
    for axis in ["x", "y", "z"] {
        assert_eq!(
            graph.input(graph.plug(&format!("Box.inp.{axis}")).unwrap()).unwrap(),
            graph.plug(&format!("Box.src.{axis}"))
        );
    }
    assert_eq!(graph.get_value(inp).unwrap(), Value::V3f([1.0, 2.0, 3.0]));

    graph.set_input(inp, None).unwrap();
    for axis in ["x", "y", "z"] {
        let child = graph.plug(&format!("Box.inp.{axis}")).unwrap();
        assert_eq!(graph.input(child).unwrap(), None);
    }
    assert_eq!(graph.get_value(inp).unwrap(), Value::V3f([0.0, 0.0, 0.0]));
}

/// Rewiring one child detaches the parent from its old source.
#[test]
fn rewiring_a_child_updates_the_parent_input() {
    let graph = Graph::new();
    let (_, src, inp, other) = v3f_plugs(&graph);
    graph.set_input(inp, Some(src)).unwrap();

    let inp_x = graph.plug("Box.inp.x").unwrap();
    graph.set_input(inp_x, Some(other)).unwrap();
    assert_eq!(graph.input(inp).unwrap(), None);
    assert_eq!(
        graph.input(graph.plug("Box.inp.y").unwrap()).unwrap(),
        graph.plug("Box.src.y")
    );
    assert_eq!(graph.get_value(inp).unwrap(), Value::V3f([9.0, 2.0, 3.0]));

    let text = serialise(&graph, graph.root(), None).unwrap();
    assert!(!text.contains("connect Box.inp Box.src"));
    assert!(text.contains("connect Box.inp.x Box.other"));
    assert!(text.contains("connect Box.inp.y Box.src.y"));
    let copy = Graph::new();
    deserialise(&copy, copy.root(), &text).unwrap();
    let copied = copy.plug("Box.inp").unwrap();
    assert_eq!(copy.get_value(copied).unwrap(), Value::V3f([9.0, 2.0, 3.0]));

    // Matching children again restores the parent connection.
    graph
        .set_input(inp_x, Some(graph.plug("Box.src.x").unwrap()))
        .unwrap();
    assert_eq!(graph.input(inp).unwrap(), Some(src));

    graph
        .set_input(graph.plug("Box.inp.y").unwrap(), None)
        .unwrap();
    assert_eq!(graph.input(inp).unwrap(), None);
    assert_eq!(graph.get_value(inp).unwrap(), Value::V3f([1.0, 0.0, 3.0]));
}

/// Computed outputs take their value from the node, never from `set_value`.
#[test]
fn computed_outputs_are_not_settable() {
    let graph = Graph::new();
    let add = graph.add_node(graph.root(), "Add", AddNode).unwrap();
    let sum = plug(&graph, add, "sum");
    assert!(matches!(
        graph.set_value(sum, 42),
        Err(Error::NotSettable(_))
    ));
    assert_eq!(graph.get_value(sum).unwrap(), Value::Int(0));

    let container = graph.add_node(graph.root(), "Box", BoxNode).unwrap();
    let out = graph
        .add_plug(container, "out", PlugSpec::output(ValueType::Int))
        .unwrap();
    graph.set_value(out, 7).unwrap();
    assert_eq!(graph.get_value(out).unwrap(), Value::Int(7));
}

/// Connections are refused for flags, types, direction and self loops,
/// and a refused connection changes nothing.
#[test]
fn invalid_connections_are_refused() {
    let graph = Graph::new();
    let a = graph.add_node(graph.root(), "A", AddNode).unwrap();
    let b = graph.add_node(graph.root(), "B", AddNode).unwrap();
    let text = graph.create_node(graph.root(), "StringSubstitute", "Text").unwrap();
    let (a_sum, b_op1) = (plug(&graph, a, "sum"), plug(&graph, b, "op1"));

    let fixed = graph
        .add_plug(
            plug(&graph, b, "user"),
            "fixed",
            PlugSpec::input(ValueType::Int)
                .with_flags(PlugFlags::DEFAULT.with(PlugFlags::ACCEPTS_INPUTS, false)),
        )
        .unwrap();
    assert!(matches!(
        graph.set_input(fixed, Some(a_sum)),
        Err(Error::IncompatiblePlugs { .. })
    ));

    assert!(matches!(
        graph.set_input(b_op1, Some(plug(&graph, text, "out"))),
        Err(Error::IncompatiblePlugs { .. })
    ));
    assert!(matches!(
        graph.set_input(b_op1, Some(b_op1)),
        Err(Error::IncompatiblePlugs { .. })
    ));
    assert!(matches!(
        graph.set_input(plug(&graph, b, "sum"), Some(a_sum)),
        Err(Error::IncompatiblePlugs { .. })
    ));

    let b_op2 = plug(&graph, b, "op2");
    graph.set_flags(b_op2, PlugFlags::READ_ONLY, true).unwrap();
    assert!(matches!(
        graph.set_input(b_op2, Some(a_sum)),
        Err(Error::ReadOnly(_))
    ));
    assert!(matches!(graph.set_value(b_op2, 1), Err(Error::ReadOnly(_))));

    for p in [fixed, b_op1, b_op2, plug(&graph, b, "sum")] {
        assert_eq!(graph.input(p).unwrap(), None);
    }
    assert!(graph.outputs(a_sum).unwrap().is_empty());
}

/// Connected plugs take their value from the input.
#[test]
fn connected_plugs_are_not_settable() {
    let graph = Graph::new();
    let a = graph.add_node(graph.root(), "A", AddNode).unwrap();
    let b = graph.add_node(graph.root(), "B", AddNode).unwrap();
    let op1 = plug(&graph, b, "op1");
    graph.set_input(op1, Some(plug(&graph, a, "sum"))).unwrap();
    assert!(matches!(graph.set_value(op1, 3), Err(Error::NotSettable(_))));
}

/// `input_changed` reports the rewired plug and everything fed by it.
#[test]
fn input_changed_reaches_downstream_plugs() {
    let graph = Graph::new();
    let a = graph.add_node(graph.root(), "A", AddNode).unwrap();
    let b = graph.add_node(graph.root(), "B", AddNode).unwrap();
    let c = graph.add_node(graph.root(), "C", AddNode).unwrap();
    let (b_op1, c_op1) = (plug(&graph, b, "op1"), plug(&graph, c, "op1"));
    graph.set_input(c_op1, Some(b_op1)).unwrap();

    let changed = Arc::new(Mutex::new(Vec::new()));
    let sink = changed.clone();
    let _c = graph
        .signals()
        .input_changed
        .connect(move |p| sink.lock().push(*p));

    graph.set_input(b_op1, Some(plug(&graph, a, "sum"))).unwrap();
    assert_eq!(*changed.lock(), vec![b_op1, c_op1]);

    changed.lock().clear();
    graph.set_input(b_op1, Some(plug(&graph, a, "sum"))).unwrap();
    assert!(changed.lock().is_empty());

    graph.set_input(b_op1, None).unwrap();
    assert_eq!(*changed.lock(), vec![b_op1, c_op1]);
}

/// A converting connection hashes apart from its input; a plain one
/// shares the input's hash.
#[test]
fn conversions_get_their_own_hash() {
    let graph = Graph::new();
    let add = graph.add_node(graph.root(), "Add", AddNode).unwrap();
    let m1 = graph.create_node(graph.root(), "Multiply", "M1").unwrap();
    let m2 = graph.create_node(graph.root(), "Multiply", "M2").unwrap();
    graph.set_value(plug(&graph, add, "op1"), 4).unwrap();
    let sum = plug(&graph, add, "sum");

    let m1_op1 = plug(&graph, m1, "op1");
    graph.set_input(m1_op1, Some(sum)).unwrap();
    assert_ne!(graph.hash(m1_op1).unwrap(), graph.hash(sum).unwrap());
    assert_eq!(graph.get_value(m1_op1).unwrap(), Value::Float(4.0));

    let product = plug(&graph, m1, "product");
    let m2_op1 = plug(&graph, m2, "op1");
    graph.set_input(m2_op1, Some(product)).unwrap();
    assert_eq!(graph.hash(m2_op1).unwrap(), graph.hash(product).unwrap());
}

/// Graphs built over the same caches reuse each other's results.
#[test]
fn graphs_can_share_caches() {
    let caches = Arc::new(Caches::default());
    let first = Graph::with_caches(EngineConfig::default(), caches.clone());
    let second = Graph::with_caches(EngineConfig::default(), caches.clone());

    let (a, first_counts) = counting_add(&first, "A");
    let (b, second_counts) = counting_add(&second, "A");
    for (graph, node) in [(&first, a), (&second, b)] {
        graph.set_value(plug(graph, node, "op1"), 4).unwrap();
        graph.set_value(plug(graph, node, "op2"), 5).unwrap();
    }

    assert_eq!(first.get_value(plug(&first, a, "sum")).unwrap(), Value::Int(9));
    assert_eq!(second.get_value(plug(&second, b, "sum")).unwrap(), Value::Int(9));
    assert_eq!(first_counts.computes(), 1);
    assert_eq!(second_counts.computes(), 0);
    assert_eq!(caches.compute.len(), 1);
}

/// The compute cache evicts least recently used values past its limit.
#[test]
fn memory_limit_evicts_old_results() {
    let entry = std::mem::size_of::<Value>();
    let config = EngineConfig {
        compute_cache_memory_limit: 2 * entry,
        cache_shards: 1,
        ..EngineConfig::default()
    };
    let graph = Graph::with_config(config);
    let nodes: Vec<_> = (1..=3)
        .map(|i| {
            let (node, counts) = counting_add(&graph, "A");
            graph.set_value(plug(&graph, node, "op1"), i).unwrap();
            (plug(&graph, node, "sum"), counts)
        })
        .collect();

    for (sum, _) in &nodes {
        graph.get_value(*sum).unwrap();
    }
    assert_eq!(graph.caches().compute.len(), 2);
    assert!(graph.caches().compute.memory_usage() <= 2 * entry);

    // The first result was the least recently used.
    graph.get_value(nodes[2].0).unwrap();
    graph.get_value(nodes[0].0).unwrap();
    assert_eq!(nodes[0].1.computes(), 2);
    assert_eq!(nodes[2].1.computes(), 1);

    graph.caches().compute.set_memory_limit(0);
    assert!(graph.caches().compute.is_empty());
    assert_eq!(graph.caches().compute.memory_usage(), 0);
}
