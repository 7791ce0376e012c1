//! Node types shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use trellis_core::graph::AffectedPlugs;
use trellis_core::{
    ComputeScope, Error, Graph, Hasher, Node, NodeId, NodeRef, PlugId, PlugLayout, PlugSpec,
    Result, Value, ValueType,
};

/// Counts calls to `hash()` and `compute()`.
#[derive(Debug, Default)]
pub struct Counters {
    pub hashes: AtomicUsize,
    pub computes: AtomicUsize,
}

impl Counters {
    pub fn hashes(&self) -> usize {
        self.hashes.load(Ordering::SeqCst)
    }

    pub fn computes(&self) -> usize {
        self.computes.load(Ordering::SeqCst)
    }
}

/// `sum = op1 + op2`, counting its work and optionally taking its time.
#[derive(Default)]
pub struct CountingAdd {
    pub counters: Arc<Counters>,
    pub delay: Option<Duration>,
}

impl Node for CountingAdd {
    fn type_name(&self) -> &str {
        "CountingAdd"
    }

    fn build(&self, plugs: &mut PlugLayout) {
        plugs
            .add("op1", PlugSpec::input(ValueType::Int))
            .add("op2", PlugSpec::input(ValueType::Int))
            .add("sum", PlugSpec::output(ValueType::Int));
    }

    fn affects(&self, node: &NodeRef<'_>, input: PlugId, outputs: &mut AffectedPlugs) {
        if node.is(input, "op1") || node.is(input, "op2") {
            outputs.extend(node.plug("sum"));
        }
    }

    fn hash(&self, scope: &ComputeScope<'_>, h: &mut Hasher) -> Result<()> {
        self.counters.hashes.fetch_add(1, Ordering::SeqCst);
        scope.append_hash("op1", h)?;
        scope.append_hash("op2", h)
    }

    fn compute(&self, scope: &ComputeScope<'_>) -> Result<Value> {
        self.counters.computes.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            let start = Instant::now();
            while start.elapsed() < delay {
                scope.check_cancellation()?;
                thread::sleep(Duration::from_millis(1));
            }
        }
        let a: i64 = scope.get("op1")?;
        let b: i64 = scope.get("op2")?;
        Ok(Value::Int(a + b))
    }
}

pub fn counting_add(graph: &Graph, name: &str) -> (NodeId, Arc<Counters>) {
    counting_add_with_delay(graph, name, None)
}

pub fn counting_add_with_delay(
    graph: &Graph,
    name: &str,
    delay: Option<Duration>,
) -> (NodeId, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let node = CountingAdd {
        counters: counters.clone(),
        delay,
    };
    let id = graph.add_node(graph.root(), name, node).unwrap();
    (id, counters)
}

/// Always fails to compute.
#[derive(Default)]
pub struct Failing {
    pub counters: Arc<Counters>,
}

impl Node for Failing {
    fn type_name(&self) -> &str {
        "Failing"
    }

    fn build(&self, plugs: &mut PlugLayout) {
        plugs.add("out", PlugSpec::output(ValueType::Int));
    }

    fn hash(&self, _scope: &ComputeScope<'_>, _h: &mut Hasher) -> Result<()> {
        Ok(())
    }

    fn compute(&self, _scope: &ComputeScope<'_>) -> Result<Value> {
        self.counters.computes.fetch_add(1, Ordering::SeqCst);
        Err(Error::node("boom"))
    }
}

/// Record every plug dirtied in `graph`.
pub fn record_dirtied(graph: &Graph) -> (Arc<Mutex<Vec<PlugId>>>, trellis_core::signal::Connection) {
    let dirtied = Arc::new(Mutex::new(Vec::new()));
    let sink = dirtied.clone();
    let connection = graph
        .signals()
        .plug_dirtied
        .connect(move |plug| sink.lock().push(*plug));
    (dirtied, connection)
}

/// Route `tracing` output through the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn plug(graph: &Graph, node: NodeId, path: &str) -> PlugId {
    graph.plug_of(node, path).unwrap()
}
