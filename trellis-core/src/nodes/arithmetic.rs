//! Binary arithmetic nodes.

use crate::compute::ComputeScope;
use crate::error::Result;
use crate::graph::{AffectedPlugs, Node, NodeRef, PlugId, PlugLayout, PlugSpec};
use crate::hash::Hasher;
use crate::value::{Value, ValueType};

fn binary_affects(node: &NodeRef<'_>, input: PlugId, output: &str, outputs: &mut AffectedPlugs) {
    if node.is(input, "op1") || node.is(input, "op2") {
        outputs.extend(node.plug(output));
    }
}

fn binary_hash(scope: &ComputeScope<'_>, h: &mut Hasher) -> Result<()> {
    scope.append_hash("op1", h)?;
    scope.append_hash("op2", h)
}

/// `sum = op1 + op2` on integers.
#[derive(Debug, Default, Clone, Copy)]
pub struct AddNode;

impl Node for AddNode {
    fn type_name(&self) -> &str {
        "Add"
    }

    fn build(&self, plugs: &mut PlugLayout) {
        plugs
            .add("op1", PlugSpec::input(ValueType::Int))
            .add("op2", PlugSpec::input(ValueType::Int))
            .add("sum", PlugSpec::output(ValueType::Int));
    }

    fn affects(&self, node: &NodeRef<'_>, input: PlugId, outputs: &mut AffectedPlugs) {
        binary_affects(node, input, "sum", outputs);
    }

    fn hash(&self, scope: &ComputeScope<'_>, h: &mut Hasher) -> Result<()> {
        binary_hash(scope, h)
    }

    fn compute(&self, scope: &ComputeScope<'_>) -> Result<Value> {
        let a: i64 = scope.get("op1")?;
        let b: i64 = scope.get("op2")?;
        Ok(Value::Int(a.wrapping_add(b)))
    }
}

/// `product = op1 * op2` on floats.
#[derive(Debug, Default, Clone, Copy)]
pub struct MultiplyNode;

impl Node for MultiplyNode {
    fn type_name(&self) -> &str {
        "Multiply"
    }

    fn build(&self, plugs: &mut PlugLayout) {
        plugs
            .add("op1", PlugSpec::input(ValueType::Float).with_default(1.0))
            .add("op2", PlugSpec::input(ValueType::Float).with_default(1.0))
            .add("product", PlugSpec::output(ValueType::Float));
    }

    fn affects(&self, node: &NodeRef<'_>, input: PlugId, outputs: &mut AffectedPlugs) {
        binary_affects(node, input, "product", outputs);
    }

    fn hash(&self, scope: &ComputeScope<'_>, h: &mut Hasher) -> Result<()> {
        binary_hash(scope, h)
    }

    fn compute(&self, scope: &ComputeScope<'_>) -> Result<Value> {
        let a: f64 = scope.get("op1")?;
        let b: f64 = scope.get("op2")?;
        Ok(Value::Float(a * b))
    }
}
