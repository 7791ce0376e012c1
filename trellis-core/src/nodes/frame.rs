//! Context driven nodes.

use crate::compute::ComputeScope;
use crate::context::Context;
use crate::error::Result;
use crate::graph::{AffectedPlugs, Node, NodeRef, PlugId, PlugLayout, PlugSpec};
use crate::hash::Hasher;
use crate::value::{Value, ValueType};

/// Outputs the frame of the context it is evaluated in.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameNode;

impl Node for FrameNode {
    fn type_name(&self) -> &str {
        "Frame"
    }

    fn build(&self, plugs: &mut PlugLayout) {
        plugs.add("output", PlugSpec::output(ValueType::Float));
    }

    fn hash(&self, scope: &ComputeScope<'_>, h: &mut Hasher) -> Result<()> {
        h.append_f64(scope.context().frame());
        Ok(())
    }

    fn compute(&self, scope: &ComputeScope<'_>) -> Result<Value> {
        Ok(Value::Float(scope.context().frame()))
    }
}

/// Evaluates `in` with the variable `name` set to `value`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContextVariableNode;

impl ContextVariableNode {
    fn upstream_context(scope: &ComputeScope<'_>) -> Result<Context> {
        let name: String = scope.get("name")?;
        if name.is_empty() {
            return Ok(scope.context().clone());
        }
        let value: f64 = scope.get("value")?;
        Ok(scope.context().with_variable(name, value))
    }
}

impl Node for ContextVariableNode {
    fn type_name(&self) -> &str {
        "ContextVariable"
    }

    fn build(&self, plugs: &mut PlugLayout) {
        plugs
            .add("name", PlugSpec::input(ValueType::String))
            .add("value", PlugSpec::input(ValueType::Float))
            .add("in", PlugSpec::input(ValueType::Int))
            .add("out", PlugSpec::output(ValueType::Int));
    }

    fn affects(&self, node: &NodeRef<'_>, input: PlugId, outputs: &mut AffectedPlugs) {
        if node.is(input, "name") || node.is(input, "value") || node.is(input, "in") {
            outputs.extend(node.plug("out"));
        }
    }

    fn hash(&self, scope: &ComputeScope<'_>, h: &mut Hasher) -> Result<()> {
        let context = Self::upstream_context(scope)?;
        h.append_digest(scope.hash_in("in", &context)?);
        Ok(())
    }

    fn compute(&self, scope: &ComputeScope<'_>) -> Result<Value> {
        let context = Self::upstream_context(scope)?;
        scope.value_in("in", &context)
    }
}
