//! String nodes.

use crate::compute::ComputeScope;
use crate::error::Result;
use crate::graph::{AffectedPlugs, Node, NodeRef, PlugId, PlugLayout, PlugSpec};
use crate::hash::Hasher;
use crate::value::{Value, ValueType};

/// Expands context variables and frame padding in `in`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringSubstituteNode;

impl Node for StringSubstituteNode {
    fn type_name(&self) -> &str {
        "StringSubstitute"
    }

    fn build(&self, plugs: &mut PlugLayout) {
        plugs
            .add("in", PlugSpec::input(ValueType::String))
            .add("out", PlugSpec::output(ValueType::String));
    }

    fn affects(&self, node: &NodeRef<'_>, input: PlugId, outputs: &mut AffectedPlugs) {
        if node.is(input, "in") {
            outputs.extend(node.plug("out"));
        }
    }

    // Hashing the substituted text means only the variables actually
    // referenced make the result context sensitive.
    fn hash(&self, scope: &ComputeScope<'_>, h: &mut Hasher) -> Result<()> {
        let text: String = scope.get("in")?;
        h.append_str(&scope.context().substitute(&text));
        Ok(())
    }

    fn compute(&self, scope: &ComputeScope<'_>) -> Result<Value> {
        let text: String = scope.get("in")?;
        Ok(Value::String(scope.context().substitute(&text)))
    }
}
