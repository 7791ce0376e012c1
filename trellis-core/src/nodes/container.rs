//! Container node.

use crate::graph::Node;

/// Groups child nodes. Boxes never compute; their output plugs either
/// hold a value or pass through an internal connection.
#[derive(Debug, Default, Clone, Copy)]
pub struct BoxNode;

impl Node for BoxNode {
    fn type_name(&self) -> &str {
        "Box"
    }

    fn computes(&self) -> bool {
        false
    }
}
