//! Serialisation
//!
//! Graphs are saved as a line oriented script that recreates them through
//! the ordinary editing API:
//!
//! ```text
//! # trellis script
//! node Add Add1
//! plug Add1.user.gain Float in dynamic,serialisable,acceptsInputs,cacheable 1.0
//! set Add1.op1 2
//! connect Add2.op1 Add1.sum
//! ```
//!
//! Paths are relative to the node being serialised into or out of, so a
//! script can be pasted under any parent. Statements run in order: nodes,
//! then dynamic plugs, then values, then connections.
//!
//! Values and defaults are JSON literals and always come last on a line,
//! which lets string values contain spaces.

mod parser;
mod writer;

use crate::error::Result;
use crate::graph::{Graph, NodeId};

/// First line of every script.
pub const HEADER: &str = "# trellis script";

/// Write the children of `parent` as a script.
///
/// With a `filter` only the listed direct children of `parent` (and their
/// descendants) are written. Connections are kept when their source is
/// written too, or is a plug of `parent`; connections from nodes left out
/// are dropped.
pub fn serialise(graph: &Graph, parent: NodeId, filter: Option<&[NodeId]>) -> Result<String> {
    writer::write(graph, parent, filter)
}

/// Run a script under `parent`, returning the top level nodes it created.
///
/// Statements are applied as they are read. On error the nodes created so
/// far are left in place. Dirty notifications are batched over the whole
/// script.
pub fn deserialise(graph: &Graph, parent: NodeId, text: &str) -> Result<Vec<NodeId>> {
    let _scope = graph.dirty_propagation_scope();
    parser::execute(graph, parent, text)
}
