use std::collections::HashSet;

use super::HEADER;
use crate::error::{Error, Result};
use crate::graph::{ComponentId, Direction, Graph, NodeId, PlugFlags, PlugId};
use crate::value::ValueType;

/// Collects the nodes and plugs to write, then emits each statement kind
/// in turn.
struct Writer<'g> {
    graph: &'g Graph,
    parent: NodeId,
    /// Included nodes, parents before children.
    nodes: Vec<NodeId>,
    out: String,
}

pub(super) fn write(graph: &Graph, parent: NodeId, filter: Option<&[NodeId]>) -> Result<String> {
    graph.behaviour(parent)?;
    let children = graph.child_nodes(parent);
    if let Some(filter) = filter {
        if let Some(stray) = filter.iter().find(|n| !children.contains(n)) {
            return Err(Error::InvalidArgument(format!(
                "\"{}\" is not a child of \"{}\"",
                graph.full_name(*stray),
                graph.full_name(parent)
            )));
        }
    }

    let mut writer = Writer {
        graph,
        parent,
        nodes: Vec::new(),
        out: String::new(),
    };
    let included = children
        .into_iter()
        .filter(|c| filter.map_or(true, |f| f.contains(c)))
        .collect();
    writer.collect(included);

    writer.line(HEADER);
    writer.write_nodes()?;
    let plugs = writer.plugs();
    writer.write_dynamic_plugs(&plugs)?;
    writer.write_values(&plugs)?;
    writer.write_connections(&plugs)?;
    Ok(writer.out)
}

/// Order siblings so that a node feeding another (anywhere in their
/// subtrees) comes first. Ties, and any node caught in a cycle between
/// siblings, keep insertion order.
fn producers_first(graph: &Graph, siblings: Vec<NodeId>) -> Vec<NodeId> {
    let mut upstream: Vec<HashSet<usize>> = vec![HashSet::new(); siblings.len()];
    for (consumer, node) in siblings.iter().enumerate() {
        for plug in subtree_plugs(graph, node.component()) {
            let Ok(Some(input)) = graph.input(plug) else {
                continue;
            };
            if let Some(producer) = siblings
                .iter()
                .position(|s| graph.is_ancestor_of(*s, input))
            {
                if producer != consumer {
                    upstream[consumer].insert(producer);
                }
            }
        }
    }

    let mut emitted = vec![false; siblings.len()];
    let mut order = Vec::with_capacity(siblings.len());
    while order.len() < siblings.len() {
        let ready = (0..siblings.len())
            .find(|i| !emitted[*i] && upstream[*i].iter().all(|u| emitted[*u]))
            .or_else(|| (0..siblings.len()).find(|i| !emitted[*i]));
        let Some(next) = ready else {
            break;
        };
        emitted[next] = true;
        order.push(siblings[next]);
    }
    order
}

fn subtree_plugs(graph: &Graph, id: ComponentId) -> Vec<PlugId> {
    let mut out = Vec::new();
    for child in graph.children(id) {
        if graph.is_plug(child) {
            out.push(PlugId(child));
        }
        out.extend(subtree_plugs(graph, child));
    }
    out
}

impl Writer<'_> {
    fn collect(&mut self, siblings: Vec<NodeId>) {
        for node in producers_first(self.graph, siblings) {
            self.nodes.push(node);
            self.collect(self.graph.child_nodes(node));
        }
    }

    fn is_written(&self, plug: PlugId) -> bool {
        self.graph.node_of(plug) == Some(self.parent)
            || self
                .nodes
                .iter()
                .any(|node| self.graph.is_ancestor_of(*node, plug))
    }

    fn line(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn path(&self, id: impl Into<ComponentId>) -> Result<String> {
        self.graph.relative_name(id, self.parent)
    }

    /// Every plug of the included nodes, parents before children.
    fn plugs(&self) -> Vec<PlugId> {
        fn visit(graph: &Graph, id: ComponentId, out: &mut Vec<PlugId>) {
            for plug in graph.child_plugs(id) {
                out.push(plug);
                visit(graph, plug.component(), out);
            }
        }
        let mut out = Vec::new();
        for node in &self.nodes {
            visit(self.graph, node.component(), &mut out);
        }
        out
    }

    fn write_nodes(&mut self) -> Result<()> {
        for node in self.nodes.clone() {
            let type_name = self.graph.node_type(node)?;
            let path = self.path(node)?;
            if !self.graph.has_node_type(&type_name) {
                tracing::warn!(
                    node = %path,
                    type_name = %type_name,
                    "node type is not registered; the script will not load without it"
                );
            }
            self.line(&format!("node {type_name} {path}"));
        }
        Ok(())
    }

    /// Dynamic plugs other than the components of typed compounds, which
    /// their parent recreates.
    fn write_dynamic_plugs(&mut self, plugs: &[PlugId]) -> Result<()> {
        for &plug in plugs {
            let flags = self.graph.flags(plug)?;
            if !flags.contains(PlugFlags::DYNAMIC) || self.within_typed_compound(plug)? {
                continue;
            }
            let value_type = self.graph.value_type(plug)?;
            let default = if value_type == ValueType::Compound {
                "null".to_string()
            } else {
                self.graph.default_value(plug)?.to_json().to_string()
            };
            let line = format!(
                "plug {} {} {} {} {}",
                self.path(plug)?,
                value_type.name(),
                self.graph.direction(plug)?.name(),
                flags.to_names(),
                default
            );
            self.line(&line);
        }
        Ok(())
    }

    fn within_typed_compound(&self, plug: PlugId) -> Result<bool> {
        match self.graph.parent(plug) {
            Some(parent) if self.graph.is_plug(parent) => {
                let value_type = self.graph.value_type(PlugId(parent))?;
                Ok(value_type.is_compound() && value_type != ValueType::Compound)
            }
            _ => Ok(false),
        }
    }

    /// Unconnected leaves holding something other than their default.
    fn write_values(&mut self, plugs: &[PlugId]) -> Result<()> {
        for &plug in plugs {
            let value_type = self.graph.value_type(plug)?;
            let flags = self.graph.flags(plug)?;
            if value_type.is_compound()
                || !flags.contains(PlugFlags::SERIALISABLE)
                || flags.contains(PlugFlags::READ_ONLY)
                || self.graph.input(plug)?.is_some()
                || self.graph.is_set_to_default(plug)?
            {
                continue;
            }
            if self.graph.direction(plug)? == Direction::Out {
                let computes = self
                    .graph
                    .node_of(plug)
                    .map(|n| self.graph.behaviour(n))
                    .transpose()?
                    .map_or(false, |b| b.computes());
                if computes {
                    continue;
                }
            }
            let value = self.graph.stored_value(plug)?;
            let line = format!("set {} {}", self.path(plug)?, value.to_json());
            self.line(&line);
        }
        Ok(())
    }

    /// Inputs whose source is written too, or is a plug of the serialised
    /// parent itself. Compound connections are written once, for the
    /// outermost connected plug.
    fn write_connections(&mut self, plugs: &[PlugId]) -> Result<()> {
        let included: HashSet<PlugId> = plugs.iter().copied().collect();
        for &plug in plugs {
            let Some(source) = self.graph.input(plug)? else {
                continue;
            };
            if !self.graph.flags(plug)?.contains(PlugFlags::SERIALISABLE) {
                continue;
            }
            let parent_connected = match self.graph.parent(plug) {
                Some(parent) if self.graph.is_plug(parent) => {
                    let parent = PlugId(parent);
                    included.contains(&parent) && self.graph.input(parent)?.is_some()
                }
                _ => false,
            };
            if parent_connected || !self.is_written(source) {
                continue;
            }
            let line = format!("connect {} {}", self.path(plug)?, self.path(source)?);
            self.line(&line);
        }
        Ok(())
    }
}
