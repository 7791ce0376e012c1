//! Hierarchy editing: names, parenting, creation and deletion.

use std::sync::Arc;

use super::component::{
    Arena, Component, ComponentId, ComponentKind, NodeData, NodeId, PlugId,
};
use super::events::{ChildEvent, GraphEvent, NameChange, ParentChange};
use super::node::{Node, PlugLayout};
use super::plug::{self, PlugFlags, PlugSpec};
use super::{Edit, Graph};
use crate::error::{Error, Result};
use crate::value::ValueType;

/// Name of the compound plug every node carries for user additions.
pub const USER_PLUG: &str = "user";

/// Names are identifiers: letters, digits and underscores, not starting
/// with a digit.
pub fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidName(name.to_string()))
    }
}

/// Split `name` into a prefix and a numeric suffix.
fn numeric_suffix(name: &str) -> (&str, Option<u64>) {
    let prefix = name.trim_end_matches(|c: char| c.is_ascii_digit());
    let suffix = name[prefix.len()..].parse().ok();
    (prefix, suffix)
}

/// `name`, or the first free variant of it among the children of `parent`.
///
/// The numeric suffix (1 when absent) is raised past every sibling that
/// shares the prefix, so `Add`, `Add1`, `Add2` continue with `Add3`.
pub(crate) fn unique_name(
    arena: &Arena,
    parent: ComponentId,
    name: &str,
    exclude: Option<ComponentId>,
) -> String {
    let siblings: Vec<&str> = arena
        .children(parent)
        .iter()
        .filter(|c| Some(**c) != exclude)
        .filter_map(|c| arena.name(*c).ok())
        .collect();
    if !siblings.contains(&name) {
        return name.to_string();
    }

    let (prefix, suffix) = numeric_suffix(name);
    let mut suffix = suffix.unwrap_or(1);
    for sibling in siblings {
        if let Some(rest) = sibling.strip_prefix(prefix) {
            if rest.is_empty() {
                suffix = suffix.max(1);
            } else if rest.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(n) = rest.parse::<u64>() {
                    suffix = suffix.max(n + 1);
                }
            }
        }
    }
    format!("{prefix}{suffix}")
}

fn check_child(arena: &Arena, parent: ComponentId, child: ComponentId) -> Result<()> {
    let parent_component = arena.get(parent)?;
    let child_component = arena.get(child)?;
    let parent_name = || arena.full_name(parent);
    let child_name = || child_component.name.clone();

    if parent == child {
        return Err(Error::InvalidArgument(format!(
            "\"{}\" cannot be parented to itself",
            child_name()
        )));
    }
    if Some(child) == arena.root() {
        return Err(Error::InvalidArgument("the graph root cannot be reparented".to_string()));
    }
    if arena.is_ancestor_of(child, parent) {
        return Err(Error::InvalidArgument(format!(
            "\"{}\" is an ancestor of \"{}\"",
            child_name(),
            parent_name()
        )));
    }

    match (&parent_component.kind, &child_component.kind) {
        (ComponentKind::Node(_), ComponentKind::Plug(_)) => Ok(()),
        (ComponentKind::Node(n), ComponentKind::Node(_)) if !n.behaviour.computes() => Ok(()),
        (ComponentKind::Plug(p), ComponentKind::Plug(c))
            if p.value_type == ValueType::Compound && p.direction == c.direction =>
        {
            Ok(())
        }
        _ => Err(Error::InvalidArgument(format!(
            "\"{}\" rejects child \"{}\"",
            parent_name(),
            child_name()
        ))),
    }
}

fn insert_plug(
    arena: &mut Arena,
    parent: ComponentId,
    name: &str,
    spec: &PlugSpec,
    extra_flags: PlugFlags,
) -> Result<PlugId> {
    let id = ComponentId::new();
    let name = unique_name(arena, parent, name, None);
    let mut data = spec.data();
    data.flags |= extra_flags;
    arena.insert(
        id,
        Component {
            name,
            parent: Some(parent),
            children: Vec::new(),
            kind: ComponentKind::Plug(data),
        },
    );
    arena.get_mut(parent)?.children.push(id);
    for (child_name, child_spec) in spec.child_specs() {
        insert_plug(arena, id, &child_name, &child_spec, extra_flags)?;
    }
    Ok(PlugId(id))
}

/// Rename without checking siblings. Dirties plugs, whose hashes include
/// their names.
fn set_name_unchecked(edit: &mut Edit<'_>, id: ComponentId, name: String) -> Result<()> {
    let component = edit.arena.get_mut(id)?;
    if component.name == name {
        return Ok(());
    }
    let old_name = std::mem::replace(&mut component.name, name.clone());
    edit.events.push(GraphEvent::NameChanged(NameChange {
        component: id,
        old_name,
        new_name: name,
    }));
    for plug in edit.arena.subtree_plugs(id) {
        edit.dirty(plug);
    }
    Ok(())
}

fn rename(edit: &mut Edit<'_>, id: ComponentId, name: &str) -> Result<String> {
    validate_name(name)?;
    let unique = match edit.arena.parent(id) {
        Some(parent) => unique_name(edit.arena, parent, name, Some(id)),
        None => name.to_string(),
    };
    set_name_unchecked(edit, id, unique.clone())?;
    Ok(unique)
}

/// Move `child` under `parent`, optionally renaming it once it is there.
fn attach(
    edit: &mut Edit<'_>,
    parent: ComponentId,
    child: ComponentId,
    name: Option<&str>,
) -> Result<()> {
    check_child(edit.arena, parent, child)?;
    let old_parent = edit.arena.parent(child);
    if old_parent == Some(parent) {
        if let Some(name) = name {
            rename(edit, child, name)?;
        }
        return Ok(());
    }

    if let Some(old) = old_parent {
        edit.arena.get_mut(old)?.children.retain(|c| *c != child);
        edit.events.push(GraphEvent::ChildRemoved(ChildEvent { parent: old, child }));
        if edit.arena.is_plug(old) {
            edit.dirty(PlugId(old));
        }
    }
    edit.arena.get_mut(parent)?.children.push(child);
    edit.arena.get_mut(child)?.parent = Some(parent);

    let name = match name {
        Some(name) => name.to_string(),
        None => edit.arena.name(child)?.to_string(),
    };
    rename(edit, child, &name)?;

    edit.events.push(GraphEvent::ChildAdded(ChildEvent { parent, child }));
    edit.events.push(GraphEvent::ParentChanged(ParentChange {
        component: child,
        old_parent,
        new_parent: Some(parent),
    }));
    if edit.arena.is_plug(parent) {
        edit.dirty(PlugId(child));
    }
    Ok(())
}

fn detach(edit: &mut Edit<'_>, child: ComponentId) -> Result<()> {
    let Some(parent) = edit.arena.parent(child) else {
        return Ok(());
    };
    plug::disconnect_external(edit, child)?;
    if edit.arena.is_plug(parent) {
        edit.dirty(PlugId(parent));
    }
    edit.arena.get_mut(parent)?.children.retain(|c| *c != child);
    edit.arena.get_mut(child)?.parent = None;
    edit.events.push(GraphEvent::ChildRemoved(ChildEvent { parent, child }));
    edit.events.push(GraphEvent::ParentChanged(ParentChange {
        component: child,
        old_parent: Some(parent),
        new_parent: None,
    }));
    Ok(())
}

impl Graph {
    /// Create a node under `parent`, along with the plugs it declares.
    pub fn add_node(&self, parent: NodeId, name: &str, node: impl Node) -> Result<NodeId> {
        self.add_node_arc(parent, name, Arc::new(node))
    }

    pub fn add_node_arc(
        &self,
        parent: NodeId,
        name: &str,
        behaviour: Arc<dyn Node>,
    ) -> Result<NodeId> {
        validate_name(name)?;
        let mut layout = PlugLayout::default();
        behaviour.build(&mut layout);
        let plugs = layout.into_plugs();
        for (plug_name, spec) in &plugs {
            validate_name(plug_name)?;
            spec.validate()?;
        }

        self.edit(|edit| {
            edit.arena.node(parent)?;
            let id = ComponentId::new();
            edit.arena.insert(
                id,
                Component {
                    name: name.to_string(),
                    parent: None,
                    children: Vec::new(),
                    kind: ComponentKind::Node(NodeData { behaviour }),
                },
            );
            for (plug_name, spec) in &plugs {
                insert_plug(edit.arena, id, plug_name, spec, PlugFlags::NONE)?;
            }
            insert_plug(
                edit.arena,
                id,
                USER_PLUG,
                &PlugSpec::input(ValueType::Compound),
                PlugFlags::NONE,
            )?;
            if let Err(e) = attach(edit, parent.0, id, None) {
                for c in edit.arena.subtree(id) {
                    edit.arena.remove(c);
                }
                return Err(e);
            }
            Ok(NodeId(id))
        })
    }

    /// Add a plug to a node or a `Compound` plug after construction.
    ///
    /// Such plugs are flagged [`PlugFlags::DYNAMIC`] so serialisation
    /// recreates them.
    pub fn add_plug(
        &self,
        parent: impl Into<ComponentId>,
        name: &str,
        spec: PlugSpec,
    ) -> Result<PlugId> {
        let parent = parent.into();
        validate_name(name)?;
        spec.validate()?;

        self.edit(|edit| {
            match &edit.arena.get(parent)?.kind {
                ComponentKind::Node(_) => {}
                ComponentKind::Plug(p)
                    if p.value_type == ValueType::Compound && p.direction == spec.direction => {}
                ComponentKind::Plug(_) => {
                    return Err(Error::InvalidArgument(format!(
                        "\"{}\" rejects child \"{name}\"",
                        edit.arena.full_name(parent)
                    )))
                }
            }
            let id = insert_plug(edit.arena, parent, name, &spec, PlugFlags::DYNAMIC)?;
            edit.events.push(GraphEvent::ChildAdded(ChildEvent {
                parent,
                child: id.0,
            }));
            edit.events.push(GraphEvent::ParentChanged(ParentChange {
                component: id.0,
                old_parent: None,
                new_parent: Some(parent),
            }));
            edit.dirty(id);
            Ok(id)
        })
    }

    /// Parent `child` under `parent`, removing it from any previous parent.
    pub fn add_child(
        &self,
        parent: impl Into<ComponentId>,
        child: impl Into<ComponentId>,
    ) -> Result<()> {
        let (parent, child) = (parent.into(), child.into());
        self.edit(|edit| attach(edit, parent, child, None))
    }

    /// Detach `child` from `parent`. The child survives as a root and may be
    /// added again; connections crossing its boundary are broken.
    pub fn remove_child(
        &self,
        parent: impl Into<ComponentId>,
        child: impl Into<ComponentId>,
    ) -> Result<()> {
        let (parent, child) = (parent.into(), child.into());
        self.edit(|edit| {
            edit.arena.get(child)?;
            if edit.arena.parent(child) != Some(parent) {
                return Err(Error::InvalidArgument(format!(
                    "\"{}\" is not a child of \"{}\"",
                    edit.arena.full_name(child),
                    edit.arena.full_name(parent)
                )));
            }
            detach(edit, child)
        })
    }

    /// Put `child` under `parent` as `name`, replacing any existing child of
    /// that name.
    pub fn set_child(
        &self,
        parent: impl Into<ComponentId>,
        name: &str,
        child: impl Into<ComponentId>,
    ) -> Result<()> {
        let (parent, child) = (parent.into(), child.into());
        validate_name(name)?;
        self.edit(|edit| {
            let existing = edit.arena.child_named(parent, name);
            if existing == Some(child) {
                return Ok(());
            }
            check_child(edit.arena, parent, child)?;
            if let Some(existing) = existing {
                detach(edit, existing)?;
            }
            attach(edit, parent, child, Some(name))
        })
    }

    /// Rename `id`, returning the (possibly uniquified) name.
    pub fn set_name(&self, id: impl Into<ComponentId>, name: &str) -> Result<String> {
        let id = id.into();
        self.edit(|edit| {
            edit.arena.get(id)?;
            rename(edit, id, name)
        })
    }

    /// Destroy `id` and everything below it.
    pub fn delete(&self, id: impl Into<ComponentId>) -> Result<()> {
        let id = id.into();
        self.edit(|edit| {
            edit.arena.get(id)?;
            if Some(id) == edit.arena.root() {
                return Err(Error::InvalidArgument("the graph root cannot be deleted".to_string()));
            }
            detach(edit, id)?;
            plug::disconnect_external(edit, id)?;
            for c in edit.arena.subtree(id) {
                edit.arena.remove(c);
            }
            Ok(())
        })
    }

    /// True while `id` has not been deleted.
    pub fn contains(&self, id: impl Into<ComponentId>) -> bool {
        self.arena.read_recursive().contains(id.into())
    }

    pub fn is_node(&self, id: ComponentId) -> bool {
        self.arena.read_recursive().is_node(id)
    }

    pub fn is_plug(&self, id: ComponentId) -> bool {
        self.arena.read_recursive().is_plug(id)
    }

    /// The component's own name.
    pub fn name(&self, id: impl Into<ComponentId>) -> Result<String> {
        Ok(self.arena.read_recursive().name(id.into())?.to_string())
    }

    /// The component's parent; `None` for the root and detached subtrees.
    pub fn parent(&self, id: impl Into<ComponentId>) -> Option<ComponentId> {
        self.arena.read_recursive().parent(id.into())
    }

    /// All children, nodes and plugs, in order.
    pub fn children(&self, id: impl Into<ComponentId>) -> Vec<ComponentId> {
        self.arena.read_recursive().children(id.into()).to_vec()
    }

    /// The child nodes of a node, in order.
    pub fn child_nodes(&self, id: NodeId) -> Vec<NodeId> {
        let arena = self.arena.read_recursive();
        arena
            .children(id.0)
            .iter()
            .filter(|c| arena.is_node(**c))
            .map(|c| NodeId(*c))
            .collect()
    }

    /// The child plugs of a node or plug, in order.
    pub fn child_plugs(&self, id: impl Into<ComponentId>) -> Vec<PlugId> {
        let arena = self.arena.read_recursive();
        arena
            .children(id.into())
            .iter()
            .filter(|c| arena.is_plug(**c))
            .map(|c| PlugId(*c))
            .collect()
    }

    /// The child of `parent` called `name`.
    pub fn child(&self, parent: impl Into<ComponentId>, name: &str) -> Option<ComponentId> {
        self.arena.read_recursive().child_named(parent.into(), name)
    }

    /// Resolve a path relative to the root (`"Add1.op1"`).
    pub fn descendant(&self, path: &str) -> Option<ComponentId> {
        self.descendant_of(self.root.0, path)
    }

    /// Resolve a path relative to `ancestor`.
    pub fn descendant_of(&self, ancestor: impl Into<ComponentId>, path: &str) -> Option<ComponentId> {
        self.arena.read_recursive().descendant(ancestor.into(), path)
    }

    /// The node at `path` from the root.
    pub fn node(&self, path: &str) -> Option<NodeId> {
        let arena = self.arena.read_recursive();
        arena
            .descendant(self.root.0, path)
            .filter(|c| arena.is_node(*c))
            .map(NodeId)
    }

    /// The plug at `path` from the root.
    pub fn plug(&self, path: &str) -> Option<PlugId> {
        let arena = self.arena.read_recursive();
        arena
            .descendant(self.root.0, path)
            .filter(|c| arena.is_plug(*c))
            .map(PlugId)
    }

    /// The plug at `path` below `node`.
    pub fn plug_of(&self, node: NodeId, path: &str) -> Result<PlugId> {
        let arena = self.arena.read_recursive();
        arena
            .descendant(node.0, path)
            .filter(|c| arena.is_plug(*c))
            .map(PlugId)
            .ok_or_else(|| Error::NotFound(format!("{}.{path}", arena.full_name(node.0))))
    }

    /// Path from the root, without the root itself.
    pub fn full_name(&self, id: impl Into<ComponentId>) -> String {
        self.arena.read_recursive().full_name(id.into())
    }

    /// Path of `id` below `ancestor`. Fails if `ancestor` is not above it.
    pub fn relative_name(
        &self,
        id: impl Into<ComponentId>,
        ancestor: impl Into<ComponentId>,
    ) -> Result<String> {
        let (id, ancestor) = (id.into(), ancestor.into());
        let arena = self.arena.read_recursive();
        if !arena.is_ancestor_of(ancestor, id) {
            return Err(Error::InvalidArgument(format!(
                "\"{}\" is not an ancestor of \"{}\"",
                arena.full_name(ancestor),
                arena.full_name(id)
            )));
        }
        Ok(arena.relative_name(id, Some(ancestor)))
    }

    pub fn is_ancestor_of(&self, ancestor: impl Into<ComponentId>, id: impl Into<ComponentId>) -> bool {
        self.arena
            .read_recursive()
            .is_ancestor_of(ancestor.into(), id.into())
    }

    /// The nearest node above `id`.
    pub fn ancestor_node(&self, id: impl Into<ComponentId>) -> Option<NodeId> {
        self.arena
            .read_recursive()
            .ancestor_where(id.into(), |c| c.as_node().is_some())
            .map(NodeId)
    }

    /// The node a plug belongs to.
    pub fn node_of(&self, plug: PlugId) -> Option<NodeId> {
        self.arena.read_recursive().node_of(plug)
    }

    /// The registered type name of a node.
    pub fn node_type(&self, node: NodeId) -> Result<String> {
        Ok(self
            .arena
            .read_recursive()
            .node(node)?
            .behaviour
            .type_name()
            .to_string())
    }

    /// The implementation behind a node.
    pub fn behaviour(&self, node: NodeId) -> Result<Arc<dyn Node>> {
        Ok(self.arena.read_recursive().node(node)?.behaviour.clone())
    }
}
