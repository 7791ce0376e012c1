//! Plugs and Connections
//!
//! A plug is a typed vertex owned by a node (or by a compound plug). Each
//! plug has at most one input; the reverse `outputs` index is maintained
//! alongside it so both directions are O(1).
//!
//! # Connections
//!
//! [`Graph::set_input`] validates everything before touching the arena:
//! flags, direction, types, compound shape, the node's own veto and cycles.
//! A rejected connection leaves the graph exactly as it was.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use super::component::{Arena, ComponentId, PlugData, PlugId};
use super::dirty;
use super::events::GraphEvent;
use super::{Edit, Graph};
use crate::error::{Error, Result};
use crate::value::{Value, ValueType};

/// Whether a plug receives data into its node or provides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    /// Name used in serialised scripts.
    pub fn name(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }

    /// Parse a name written by [`Direction::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "in" => Some(Direction::In),
            "out" => Some(Direction::Out),
            _ => None,
        }
    }
}

/// Plug behaviour flags.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlugFlags(u32);

impl PlugFlags {
    pub const NONE: PlugFlags = PlugFlags(0);
    /// Added after node construction; serialisation must recreate it.
    pub const DYNAMIC: PlugFlags = PlugFlags(1);
    /// Values and connections are written by serialisation.
    pub const SERIALISABLE: PlugFlags = PlugFlags(1 << 1);
    /// The plug may be connected to another plug.
    pub const ACCEPTS_INPUTS: PlugFlags = PlugFlags(1 << 2);
    /// Neither the value nor the input may be changed.
    pub const READ_ONLY: PlugFlags = PlugFlags(1 << 3);
    /// Computed values go through the compute cache.
    pub const CACHEABLE: PlugFlags = PlugFlags(1 << 4);

    /// Flags a new plug starts with.
    pub const DEFAULT: PlugFlags = PlugFlags(
        Self::SERIALISABLE.0 | Self::ACCEPTS_INPUTS.0 | Self::CACHEABLE.0,
    );

    const NAMED: [(PlugFlags, &'static str); 5] = [
        (Self::DYNAMIC, "dynamic"),
        (Self::SERIALISABLE, "serialisable"),
        (Self::ACCEPTS_INPUTS, "acceptsInputs"),
        (Self::READ_ONLY, "readOnly"),
        (Self::CACHEABLE, "cacheable"),
    ];

    /// True if every flag in `other` is set.
    pub fn contains(&self, other: PlugFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// A copy with `other` turned on or off.
    pub fn with(self, other: PlugFlags, on: bool) -> PlugFlags {
        if on {
            PlugFlags(self.0 | other.0)
        } else {
            PlugFlags(self.0 & !other.0)
        }
    }

    /// The raw bit set.
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Comma separated flag names, or `none`.
    pub fn to_names(&self) -> String {
        let names: Vec<&str> = Self::NAMED
            .iter()
            .filter(|(f, _)| self.contains(*f))
            .map(|(_, n)| *n)
            .collect();
        if names.is_empty() {
            "none".to_string()
        } else {
            names.join(",")
        }
    }

    /// Parse the output of [`PlugFlags::to_names`].
    pub fn from_names(text: &str) -> Option<PlugFlags> {
        if text == "none" {
            return Some(Self::NONE);
        }
        text.split(',').try_fold(Self::NONE, |acc, name| {
            Self::NAMED
                .iter()
                .find(|(_, n)| *n == name)
                .map(|(f, _)| acc | *f)
        })
    }
}

impl Default for PlugFlags {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl BitOr for PlugFlags {
    type Output = PlugFlags;

    fn bitor(self, rhs: PlugFlags) -> PlugFlags {
        PlugFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for PlugFlags {
    fn bitor_assign(&mut self, rhs: PlugFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for PlugFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlugFlags({})", self.to_names())
    }
}

/// Description of a plug to be created.
#[derive(Debug, Clone)]
pub struct PlugSpec {
    /// Whether the plug feeds its node or is produced by it.
    pub direction: Direction,
    /// Type of the value the plug holds.
    pub value_type: ValueType,
    /// Behaviour flags, [`PlugFlags::DEFAULT`] unless changed.
    pub flags: PlugFlags,
    /// Initial and default value; the type's zero value when `None`.
    pub default: Option<Value>,
    /// Extra children for `Compound` plugs. Typed compounds get their
    /// components automatically.
    pub children: Vec<(String, PlugSpec)>,
}

impl PlugSpec {
    /// A plug with default flags and no explicit default value.
    pub fn new(direction: Direction, value_type: ValueType) -> Self {
        Self {
            direction,
            value_type,
            flags: PlugFlags::DEFAULT,
            default: None,
            children: Vec::new(),
        }
    }

    /// An input plug of `value_type`.
    pub fn input(value_type: ValueType) -> Self {
        Self::new(Direction::In, value_type)
    }

    /// An output plug of `value_type`.
    pub fn output(value_type: ValueType) -> Self {
        Self::new(Direction::Out, value_type)
    }

    /// Set the default, which is also the initial value. It is converted
    /// to the plug's type when the plug is created.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Replace the flags.
    pub fn with_flags(mut self, flags: PlugFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Add a child to a `Compound` plug.
    pub fn with_child(mut self, name: impl Into<String>, child: PlugSpec) -> Self {
        self.children.push((name.into(), child));
        self
    }

    /// Check the description is self consistent before anything is created.
    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(default) = &self.default {
            if self.value_type.is_compound() {
                if default.value_type() != self.value_type {
                    return Err(Error::TypeMismatch {
                        target: "default value".to_string(),
                        expected: self.value_type.name().to_string(),
                        actual: default.value_type().name().to_string(),
                    });
                }
                if self.value_type == ValueType::Compound {
                    return Err(Error::InvalidArgument(
                        "Compound plugs take defaults from their children".to_string(),
                    ));
                }
            } else if default.convert(self.value_type).is_none() {
                return Err(Error::TypeMismatch {
                    target: "default value".to_string(),
                    expected: self.value_type.name().to_string(),
                    actual: default.value_type().name().to_string(),
                });
            }
        }
        if !self.children.is_empty() && self.value_type != ValueType::Compound {
            return Err(Error::InvalidArgument(format!(
                "{} plugs cannot have extra children",
                self.value_type
            )));
        }
        for (name, child) in &self.children {
            super::hierarchy::validate_name(name)?;
            if child.direction != self.direction {
                return Err(Error::InvalidArgument(format!(
                    "child \"{name}\" must have the same direction as its parent"
                )));
            }
            child.validate()?;
        }
        Ok(())
    }

    /// The arena data for this plug (children are created separately).
    pub(crate) fn data(&self) -> PlugData {
        let default = if self.value_type.is_compound() {
            None
        } else {
            self.default
                .as_ref()
                .and_then(|v| v.convert(self.value_type))
                .or_else(|| self.value_type.zero())
        };
        PlugData {
            direction: self.direction,
            flags: self.flags,
            value_type: self.value_type,
            input: None,
            outputs: Vec::new(),
            value: default.clone(),
            default,
            dirty_count: 0,
        }
    }

    /// Child specs, including the components of typed compounds.
    pub(crate) fn child_specs(&self) -> Vec<(String, PlugSpec)> {
        let defaults = self.default.as_ref().and_then(Value::components);
        let mut out: Vec<(String, PlugSpec)> = self
            .value_type
            .component_layout()
            .iter()
            .enumerate()
            .map(|(i, (name, value_type))| {
                let mut spec = PlugSpec::new(self.direction, *value_type).with_flags(self.flags);
                if let Some(d) = defaults.as_ref().and_then(|d| d.get(i)) {
                    spec.default = Some(d.clone());
                }
                (name.to_string(), spec)
            })
            .collect();
        out.extend(self.children.iter().cloned());
        out
    }
}

impl Graph {
    /// Connect `plug` to `input`, or disconnect it with `None`.
    pub fn set_input(&self, plug: PlugId, input: Option<PlugId>) -> Result<()> {
        self.edit(|edit| set_input(edit, plug, input))
    }

    /// The plug's direct input.
    pub fn input(&self, plug: PlugId) -> Result<Option<PlugId>> {
        Ok(self.arena.read_recursive().plug(plug)?.input)
    }

    /// Plugs whose input is `plug`.
    pub fn outputs(&self, plug: PlugId) -> Result<Vec<PlugId>> {
        Ok(self.arena.read_recursive().plug(plug)?.outputs.clone())
    }

    /// Follow inputs back to the plug with no further input.
    pub fn source(&self, plug: PlugId) -> Result<PlugId> {
        self.arena.read_recursive().source(plug)
    }

    /// Whether `plug` is an input or an output.
    pub fn direction(&self, plug: PlugId) -> Result<Direction> {
        Ok(self.arena.read_recursive().plug(plug)?.direction)
    }

    /// The type of value `plug` holds.
    pub fn value_type(&self, plug: PlugId) -> Result<ValueType> {
        Ok(self.arena.read_recursive().plug(plug)?.value_type)
    }

    /// The behaviour flags of `plug`.
    pub fn flags(&self, plug: PlugId) -> Result<PlugFlags> {
        Ok(self.arena.read_recursive().plug(plug)?.flags)
    }

    /// Turn `flags` on or off for `plug`.
    pub fn set_flags(&self, plug: PlugId, flags: PlugFlags, on: bool) -> Result<()> {
        self.edit(|edit| {
            let data = edit.arena.plug_mut(plug)?;
            let updated = data.flags.with(flags, on);
            if updated != data.flags {
                data.flags = updated;
                // Cacheability changes how the value is produced.
                if flags.contains(PlugFlags::CACHEABLE) {
                    edit.dirty(plug);
                }
            }
            Ok(())
        })
    }

    /// The value `plug` was created with. Compounds combine their
    /// children's defaults.
    pub fn default_value(&self, plug: PlugId) -> Result<Value> {
        let arena = self.arena.read_recursive();
        stored_value(&arena, plug, |p| p.default.clone())
    }

    /// The stored value, ignoring inputs and computation.
    pub(crate) fn stored_value(&self, plug: PlugId) -> Result<Value> {
        let arena = self.arena.read_recursive();
        stored_value(&arena, plug, |p| p.value.clone())
    }

    /// Store a value on an unconnected plug.
    ///
    /// Setting a value equal to the current one does nothing. Compound
    /// values are split over the children.
    pub fn set_value(&self, plug: PlugId, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.edit(|edit| set_value(edit, plug, value))
    }

    /// Restore the default value.
    pub fn set_to_default(&self, plug: PlugId) -> Result<()> {
        let default = self.default_value(plug)?;
        self.set_value(plug, default)
    }

    /// True if every leaf below `plug` is unconnected and holds its default.
    pub fn is_set_to_default(&self, plug: PlugId) -> Result<bool> {
        let arena = self.arena.read_recursive();
        arena.plug(plug)?;
        for leaf in arena.leaf_plugs(plug) {
            let data = arena.plug(leaf)?;
            if data.input.is_some() || data.value != data.default {
                return Ok(false);
            }
        }
        Ok(arena.plug(plug)?.input.is_none())
    }
}

fn stored_value(
    arena: &Arena,
    plug: PlugId,
    leaf: impl Fn(&PlugData) -> Option<Value> + Copy,
) -> Result<Value> {
    let data = arena.plug(plug)?;
    if data.value_type.is_compound() {
        let parts = arena
            .plug_children(plug)
            .map(|c| stored_value(arena, c, leaf))
            .collect::<Result<Vec<_>>>()?;
        return Value::from_components(data.value_type, parts);
    }
    leaf(data).ok_or_else(|| Error::NotFound(format!("value of {}", arena.full_name(plug.0))))
}

fn set_value(edit: &mut Edit<'_>, plug: PlugId, value: Value) -> Result<()> {
    check_settable(edit.arena, plug)?;
    let data = edit.arena.plug(plug)?;
    let value_type = data.value_type;

    if value_type.is_compound() {
        let parts = value.components().ok_or_else(|| Error::TypeMismatch {
            target: edit.arena.full_name(plug.0),
            expected: value_type.name().to_string(),
            actual: value.value_type().name().to_string(),
        })?;
        let children: Vec<PlugId> = edit.arena.plug_children(plug).collect();
        if children.len() != parts.len() || !value_type.accepts(value.value_type()) {
            return Err(Error::TypeMismatch {
                target: edit.arena.full_name(plug.0),
                expected: value_type.name().to_string(),
                actual: value.value_type().name().to_string(),
            });
        }
        // Validate every child before storing anything.
        let mut converted = Vec::with_capacity(parts.len());
        for (child, part) in children.iter().zip(parts) {
            check_settable(edit.arena, *child)?;
            converted.push((*child, convert_for(edit.arena, *child, part)?));
        }
        for (child, part) in converted {
            store(edit, child, part)?;
        }
        return Ok(());
    }

    let value = convert_for(edit.arena, plug, value)?;
    store(edit, plug, value)
}

fn convert_for(arena: &Arena, plug: PlugId, value: Value) -> Result<Value> {
    let data = arena.plug(plug)?;
    if data.value_type.is_compound() {
        return Err(Error::NotSettable(format!(
            "{} is a nested compound",
            arena.full_name(plug.0)
        )));
    }
    value
        .convert(data.value_type)
        .ok_or_else(|| Error::TypeMismatch {
            target: arena.full_name(plug.0),
            expected: data.value_type.name().to_string(),
            actual: value.value_type().name().to_string(),
        })
}

fn check_settable(arena: &Arena, plug: PlugId) -> Result<()> {
    let data = arena.plug(plug)?;
    if data.input.is_some() {
        return Err(Error::NotSettable(format!(
            "{} has an input",
            arena.full_name(plug.0)
        )));
    }
    if data.flags.contains(PlugFlags::READ_ONLY) {
        return Err(Error::ReadOnly(arena.full_name(plug.0)));
    }
    if data.direction == Direction::Out && is_computed(arena, plug) {
        return Err(Error::NotSettable(format!(
            "{} is computed by its node",
            arena.full_name(plug.0)
        )));
    }
    Ok(())
}

/// Outputs of nodes that compute get their value from `compute()`.
fn is_computed(arena: &Arena, plug: PlugId) -> bool {
    arena
        .node_of(plug)
        .and_then(|node| arena.node(node).ok())
        .map(|node| node.behaviour.computes())
        .unwrap_or(false)
}

fn store(edit: &mut Edit<'_>, plug: PlugId, value: Value) -> Result<()> {
    let data = edit.arena.plug_mut(plug)?;
    if data.value.as_ref() == Some(&value) {
        return Ok(());
    }
    data.value = Some(value);
    emit_plug_set(edit, plug);
    edit.dirty(plug);
    Ok(())
}

/// `plug_set` goes to the plug, its parent plugs and everything downstream.
fn emit_plug_set(edit: &mut Edit<'_>, plug: PlugId) {
    let mut notified = Vec::new();
    let mut current = Some(plug);
    while let Some(p) = current {
        notified.push(p);
        current = edit.arena.parent_plug(p);
    }
    let mut stack = vec![plug];
    while let Some(p) = stack.pop() {
        if let Ok(data) = edit.arena.plug(p) {
            for o in &data.outputs {
                if !notified.contains(o) {
                    notified.push(*o);
                    stack.push(*o);
                }
            }
        }
    }
    edit.events
        .extend(notified.into_iter().map(GraphEvent::PlugSet));
}

pub(crate) fn set_input(edit: &mut Edit<'_>, plug: PlugId, input: Option<PlugId>) -> Result<()> {
    if let Some(source) = input {
        validate_connection(edit.arena, plug, source)?;
    } else {
        edit.arena.plug(plug)?;
    }
    if edit.arena.plug(plug)?.input == input {
        return Ok(());
    }
    connect_unchecked(edit, plug, input)?;
    update_parent_input(edit, plug)
}

/// Keep the parent plugs of `plug` consistent with their children.
///
/// A parent is connected to a compound exactly when each of its children is
/// connected to the matching child of that compound. Otherwise its input is
/// cleared so evaluation and serialisation follow the children.
fn update_parent_input(edit: &mut Edit<'_>, plug: PlugId) -> Result<()> {
    let Some(parent) = edit.arena.parent_plug(plug) else {
        return Ok(());
    };
    let common = common_input(edit.arena, parent)?;
    let old = edit.arena.plug(parent)?.input;
    if old == common {
        return Ok(());
    }

    if let Some(old) = old {
        edit.arena.plug_mut(old)?.outputs.retain(|o| *o != parent);
    }
    if let Some(new) = common {
        edit.arena.plug_mut(new)?.outputs.push(parent);
    }
    edit.arena.plug_mut(parent)?.input = common;
    emit_input_changed(edit, parent);
    update_parent_input(edit, parent)
}

/// The compound feeding every child of `parent` pairwise, if there is one.
fn common_input(arena: &Arena, parent: PlugId) -> Result<Option<PlugId>> {
    let children: Vec<PlugId> = arena.plug_children(parent).collect();
    let mut common = None;
    for (i, child) in children.iter().enumerate() {
        let Some(input) = arena.plug(*child)?.input else {
            return Ok(None);
        };
        let Some(source) = arena.parent_plug(input) else {
            return Ok(None);
        };
        if common.is_some_and(|c| c != source) {
            return Ok(None);
        }
        if arena.plug_children(source).nth(i) != Some(input) {
            return Ok(None);
        }
        common = Some(source);
    }
    let Some(source) = common else {
        return Ok(None);
    };
    let compatible = arena.plug_children(source).count() == children.len()
        && arena
            .plug(parent)?
            .value_type
            .accepts(arena.plug(source)?.value_type);
    Ok(compatible.then_some(source))
}

/// Rewire `plug` (and compound children pairwise) without validation.
pub(crate) fn connect_unchecked(
    edit: &mut Edit<'_>,
    plug: PlugId,
    input: Option<PlugId>,
) -> Result<()> {
    let old = edit.arena.plug(plug)?.input;
    if old != input {
        if let Some(old) = old {
            edit.arena.plug_mut(old)?.outputs.retain(|o| *o != plug);
        }
        if let Some(new) = input {
            edit.arena.plug_mut(new)?.outputs.push(plug);
        }
        edit.arena.plug_mut(plug)?.input = input;
    }

    let children: Vec<PlugId> = edit.arena.plug_children(plug).collect();
    if !children.is_empty() {
        let sources: Vec<Option<PlugId>> = match input {
            Some(source) => edit.arena.plug_children(source).map(Some).collect(),
            None => vec![None; children.len()],
        };
        for (child, source) in children.into_iter().zip(sources) {
            connect_unchecked(edit, child, source)?;
        }
    }

    if old != input {
        emit_input_changed(edit, plug);
        edit.dirty(plug);
    }
    Ok(())
}

/// `input_changed` goes to the plug and recursively to its outputs, since
/// their effective source changed too.
fn emit_input_changed(edit: &mut Edit<'_>, plug: PlugId) {
    let mut stack = vec![plug];
    let mut seen = Vec::new();
    while let Some(p) = stack.pop() {
        if seen.contains(&p) {
            continue;
        }
        seen.push(p);
        edit.events.push(GraphEvent::InputChanged(p));
        if let Ok(data) = edit.arena.plug(p) {
            stack.extend(data.outputs.iter().rev());
        }
    }
}

fn validate_connection(arena: &Arena, plug: PlugId, source: PlugId) -> Result<()> {
    let incompatible = |reason: &str| Error::IncompatiblePlugs {
        destination: arena.full_name(plug.0),
        source_plug: arena.full_name(source.0),
        reason: reason.to_string(),
    };

    let dst = arena.plug(plug)?;
    let src = arena.plug(source)?;

    if plug == source {
        return Err(incompatible("a plug cannot be its own input"));
    }
    if !dst.flags.contains(PlugFlags::ACCEPTS_INPUTS) {
        return Err(incompatible("destination does not accept inputs"));
    }
    if dst.flags.contains(PlugFlags::READ_ONLY) {
        return Err(Error::ReadOnly(arena.full_name(plug.0)));
    }
    if !dst.value_type.accepts(src.value_type) {
        return Err(incompatible(&format!(
            "cannot connect {} to {}",
            src.value_type, dst.value_type
        )));
    }
    check_compound_shape(arena, plug, source).map_err(|reason| incompatible(&reason))?;

    if dst.direction == Direction::Out {
        // Out plugs only take internal pass-through inputs.
        let node = arena.node_of(plug);
        let source_node = arena.node_of(source);
        let internal = match (node, source_node) {
            (Some(n), Some(s)) => n == s || arena.is_ancestor_of(n.0, s.0),
            _ => false,
        };
        if !internal {
            return Err(incompatible(
                "an output plug may only take an input from its own node or a child node",
            ));
        }
    }

    if let Some(node) = arena.node_of(plug) {
        let behaviour = arena.node(node)?.behaviour.clone();
        let view = super::node::NodeRef::new(arena, node);
        if !behaviour.accepts_input(&view, plug, source) {
            return Err(incompatible("rejected by node"));
        }
    }

    // Creating the connection must not make `source` depend on `plug`.
    let seeds = arena.leaf_plugs(plug);
    let downstream = dirty::downstream(arena, &seeds);
    let source_plugs = arena.subtree_plugs(source.0);
    if source_plugs.iter().any(|p| downstream.contains(p)) || arena.is_ancestor_of(plug.0, source.0) {
        return Err(Error::CyclicConnection {
            destination: arena.full_name(plug.0),
            source_plug: arena.full_name(source.0),
        });
    }
    Ok(())
}

fn check_compound_shape(
    arena: &Arena,
    plug: PlugId,
    source: PlugId,
) -> std::result::Result<(), String> {
    let dst: Vec<PlugId> = arena.plug_children(plug).collect();
    let src: Vec<PlugId> = arena.plug_children(source).collect();
    if dst.len() != src.len() {
        return Err(format!(
            "child count mismatch ({} vs {})",
            dst.len(),
            src.len()
        ));
    }
    for (d, s) in dst.into_iter().zip(src) {
        let (dt, st) = match (arena.plug(d), arena.plug(s)) {
            (Ok(dd), Ok(sd)) => (dd.value_type, sd.value_type),
            _ => return Err("missing child".to_string()),
        };
        if !dt.accepts(st) {
            return Err(format!("cannot connect child {st} to {dt}"));
        }
        check_compound_shape(arena, d, s)?;
    }
    Ok(())
}

/// Break every connection that crosses the boundary of the subtree `root`.
pub(crate) fn disconnect_external(edit: &mut Edit<'_>, root: ComponentId) -> Result<()> {
    let plugs = edit.arena.subtree_plugs(root);
    let inside = |arena: &Arena, p: PlugId| p.0 == root || arena.is_ancestor_of(root, p.0);

    for plug in &plugs {
        if let Some(input) = edit.arena.plug(*plug)?.input {
            if !inside(edit.arena, input) {
                connect_unchecked(edit, *plug, None)?;
                update_parent_input(edit, *plug)?;
            }
        }
        let outputs = edit.arena.plug(*plug)?.outputs.clone();
        for output in outputs {
            if !inside(edit.arena, output) {
                connect_unchecked(edit, output, None)?;
                update_parent_input(edit, output)?;
            }
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_flags() {
        let flags = PlugFlags::default();
        assert!(flags.contains(PlugFlags::SERIALISABLE));
        assert!(flags.contains(PlugFlags::ACCEPTS_INPUTS));
        assert!(flags.contains(PlugFlags::CACHEABLE));
        assert!(!flags.contains(PlugFlags::DYNAMIC));
        assert!(!flags.contains(PlugFlags::READ_ONLY));
    }

    #[test]
    fn flag_names() {
        let flags = PlugFlags::DYNAMIC | PlugFlags::READ_ONLY;
        assert_eq!(flags.to_names(), "dynamic,readOnly");
        assert_eq!(PlugFlags::from_names("dynamic,readOnly"), Some(flags));
        assert_eq!(PlugFlags::from_names("none"), Some(PlugFlags::NONE));
        assert_eq!(PlugFlags::from_names("bogus"), None);
        assert_eq!(PlugFlags::NONE.to_names(), "none");
    }

    #[test]
    fn with_toggles_flags() {
        let flags = PlugFlags::DEFAULT.with(PlugFlags::CACHEABLE, false);
        assert!(!flags.contains(PlugFlags::CACHEABLE));
        assert!(flags.with(PlugFlags::CACHEABLE, true).contains(PlugFlags::CACHEABLE));
    }

    #[test]
    fn spec_validation() {
        assert!(PlugSpec::input(ValueType::Int).with_default(1.5).validate().is_ok());
        assert!(PlugSpec::input(ValueType::Int)
            .with_default("x")
            .validate()
            .is_err());
        assert!(PlugSpec::input(ValueType::Int)
            .with_child("a", PlugSpec::input(ValueType::Int))
            .validate()
            .is_err());
        assert!(PlugSpec::input(ValueType::Compound)
            .with_child("a", PlugSpec::output(ValueType::Int))
            .validate()
            .is_err());
    }

    #[test]
    fn typed_compound_children() {
        let spec = PlugSpec::input(ValueType::V3f).with_default(Value::V3f([1.0, 2.0, 3.0]));
        let children = spec.child_specs();
        let names: Vec<&str> = children.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["x", "y", "z"]);
        assert_eq!(children[1].1.default, Some(Value::Float(2.0)));
        assert!(spec.data().default.is_none());
    }

    #[test]
    fn leaf_default_is_converted() {
        let data = PlugSpec::input(ValueType::Float).with_default(2).data();
        assert_eq!(data.default, Some(Value::Float(2.0)));
        assert_eq!(data.value, data.default);
        let zero = PlugSpec::input(ValueType::String).data();
        assert_eq!(zero.value, Some(Value::String(String::new())));
    }
}
