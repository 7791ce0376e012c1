//! Graph Events
//!
//! Edits collect [`GraphEvent`]s while the arena is locked and dispatch
//! them once the lock is released, so handlers are free to read (or edit)
//! the graph. Dirtiness is not an event here: it is batched separately and
//! emitted through [`GraphSignals::plug_dirtied`] when the outermost
//! propagation scope closes.

use super::component::{ComponentId, PlugId};
use crate::signal::Signal;

/// A child was added to or removed from a parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildEvent {
    pub parent: ComponentId,
    pub child: ComponentId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameChange {
    pub component: ComponentId,
    pub old_name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentChange {
    pub component: ComponentId,
    pub old_parent: Option<ComponentId>,
    pub new_parent: Option<ComponentId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum GraphEvent {
    ChildAdded(ChildEvent),
    ChildRemoved(ChildEvent),
    NameChanged(NameChange),
    ParentChanged(ParentChange),
    InputChanged(PlugId),
    PlugSet(PlugId),
}

/// Notification channels of a graph.
#[derive(Debug, Default)]
pub struct GraphSignals {
    pub child_added: Signal<ChildEvent>,
    pub child_removed: Signal<ChildEvent>,
    pub name_changed: Signal<NameChange>,
    pub parent_changed: Signal<ParentChange>,
    /// The plug's input changed, or the input of one of its upstream plugs.
    pub input_changed: Signal<PlugId>,
    /// A stored value changed on the plug, a child of it, or upstream of it.
    pub plug_set: Signal<PlugId>,
    /// The plug's value may have changed.
    pub plug_dirtied: Signal<PlugId>,
}

impl GraphSignals {
    pub(crate) fn dispatch(&self, events: &[GraphEvent]) {
        for event in events {
            match event {
                GraphEvent::ChildAdded(e) => self.child_added.emit(e),
                GraphEvent::ChildRemoved(e) => self.child_removed.emit(e),
                GraphEvent::NameChanged(e) => self.name_changed.emit(e),
                GraphEvent::ParentChanged(e) => self.parent_changed.emit(e),
                GraphEvent::InputChanged(p) => self.input_changed.emit(p),
                GraphEvent::PlugSet(p) => self.plug_set.emit(p),
            }
        }
    }
}
