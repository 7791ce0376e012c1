//! Signals
//!
//! A [`Signal`] delivers notifications to any number of subscribers. A
//! subscription lives exactly as long as the [`Connection`] token returned
//! by [`Signal::connect`]: dropping the token disconnects the slot.
//!
//! # Thread Safety
//!
//! Slots are stored behind a `parking_lot::RwLock`. Emission snapshots the
//! slot list before calling anything, so a slot may connect or disconnect
//! (itself or others) while being called without deadlocking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

/// Unique identifier for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

type Slot<T> = Arc<dyn Fn(&T) + Send + Sync>;
type Slots<T> = RwLock<Vec<(SubscriberId, Slot<T>)>>;

/// A notification channel carrying values of type `T`.
pub struct Signal<T: 'static> {
    slots: Arc<Slots<T>>,
}

impl<T: 'static> Signal<T> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Subscribe `slot`. The subscription ends when the returned token drops.
    #[must_use = "dropping the Connection disconnects the slot immediately"]
    pub fn connect<F>(&self, slot: F) -> Connection
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriberId::new();
        self.slots.write().push((id, Arc::new(slot)));

        let weak: Weak<Slots<T>> = Arc::downgrade(&self.slots);
        Connection {
            id,
            disconnect: Some(Box::new(move || {
                if let Some(slots) = weak.upgrade() {
                    slots.write().retain(|(s, _)| *s != id);
                }
            })),
        }
    }

    /// Call every connected slot with `value`.
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<Slot<T>> = self
            .slots
            .read()
            .iter()
            .map(|(_, slot)| Arc::clone(slot))
            .collect();
        for slot in snapshot {
            slot(value);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.slots.read().len()
    }
}

impl<T: 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Scoped subscription token.
pub struct Connection {
    id: SubscriberId,
    disconnect: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Connection {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn is_connected(&self) -> bool {
        self.disconnect.is_some()
    }

    /// Disconnect now rather than on drop.
    pub fn disconnect(&mut self) {
        if let Some(disconnect) = self.disconnect.take() {
            disconnect();
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .finish()
    }
}
