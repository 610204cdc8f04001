//! Registration set for reset listeners.
//!
//! Entries are kept sorted by `(priority, id)` so a snapshot is already in
//! delivery order. The registry is only mutated by register/unregister and only
//! read as a snapshot, so the lock guarding it is never held while a listener runs.

use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Opaque identifier assigned to each registration.
pub type ListenerId = u64;

/// Type-erased reset callback. Infallible listeners are adapted to always return `Ok`.
pub(crate) type ResetFn = Box<dyn FnMut() -> std::result::Result<(), String> + Send>;

/// Optional metadata attached to a registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationOptions {
    /// Human-readable name used in diagnostics. Never PHI.
    pub label: Option<String>,
    /// Lower values are cleared first. Ties keep registration order.
    pub priority: i32,
}

impl RegistrationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Outcome of a single listener invocation during a broadcast.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Invocation {
    Cleared,
    /// Unregistered after the snapshot was taken
    Detached,
    /// Already running further up this thread's stack (re-entrant broadcast)
    Busy,
    Errored(String),
    Panicked(String),
}

pub(crate) struct ListenerEntry {
    id: ListenerId,
    label: Option<Arc<str>>,
    priority: i32,
    active: AtomicBool,
    reset: Mutex<ResetFn>,
}

impl ListenerEntry {
    fn new(id: ListenerId, options: RegistrationOptions, reset: ResetFn) -> Self {
        Self {
            id,
            label: options.label.map(Arc::from),
            priority: options.priority,
            active: AtomicBool::new(true),
            reset: Mutex::new(reset),
        }
    }

    pub(crate) fn id(&self) -> ListenerId {
        self.id
    }

    pub(crate) fn label(&self) -> Option<&Arc<str>> {
        self.label.as_ref()
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Run the reset callback, capturing both returned errors and panics.
    pub(crate) fn invoke(&self) -> Invocation {
        if !self.is_active() {
            return Invocation::Detached;
        }

        let Some(mut reset) = self.reset.try_lock() else {
            return Invocation::Busy;
        };

        match panic::catch_unwind(AssertUnwindSafe(|| (*reset)())) {
            Ok(Ok(())) => Invocation::Cleared,
            Ok(Err(message)) => Invocation::Errored(message),
            Err(payload) => Invocation::Panicked(panic_message(payload.as_ref())),
        }
    }
}

impl fmt::Debug for ListenerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerEntry")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("priority", &self.priority)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Ordered set of registered listeners.
#[derive(Debug)]
pub(crate) struct ListenerRegistry {
    next_id: ListenerId,
    entries: Vec<Arc<ListenerEntry>>,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 1,
            entries: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, options: RegistrationOptions, reset: ResetFn) -> ListenerId {
        let id = self.next_id;
        self.next_id += 1;

        let priority = options.priority;
        // Ids only grow, so inserting after every entry with priority <= ours keeps ties ordered.
        let position = self
            .entries
            .partition_point(|entry| entry.priority <= priority);
        self.entries
            .insert(position, Arc::new(ListenerEntry::new(id, options, reset)));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        match self.entries.iter().position(|entry| entry.id == id) {
            Some(index) => {
                let entry = self.entries.remove(index);
                entry.deactivate();
                true
            }
            None => false,
        }
    }

    pub(crate) fn contains(&self, id: ListenerId) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<ListenerEntry>> {
        self.entries.clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
