//! Component state that clears itself on broadcast.
//!
//! [`PhiState`] pairs a value with its cleared value and a listener registration
//! that lives exactly as long as the state. It exposes the usual
//! `[value, set_value, manual_clear]` triple.
//!
//! The value lock is never held while caller code runs, so a closure passed to
//! [`PhiState::with`] or [`PhiState::update`] may itself log out or broadcast.

use crate::coordinator::{ClearCoordinator, ListenerGuard, ListenerId, RegistrationOptions};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Value plus a counter bumped on every write, so `update` can tell whether it was
/// overtaken while its closure ran.
struct Slot<T> {
    value: T,
    generation: u64,
}

impl<T> Slot<T> {
    fn replace(&mut self, value: T) {
        self.value = value;
        self.generation = self.generation.wrapping_add(1);
    }
}

/// PHI-bearing value owned by one component.
pub struct PhiState<T> {
    slot: Arc<Mutex<Slot<T>>>,
    cleared: Arc<T>,
    guard: ListenerGuard,
}

impl<T> PhiState<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Cleared value is the initial value
    pub fn new(coordinator: &ClearCoordinator, initial: T) -> Self {
        let cleared = initial.clone();
        Self::with_cleared(coordinator, initial, cleared)
    }

    pub fn with_cleared(coordinator: &ClearCoordinator, initial: T, cleared: T) -> Self {
        Self::with_options(coordinator, RegistrationOptions::default(), initial, cleared)
    }

    pub fn with_options(
        coordinator: &ClearCoordinator,
        options: RegistrationOptions,
        initial: T,
        cleared: T,
    ) -> Self {
        let slot = Arc::new(Mutex::new(Slot {
            value: initial,
            generation: 0,
        }));
        let cleared = Arc::new(cleared);

        let target = Arc::clone(&slot);
        let reset_to = Arc::clone(&cleared);
        let guard = coordinator.register_listener_with(options, move || {
            target.lock().replace(T::clone(&reset_to));
        });

        Self {
            slot,
            cleared,
            guard,
        }
    }

    /// Current value (cloned)
    pub fn get(&self) -> T {
        self.slot.lock().value.clone()
    }

    /// Run `f` against a snapshot of the current value
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let snapshot = self.get();
        f(&snapshot)
    }

    pub fn set(&self, value: T) {
        self.slot.lock().replace(value);
    }

    /// Modify a copy of the value and store it back.
    ///
    /// Returns false, discarding the change, if the value was cleared or set while
    /// `f` ran. A clear always wins over an in-flight update.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        let (mut working, generation) = {
            let slot = self.slot.lock();
            (slot.value.clone(), slot.generation)
        };
        f(&mut working);

        let mut slot = self.slot.lock();
        if slot.generation != generation {
            return false;
        }
        slot.replace(working);
        true
    }

    /// Reset to the cleared value without a broadcast
    pub fn manual_clear(&self) {
        self.slot.lock().replace(T::clone(&self.cleared));
    }

    pub fn cleared_value(&self) -> &T {
        &self.cleared
    }

    pub fn listener_id(&self) -> ListenerId {
        self.guard.id()
    }

    pub fn is_registered(&self) -> bool {
        self.guard.is_registered()
    }
}

impl<T> PhiState<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn is_cleared(&self) -> bool {
        self.slot.lock().value == *self.cleared
    }
}

// Never print the value itself
impl<T> fmt::Debug for PhiState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhiState")
            .field("listener", &self.guard.id())
            .field("value", &"<redacted>")
            .finish()
    }
}
