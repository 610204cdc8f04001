//! PHI-clear coordinator.
//!
//! A [`ClearCoordinator`] delivers a zero-payload "drop PHI now" signal to every
//! registered reset listener. It knows nothing about what each listener holds.
//! Components register on mount and keep the returned [`ListenerGuard`] for their
//! lifetime; dropping the guard unregisters them, including during unwinding.
//!
//! The coordinator is injected, not global: create one per session scope and clone
//! the handle into whatever needs it.

pub mod registry;
pub mod report;

pub use registry::{ListenerId, RegistrationOptions};
pub use report::{BroadcastReport, FailureKind, ListenerFailure};

use crate::marker::{self, PhiElement};
use crate::observer::{ClearObserver, LogObserver};
use log::{debug, warn};
use parking_lot::{Mutex, ReentrantMutex};
use registry::{Invocation, ListenerRegistry, ResetFn};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Instant;

struct Inner {
    registry: Mutex<ListenerRegistry>,
    /// Serializes broadcasts across threads while letting a listener broadcast re-entrantly
    broadcast_lock: ReentrantMutex<()>,
    observer: Arc<dyn ClearObserver>,
}

/// Cloneable handle to one broadcast channel.
#[derive(Clone)]
pub struct ClearCoordinator {
    inner: Arc<Inner>,
}

impl ClearCoordinator {
    /// Create a coordinator that reports through [`LogObserver`]
    pub fn new() -> Self {
        Self::with_observer(Arc::new(LogObserver))
    }

    pub fn with_observer(observer: Arc<dyn ClearObserver>) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::new(ListenerRegistry::new()),
                broadcast_lock: ReentrantMutex::new(()),
                observer,
            }),
        }
    }

    /// Register a reset callback for the lifetime of the returned guard.
    ///
    /// The callback must not capture a clone of this coordinator, or the
    /// registration keeps the coordinator alive.
    pub fn register_listener<F>(&self, reset: F) -> ListenerGuard
    where
        F: FnMut() + Send + 'static,
    {
        self.register_listener_with(RegistrationOptions::default(), reset)
    }

    /// Register with a label and/or priority.
    pub fn register_listener_with<F>(
        &self,
        options: RegistrationOptions,
        mut reset: F,
    ) -> ListenerGuard
    where
        F: FnMut() + Send + 'static,
    {
        self.insert(
            options,
            Box::new(move || {
                reset();
                Ok(())
            }),
        )
    }

    /// Register a callback whose reset can fail. Errors are reported to the
    /// observer and never interrupt delivery to other listeners.
    pub fn register_fallible<F, E>(
        &self,
        options: RegistrationOptions,
        mut reset: F,
    ) -> ListenerGuard
    where
        F: FnMut() -> std::result::Result<(), E> + Send + 'static,
        E: fmt::Display,
    {
        self.insert(
            options,
            Box::new(move || reset().map_err(|err| err.to_string())),
        )
    }

    fn insert(&self, options: RegistrationOptions, reset: ResetFn) -> ListenerGuard {
        let label = options.label.clone();
        let priority = options.priority;
        let id = self.inner.registry.lock().insert(options, reset);
        debug!(
            "Registered PHI listener #{} (label: {}, priority: {})",
            id,
            label.as_deref().unwrap_or("-"),
            priority
        );

        ListenerGuard {
            id,
            coordinator: Arc::downgrade(&self.inner),
        }
    }

    /// Detach a listener by id. Returns false if it was not registered.
    pub fn unregister(&self, id: ListenerId) -> bool {
        unregister_from(&self.inner, id)
    }

    pub fn is_registered(&self, id: ListenerId) -> bool {
        self.inner.registry.lock().contains(id)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.registry.lock().len()
    }

    /// Synchronously tell every registered listener to clear its PHI.
    ///
    /// Delivery walks a snapshot taken at the start of the call, in priority order.
    /// Each invocation is isolated: errors and panics are captured, reported to the
    /// observer and recorded in the returned report. This never fails.
    pub fn broadcast_clear(&self) -> BroadcastReport {
        let _serialized = self.inner.broadcast_lock.lock();
        let started = Instant::now();

        let snapshot = self.inner.registry.lock().snapshot();
        let mut report = BroadcastReport::new(snapshot.len());

        for entry in &snapshot {
            let failure = match entry.invoke() {
                Invocation::Cleared => {
                    report.notified += 1;
                    None
                }
                Invocation::Detached => {
                    report.detached += 1;
                    None
                }
                Invocation::Busy => {
                    report.reentrant_skips += 1;
                    None
                }
                Invocation::Errored(message) => {
                    report.notified += 1;
                    Some((FailureKind::Error, message))
                }
                Invocation::Panicked(message) => {
                    report.notified += 1;
                    Some((FailureKind::Panic, message))
                }
            };

            if let Some((kind, message)) = failure {
                let failure = ListenerFailure {
                    listener: entry.id(),
                    label: entry.label().cloned(),
                    kind,
                    message,
                };
                self.notify_observer(|observer| observer.on_listener_failure(&failure));
                report.failures.push(failure);
            }
        }

        report.elapsed = started.elapsed();
        self.notify_observer(|observer| observer.on_broadcast(&report));
        report
    }

    /// Observer panics are contained like listener panics.
    fn notify_observer(&self, notify: impl FnOnce(&dyn ClearObserver)) {
        let observer = self.inner.observer.as_ref();
        if panic::catch_unwind(AssertUnwindSafe(|| notify(observer))).is_err() {
            warn!("Clear observer panicked, notification dropped");
        }
    }

    /// Tag an element as PHI-bearing for external audit tooling. Tag only.
    pub fn mark_as_phi<E: PhiElement + ?Sized>(&self, element: &mut E) {
        marker::mark_as_phi(element);
    }
}

impl Default for ClearCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ClearCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClearCoordinator")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

fn unregister_from(inner: &Inner, id: ListenerId) -> bool {
    let removed = inner.registry.lock().remove(id);
    if removed {
        debug!("Unregistered PHI listener #{}", id);
    }
    removed
}

/// Scoped registration. Dropping it unregisters the listener.
///
/// Holds only a weak reference, so a guard that outlives its coordinator is harmless.
#[must_use = "dropping the guard immediately unregisters the listener"]
#[derive(Debug)]
pub struct ListenerGuard {
    id: ListenerId,
    coordinator: Weak<Inner>,
}

impl ListenerGuard {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// True while the listener is still in its coordinator's registry
    pub fn is_registered(&self) -> bool {
        let Some(inner) = self.coordinator.upgrade() else {
            return false;
        };
        let registered = inner.registry.lock().contains(self.id);
        registered
    }

    /// Explicitly unregister. Equivalent to dropping the guard.
    pub fn unregister(self) {
        drop(self);
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.coordinator.upgrade() {
            unregister_from(&inner, self.id);
        }
    }
}
