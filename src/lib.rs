//! # phiclear - PHI session-safety coordinator
//!
//! Forces every component holding Protected Health Information (PHI) to purge its
//! in-memory state on logout or session timeout.
//!
//! ## Features
//!
//! - **Injected broadcast channel**: no ambient global; each [`ClearCoordinator`] is independent
//! - **Scoped registration**: listeners unregister when their [`ListenerGuard`] drops
//! - **Fault isolation**: a failing or panicking reset never blocks the others
//! - **Explicit ordering**: optional priorities instead of incidental iteration order
//! - **Idle timeout**: [`SessionGuard`] clears at most once per idle period
//!
//! ## Architecture
//!
//! - [`error`] - Centralized error types and handling
//! - [`coordinator`] - Listener registry and `broadcast_clear`
//! - [`state`] - Self-clearing component state
//! - [`observer`] - Failure and broadcast reporting
//! - [`marker`] - Tag-only PHI element marking
//! - [`session`] - Logout and idle-timeout triggers
//! - [`config`] - Session timing configuration

pub mod config;
pub mod coordinator;
pub mod error;
pub mod marker;
pub mod observer;
pub mod session;
pub mod state;

pub use error::{PhiClearError, Result};

pub use config::SessionConfig;
pub use coordinator::{
    BroadcastReport, ClearCoordinator, FailureKind, ListenerFailure, ListenerGuard, ListenerId,
    RegistrationOptions,
};
pub use marker::{is_marked_phi, mark_as_phi, PhiElement};
pub use observer::{ClearObserver, LogObserver, NullObserver};
pub use session::{spawn_idle_watch, IdleWatchHandle, SessionGuard, SessionPhase};
pub use state::PhiState;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
