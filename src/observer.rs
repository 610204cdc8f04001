//! Observability hooks for clear broadcasts.
//!
//! The coordinator never raises listener failures to the broadcaster. Instead each
//! failure, and a summary of every broadcast, is handed to a [`ClearObserver`].

use crate::coordinator::{BroadcastReport, ListenerFailure};
use log::{info, warn};

/// Receives broadcast outcomes. A panicking observer is caught and logged.
pub trait ClearObserver: Send + Sync {
    /// Called once per failing listener, as soon as the failure is captured
    fn on_listener_failure(&self, _failure: &ListenerFailure) {}

    /// Called after every broadcast, including nested ones
    fn on_broadcast(&self, _report: &BroadcastReport) {}
}

/// Default observer: reports through the `log` facade.
///
/// Failure messages are free text from caller code and may hold PHI, so only the
/// listener id, label and failure kind are logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

fn failure_line(failure: &ListenerFailure) -> String {
    format!(
        "PHI listener {} failed to clear ({})",
        failure.describe(),
        failure.kind
    )
}

impl ClearObserver for LogObserver {
    fn on_listener_failure(&self, failure: &ListenerFailure) {
        warn!("{}", failure_line(failure));
    }

    fn on_broadcast(&self, report: &BroadcastReport) {
        if report.is_clean() {
            info!("PHI clear broadcast: {}", report);
        } else {
            warn!("PHI clear broadcast incomplete: {}", report);
        }
    }
}

/// Observer that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl ClearObserver for NullObserver {}
