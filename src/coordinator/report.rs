//! Per-broadcast outcome reporting.

use crate::coordinator::registry::ListenerId;
use crate::error::PhiClearError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// How a listener failed to clear its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A fallible listener returned `Err`
    Error,
    /// The listener panicked; the panic was caught and delivery continued
    Panic,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Error => write!(f, "error"),
            FailureKind::Panic => write!(f, "panic"),
        }
    }
}

/// A single listener that did not reset cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFailure {
    pub listener: ListenerId,
    pub label: Option<Arc<str>>,
    pub kind: FailureKind,
    pub message: String,
}

impl ListenerFailure {
    /// `#id (label)` form used in logs and errors
    pub fn describe(&self) -> String {
        match &self.label {
            Some(label) => format!("#{} ({})", self.listener, label),
            None => format!("#{}", self.listener),
        }
    }

    pub fn to_error(&self) -> PhiClearError {
        PhiClearError::listener(self.describe(), format!("{}: {}", self.kind, self.message))
    }
}

/// Summary of one `broadcast_clear` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Listeners present in the snapshot when the broadcast started
    pub registered: usize,
    /// Listeners whose reset ran (successfully or not)
    pub notified: usize,
    /// Listeners unregistered by a sibling before their turn
    pub detached: usize,
    /// Listeners skipped because they were already resetting (re-entrant broadcast)
    pub reentrant_skips: usize,
    pub failures: Vec<ListenerFailure>,
    pub elapsed: Duration,
}

impl BroadcastReport {
    pub(crate) fn new(registered: usize) -> Self {
        Self {
            registered,
            ..Self::default()
        }
    }

    /// Number of listeners that reset without error
    pub fn cleared(&self) -> usize {
        self.notified - self.failures.len()
    }

    /// True when every notified listener reset cleanly
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for BroadcastReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} listeners cleared in {:?}",
            self.cleared(),
            self.registered,
            self.elapsed
        )?;
        if !self.failures.is_empty() {
            write!(f, ", {} failed", self.failures.len())?;
        }
        if self.detached > 0 {
            write!(f, ", {} detached", self.detached)?;
        }
        if self.reentrant_skips > 0 {
            write!(f, ", {} skipped (re-entrant)", self.reentrant_skips)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(label: Option<&str>) -> ListenerFailure {
        ListenerFailure {
            listener: 7,
            label: label.map(Arc::from),
            kind: FailureKind::Panic,
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_failure_description() {
        assert_eq!(failure(Some("lab-results")).describe(), "#7 (lab-results)");
        assert_eq!(failure(None).describe(), "#7");
        assert_eq!(
            failure(None).to_error().to_string(),
            "Listener #7 failed to clear: panic: boom"
        );
    }

    #[test]
    fn test_report_counts_and_display() {
        let mut report = BroadcastReport::new(4);
        report.notified = 3;
        report.detached = 1;
        report.failures.push(failure(None));

        assert_eq!(report.cleared(), 2);
        assert!(!report.is_clean());

        let text = report.to_string();
        assert!(text.starts_with("2/4 listeners cleared"));
        assert!(text.contains("1 failed"));
        assert!(text.contains("1 detached"));
    }
}
