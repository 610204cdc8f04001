//! Logout and idle-timeout triggers.
//!
//! [`SessionGuard`] decides *when* PHI must be dropped and calls
//! [`ClearCoordinator::broadcast_clear`]. An idle timeout clears at most once per
//! idle period; new activity re-arms it. Logout always clears and ends the session.

use crate::config::SessionConfig;
use crate::coordinator::{BroadcastReport, ClearCoordinator};
use crate::error::Result;
use log::{debug, info};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Active,
    /// Idle timeout fired; PHI was cleared. Activity re-arms the session.
    Expired,
    /// Terminal
    LoggedOut,
}

#[derive(Debug)]
struct SessionState {
    phase: SessionPhase,
    last_activity: Instant,
    last_report: Option<BroadcastReport>,
}

#[derive(Debug)]
pub struct SessionGuard {
    coordinator: ClearCoordinator,
    config: SessionConfig,
    state: Mutex<SessionState>,
}

impl SessionGuard {
    pub fn new(coordinator: ClearCoordinator, config: SessionConfig) -> Result<Self> {
        Self::starting_at(coordinator, config, Instant::now())
    }

    /// Start a session whose last activity is `now`
    pub fn starting_at(
        coordinator: ClearCoordinator,
        config: SessionConfig,
        now: Instant,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            coordinator,
            config,
            state: Mutex::new(SessionState {
                phase: SessionPhase::Active,
                last_activity: now,
                last_report: None,
            }),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &ClearCoordinator {
        &self.coordinator
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.lock().phase
    }

    pub fn is_active(&self) -> bool {
        self.phase() == SessionPhase::Active
    }

    /// Report of the most recent clear triggered by this guard
    pub fn last_report(&self) -> Option<BroadcastReport> {
        self.state.lock().last_report.clone()
    }

    fn clear(&self) -> BroadcastReport {
        let report = self.coordinator.broadcast_clear();
        self.state.lock().last_report = Some(report.clone());
        report
    }

    pub fn record_activity(&self) -> bool {
        self.record_activity_at(Instant::now())
    }

    /// Refresh the idle deadline. Returns false once logged out.
    pub fn record_activity_at(&self, now: Instant) -> bool {
        let mut state = self.state.lock();
        match state.phase {
            SessionPhase::LoggedOut => false,
            SessionPhase::Expired => {
                debug!("Activity after idle expiry, re-arming session");
                state.phase = SessionPhase::Active;
                state.last_activity = now;
                true
            }
            SessionPhase::Active => {
                state.last_activity = state.last_activity.max(now);
                true
            }
        }
    }

    /// Remaining time before the idle timeout, `None` unless active
    pub fn time_until_timeout_at(&self, now: Instant) -> Option<Duration> {
        let state = self.state.lock();
        if state.phase != SessionPhase::Active {
            return None;
        }
        let idle = now.saturating_duration_since(state.last_activity);
        Some(self.config.idle_timeout().saturating_sub(idle))
    }

    pub fn check_idle(&self) -> Option<BroadcastReport> {
        self.check_idle_at(Instant::now())
    }

    /// Broadcast a clear if the session has been idle past the timeout.
    /// Fires at most once per idle period.
    pub fn check_idle_at(&self, now: Instant) -> Option<BroadcastReport> {
        {
            let mut state = self.state.lock();
            if state.phase != SessionPhase::Active {
                return None;
            }
            let idle = now.saturating_duration_since(state.last_activity);
            if idle < self.config.idle_timeout() {
                return None;
            }
            state.phase = SessionPhase::Expired;
            info!(
                "Session idle for {:?} (timeout {:?}), clearing PHI",
                idle,
                self.config.idle_timeout()
            );
        }
        // State lock released so listeners may touch the session
        Some(self.clear())
    }

    /// End the session and clear PHI unconditionally.
    pub fn logout(&self) -> BroadcastReport {
        {
            let mut state = self.state.lock();
            state.phase = SessionPhase::LoggedOut;
        }
        info!("Logout, clearing PHI");
        self.clear()
    }
}

/// Handle to a running idle watcher task. Dropping it also stops the watcher.
#[derive(Debug)]
pub struct IdleWatchHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl IdleWatchHandle {
    /// Stop the watcher and wait for it to exit
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.task).await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Poll the guard every `poll_interval` until shutdown or logout.
///
/// Must be called from within a tokio runtime.
pub fn spawn_idle_watch(guard: Arc<SessionGuard>) -> IdleWatchHandle {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
    let poll_interval = guard.config().poll_interval();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    debug!("Idle watcher shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if guard.phase() == SessionPhase::LoggedOut {
                        debug!("Session logged out, idle watcher exiting");
                        break;
                    }
                    guard.check_idle();
                }
            }
        }
    });

    IdleWatchHandle {
        shutdown: Some(shutdown_tx),
        task,
    }
}
