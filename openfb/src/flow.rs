//! The single in-flight login attempt owned by a session.
//!
//! An attempt holds a oneshot sender as its pending callback. Settling
//! consumes the sender and returns the slot to idle, so whichever exit path
//! gets there first (redirect, window closed, supersede) delivers the one
//! and only outcome; every later settle for that attempt is a no-op.

use crate::types::LoginOutcome;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Minimum time the login window stays up before it may be closed. Closing an
/// embedded view while its opening animation runs fails on some platforms.
pub const MIN_VISIBLE: Duration = Duration::from_millis(600);

/// Closed-state poll interval for popup windows.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Delay before the transient provider-logout view is closed.
pub const LOGOUT_CLOSE_DELAY: Duration = Duration::from_millis(700);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttemptId(u64);

enum FlowState {
    Idle,
    AwaitingRedirect {
        attempt: AttemptId,
        started_at: Instant,
        pending: oneshot::Sender<LoginOutcome>,
    },
}

/// Pending callback of an attempt that has left the slot.
pub struct Pending {
    attempt: AttemptId,
    sender: oneshot::Sender<LoginOutcome>,
}

impl Pending {
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    pub fn resolve(self, outcome: LoginOutcome) {
        tracing::debug!(
            "Login attempt {:?} settled: {}",
            self.attempt,
            outcome.error_code().unwrap_or("connected")
        );
        // The receiver is gone if the login future was dropped.
        let _ = self.sender.send(outcome);
    }
}

struct Slot {
    next_id: u64,
    state: FlowState,
}

pub struct LoginFlow {
    slot: Mutex<Slot>,
}

impl Default for LoginFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl LoginFlow {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                next_id: 1,
                state: FlowState::Idle,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Start a new attempt. A live attempt is superseded: it resolves with
    /// [`LoginOutcome::UserCancelled`] before the new one is installed.
    pub fn begin(&self, started_at: Instant) -> (AttemptId, oneshot::Receiver<LoginOutcome>) {
        let (tx, rx) = oneshot::channel();
        let mut slot = self.lock();
        let attempt = AttemptId(slot.next_id);
        slot.next_id += 1;

        let previous = std::mem::replace(
            &mut slot.state,
            FlowState::AwaitingRedirect {
                attempt,
                started_at,
                pending: tx,
            },
        );
        if let FlowState::AwaitingRedirect { attempt: old, pending, .. } = previous {
            tracing::warn!("Login attempt {:?} superseded by {:?}", old, attempt);
            Pending {
                attempt: old,
                sender: pending,
            }
            .resolve(LoginOutcome::UserCancelled);
        }

        tracing::debug!("Login attempt {:?} awaiting redirect", attempt);
        (attempt, rx)
    }

    /// Detach the live attempt's pending callback and return to idle.
    ///
    /// With `Some(id)`, only that attempt may be taken. With `None`, any live
    /// attempt is. Returns `None` when the attempt was already settled.
    pub fn take(&self, attempt: Option<AttemptId>) -> Option<Pending> {
        let mut slot = self.lock();
        match &slot.state {
            FlowState::AwaitingRedirect { attempt: live, .. }
                if attempt.is_none_or(|id| id == *live) => {}
            _ => return None,
        }
        match std::mem::replace(&mut slot.state, FlowState::Idle) {
            FlowState::AwaitingRedirect {
                attempt, pending, ..
            } => Some(Pending {
                attempt,
                sender: pending,
            }),
            FlowState::Idle => None,
        }
    }

    /// Deliver `outcome` to the live attempt. Returns `false` when there was
    /// nothing left to settle.
    pub fn settle(&self, attempt: Option<AttemptId>, outcome: LoginOutcome) -> bool {
        match self.take(attempt) {
            Some(pending) => {
                pending.resolve(outcome);
                true
            }
            None => false,
        }
    }

    /// Clear the slot without delivering an outcome (the waiting future is gone).
    pub fn abandon(&self, attempt: AttemptId) {
        let mut slot = self.lock();
        if matches!(slot.state, FlowState::AwaitingRedirect { attempt: live, .. } if live == attempt) {
            tracing::debug!("Login attempt {:?} abandoned", attempt);
            slot.state = FlowState::Idle;
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.lock().state, FlowState::Idle)
    }

    pub fn current(&self) -> Option<AttemptId> {
        match self.lock().state {
            FlowState::AwaitingRedirect { attempt, .. } => Some(attempt),
            FlowState::Idle => None,
        }
    }

    /// When the live attempt (if it is `attempt`) opened its window.
    pub fn started_at(&self, attempt: AttemptId) -> Option<Instant> {
        match self.lock().state {
            FlowState::AwaitingRedirect {
                attempt: live,
                started_at,
                ..
            } if live == attempt => Some(started_at),
            _ => None,
        }
    }
}

/// How long to wait before closing a window that has been up for `elapsed`.
pub fn close_delay(elapsed: Duration) -> Duration {
    MIN_VISIBLE.saturating_sub(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_delay_covers_remaining_window() {
        assert_eq!(close_delay(Duration::ZERO), MIN_VISIBLE);
        assert_eq!(close_delay(Duration::from_millis(450)), Duration::from_millis(150));
        assert_eq!(close_delay(Duration::from_millis(600)), Duration::ZERO);
        assert_eq!(close_delay(Duration::from_secs(5)), Duration::ZERO);
    }

    #[tokio::test]
    async fn first_settle_wins() {
        let flow = LoginFlow::new();
        let (id, rx) = flow.begin(Instant::now());
        assert_eq!(flow.current(), Some(id));

        assert!(flow.settle(Some(id), LoginOutcome::not_authorized("access_denied")));
        assert!(!flow.settle(Some(id), LoginOutcome::UserCancelled));
        assert!(!flow.settle(None, LoginOutcome::UserCancelled));
        assert!(flow.is_idle());

        assert_eq!(rx.await.unwrap(), LoginOutcome::not_authorized("access_denied"));
    }

    #[tokio::test]
    async fn begin_supersedes_live_attempt() {
        let flow = LoginFlow::new();
        let (first, first_rx) = flow.begin(Instant::now());
        let (second, second_rx) = flow.begin(Instant::now());
        assert_ne!(first, second);

        assert_eq!(first_rx.await.unwrap(), LoginOutcome::UserCancelled);
        // Late events for the superseded attempt do not touch the new one.
        assert!(!flow.settle(Some(first), LoginOutcome::UserCancelled));
        assert_eq!(flow.current(), Some(second));

        assert!(flow.settle(None, LoginOutcome::Disconnected));
        assert_eq!(second_rx.await.unwrap(), LoginOutcome::Disconnected);
    }

    #[test]
    fn abandon_only_clears_matching_attempt() {
        let flow = LoginFlow::new();
        let (first, _rx1) = flow.begin(Instant::now());
        let (second, _rx2) = flow.begin(Instant::now());
        flow.abandon(first);
        assert_eq!(flow.current(), Some(second));
        assert!(flow.started_at(second).is_some());
        assert!(flow.started_at(first).is_none());
        flow.abandon(second);
        assert!(flow.is_idle());
    }
}
