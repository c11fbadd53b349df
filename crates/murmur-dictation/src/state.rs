//! Session state machine with thread-safe, observable transitions.
//!
//! Enforces valid state transitions for the dictation session lifecycle:
//! - Idle -> Starting (start accepted)
//! - Starting -> Listening (startup sequence succeeded)
//! - Starting -> Stopping (stop requested mid-startup, aborts the start)
//! - Starting -> Idle (startup failure rollback)
//! - Listening -> Stopping (stop requested or engine-initiated stop)
//! - Stopping -> Idle (stop sequence complete)
//!
//! The machine is the single source of truth for session guards: a rejected
//! transition is how double-start and double-stop become silent no-ops. It
//! is built on a `tokio::sync::watch` channel so a caller can suspend until
//! a state is reached (`stop()` waits for `Idle` this way) without a
//! missed-wakeup window.

use std::fmt;

use tokio::sync::watch;

use murmur_core::error::MurmurError;

/// Operational state of a dictation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No session in progress. Ready to start.
    Idle,
    /// Startup sequence running: permission negotiation, resource
    /// acquisition, engine start.
    Starting,
    /// Engine capturing; partial and final results flowing.
    Listening,
    /// Stop sequence running: engine acknowledgment, finalization,
    /// resource release.
    Stopping,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Starting => write!(f, "Starting"),
            SessionState::Listening => write!(f, "Listening"),
            SessionState::Stopping => write!(f, "Stopping"),
        }
    }
}

impl SessionState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &SessionState) -> bool {
        matches!(
            (self, target),
            (SessionState::Idle, SessionState::Starting)
                | (SessionState::Starting, SessionState::Listening)
                | (SessionState::Starting, SessionState::Stopping)
                | (SessionState::Starting, SessionState::Idle)
                | (SessionState::Listening, SessionState::Stopping)
                | (SessionState::Stopping, SessionState::Idle)
        )
    }

    /// Whether a session exists in any form.
    pub fn is_live(&self) -> bool {
        !matches!(self, SessionState::Idle)
    }
}

/// Thread-safe state machine for session state transitions.
///
/// Clones share the underlying channel. All transitions are validated before
/// being applied, returning an error if the requested transition is not
/// permitted from the current state.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    tx: watch::Sender<SessionState>,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    /// Create a new state machine initialized to `Idle`.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Idle);
        Self { tx }
    }

    /// Returns the current state.
    pub fn current(&self) -> SessionState {
        *self.tx.borrow()
    }

    /// Attempt to transition to the target state.
    ///
    /// Returns `Ok(())` if the transition is valid, or a `MurmurError::Dictation`
    /// if the transition is not allowed from the current state.
    pub fn transition(&self, target: SessionState) -> Result<(), MurmurError> {
        let mut prev = SessionState::Idle;
        let mut applied = false;
        self.tx.send_modify(|state| {
            prev = *state;
            if state.can_transition_to(&target) {
                *state = target;
                applied = true;
            }
        });

        if applied {
            tracing::debug!("Session state: {} -> {}", prev, target);
            Ok(())
        } else {
            Err(MurmurError::Dictation(format!(
                "Invalid state transition: {} -> {}",
                prev, target
            )))
        }
    }

    /// Atomically transition to the target state only if currently in `from`.
    ///
    /// Returns `true` if the transition was applied. This is the primitive
    /// behind the idempotent start guard: exactly one caller wins the
    /// `Idle -> Starting` race.
    pub fn transition_if(&self, from: SessionState, target: SessionState) -> bool {
        let mut applied = false;
        self.tx.send_modify(|state| {
            if *state == from && state.can_transition_to(&target) {
                *state = target;
                applied = true;
            }
        });
        if applied {
            tracing::debug!("Session state: {} -> {}", from, target);
        }
        applied
    }

    /// Atomically move a live session (`Listening` or `Starting`) to
    /// `Stopping`, returning the state it was in.
    ///
    /// Returns `None` without touching the state when no stoppable session
    /// exists, which makes `stop()` idempotent.
    pub fn begin_stop(&self) -> Option<SessionState> {
        let mut prev = None;
        self.tx.send_modify(|state| {
            if matches!(state, SessionState::Listening | SessionState::Starting) {
                prev = Some(*state);
                *state = SessionState::Stopping;
            }
        });
        if let Some(prev) = prev {
            tracing::debug!("Session state: {} -> {}", prev, SessionState::Stopping);
        }
        prev
    }

    /// Suspend until the machine reaches the target state.
    ///
    /// Returns immediately if it is already there.
    pub async fn wait_for(&self, target: SessionState) {
        let mut rx = self.tx.subscribe();
        // The sender lives in self, so the channel cannot close while we wait.
        let _ = rx.wait_for(|state| *state == target).await;
    }

    /// Force the state machine back to Idle (used for teardown recovery).
    pub fn reset(&self) {
        self.tx.send_modify(|state| {
            if *state != SessionState::Idle {
                tracing::warn!("Session state machine reset to Idle from {}", *state);
                *state = SessionState::Idle;
            }
        });
    }
}

// =============================================================================
// Tests
// =============================================================================
