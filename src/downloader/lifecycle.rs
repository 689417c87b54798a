// Response lifecycle of one download request

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

/// Where a download response stands.
///
/// `Idle → HeadersPending → Streaming → {Completed | Aborted}`. A response
/// that fails before its first byte goes `HeadersPending → Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Nothing decided yet; a JSON error is still possible
    Idle,
    /// Headers staged but not written; a JSON error replaces them
    HeadersPending,
    /// Bytes are on the wire
    Streaming,
    Completed,
    Aborted,
}

impl LifecycleState {
    fn can_move_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Idle, HeadersPending)
                | (HeadersPending, Streaming)
                | (HeadersPending, Aborted)
                | (Streaming, Completed)
                | (Streaming, Aborted)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::HeadersPending => "headers-pending",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Shared handle on a request's [`LifecycleState`].
///
/// Cloned into the response body so that the body can record completion,
/// transport errors and client disconnects.
#[derive(Debug, Clone)]
pub struct ResponseLifecycle {
    state: Arc<Mutex<LifecycleState>>,
}

impl Default for ResponseLifecycle {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(LifecycleState::Idle)),
        }
    }
}

impl ResponseLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// A structured JSON error may only be sent before the first byte.
    pub fn can_report_error(&self) -> bool {
        matches!(
            self.state(),
            LifecycleState::Idle | LifecycleState::HeadersPending
        )
    }

    /// Move to `next` if the transition is legal. Returns whether it happened.
    pub fn advance(&self, next: LifecycleState) -> bool {
        let mut state = self.state.lock();
        if state.can_move_to(next) {
            debug!("response lifecycle {} -> {}", *state, next);
            *state = next;
            true
        } else {
            if !state.is_terminal() {
                warn!("ignored lifecycle transition {} -> {}", *state, next);
            }
            false
        }
    }
}
