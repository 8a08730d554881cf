use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Why a [`Context`] is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CancelCause {
    #[error("context canceled")]
    Canceled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Execution context handed to every supervised task.
///
/// A context carries a cancellation signal and an optional deadline. Once
/// done it stays done, and every context derived from it is done as well.
/// Tasks only observe a context; cancelling it requires the [`CancelHandle`]
/// returned when it was derived.
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

/// Cancels the context it was created with, and everything derived from it.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    /// Cancels the context. Calling it more than once has no further effect.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns a guard that cancels the context when dropped.
    pub fn drop_guard(self) -> DropGuard {
        self.token.drop_guard()
    }
}

impl Context {
    /// Creates a root context with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives a child context that can be cancelled independently.
    pub fn with_cancel(&self) -> (Context, CancelHandle) {
        self.derive(self.deadline)
    }

    /// Derives a child context that is done after `timeout`.
    ///
    /// A timeout too large to represent as an instant adds no deadline.
    pub fn with_timeout(&self, timeout: Duration) -> (Context, CancelHandle) {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.with_cancel(),
        }
    }

    /// Derives a child context that is done at `deadline`, or earlier if the
    /// parent's own deadline comes first.
    pub fn with_deadline(&self, deadline: Instant) -> (Context, CancelHandle) {
        let deadline = match self.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        };
        self.derive(Some(deadline))
    }

    /// Returns a new root context that is neither cancelled nor expired by
    /// this one.
    pub fn without_cancel(&self) -> Context {
        Context::new()
    }

    fn derive(&self, deadline: Option<Instant>) -> (Context, CancelHandle) {
        let token = self.token.child_token();
        let handle = CancelHandle {
            token: token.clone(),
        };
        (Context { token, deadline }, handle)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the cause if the context is already done.
    pub fn err(&self) -> Option<CancelCause> {
        if self.token.is_cancelled() {
            return Some(CancelCause::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelCause::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Waits until the context is cancelled or its deadline elapses.
    pub async fn done(&self) -> CancelCause {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => CancelCause::Canceled,
                    _ = tokio::time::sleep_until(deadline) => CancelCause::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                CancelCause::Canceled
            }
        }
    }
}
