//! Cooperative cancellation carrying an optional deadline.
//!
//! A [`Context`] is handed down by the caller's own request lifecycle and
//! bounds how long an acquisition may wait. It also decides when an
//! auto-released reservation is returned.
//!
//! Contexts form a tree: a derived context observes its parent's
//! cancellation, its deadline is the nearer of its own and the parent's, and
//! cancelling it never affects the parent.
//!
//! ```text
//!   background ──► with_cancel ──► with_timeout(1s)
//!       │               │                  │
//!   never fires    cancel() ───────► fires too
//!                                   or at the deadline
//! ```
//!
//! # Examples
//!
//! ```rust
//! use std::time::Duration;
//! use valmux::{Context, ContextError};
//!
//! let root = Context::new();
//! let child = root.with_timeout(Duration::from_secs(5));
//!
//! root.cancel();
//! assert_eq!(child.err(), Some(ContextError::Cancelled));
//! ```

use std::future::pending;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Why a context fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    /// [`Context::cancel`] was called on this context or an ancestor.
    #[error("context cancelled")]
    Cancelled,
    /// The deadline of this context or an ancestor has passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// A cheap-to-clone cancellation token with an optional deadline.
///
/// Clones share the same cancellation state. Use [`with_cancel`],
/// [`with_deadline`] or [`with_timeout`] to derive an independent child.
///
/// [`with_cancel`]: Context::with_cancel
/// [`with_deadline`]: Context::with_deadline
/// [`with_timeout`]: Context::with_timeout
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that never fires: not cancellable and without deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A root context that can be cancelled explicitly and has no deadline.
    pub fn new() -> Self {
        Context {
            token: Some(CancellationToken::new()),
            deadline: None,
        }
    }

    fn child_token(&self) -> CancellationToken {
        match &self.token {
            Some(token) => token.child_token(),
            None => CancellationToken::new(),
        }
    }

    /// Derives a cancellable child that keeps the parent's deadline.
    pub fn with_cancel(&self) -> Self {
        Context {
            token: Some(self.child_token()),
            deadline: self.deadline,
        }
    }

    /// Derives a child that fires at `deadline` at the latest.
    ///
    /// A parent deadline that is nearer stays in effect.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        Context {
            token: Some(self.child_token()),
            deadline: Some(deadline),
        }
    }

    /// Derives a child that fires `timeout` from now at the latest.
    ///
    /// A timeout too large to be represented behaves like no timeout.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.with_cancel(),
        }
    }

    /// Cancels this context and every context derived from it.
    ///
    /// Has no effect on [`Context::background`].
    pub fn cancel(&self) {
        if let Some(token) = &self.token {
            token.cancel();
        }
    }

    /// The instant this context expires, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` if this context can ever fire.
    pub fn is_cancellable(&self) -> bool {
        self.token.is_some() || self.deadline.is_some()
    }

    /// Returns the reason this context fired, or `None` while it is live.
    ///
    /// An explicit cancel takes precedence over an elapsed deadline.
    pub fn err(&self) -> Option<ContextError> {
        if self.token.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Some(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Returns `true` once the context has fired.
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Waits until the context fires and returns why.
    ///
    /// Never completes for a context that is not cancellable.
    pub async fn done(&self) -> ContextError {
        match (&self.token, self.deadline) {
            (Some(token), Some(deadline)) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => ContextError::Cancelled,
                    _ = sleep_until(deadline) => ContextError::DeadlineExceeded,
                }
            }
            (Some(token), None) => {
                token.cancelled().await;
                ContextError::Cancelled
            }
            (None, Some(deadline)) => {
                sleep_until(deadline).await;
                ContextError::DeadlineExceeded
            }
            (None, None) => pending().await,
        }
    }

    /// Runs `f` exactly once, on a background task, when the context fires.
    ///
    /// Aborting the returned handle unregisters `f`. Returns `None` without
    /// spawning anything for a context that is not cancellable, `f` is
    /// dropped unrun.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn after_done<F>(&self, f: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.is_cancellable() {
            return None;
        }
        let ctx = self.clone();
        Some(tokio::spawn(async move {
            ctx.done().await;
            f();
        }))
    }
}
