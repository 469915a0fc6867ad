//! Cancellation-aware acquisition on top of a [`BoundedCounter`].
//!
//! [`ValMux`] adds three things to the raw counter:
//!
//! 1. **Deadline resolution**: a caller context that carries a deadline is
//!    authoritative; otherwise the configured default timeout is layered
//!    under it; otherwise there is no deadline at all.
//! 2. **Waiting mode**: instead of failing fast when the counter is full,
//!    the acquisition re-checks capacity every poll interval until it
//!    succeeds or the governing context fires.
//! 3. **Auto-release**: [`ValMux::add_auto_sub`] returns the reservation
//!    when the governing context fires, without the caller having to keep a
//!    guard around.
//!
//! # Acquisition Loop
//!
//! ```text
//!   ┌─► context fired? ──yes──► Cancelled / DeadlineExceeded
//!   │        │
//!   │   delta > max? ──yes──► MaxExceeded (never waits)
//!   │        │
//!   │   fits? ──yes──► CAS ──won──► Ok
//!   │        │          └──lost──┐
//!   │        no                  │
//!   │        │                   │
//!   │   waiting? ──no──► CapacityExceeded / Overflow
//!   │        │                   │
//!   │   sleep(poll) or context   │
//!   └────────┴───────────────────┘
//! ```
//!
//! There is no fairness among waiters: whichever waiter polls first after
//! capacity is freed wins it.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use atomic_time::{AtomicDuration, AtomicOptionDuration};
use tokio::time::{sleep, Instant};
use tracing::trace;

use crate::config::Config;
use crate::context::Context;
use crate::counter::BoundedCounter;
use crate::error::{Result, ValMuxError};

struct Shared {
    counter: BoundedCounter,
    waiting: AtomicBool,
    poll_interval: AtomicDuration,
    timeout: AtomicOptionDuration,
}

/// A bounded in-flight counter with waiting and auto-release.
///
/// `ValMux` is a handle: clones share the same counter and settings, so it
/// can be handed to every task that competes for the resource.
///
/// Settings can be changed in place at any time; an operation that is
/// already waiting picks up a new capacity on its next poll, while the
/// deadline and mode are fixed when the operation starts.
///
/// # Examples
///
/// Fail-fast:
///
/// ```rust
/// use valmux::ValMux;
///
/// let limiter = ValMux::new(2);
/// limiter.inc().unwrap();
/// limiter.inc().unwrap();
/// assert!(limiter.inc().unwrap_err().is_capacity_exceeded());
///
/// limiter.dec();
/// assert_eq!(limiter.current(), 1);
/// ```
///
/// Waiting with a deadline:
///
/// ```rust
/// use std::time::Duration;
/// use valmux::{Config, Context, ValMux};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let limiter = ValMux::with_config(
///     Config::default()
///         .with_max(1)
///         .with_waiting(Duration::from_millis(1)),
/// );
///
/// let ctx = Context::background().with_timeout(Duration::from_millis(10));
/// limiter.inc_ctx(&ctx).await.unwrap();
///
/// let err = limiter.inc_ctx(&ctx).await.unwrap_err();
/// assert!(err.is_deadline_exceeded());
/// # }
/// ```
#[derive(Clone)]
pub struct ValMux {
    shared: Arc<Shared>,
}

impl ValMux {
    /// Creates a fail-fast counter with the given capacity and the default
    /// timeout.
    pub fn new(max: u64) -> Self {
        Self::with_config(Config::default().with_max(max))
    }

    /// Creates a counter from an explicit configuration.
    pub fn with_config(config: Config) -> Self {
        ValMux {
            shared: Arc::new(Shared {
                counter: BoundedCounter::new(config.max),
                waiting: AtomicBool::new(config.waiting),
                poll_interval: AtomicDuration::new(config.poll_interval),
                timeout: AtomicOptionDuration::new(config.timeout),
            }),
        }
    }

    /// Current settings.
    pub fn config(&self) -> Config {
        Config {
            max: self.max(),
            waiting: self.is_waiting(),
            poll_interval: self.poll_interval(),
            timeout: self.timeout(),
        }
    }

    /// Replaces every setting at once. The occupancy is untouched.
    pub fn apply(&self, config: Config) {
        self.set_max(config.max);
        self.shared
            .poll_interval
            .store(config.poll_interval, Ordering::Release);
        self.shared.waiting.store(config.waiting, Ordering::Release);
        self.shared.timeout.store(config.timeout, Ordering::Release);
    }

    /// Changes the capacity.
    pub fn set_max(&self, max: u64) {
        self.shared.counter.set_max(max);
    }

    /// Switches to waiting mode with the given poll interval.
    pub fn enable_waiting(&self, poll_interval: Duration) {
        self.shared
            .poll_interval
            .store(poll_interval, Ordering::Release);
        self.shared.waiting.store(true, Ordering::Release);
    }

    /// Switches back to fail-fast mode.
    pub fn disable_waiting(&self) {
        self.shared.waiting.store(false, Ordering::Release);
    }

    /// Sets the default deadline.
    pub fn set_timeout(&self, timeout: Duration) {
        self.shared.timeout.store(Some(timeout), Ordering::Release);
    }

    /// Removes the default deadline.
    pub fn set_no_timeout(&self) {
        self.shared.timeout.store(None, Ordering::Release);
    }

    #[inline]
    pub fn max(&self) -> u64 {
        self.shared.counter.max()
    }

    #[inline]
    pub fn current(&self) -> u64 {
        self.shared.counter.current()
    }

    /// The default deadline, `None` if disabled.
    pub fn timeout(&self) -> Option<Duration> {
        self.shared.timeout.load(Ordering::Acquire)
    }

    pub fn poll_interval(&self) -> Duration {
        self.shared.poll_interval.load(Ordering::Acquire)
    }

    pub fn is_waiting(&self) -> bool {
        self.shared.waiting.load(Ordering::Acquire)
    }

    /// Adds `delta` if it fits, without waiting.
    ///
    /// Neither the waiting mode nor the default timeout apply here.
    #[inline]
    pub fn try_add(&self, delta: u64) -> Result<()> {
        self.shared.counter.try_add(delta)
    }

    /// Same as `try_add(1)`.
    #[inline]
    pub fn inc(&self) -> Result<()> {
        self.try_add(1)
    }

    /// Releases `delta`, clamping at zero.
    #[doc(alias = "release")]
    #[inline]
    pub fn sub(&self, delta: u64) {
        self.shared.counter.sub(delta);
    }

    /// Same as `sub(1)`.
    #[inline]
    pub fn dec(&self) {
        self.sub(1);
    }

    /// Drops every outstanding reservation.
    ///
    /// Pending auto-releases still run later, they clamp at zero.
    pub fn reset(&self) {
        self.shared.counter.reset();
    }

    /// Adds `delta`, waiting for capacity if waiting mode is enabled.
    ///
    /// The wait is bounded by `ctx`, or by the default timeout if `ctx` has
    /// no deadline. The reservation is kept until released with
    /// [`sub`](Self::sub).
    pub async fn add(&self, delta: u64, ctx: &Context) -> Result<()> {
        self.acquire(delta, ctx).await.map(|_| ())
    }

    /// Same as `add(1, ctx)`.
    pub async fn inc_ctx(&self, ctx: &Context) -> Result<()> {
        self.add(1, ctx).await
    }

    /// Adds `delta` like [`add`](Self::add) and releases it automatically
    /// once the governing context fires.
    ///
    /// The governing context is `ctx` if it has a deadline, otherwise `ctx`
    /// bounded by the default timeout. If it can never fire (a background
    /// context and no default timeout) the reservation is released before
    /// returning.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub async fn add_auto_sub(&self, delta: u64, ctx: &Context) -> Result<()> {
        let scope = self.acquire(delta, ctx).await?;

        if !scope.is_cancellable() {
            trace!(delta, "no deadline to release on, releasing immediately");
            self.sub(delta);
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let _ = scope.after_done(move || {
            shared.counter.sub(delta);
            trace!(delta, current = shared.counter.current(), "auto-released");
        });

        Ok(())
    }

    /// Same as `add_auto_sub(1, ctx)`.
    pub async fn inc_auto_dec(&self, ctx: &Context) -> Result<()> {
        self.add_auto_sub(1, ctx).await
    }

    /// Picks the context that bounds an acquisition.
    fn scope(&self, ctx: &Context) -> Context {
        if ctx.deadline().is_some() {
            return ctx.clone();
        }
        // A timeout too large for an `Instant` is the same as no timeout.
        match self.timeout().and_then(|t| Instant::now().checked_add(t)) {
            Some(deadline) => ctx.with_deadline(deadline),
            None => ctx.clone(),
        }
    }

    /// Runs the acquisition loop and returns the governing context on success.
    async fn acquire(&self, delta: u64, ctx: &Context) -> Result<Context> {
        let scope = self.scope(ctx);
        let waiting = self.is_waiting();
        let counter = &self.shared.counter;

        loop {
            if let Some(err) = scope.err() {
                return Err(err.into());
            }

            let max = counter.max();
            if delta > max {
                return Err(ValMuxError::MaxExceeded {
                    requested: delta,
                    max,
                });
            }

            let current = counter.current();
            match BoundedCounter::checked_next(current, delta, max) {
                Ok(next) => {
                    if counter.compare_and_add(current, next) {
                        return Ok(scope);
                    }
                    // Lost the race, re-check right away.
                    continue;
                }
                Err(err) if !waiting => return Err(err),
                Err(_) => {}
            }

            let poll_interval = self.poll_interval();
            trace!(delta, current, max, ?poll_interval, "waiting for capacity");

            tokio::select! {
                biased;
                reason = scope.done() => return Err(reason.into()),
                _ = sleep(poll_interval) => {}
            }
        }
    }
}

impl Debug for ValMux {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValMux")
            .field("current", &self.current())
            .field("max", &self.max())
            .field("waiting", &self.is_waiting())
            .field("poll_interval", &self.poll_interval())
            .field("timeout", &self.timeout())
            .finish()
    }
}

impl Default for ValMux {
    fn default() -> Self {
        Self::with_config(Config::default())
    }
}
