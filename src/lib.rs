//! # ValMux - Bounded In-Flight Counters
//!
//! A small library for bounding how many units of work may be in flight
//! against a resource at the same time. Think of it as a counting semaphore
//! with a mutable ceiling, an optional polling wait, deadlines tied to the
//! caller's request lifecycle, and reservations that release themselves when
//! that lifecycle ends.
//!
//! ## Building Blocks
//!
//! | Type | Description |
//! |------|-------------|
//! | [`BoundedCounter`] | Lock-free `u64` that never exceeds its ceiling and never goes below zero |
//! | [`ValMux`] | Counter plus waiting mode, default timeout and auto-release |
//! | [`Store`] | Keyed registry creating one [`ValMux`] per key from a template |
//! | [`Context`] | Cancellation token with an optional deadline |
//! | [`Config`] | Capacity, waiting mode, poll interval and default timeout |
//!
//! ```text
//!   caller ──► Store::get(key) ──► ValMux ──► BoundedCounter
//!                                    │
//!                                    ├── fail fast:  CapacityExceeded
//!                                    ├── waiting:    poll until fits / ctx fires
//!                                    └── auto-sub:   release when ctx fires
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use valmux::{Config, Context, ValMux};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> valmux::Result<()> {
//! // At most 4 requests in flight, wait up to the deadline for a free slot.
//! let limiter = ValMux::with_config(
//!     Config::default()
//!         .with_max(4)
//!         .with_waiting(Duration::from_millis(5)),
//! );
//!
//! // The request lifecycle: the slot is returned when it ends.
//! let request = Context::background().with_timeout(Duration::from_millis(200));
//! limiter.inc_auto_dec(&request).await?;
//! assert_eq!(limiter.current(), 1);
//!
//! // Or manage the slot by hand.
//! limiter.inc_ctx(&request).await?;
//! limiter.dec();
//! # Ok(())
//! # }
//! ```
//!
//! ## Per-Key Limits
//!
//! ```rust
//! use valmux::{Config, Store, ValMux};
//!
//! let per_tenant: Store<String> = Store::new(Config::default().with_max(2));
//!
//! let tenant = "acme".to_string();
//! per_tenant.inc(&tenant)?;
//! per_tenant.inc(&tenant)?;
//! assert!(per_tenant.inc(&tenant).is_err());
//!
//! // A tenant with a bigger quota.
//! per_tenant.set("bigcorp".to_string(), ValMux::new(10));
//! # Ok::<(), valmux::ValMuxError>(())
//! ```
//!
//! ## Timeouts
//!
//! A deadline carried by the caller's [`Context`] is authoritative. If the
//! context has none, the configured default timeout
//! ([`DEFAULT_TIMEOUT`](config::DEFAULT_TIMEOUT) unless changed) bounds the
//! wait and, for auto-released reservations, decides when they are returned.
//! With no deadline anywhere, waits are unbounded and auto-released
//! reservations are returned right away, as there is nothing to hook the
//! release on.
//!
//! ## What This Is Not
//!
//! - Not distributed: counters live in one process.
//! - Not fair: waiters poll, whichever polls first after a release wins.
//! - Not a rate limiter: it tracks occupancy, not throughput over time.
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `serde` | Serializable [`Config`] and the `snapshot` module |
//! | `json` | JSON rendering of snapshots |
//! | `full` | All of the above |

pub mod config;
pub mod context;
pub mod counter;
pub mod error;
pub mod store;
pub mod valmux;

#[cfg(feature = "serde")]
pub mod snapshot;

pub use config::Config;
pub use context::{Context, ContextError};
pub use counter::BoundedCounter;
pub use error::{Result, ValMuxError};
pub use store::Store;
pub use valmux::ValMux;
