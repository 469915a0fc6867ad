//! Error taxonomy shared by counters, scopes and stores.
//!
//! Every failure is returned as a typed [`ValMuxError`] to the immediate
//! caller. Release operations never fail, so there is no error for them.
//!
//! # Example
//!
//! ```rust
//! use valmux::{ValMux, ValMuxError};
//!
//! let limiter = ValMux::new(1);
//! limiter.inc().unwrap();
//!
//! match limiter.inc() {
//!     Err(ValMuxError::CapacityExceeded { current, max, .. }) => {
//!         assert_eq!((current, max), (1, 1));
//!     }
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use thiserror::Error;

use crate::context::ContextError;

/// Errors returned by acquisition operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValMuxError {
    /// The requested amount alone is larger than the capacity.
    ///
    /// Such a request can never succeed, so it is rejected immediately and
    /// never waits.
    #[error("requested {requested} exceeds maximum {max}")]
    MaxExceeded {
        /// The amount that was requested.
        requested: u64,
        /// The capacity at check time.
        max: u64,
    },

    /// Current occupancy plus the requested amount exceeds the capacity.
    #[error("count exceeded: {current} + {requested} > {max}")]
    CapacityExceeded {
        /// Occupancy observed at check time.
        current: u64,
        /// The amount that was requested.
        requested: u64,
        /// The capacity at check time.
        max: u64,
    },

    /// The addition would not fit in a `u64`.
    #[error("integer overflow: {current} + {requested}")]
    Overflow {
        /// Occupancy observed at check time.
        current: u64,
        /// The amount that was requested.
        requested: u64,
    },

    /// The governing context was cancelled explicitly.
    #[error("context cancelled")]
    Cancelled,

    /// The governing context reached its deadline.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

impl ValMuxError {
    /// Returns `true` for [`ValMuxError::MaxExceeded`].
    pub fn is_max_exceeded(&self) -> bool {
        matches!(self, ValMuxError::MaxExceeded { .. })
    }

    /// Returns `true` for [`ValMuxError::CapacityExceeded`].
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, ValMuxError::CapacityExceeded { .. })
    }

    /// Returns `true` for [`ValMuxError::Overflow`].
    pub fn is_overflow(&self) -> bool {
        matches!(self, ValMuxError::Overflow { .. })
    }

    /// Returns `true` for [`ValMuxError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ValMuxError::Cancelled)
    }

    /// Returns `true` for [`ValMuxError::DeadlineExceeded`].
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, ValMuxError::DeadlineExceeded)
    }

    /// Returns `true` if the error came from the governing context rather
    /// than from the counter itself.
    pub fn is_context(&self) -> bool {
        self.is_cancelled() || self.is_deadline_exceeded()
    }
}

impl From<ContextError> for ValMuxError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Cancelled => ValMuxError::Cancelled,
            ContextError::DeadlineExceeded => ValMuxError::DeadlineExceeded,
        }
    }
}

/// Result type for acquisition operations.
pub type Result<T> = std::result::Result<T, ValMuxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ValMuxError::MaxExceeded {
            requested: 5,
            max: 2,
        };
        assert_eq!(err.to_string(), "requested 5 exceeds maximum 2");

        let err = ValMuxError::CapacityExceeded {
            current: 1,
            requested: 1,
            max: 1,
        };
        assert_eq!(err.to_string(), "count exceeded: 1 + 1 > 1");

        assert_eq!(
            ValMuxError::DeadlineExceeded.to_string(),
            "context deadline exceeded"
        );
    }

    #[test]
    fn test_from_context_error() {
        assert_eq!(
            ValMuxError::from(ContextError::Cancelled),
            ValMuxError::Cancelled
        );
        assert_eq!(
            ValMuxError::from(ContextError::DeadlineExceeded),
            ValMuxError::DeadlineExceeded
        );
    }

    #[test]
    fn test_predicates() {
        let overflow = ValMuxError::Overflow {
            current: u64::MAX,
            requested: 1,
        };
        assert!(overflow.is_overflow());
        assert!(!overflow.is_context());
        assert!(ValMuxError::Cancelled.is_context());
        assert!(ValMuxError::DeadlineExceeded.is_context());
        assert!(ValMuxError::MaxExceeded { requested: 2, max: 1 }.is_max_exceeded());
    }
}
