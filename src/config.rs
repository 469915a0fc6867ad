//! Configuration for [`ValMux`](crate::ValMux) and [`Store`](crate::Store).
//!
//! [`Config`] is a plain struct with public fields and chainable builder
//! methods:
//!
//! ```rust
//! use std::time::Duration;
//! use valmux::Config;
//!
//! let config = Config::default()
//!     .with_max(8)
//!     .with_waiting(Duration::from_millis(5))
//!     .with_timeout(Duration::from_millis(250));
//!
//! assert_eq!(config.max, 8);
//! assert!(config.waiting);
//! ```

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default capacity.
pub const DEFAULT_MAX: u64 = 1;

/// Default deadline applied when the caller's context has none.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Default interval between two capacity checks in waiting mode.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Settings of a single bounded counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Capacity of the counter.
    pub max: u64,
    /// Wait for capacity instead of failing fast.
    pub waiting: bool,
    /// How often capacity is re-checked while waiting.
    pub poll_interval: Duration,
    /// Deadline applied when the caller's context has none.
    ///
    /// `None` disables it. Use with care: with waiting enabled and a caller
    /// context that never fires, an acquisition may wait forever.
    pub timeout: Option<Duration>,
}

impl Config {
    /// Switches to waiting mode, checking capacity every `poll_interval`.
    pub const fn with_waiting(self, poll_interval: Duration) -> Self {
        Self {
            waiting: true,
            poll_interval,
            ..self
        }
    }

    /// Switches back to fail-fast mode. The poll interval is kept.
    pub const fn without_waiting(self) -> Self {
        Self {
            waiting: false,
            ..self
        }
    }

    /// Sets the default deadline.
    pub const fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..self
        }
    }

    /// Removes the default deadline.
    pub const fn with_no_timeout(self) -> Self {
        Self {
            timeout: None,
            ..self
        }
    }

    /// Sets the capacity.
    pub const fn with_max(self, max: u64) -> Self {
        Self { max, ..self }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max: DEFAULT_MAX,
            waiting: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let config = Config::default();
        assert_eq!(config.max, DEFAULT_MAX);
        assert!(!config.waiting);
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.timeout, Some(DEFAULT_TIMEOUT));
    }

    #[test]
    fn test_builder_chain() {
        let config = Config::default()
            .with_waiting(Duration::from_millis(1))
            .with_no_timeout()
            .with_max(4);

        assert!(config.waiting);
        assert_eq!(config.poll_interval, Duration::from_millis(1));
        assert_eq!(config.timeout, None);
        assert_eq!(config.max, 4);
    }

    #[test]
    fn test_later_options_override() {
        let config = Config::default()
            .with_waiting(Duration::from_millis(3))
            .without_waiting()
            .with_no_timeout()
            .with_timeout(Duration::from_millis(20));

        assert!(!config.waiting);
        assert_eq!(config.poll_interval, Duration::from_millis(3));
        assert_eq!(config.timeout, Some(Duration::from_millis(20)));
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_deserialize_partial() {
        let config: Config = serde_json::from_str(r#"{"max":3,"waiting":true}"#).unwrap();
        assert_eq!(config.max, 3);
        assert!(config.waiting);
        assert_eq!(config.timeout, Some(DEFAULT_TIMEOUT));
    }
}
