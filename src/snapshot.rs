//! Serializable point-in-time views of counters and stores.
//!
//! # Feature Flag
//!
//! This module requires the `serde` feature. The `to_json` helpers also
//! need `json`:
//!
//! ```toml
//! [dependencies]
//! valmux = { version = "0.1", features = ["json"] }
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use valmux::{Config, Store};
//!
//! let store: Store<String> = Store::new(Config::default().with_max(4));
//! store.try_add(&"tenant-a".to_string(), 3)?;
//!
//! let json = store.snapshot().to_json(false)?;
//! // {"entries":[["tenant-a",{"current":3,"max":4,...}]]}
//! ```

use std::hash::Hash;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::store::Store;
use crate::valmux::ValMux;

/// A snapshot of one counter: occupancy plus settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValMuxSnapshot {
    pub current: u64,
    pub max: u64,
    pub waiting: bool,
    pub poll_interval: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl From<&ValMux> for ValMuxSnapshot {
    fn from(valmux: &ValMux) -> Self {
        ValMuxSnapshot {
            current: valmux.current(),
            max: valmux.max(),
            waiting: valmux.is_waiting(),
            poll_interval: valmux.poll_interval(),
            timeout: valmux.timeout(),
        }
    }
}

/// A snapshot of every entry of a [`Store`].
///
/// Entries are not ordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreSnapshot<K> {
    pub entries: Vec<(K, ValMuxSnapshot)>,
}

impl<K> StoreSnapshot<K> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of the occupancy of all entries.
    pub fn total_current(&self) -> u64 {
        self.entries
            .iter()
            .fold(0u64, |acc, (_, entry)| acc.saturating_add(entry.current))
    }
}

impl ValMux {
    /// Captures the current occupancy and settings.
    pub fn snapshot(&self) -> ValMuxSnapshot {
        ValMuxSnapshot::from(self)
    }
}

impl<K> Store<K>
where
    K: Eq + Hash + Clone,
{
    /// Captures every entry.
    pub fn snapshot(&self) -> StoreSnapshot<K> {
        StoreSnapshot {
            entries: self
                .get_all()
                .into_iter()
                .map(|(key, valmux)| (key, valmux.snapshot()))
                .collect(),
        }
    }
}

#[cfg(feature = "json")]
mod json {
    use super::{StoreSnapshot, ValMuxSnapshot};
    use serde::Serialize;
    use thiserror::Error;

    /// Error rendering a snapshot.
    #[derive(Debug, Error)]
    pub enum SnapshotError {
        #[error("json error: {0}")]
        Json(#[from] serde_json::Error),
    }

    fn render<T: Serialize>(value: &T, pretty: bool) -> Result<String, SnapshotError> {
        let json = if pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(json)
    }

    impl ValMuxSnapshot {
        /// Renders the snapshot as JSON.
        pub fn to_json(&self, pretty: bool) -> Result<String, SnapshotError> {
            render(self, pretty)
        }
    }

    impl<K: Serialize> StoreSnapshot<K> {
        /// Renders the snapshot as JSON.
        pub fn to_json(&self, pretty: bool) -> Result<String, SnapshotError> {
            render(self, pretty)
        }
    }
}

#[cfg(feature = "json")]
pub use json::SnapshotError;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_valmux_snapshot() {
        let valmux = ValMux::with_config(
            Config::default()
                .with_max(4)
                .with_waiting(Duration::from_millis(2))
                .with_no_timeout(),
        );
        valmux.try_add(3).unwrap();

        assert_eq!(
            valmux.snapshot(),
            ValMuxSnapshot {
                current: 3,
                max: 4,
                waiting: true,
                poll_interval: Duration::from_millis(2),
                timeout: None,
            }
        );
    }

    #[test]
    fn test_store_snapshot() {
        let store: Store<&str> = Store::new(Config::default().with_max(5));
        store.try_add(&"a", 2).unwrap();
        store.try_add(&"b", 3).unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.total_current(), 5);

        // Later changes do not leak into the snapshot.
        store.inc(&"a").unwrap();
        assert_eq!(snapshot.total_current(), 5);
    }

    #[test]
    fn test_empty_store_snapshot() {
        let store: Store<u8> = Store::default();
        let snapshot = store.snapshot();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.total_current(), 0);
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_to_json() {
        let valmux = ValMux::with_config(Config::default().with_max(2).with_no_timeout());
        valmux.inc().unwrap();

        let json = valmux.snapshot().to_json(false).unwrap();
        assert_eq!(
            json,
            r#"{"current":1,"max":2,"waiting":false,"poll_interval":{"secs":0,"nanos":10000000}}"#
        );

        let store: Store<String> = Store::default();
        store.inc(&"k".to_string()).unwrap();
        let json = store.snapshot().to_json(true).unwrap();
        assert!(json.contains("\"k\""));
        assert!(json.contains('\n'));

        let parsed: StoreSnapshot<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.total_current(), 1);
    }
}
