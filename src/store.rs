//! Keyed registry of [`ValMux`] counters.
//!
//! [`Store`] bounds concurrency per key (per tenant, per endpoint, ...). Each
//! key gets its own independent [`ValMux`], created lazily on first access
//! from a shared template [`Config`]:
//!
//! ```text
//!   Store<String>  (template: max = 2, waiting)
//!   ├── "tenant-a" ──► ValMux {1/2}
//!   ├── "tenant-b" ──► ValMux {2/2}
//!   └── "tenant-c" ──► ValMux {0/8}   (installed with `set`)
//! ```
//!
//! Entries are never dropped implicitly, only through
//! [`remove`](Store::remove) and [`clear`](Store::clear).
//!
//! # Examples
//!
//! ```rust
//! use valmux::{Config, Store};
//!
//! let store: Store<String> = Store::new(Config::default().with_max(2));
//!
//! store.inc("tenant-a").unwrap();
//! store.inc("tenant-a").unwrap();
//! assert!(store.inc("tenant-a").is_err());
//!
//! // Other keys are unaffected.
//! store.inc("tenant-b").unwrap();
//! assert_eq!(store.current("tenant-b"), 1);
//! ```

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::RwLock;
use tracing::debug;

use crate::config::Config;
use crate::context::Context;
use crate::error::Result;
use crate::valmux::ValMux;

/// Thread-safe map from keys to lazily created [`ValMux`] counters.
///
/// Lookups take a shared lock; only inserting, removing and clearing take
/// the exclusive one. Every [`ValMux`] handed out shares its state with the
/// entry in the store.
#[derive(Debug)]
pub struct Store<K> {
    entries: RwLock<HashMap<K, ValMux>>,
    template: RwLock<Config>,
}

impl<K> Store<K>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty store whose entries are built from `template`.
    pub fn new(template: Config) -> Self {
        Store {
            entries: RwLock::new(HashMap::new()),
            template: RwLock::new(template),
        }
    }

    /// The template used for entries created from now on.
    pub fn config(&self) -> Config {
        *self.template.read()
    }

    /// Replaces the template. Existing entries keep their settings.
    pub fn set_config(&self, template: Config) {
        *self.template.write() = template;
    }

    /// Returns the counter for `key`, creating it from the template if needed.
    ///
    /// Concurrent first accesses to the same key all get the same instance.
    /// The key is only converted to an owned `K` when the entry is created.
    pub fn get<Q>(&self, key: &Q) -> ValMux
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        if let Some(valmux) = self.entries.read().get(key) {
            return valmux.clone();
        }

        let template = self.config();
        let mut entries = self.entries.write();
        let len = entries.len();
        entries
            .entry(key.to_owned())
            .or_insert_with(|| {
                debug!(entries = len + 1, max = template.max, "created store entry");
                ValMux::with_config(template)
            })
            .clone()
    }

    /// Installs `valmux` for `key`, replacing any existing entry.
    ///
    /// Use this for keys that need settings different from the template.
    pub fn set(&self, key: K, valmux: ValMux) {
        if self.entries.write().insert(key, valmux).is_some() {
            debug!("replaced store entry");
        }
    }

    /// A point-in-time copy of all entries.
    ///
    /// The map is detached from the store, the counters are not: they are
    /// the same handles the store holds.
    pub fn get_all(&self) -> HashMap<K, ValMux> {
        self.entries.read().clone()
    }

    /// Removes the entry for `key`, returning it if it existed.
    pub fn remove<Q>(&self, key: &Q) -> Option<ValMux>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self.entries.write().remove(key);
        if removed.is_some() {
            debug!("removed store entry");
        }
        removed
    }

    /// Removes every entry.
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        debug!(entries = entries.len(), "cleared store");
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.read().contains_key(key)
    }

    /// Occupancy for `key`; `0` for a key that has no entry yet.
    ///
    /// Does not create the entry.
    pub fn current<Q>(&self, key: &Q) -> u64
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.read().get(key).map_or(0, ValMux::current)
    }

    /// See [`ValMux::try_add`].
    pub fn try_add<Q>(&self, key: &Q, delta: u64) -> Result<()>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        self.get(key).try_add(delta)
    }

    /// See [`ValMux::inc`].
    pub fn inc<Q>(&self, key: &Q) -> Result<()>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        self.try_add(key, 1)
    }

    /// See [`ValMux::add`].
    pub async fn add<Q>(&self, key: &Q, delta: u64, ctx: &Context) -> Result<()>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        self.get(key).add(delta, ctx).await
    }

    /// See [`ValMux::inc_ctx`].
    pub async fn inc_ctx<Q>(&self, key: &Q, ctx: &Context) -> Result<()>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        self.add(key, 1, ctx).await
    }

    /// See [`ValMux::add_auto_sub`].
    pub async fn add_auto_sub<Q>(&self, key: &Q, delta: u64, ctx: &Context) -> Result<()>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        self.get(key).add_auto_sub(delta, ctx).await
    }

    /// See [`ValMux::inc_auto_dec`].
    pub async fn inc_auto_dec<Q>(&self, key: &Q, ctx: &Context) -> Result<()>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        self.add_auto_sub(key, 1, ctx).await
    }

    /// Releases `delta` for `key`. No-op for a key without entry.
    pub fn sub<Q>(&self, key: &Q, delta: u64)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if let Some(valmux) = self.entries.read().get(key) {
            valmux.sub(delta);
        }
    }

    pub fn dec<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.sub(key, 1);
    }

    /// Sets the occupancy of `key` back to zero, keeping the entry.
    pub fn reset<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if let Some(valmux) = self.entries.read().get(key) {
            valmux.reset();
        }
    }

    /// Sets the occupancy of every entry back to zero, keeping the entries.
    pub fn reset_all(&self) {
        for valmux in self.entries.read().values() {
            valmux.reset();
        }
    }
}

impl<K> Default for Store<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new(Config::default())
    }
}
