//! Cache Item Module
//!
//! A single table entry with its own lock for the fields that change on
//! every read.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

use crate::cache::callbacks::Callbacks;

// == Access State ==
/// Fields mutated after construction, guarded by the item lock.
struct Access<K> {
    accessed_at: Instant,
    access_count: u64,
    on_evict: Callbacks<K>,
}

// == Cache Item ==
/// A cached key/value pair with sliding expiration.
///
/// The item lock is independent of the table lock. A thread holding an item
/// lock never goes on to take the table lock.
pub struct Item<K, V> {
    key: K,
    value: V,
    /// Idle time after which the item expires, zero = never
    lifespan: Duration,
    created_at: Instant,
    access: RwLock<Access<K>>,
    /// Set once a delete or the expiry sweep has claimed the item
    departing: AtomicBool,
}

impl<K, V> Item<K, V> {
    // == Constructor ==
    /// Creates a new item whose lifespan starts now.
    ///
    /// # Arguments
    /// * `key` - The table key
    /// * `lifespan` - Idle time before expiry, `Duration::ZERO` for none
    /// * `value` - The stored value
    pub fn new(key: K, lifespan: Duration, value: V) -> Self {
        let now = Instant::now();
        Self {
            key,
            value,
            lifespan,
            created_at: now,
            access: RwLock::new(Access {
                accessed_at: now,
                access_count: 0,
                on_evict: Callbacks::new(),
            }),
            departing: AtomicBool::new(false),
        }
    }

    // == Touch ==
    /// Marks the item as read: restarts its lifespan and bumps its counter.
    pub fn touch(&self) {
        let mut access = self.access.write();
        access.accessed_at = Instant::now();
        access.access_count += 1;
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    /// Consumes the item and returns its value.
    pub fn into_value(self) -> V {
        self.value
    }

    pub fn lifespan(&self) -> Duration {
        self.lifespan
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn accessed_at(&self) -> Instant {
        self.access.read().accessed_at
    }

    /// Number of reads through the table's get-or-load path.
    pub fn access_count(&self) -> u64 {
        self.access.read().access_count
    }

    // == Expiry ==
    /// Time left before the item expires at `now`.
    ///
    /// Returns `None` for items that never expire and `Some(ZERO)` for items
    /// already due.
    pub fn remaining_at(&self, now: Instant) -> Option<Duration> {
        if self.lifespan.is_zero() {
            return None;
        }
        let idle = now.saturating_duration_since(self.accessed_at());
        Some(self.lifespan.saturating_sub(idle))
    }

    // == Pre-eviction Callbacks ==
    /// Replaces all pre-eviction callbacks with `f`.
    pub fn set_pre_eviction_callback<F>(&self, f: F)
    where
        F: Fn(&K) + Send + Sync + 'static,
    {
        self.access.write().on_evict.set(Arc::new(f));
    }

    /// Appends a pre-eviction callback after the existing ones.
    pub fn add_pre_eviction_callback<F>(&self, f: F)
    where
        F: Fn(&K) + Send + Sync + 'static,
    {
        self.access.write().on_evict.add(Arc::new(f));
    }

    pub fn clear_pre_eviction_callbacks(&self) {
        self.access.write().on_evict.clear();
    }

    /// Fires the pre-eviction callbacks with the item lock released, so a
    /// callback may read or edit this item.
    pub(crate) fn fire_pre_eviction(&self) {
        let chain = self.access.read().on_evict.clone();
        chain.fire(&self.key);
    }

    /// Claims the item for removal. Only the first caller gets `true`.
    pub(crate) fn begin_departure(&self) -> bool {
        !self.departing.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn is_departing(&self) -> bool {
        self.departing.load(Ordering::Acquire)
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Item<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let access = self.access.read();
        f.debug_struct("Item")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("lifespan", &self.lifespan)
            .field("created_at", &self.created_at)
            .field("accessed_at", &access.accessed_at)
            .field("access_count", &access.access_count)
            .field("pre_eviction_callbacks", &access.on_evict.len())
            .finish()
    }
}
