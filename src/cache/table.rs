//! Cache Table Module
//!
//! Main cache engine: a keyed map of items with individual sliding lifespans,
//! get-or-load on miss, and add/delete observers.
//!
//! # Locking
//! The table lock guards the map shape, the callback chains, the loader, the
//! logger and the scheduler state. Each item has its own lock for its
//! mutable fields. Locks are always taken table first, item second.
//! Callbacks, the loader and the logger only ever run with the table's write
//! lock released, so they may call back into the table.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{RwLock, RwLockWriteGuard};
use tokio::time::Instant;
use tracing::trace;

use crate::cache::callbacks::Callbacks;
use crate::cache::stats::{CacheStats, StatsRecorder};
use crate::cache::Item;
use crate::config::TableConfig;
use crate::error::{CacheError, Result};
use crate::logger::Logger;
use crate::tasks::{Timer, TokioTimer};

/// Miss handler: receives the key and the caller's extra arguments.
pub type Loader<K, V> = dyn Fn(&K, &[&dyn Any]) -> Option<Item<K, V>> + Send + Sync;

// == Table State ==
/// Everything guarded by the table lock.
pub(super) struct State<K, V> {
    pub(super) items: HashMap<K, Arc<Item<K, V>>>,
    /// Instant the timer is armed for, `None` when disarmed or when the
    /// deadline is past the range of `Instant`
    pub(super) next_sweep: Option<Instant>,
    /// Duration of the last arming, zero when disarmed
    pub(super) cleanup_interval: Duration,
    pub(super) loader: Option<Arc<Loader<K, V>>>,
    pub(super) logger: Option<Arc<dyn Logger>>,
    pub(super) added: Callbacks<Arc<Item<K, V>>>,
    pub(super) deleted: Callbacks<Arc<Item<K, V>>>,
}

/// State shared by every handle of one table and by its timer task.
pub(super) struct Shared<K, V> {
    pub(super) name: String,
    pub(super) default_lifespan: Duration,
    pub(super) state: RwLock<State<K, V>>,
    pub(super) timer: Box<dyn Timer>,
    pub(super) stats: StatsRecorder,
}

/// Outcome of the first critical section of a get-or-load.
enum Lookup<K, V> {
    Hit(Arc<Item<K, V>>),
    Miss(Option<Arc<Loader<K, V>>>),
}

// == Cache Table ==
/// Concurrent cache table with per-item sliding expiration.
///
/// `Table` is a cheap handle: clones share the same items. The expiry timer
/// only holds a weak reference, so dropping the last handle cancels it.
pub struct Table<K, V> {
    shared: Arc<Shared<K, V>>,
}

impl<K, V> Clone for Table<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<K, V> Table<K, V>
where
    K: Eq + Hash + Ord + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    // == Constructors ==
    /// Creates a table driven by a Tokio timer.
    ///
    /// # Panics
    /// Panics if called outside of a Tokio runtime.
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_config(&TableConfig::named(name))
    }

    /// Creates a table from configuration, driven by a Tokio timer.
    ///
    /// # Panics
    /// Panics if called outside of a Tokio runtime.
    pub fn from_config(config: &TableConfig) -> Self {
        Self::with_timer(config, TokioTimer::new())
    }

    /// Creates a table driven by the given timer.
    pub fn with_timer(config: &TableConfig, timer: impl Timer + 'static) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: config.name.clone(),
                default_lifespan: config.default_lifespan,
                state: RwLock::new(State {
                    items: HashMap::new(),
                    next_sweep: None,
                    cleanup_interval: Duration::ZERO,
                    loader: None,
                    logger: None,
                    added: Callbacks::new(),
                    deleted: Callbacks::new(),
                }),
                timer: Box::new(timer),
                stats: StatsRecorder::default(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Lifespan used by `add_default`.
    pub fn default_lifespan(&self) -> Duration {
        self.shared.default_lifespan
    }

    // == Add ==
    /// Inserts an item, replacing any existing item for the key.
    ///
    /// Add callbacks fire with the new item before this returns.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `lifespan` - Idle time before expiry, `Duration::ZERO` for none
    /// * `value` - The value to store
    pub fn add(&self, key: K, lifespan: Duration, value: V) -> Arc<Item<K, V>> {
        let item = Arc::new(Item::new(key, lifespan, value));
        let state = self.shared.state.write();
        self.insert(state, item.clone());
        item
    }

    /// Inserts an item with the table's default lifespan.
    pub fn add_default(&self, key: K, value: V) -> Arc<Item<K, V>> {
        self.add(key, self.shared.default_lifespan, value)
    }

    // == Not Found Add ==
    /// Inserts the item only if the key is absent.
    ///
    /// Returns false, without side effects, if the key is present.
    pub fn not_found_add(&self, key: K, lifespan: Duration, value: V) -> bool {
        let state = self.shared.state.write();
        if state.items.contains_key(&key) {
            return false;
        }
        self.insert(state, Arc::new(Item::new(key, lifespan, value)));
        true
    }

    /// Stores `item` under the held write lock, then releases it to run the
    /// add callbacks and, if the nearest deadline moved, the scheduler.
    fn insert(&self, mut state: RwLockWriteGuard<'_, State<K, V>>, item: Arc<Item<K, V>>) {
        let replaced = state.items.insert(item.key().clone(), item.clone());

        // A deadline past the representable range is never the soonest one.
        let sooner = !item.lifespan().is_zero()
            && match state.next_sweep {
                None => true,
                Some(next) => item
                    .created_at()
                    .checked_add(item.lifespan())
                    .is_some_and(|deadline| deadline < next),
            };
        // A replaced finite item may have been the only one keeping the timer armed.
        let orphaned = replaced.map_or(false, |old| !old.lifespan().is_zero());
        let added = state.added.clone();
        drop(state);

        added.fire(&item);

        if sooner || orphaned {
            self.shared.expiration_check();
        }
    }

    // == Delete ==
    /// Removes an item by key.
    ///
    /// Delete callbacks fire first, then the item's own pre-eviction
    /// callbacks, then the entry is removed.
    ///
    /// # Errors
    /// `KeyNotFound` if the key is absent or already being removed.
    pub fn delete(&self, key: &K) -> Result<Arc<Item<K, V>>> {
        let (item, deleted) = {
            let state = self.shared.state.write();
            let item = match state.items.get(key) {
                Some(item) if item.begin_departure() => item.clone(),
                _ => return Err(CacheError::KeyNotFound),
            };
            (item, state.deleted.clone())
        };

        self.shared.finish_departure(&item, &deleted);
        if !item.lifespan().is_zero() {
            self.shared.expiration_check();
        }
        Ok(item)
    }

    // == Exist ==
    /// Returns true if the key is in the table. Does not touch the item.
    pub fn exist(&self, key: &K) -> bool {
        self.shared.state.read().items.contains_key(key)
    }

    // == Value ==
    /// Returns the item for `key`, loading it on a miss.
    ///
    /// A hit touches the item, restarting its lifespan.
    ///
    /// # Errors
    /// - `KeyNotFound` if the key is absent and no loader is set
    /// - `KeyNotFoundOrNotLoadable` if the loader returned nothing
    pub fn value(&self, key: &K) -> Result<Arc<Item<K, V>>> {
        self.value_with(key, &[])
    }

    /// Like `value`, passing `args` through to the loader on a miss.
    pub fn value_with(&self, key: &K, args: &[&dyn Any]) -> Result<Arc<Item<K, V>>> {
        let loader = match self.lookup(key) {
            Lookup::Hit(item) => {
                self.shared.stats.record_hit();
                return Ok(item);
            }
            Lookup::Miss(loader) => loader,
        };
        self.shared.stats.record_miss();

        // No table lock is held here: the loader may use the table.
        let loader = loader.ok_or(CacheError::KeyNotFound)?;
        let loaded = loader(key, args).ok_or(CacheError::KeyNotFoundOrNotLoadable)?;

        self.shared.stats.record_load();
        trace!(table = %self.shared.name, "Loaded missing key into table");
        Ok(self.add(key.clone(), loaded.lifespan(), loaded.into_value()))
    }

    fn lookup(&self, key: &K) -> Lookup<K, V> {
        let state = self.shared.state.read();
        match state.items.get(key) {
            Some(item) => {
                item.touch();
                Lookup::Hit(item.clone())
            }
            None => Lookup::Miss(state.loader.clone()),
        }
    }

    // == Flush ==
    /// Removes every item and disarms the expiry timer. No callbacks fire.
    pub fn flush(&self) {
        let mut state = self.shared.state.write();
        state.items.clear();
        state.next_sweep = None;
        state.cleanup_interval = Duration::ZERO;
        self.shared.timer.cancel();
    }

    // == Iteration ==
    /// Calls `visit` for every entry in a snapshot taken under the read lock.
    ///
    /// The lock is released before the first visit, so `visit` may use the
    /// table freely. Entries added or removed meanwhile are not reflected.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&K, &Arc<Item<K, V>>),
    {
        let snapshot: Vec<(K, Arc<Item<K, V>>)> = self
            .shared
            .state
            .read()
            .items
            .iter()
            .map(|(key, item)| (key.clone(), item.clone()))
            .collect();

        for (key, item) in &snapshot {
            visit(key, item);
        }
    }

    // == Most Accessed ==
    /// Returns up to `count` items by descending access count, ties in key
    /// order. Access counts are left untouched.
    pub fn most_accessed(&self, count: usize) -> Vec<Arc<Item<K, V>>> {
        let state = self.shared.state.read();
        let mut ranked: Vec<(u64, &Arc<Item<K, V>>)> = state
            .items
            .values()
            .map(|item| (item.access_count(), item))
            .collect();

        ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.key().cmp(b.1.key())));
        ranked
            .into_iter()
            .take(count)
            .map(|(_, item)| item.clone())
            .collect()
    }

    // == Count ==
    /// Returns the current number of items.
    pub fn count(&self) -> usize {
        self.shared.state.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    // == Stats ==
    /// Returns current table statistics.
    pub fn stats(&self) -> CacheStats {
        self.shared.stats.snapshot(self.count())
    }

    // == Configuration ==
    /// Sets the loader called on misses in `value`.
    pub fn set_loader<F>(&self, loader: F)
    where
        F: Fn(&K, &[&dyn Any]) -> Option<Item<K, V>> + Send + Sync + 'static,
    {
        self.shared.state.write().loader = Some(Arc::new(loader));
    }

    pub fn remove_loader(&self) {
        self.shared.state.write().loader = None;
    }

    /// Sets the logger that receives scheduler messages.
    pub fn set_logger(&self, logger: impl Logger + 'static) {
        self.shared.state.write().logger = Some(Arc::new(logger));
    }

    pub fn remove_logger(&self) {
        self.shared.state.write().logger = None;
    }

    /// Replaces all add callbacks with `f`.
    pub fn set_added_item_callback<F>(&self, f: F)
    where
        F: Fn(&Arc<Item<K, V>>) + Send + Sync + 'static,
    {
        self.shared.state.write().added.set(Arc::new(f));
    }

    /// Appends an add callback.
    pub fn add_added_item_callback<F>(&self, f: F)
    where
        F: Fn(&Arc<Item<K, V>>) + Send + Sync + 'static,
    {
        self.shared.state.write().added.add(Arc::new(f));
    }

    pub fn remove_added_item_callbacks(&self) {
        self.shared.state.write().added.clear();
    }

    /// Replaces all delete callbacks with `f`.
    pub fn set_deleted_item_callback<F>(&self, f: F)
    where
        F: Fn(&Arc<Item<K, V>>) + Send + Sync + 'static,
    {
        self.shared.state.write().deleted.set(Arc::new(f));
    }

    /// Appends a delete callback.
    pub fn add_deleted_item_callback<F>(&self, f: F)
    where
        F: Fn(&Arc<Item<K, V>>) + Send + Sync + 'static,
    {
        self.shared.state.write().deleted.add(Arc::new(f));
    }

    pub fn remove_deleted_item_callbacks(&self) {
        self.shared.state.write().deleted.clear();
    }
}

impl<K, V> Shared<K, V> {
    /// Second half of a removal, run without the table lock: observers, then
    /// the item's own callbacks, then the map entry goes.
    ///
    /// Returns false if the entry was already replaced or flushed.
    pub(super) fn finish_departure(
        &self,
        item: &Arc<Item<K, V>>,
        deleted: &Callbacks<Arc<Item<K, V>>>,
    ) -> bool
    where
        K: Eq + Hash,
    {
        deleted.fire(item);
        item.fire_pre_eviction();

        let mut state = self.state.write();
        // The key may have been overwritten or flushed while callbacks ran.
        let still_current = state
            .items
            .get(item.key())
            .is_some_and(|current| Arc::ptr_eq(current, item));
        if still_current {
            state.items.remove(item.key());
        }
        still_current
    }
}

impl<K, V> fmt::Debug for Table<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.read();
        f.debug_struct("Table")
            .field("name", &self.shared.name)
            .field("items", &state.items.len())
            .field("cleanup_interval", &state.cleanup_interval)
            .finish()
    }
}
