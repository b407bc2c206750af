//! Deduplicating cache for asynchronously loaded assets
//!
//! Every key maps to a single shared load. The pending load is registered
//! before any asynchronous work starts, so concurrent requests for the same key
//! attach to the same operation instead of starting a second one. Loads run on
//! their own task and keep going even when every requester has gone away.
//!
//! A failed load is handed to every requester already waiting on it and then
//! evicted, so the next request for that key starts a fresh attempt. A load
//! that panics counts as failed.

use crate::avatar::{AvatarError, AvatarResult};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Handle to a load that may still be in flight. Cloning is cheap and every
/// clone resolves to the same result.
pub type SharedLoad<V> = Shared<BoxFuture<'static, AvatarResult<V>>>;

/// Run `load` on its own task and return a handle any number of callers can await.
pub fn spawn_shared<V, Fut>(load: Fut) -> SharedLoad<V>
where
    V: Clone + Send + Sync + 'static,
    Fut: Future<Output = AvatarResult<V>> + Send + 'static,
{
    let handle = tokio::spawn(load);
    async move { handle.await? }.boxed().shared()
}

/// Cache performance statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub failures: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Calculate cache hit ratio as percentage
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

struct Entry<V> {
    generation: u64,
    load: SharedLoad<V>,
}

type Entries<K, V> = Arc<Mutex<HashMap<K, Entry<V>>>>;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    let message = payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("load panicked: {}", message)
}

pub struct InFlightCache<K, V> {
    name: &'static str,
    entries: Entries<K, V>,
    next_generation: AtomicU64,
    stats: Arc<Mutex<CacheStats>>,
}

impl<K, V> std::fmt::Debug for InFlightCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlightCache")
            .field("name", &self.name)
            .field("entries", &lock(&self.entries).len())
            .finish()
    }
}

impl<K, V> InFlightCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
            stats: Arc::new(Mutex::new(CacheStats::default())),
        }
    }

    /// Return the load registered for `key`, or register and start the one
    /// produced by `load`. `load` is only called on a miss.
    pub fn get_or_load<F, Fut>(&self, key: K, load: F) -> SharedLoad<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AvatarResult<V>> + Send + 'static,
    {
        let mut entries = lock(&self.entries);

        if let Some(entry) = entries.get(&key) {
            lock(&self.stats).hits += 1;
            debug!("📋 {} cache HIT for {:?}", self.name, key);
            return entry.load.clone();
        }

        lock(&self.stats).misses += 1;
        debug!("📋 {} cache MISS for {:?}", self.name, key);

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let fut = load();
        let name = self.name;
        let evict_key = key.clone();
        let evict_from = Arc::downgrade(&self.entries);
        let stats = Arc::clone(&self.stats);

        // The entry lock is held until the handle is inserted, so the eviction
        // below can never run before the entry exists.
        let shared = spawn_shared(async move {
            let result = match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Err(AvatarError::Task { reason: panic_reason(panic.as_ref()) }),
            };
            if let Err(error) = &result {
                lock(&stats).failures += 1;
                if let Some(entries) = evict_from.upgrade() {
                    let mut entries = lock(&entries);
                    if entries.get(&evict_key).is_some_and(|entry| entry.generation == generation) {
                        entries.remove(&evict_key);
                        warn!("📋 {} load for {:?} failed, evicted: {}", name, evict_key, error);
                    }
                }
            }
            result
        });

        entries.insert(key, Entry { generation, load: shared.clone() });
        shared
    }

    /// Completed value for `key`, if its load has already succeeded.
    pub fn get_ready(&self, key: &K) -> Option<V> {
        let entries = lock(&self.entries);
        match entries.get(key)?.load.peek() {
            Some(Ok(value)) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        lock(&self.entries).contains_key(key)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = lock(&self.stats).clone();
        stats.entries = self.len();
        stats
    }
}
