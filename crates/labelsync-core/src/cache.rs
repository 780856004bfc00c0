//! Single-flight resolution cache
//!
//! Source plugins resolve identifiers (tag ids, category ids) into
//! human-readable names. Many hosts share the same identifiers, so each one
//! is resolved at most once per pass. Concurrent requesters of a key that is
//! being resolved wait for that resolution instead of issuing their own.
//!
//! The cache is an explicit value owned by whoever runs the pass; a new pass
//! gets a new cache, so no entry outlives the pass it was resolved in.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

/// Async memo keyed by identifier
///
/// Failed resolutions are not stored: the next requester retries.
#[derive(Debug)]
pub struct ResolutionCache<K, V> {
    entries: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for ResolutionCache<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> ResolutionCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key`, resolving it with `resolve` if absent
    ///
    /// The map lock is held only to find the slot; resolution itself runs
    /// outside it so distinct keys resolve in parallel.
    pub async fn get_or_try_resolve<F, Fut, E>(&self, key: &K, resolve: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let cell = {
            let mut entries = self.entries.lock().await;
            Arc::clone(entries.entry(key.clone()).or_default())
        };

        cell.get_or_try_init(resolve).await.cloned()
    }

    /// Cached value for `key`, if resolved
    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.lock().await;
        entries.get(key).and_then(|cell| cell.get().cloned())
    }

    /// Number of resolved entries
    pub async fn len(&self) -> usize {
        let entries = self.entries.lock().await;
        entries.values().filter(|cell| cell.initialized()).count()
    }

    /// True when nothing has been resolved yet
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
