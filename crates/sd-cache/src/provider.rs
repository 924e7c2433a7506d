//! Cache provider trait.

use std::future::Future;
use std::hash::Hash;

use async_trait::async_trait;

/// Read-through cache port.
///
/// Implementations must be thread-safe and guarantee that a caller never
/// observes a partially computed value. Two concurrent misses for the same
/// key should share a single computation.
///
/// A computation that yields `None` is stored as a negative entry, so that
/// repeated lookups of a missing entity do not reach the backend each time.
/// Negative entries are time-bounded by the implementation.
#[async_trait]
pub trait CacheProvider<K, V>: Send + Sync
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Returns the cached value for `key`, computing and storing it on a miss.
    ///
    /// Errors from `compute` are returned as-is and nothing is stored.
    async fn get_or_try_insert_with<F, Fut, E>(&self, key: K, compute: F) -> Result<Option<V>, E>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<Option<V>, E>> + Send,
        E: Send;

    /// Drops the entry for `key`, if any.
    async fn invalidate(&self, key: &K);

    /// Drops every entry.
    async fn invalidate_all(&self);

    /// Returns the number of stored entries, including negative ones.
    fn entry_count(&self) -> usize;
}
