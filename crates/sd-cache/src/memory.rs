//! In-memory read-through cache.
//!
//! Entries live in a [`DashMap`] of per-key [`OnceCell`] slots. The map lock
//! is only held long enough to find or create a slot; the computation itself
//! runs on the slot, so concurrent misses for one key wait for a single
//! computation while other keys proceed independently.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::provider::CacheProvider;

/// Default lifetime of negative entries.
pub const DEFAULT_NEGATIVE_TTL: Duration = Duration::from_secs(5 * 60);

/// Lifetime of listing-style caches, flushed once a day.
pub const DAILY: Duration = Duration::from_secs(24 * 60 * 60);

/// Expiry settings for one cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    /// Lifetime of found values; `None` keeps them until invalidated.
    pub ttl: Option<Duration>,
    /// Lifetime of negative entries.
    pub negative_ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: None,
            negative_ttl: DEFAULT_NEGATIVE_TTL,
        }
    }
}

impl CacheSettings {
    /// Settings for a listing cache that is flushed daily.
    #[must_use]
    pub const fn daily() -> Self {
        Self {
            ttl: Some(DAILY),
            negative_ttl: DEFAULT_NEGATIVE_TTL,
        }
    }

    /// Sets the lifetime of found values.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets the lifetime of negative entries.
    #[must_use]
    pub const fn with_negative_ttl(mut self, ttl: Duration) -> Self {
        self.negative_ttl = ttl;
        self
    }
}

struct Stored<V> {
    value: Option<V>,
    stored_at: Instant,
}

type Slot<V> = Arc<OnceCell<Stored<V>>>;

/// Concurrent in-memory cache with per-key single-flight computation.
pub struct MemoryCache<K, V> {
    name: &'static str,
    settings: CacheSettings,
    entries: DashMap<K, Slot<V>>,
}

impl<K, V> std::fmt::Debug for MemoryCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<K, V> MemoryCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty cache. `name` is used in log fields.
    #[must_use]
    pub fn new(name: &'static str, settings: CacheSettings) -> Self {
        Self {
            name,
            settings,
            entries: DashMap::new(),
        }
    }

    /// Returns the cache name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the expiry settings.
    #[must_use]
    pub const fn settings(&self) -> CacheSettings {
        self.settings
    }

    fn is_expired(&self, stored: &Stored<V>) -> bool {
        let ttl = if stored.value.is_some() {
            self.settings.ttl
        } else {
            Some(self.settings.negative_ttl)
        };
        ttl.is_some_and(|ttl| stored.stored_at.elapsed() >= ttl)
    }

    /// Finds the live slot for `key`, replacing an expired one.
    fn slot(&self, key: &K) -> Slot<V> {
        let existing = self.entries.get(key).map(|entry| entry.value().clone());
        if let Some(slot) = existing {
            match slot.get() {
                Some(stored) if self.is_expired(stored) => {
                    tracing::trace!(cache = self.name, "cache entry expired");
                    self.entries
                        .remove_if(key, |_, current| Arc::ptr_eq(current, &slot));
                }
                _ => return slot,
            }
        }
        self.entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone()
    }
}

#[async_trait]
impl<K, V> CacheProvider<K, V> for MemoryCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get_or_try_insert_with<F, Fut, E>(&self, key: K, compute: F) -> Result<Option<V>, E>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<Option<V>, E>> + Send,
        E: Send,
    {
        let slot = self.slot(&key);
        if let Some(stored) = slot.get() {
            tracing::trace!(cache = self.name, "cache hit");
            return Ok(stored.value.clone());
        }

        let stored = slot
            .get_or_try_init(|| async {
                tracing::debug!(cache = self.name, "cache miss");
                let value = compute().await?;
                Ok::<_, E>(Stored {
                    value,
                    stored_at: Instant::now(),
                })
            })
            .await?;
        Ok(stored.value.clone())
    }

    async fn invalidate(&self, key: &K) {
        if self.entries.remove(key).is_some() {
            tracing::debug!(cache = self.name, "cache entry invalidated");
        }
    }

    async fn invalidate_all(&self) {
        let count = self.entries.len();
        self.entries.clear();
        tracing::debug!(cache = self.name, count, "cache flushed");
    }

    fn entry_count(&self) -> usize {
        self.entries.len()
    }
}
