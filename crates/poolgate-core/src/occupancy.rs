//! Process-local occupancy state.
//!
//! The occupancy cache is the fast read path for access checks. It is not an
//! independent source of truth: it caches the durable store plus the most
//! recent telemetry facts that have not yet been persisted. The cache is
//! updated first, optimistically; the store write trails behind as a
//! best-effort background side effect.
//!
//! Two execution contexts share this state: the asynchronous telemetry
//! ingestion callback and the pool of request handlers. All mutation and
//! reads of the underlying map are serialized through a `RwLock`, and no lock
//! is held across an await point.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::store::OccupancyStore;
use crate::telemetry::OccupancyFact;

/// Lock-protected map of pool id to last reported occupancy.
#[derive(Debug, Default)]
pub struct OccupancyCache {
    entries: RwLock<HashMap<String, bool>>,
}

impl OccupancyCache {
    /// Creates a new empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached occupancy for a pool, or `None` on a miss.
    #[must_use]
    pub fn get(&self, pool_id: &str) -> Option<bool> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(pool_id).copied())
    }

    /// Inserts or replaces the occupancy for a pool.
    pub fn insert(&self, pool_id: &str, occupied: bool) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(pool_id.to_string(), occupied);
        }
    }

    /// Returns the number of cached pools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Returns whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The occupancy cache coupled to its durable backing store.
///
/// Owns the cache lifecycle: seeded from a full store scan at startup, kept
/// current by telemetry via [`record`](Self::record), and consulted by the
/// decision path via [`lookup`](Self::lookup) with store read-through on a
/// miss. Ephemeral by design; rebuildable from the store at next startup.
pub struct OccupancyState {
    cache: OccupancyCache,
    store: Arc<dyn OccupancyStore>,
}

impl std::fmt::Debug for OccupancyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OccupancyState")
            .field("cache", &self.cache)
            .field("store", &"<OccupancyStore>")
            .finish()
    }
}

impl OccupancyState {
    /// Creates occupancy state backed by the given store, with an empty cache.
    #[must_use]
    pub fn new(store: Arc<dyn OccupancyStore>) -> Self {
        Self {
            cache: OccupancyCache::new(),
            store,
        }
    }

    /// Seeds the cache from a full store scan.
    ///
    /// A failed seed is non-fatal: the cache stays empty and pools are
    /// reported unknown until telemetry or read-through populates them.
    pub async fn seed(&self) {
        match self.store.load_all().await {
            Ok(records) => {
                for record in &records {
                    self.cache.insert(&record.pool_id, record.occupied);
                }
                if !records.is_empty() {
                    tracing::info!(pools = records.len(), "occupancy cache seeded from store");
                }
            }
            Err(error) => {
                tracing::warn!(%error, "occupancy cache seed failed; starting empty");
            }
        }
    }

    /// Returns the occupancy for a pool, or `None` if the pool is unknown.
    ///
    /// A cache hit answers directly. On a miss the store is consulted: a
    /// found document populates the cache and answers; a missing document or
    /// a store error leaves the cache untouched (negative results are never
    /// cached, since the pool may simply not have reported yet).
    pub async fn lookup(&self, pool_id: &str) -> Option<bool> {
        if let Some(occupied) = self.cache.get(pool_id) {
            return Some(occupied);
        }

        match self.store.find(pool_id).await {
            Ok(Some(record)) => {
                self.cache.insert(pool_id, record.occupied);
                Some(record.occupied)
            }
            Ok(None) => None,
            Err(error) => {
                // Fail toward denial: an unreachable store reads as unknown.
                tracing::warn!(pool_id, %error, "occupancy read-through failed");
                None
            }
        }
    }

    /// Folds one telemetry fact into the state.
    ///
    /// The cache update is synchronous and unconditional; the durable upsert
    /// is dispatched to a background task so store latency or failure never
    /// blocks the ingestion path. Upsert failures are logged and dropped.
    pub fn record(&self, fact: OccupancyFact) {
        self.cache.insert(&fact.pool_id, fact.occupied);
        tracing::info!(pool_id = %fact.pool_id, occupied = fact.occupied, "occupancy updated");

        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(error) = store
                .upsert(&fact.pool_id, fact.occupied, fact.observed_at)
                .await
            {
                tracing::warn!(pool_id = %fact.pool_id, %error, "occupancy upsert failed");
            }
        });
    }
}
