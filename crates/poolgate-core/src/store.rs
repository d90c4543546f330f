//! Store abstractions for the durable document collections.
//!
//! This module defines the contracts poolgate needs from its durable stores:
//! occupancy documents keyed by pool id, identity presence lookups, and the
//! append-only audit ledger. Connection management and query execution live
//! behind these traits in whichever backend a deployment wires in.
//!
//! An in-memory backend is provided for tests and debug-mode runs.
//! Thread-safe via `RwLock`. Not suitable for production.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::audit::AccessRecord;
use crate::error::{Error, Result};

/// A durable occupancy document for one pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolRecord {
    /// The pool identifier (primary key).
    pub pool_id: String,
    /// Last reported occupancy.
    pub occupied: bool,
    /// When the document was last replaced.
    pub updated_at: DateTime<Utc>,
}

/// Durable store of pool occupancy documents, keyed by pool id.
///
/// Upsert semantics on write (create-or-replace); there is no delete path.
#[async_trait]
pub trait OccupancyStore: Send + Sync + 'static {
    /// Loads every occupancy document, for seeding the cache at startup.
    async fn load_all(&self) -> Result<Vec<PoolRecord>>;

    /// Finds the document for one pool, or `None` if it never reported.
    async fn find(&self, pool_id: &str) -> Result<Option<PoolRecord>>;

    /// Creates or replaces the document for one pool.
    async fn upsert(&self, pool_id: &str, occupied: bool, updated_at: DateTime<Utc>)
        -> Result<()>;
}

/// Durable identity store, consulted for existence only.
#[async_trait]
pub trait IdentityStore: Send + Sync + 'static {
    /// Returns whether an identity with this name is known.
    async fn exists(&self, name: &str) -> Result<bool>;
}

/// Append-only audit ledger of access decisions.
///
/// Records are immutable once written; this core never updates or deletes.
#[async_trait]
pub trait AuditStore: Send + Sync + 'static {
    /// Appends one access record.
    async fn append(&self, record: AccessRecord) -> Result<()>;
}

/// In-memory store backend implementing all three store contracts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pools: Arc<RwLock<HashMap<String, PoolRecord>>>,
    identities: Arc<RwLock<Vec<String>>>,
    audit: Arc<RwLock<Vec<AccessRecord>>>,
}

impl MemoryStore {
    /// Creates a new empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a known identity (test/debug seeding).
    pub fn add_identity(&self, name: impl Into<String>) {
        if let Ok(mut identities) = self.identities.write() {
            identities.push(name.into());
        }
    }

    /// Returns a snapshot of the audit ledger, in append order.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the ledger lock is poisoned.
    pub fn audit_records(&self) -> Result<Vec<AccessRecord>> {
        let audit = self.audit.read().map_err(|_| Error::internal("lock poisoned"))?;
        Ok(audit.clone())
    }
}

#[async_trait]
impl OccupancyStore for MemoryStore {
    async fn load_all(&self) -> Result<Vec<PoolRecord>> {
        let pools = self.pools.read().map_err(|_| Error::internal("lock poisoned"))?;
        Ok(pools.values().cloned().collect())
    }

    async fn find(&self, pool_id: &str) -> Result<Option<PoolRecord>> {
        let pools = self.pools.read().map_err(|_| Error::internal("lock poisoned"))?;
        Ok(pools.get(pool_id).cloned())
    }

    async fn upsert(
        &self,
        pool_id: &str,
        occupied: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut pools = self.pools.write().map_err(|_| Error::internal("lock poisoned"))?;
        pools.insert(
            pool_id.to_string(),
            PoolRecord {
                pool_id: pool_id.to_string(),
                occupied,
                updated_at,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn exists(&self, name: &str) -> Result<bool> {
        let identities = self
            .identities
            .read()
            .map_err(|_| Error::internal("lock poisoned"))?;
        Ok(identities.iter().any(|known| known == name))
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append(&self, record: AccessRecord) -> Result<()> {
        let mut audit = self.audit.write().map_err(|_| Error::internal("lock poisoned"))?;
        audit.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_is_create_or_replace() -> anyhow::Result<()> {
        let store = MemoryStore::new();

        store.upsert("P1", true, Utc::now()).await?;
        store.upsert("P1", false, Utc::now()).await?;

        let record = store.find("P1").await?.expect("document should exist");
        assert!(!record.occupied);
        assert_eq!(store.load_all().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_find_missing_pool_returns_none() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        assert!(store.find("never-reported").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_identity_lookup_is_existence_only() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        store.add_identity("alice");

        assert!(store.exists("alice").await?);
        assert!(!store.exists("bob").await?);
        Ok(())
    }
}
