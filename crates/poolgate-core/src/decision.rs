//! The access-decision engine.
//!
//! One access check produces one immutable [`AccessDecision`]: a binary
//! verdict plus the three reason flags that produced it. All three flags are
//! computed unconditionally — the audit trail and the caller always see the
//! full picture, even when an earlier flag already settles the verdict.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::occupancy::OccupancyState;
use crate::store::IdentityStore;

/// The binary admission verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Access granted; the gate may open.
    Granted,
    /// Access refused.
    Refused,
}

impl Verdict {
    /// Returns the wire spelling of the verdict.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Refused => "refused",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three facts a verdict is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionReasons {
    /// The requesting identity exists in the identity store.
    pub user_ok: bool,
    /// The pool has a known occupancy (cache or store).
    pub pool_known: bool,
    /// The pool is known and currently free.
    pub pool_free: bool,
}

/// One immutable access decision, constructed once per access request.
///
/// Written to the audit ledger and returned to the caller; never mutated or
/// retried.
#[derive(Debug, Clone, Serialize)]
pub struct AccessDecision {
    /// The requesting identity name.
    pub idu: String,
    /// The pool the request is for.
    pub idswp: String,
    /// The admission verdict.
    pub decision: Verdict,
    /// The facts behind the verdict.
    pub reasons: DecisionReasons,
    /// When the decision was made.
    pub decided_at: DateTime<Utc>,
}

/// Evaluates access checks against the identity store and occupancy state.
pub struct DecisionEngine {
    identities: Arc<dyn IdentityStore>,
    occupancy: Arc<OccupancyState>,
}

impl std::fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("identities", &"<IdentityStore>")
            .field("occupancy", &self.occupancy)
            .finish()
    }
}

impl DecisionEngine {
    /// Creates a new engine over the given collaborators.
    #[must_use]
    pub fn new(identities: Arc<dyn IdentityStore>, occupancy: Arc<OccupancyState>) -> Self {
        Self {
            identities,
            occupancy,
        }
    }

    /// Returns the occupancy state this engine reads from.
    #[must_use]
    pub fn occupancy(&self) -> Arc<OccupancyState> {
        Arc::clone(&self.occupancy)
    }

    /// Decides one access request.
    ///
    /// Granted iff the identity is known **and** the pool is known **and**
    /// the pool is free. An identity-store failure reads as unknown identity:
    /// a broken store denies, it never falsely grants.
    pub async fn decide(&self, idu: &str, idswp: &str) -> AccessDecision {
        let user_ok = match self.identities.exists(idu).await {
            Ok(found) => found,
            Err(error) => {
                tracing::warn!(idu, %error, "identity lookup failed");
                false
            }
        };

        let occupancy = self.occupancy.lookup(idswp).await;
        let pool_known = occupancy.is_some();
        let pool_free = occupancy == Some(false);

        let decision = if user_ok && pool_known && pool_free {
            Verdict::Granted
        } else {
            Verdict::Refused
        };

        tracing::info!(idu, idswp, %decision, user_ok, pool_known, pool_free, "access decided");

        AccessDecision {
            idu: idu.to_string(),
            idswp: idswp.to_string(),
            decision,
            reasons: DecisionReasons {
                user_ok,
                pool_known,
                pool_free,
            },
            decided_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::store::MemoryStore;
    use crate::telemetry::OccupancyFact;
    use async_trait::async_trait;

    struct UnavailableIdentities;

    #[async_trait]
    impl IdentityStore for UnavailableIdentities {
        async fn exists(&self, _name: &str) -> Result<bool> {
            Err(Error::store("identity store unreachable"))
        }
    }

    fn engine_with(users: &[&str], pools: &[(&str, bool)]) -> DecisionEngine {
        let store = Arc::new(MemoryStore::new());
        for user in users {
            store.add_identity(*user);
        }
        let occupancy = Arc::new(OccupancyState::new(
            Arc::clone(&store) as Arc<dyn crate::store::OccupancyStore>
        ));
        for (pool, occupied) in pools {
            occupancy.record(OccupancyFact {
                pool_id: (*pool).to_string(),
                occupied: *occupied,
                observed_at: Utc::now(),
            });
        }
        DecisionEngine::new(store, occupancy)
    }

    #[tokio::test]
    async fn test_known_user_and_free_pool_is_granted() {
        let engine = engine_with(&["alice"], &[("P1", false)]);

        let decision = engine.decide("alice", "P1").await;

        assert_eq!(decision.decision, Verdict::Granted);
        assert!(decision.reasons.user_ok);
        assert!(decision.reasons.pool_known);
        assert!(decision.reasons.pool_free);
    }

    #[tokio::test]
    async fn test_unknown_user_and_unknown_pool_is_refused() {
        let engine = engine_with(&[], &[]);

        let decision = engine.decide("bob", "P2").await;

        assert_eq!(decision.decision, Verdict::Refused);
        assert!(!decision.reasons.user_ok);
        assert!(!decision.reasons.pool_known);
        assert!(!decision.reasons.pool_free);
    }

    #[tokio::test]
    async fn test_occupied_pool_refuses_known_user() {
        let engine = engine_with(&["alice"], &[("P1", true)]);

        let decision = engine.decide("alice", "P1").await;

        assert_eq!(decision.decision, Verdict::Refused);
        assert!(decision.reasons.user_ok);
        assert!(decision.reasons.pool_known);
        assert!(!decision.reasons.pool_free);
    }

    #[tokio::test]
    async fn test_unknown_user_still_reports_pool_flags() {
        // No short-circuit: the pool flags are computed even though the
        // identity alone already settles the verdict.
        let engine = engine_with(&[], &[("P1", false)]);

        let decision = engine.decide("mallory", "P1").await;

        assert_eq!(decision.decision, Verdict::Refused);
        assert!(!decision.reasons.user_ok);
        assert!(decision.reasons.pool_known);
        assert!(decision.reasons.pool_free);
    }

    #[tokio::test]
    async fn test_identity_store_failure_denies() {
        let occupancy = Arc::new(OccupancyState::new(Arc::new(MemoryStore::new())));
        occupancy.record(OccupancyFact {
            pool_id: "P1".to_string(),
            occupied: false,
            observed_at: Utc::now(),
        });
        let engine = DecisionEngine::new(Arc::new(UnavailableIdentities), occupancy);

        let decision = engine.decide("alice", "P1").await;

        assert_eq!(decision.decision, Verdict::Refused);
        assert!(!decision.reasons.user_ok);
    }

    #[test]
    fn test_verdict_wire_spelling() {
        assert_eq!(serde_json::to_string(&Verdict::Granted).unwrap(), "\"granted\"");
        assert_eq!(serde_json::to_string(&Verdict::Refused).unwrap(), "\"refused\"");
    }
}
