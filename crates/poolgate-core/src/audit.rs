//! Audit records for access decisions.
//!
//! Every access check appends exactly one record to the audit ledger.
//! Records are immutable once written and never secret-bearing: they carry
//! the identity name, the pool, the verdict, and the reason flags — nothing
//! else. Audit failures are fail-open: a broken ledger is logged and never
//! blocks or reverses a decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decision::{AccessDecision, DecisionReasons, Verdict};

/// Version of the audit record schema.
///
/// Increment when making breaking changes to the schema.
pub const AUDIT_RECORD_VERSION: u32 = 1;

/// One append-only audit record of an access decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRecord {
    /// Schema version of this record.
    pub version: u32,
    /// When the decision was made.
    pub ts: DateTime<Utc>,
    /// The requesting identity name.
    pub idu: String,
    /// The pool the request was for.
    pub idswp: String,
    /// The admission verdict.
    pub decision: Verdict,
    /// The facts behind the verdict.
    pub reasons: DecisionReasons,
}

impl From<&AccessDecision> for AccessRecord {
    fn from(decision: &AccessDecision) -> Self {
        Self {
            version: AUDIT_RECORD_VERSION,
            ts: decision.decided_at,
            idu: decision.idu.clone(),
            idswp: decision.idswp.clone(),
            decision: decision.decision,
            reasons: decision.reasons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_mirrors_decision() {
        let decision = AccessDecision {
            idu: "alice".to_string(),
            idswp: "P1".to_string(),
            decision: Verdict::Granted,
            reasons: DecisionReasons {
                user_ok: true,
                pool_known: true,
                pool_free: true,
            },
            decided_at: Utc::now(),
        };

        let record = AccessRecord::from(&decision);
        assert_eq!(record.version, AUDIT_RECORD_VERSION);
        assert_eq!(record.idu, "alice");
        assert_eq!(record.idswp, "P1");
        assert_eq!(record.decision, Verdict::Granted);
        assert_eq!(record.ts, decision.decided_at);
    }

    #[test]
    fn test_record_serializes_reason_flags() {
        let decision = AccessDecision {
            idu: "bob".to_string(),
            idswp: "P2".to_string(),
            decision: Verdict::Refused,
            reasons: DecisionReasons {
                user_ok: false,
                pool_known: false,
                pool_free: false,
            },
            decided_at: Utc::now(),
        };

        let json = serde_json::to_value(AccessRecord::from(&decision)).unwrap();
        assert_eq!(json["decision"], "refused");
        assert_eq!(json["reasons"]["user_ok"], false);
        assert_eq!(json["reasons"]["pool_known"], false);
        assert_eq!(json["reasons"]["pool_free"], false);
    }
}
