//! Telemetry normalization for inbound pool occupancy reports.
//!
//! Devices publish JSON occupancy reports whose shape varies by producer
//! firmware and flow version. This module folds every known variant into one
//! canonical [`OccupancyFact`]. Normalization is total: anything the rules
//! cannot make sense of is discarded with a `None`, never an error, so the
//! ingestion loop can survive arbitrary payloads.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// A canonical occupancy observation for a single pool.
///
/// Produced only by [`normalize`]; immutable once constructed. The latest
/// fact for a pool supersedes all prior facts for that pool (last-write-wins,
/// with no ordering guarantee against out-of-order network delivery).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyFact {
    /// The pool the observation is about.
    pub pool_id: String,
    /// Whether the pool was occupied at observation time.
    pub occupied: bool,
    /// When this service observed the report.
    pub observed_at: DateTime<Utc>,
}

/// Occupancy field spellings, in precedence order.
///
/// Each rule is `(parent key, field)`. The first rule whose field is present
/// wins; later rules are not consulted. The first two spellings are typos
/// emitted by historical firmware and Node-RED flows and must keep priority
/// over the canonical spelling so mixed payloads resolve the same way the
/// fleet already expects.
const OCCUPANCY_RULES: &[(&str, &str)] = &[
    ("piscine", "occuped"),
    ("piscine", "oocuped"),
    ("piscine", "occupied"),
    ("status", "occupied"),
];

/// Normalizes one raw telemetry body into an [`OccupancyFact`].
///
/// Returns `None` when the body is not JSON or carries no pool identifier at
/// `info.ident`; such messages are silently discarded by the caller. When the
/// identifier is present but none of the known occupancy spellings are, the
/// pool is reported **occupied** — an unrecognized shape must deny access,
/// never falsely grant it.
#[must_use]
pub fn normalize(body: &[u8]) -> Option<OccupancyFact> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let pool_id = value.get("info")?.get("ident")?.as_str()?.to_string();

    let occupied = OCCUPANCY_RULES
        .iter()
        .find_map(|(parent, field)| value.get(parent)?.get(field))
        .map_or(true, truthy);

    Some(OccupancyFact {
        pool_id,
        occupied,
        observed_at: Utc::now(),
    })
}

/// JSON truthiness, matching how the device fleet's flows coerce the field.
///
/// `null`, `false`, `0`, and empty strings/arrays/objects are falsy;
/// everything else is truthy.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(body: &str) -> Option<OccupancyFact> {
        normalize(body.as_bytes())
    }

    #[test]
    fn test_each_spelling_is_honored_alone() {
        let cases = [
            (r#"{"info":{"ident":"P1"},"piscine":{"occuped":false}}"#, false),
            (r#"{"info":{"ident":"P1"},"piscine":{"oocuped":false}}"#, false),
            (r#"{"info":{"ident":"P1"},"piscine":{"occupied":false}}"#, false),
            (r#"{"info":{"ident":"P1"},"status":{"occupied":false}}"#, false),
            (r#"{"info":{"ident":"P1"},"piscine":{"occuped":true}}"#, true),
            (r#"{"info":{"ident":"P1"},"piscine":{"oocuped":true}}"#, true),
            (r#"{"info":{"ident":"P1"},"piscine":{"occupied":true}}"#, true),
            (r#"{"info":{"ident":"P1"},"status":{"occupied":true}}"#, true),
        ];
        for (body, expected) in cases {
            let fact = fact(body).expect("payload carries an ident");
            assert_eq!(fact.occupied, expected, "body: {body}");
            assert_eq!(fact.pool_id, "P1");
        }
    }

    #[test]
    fn test_occuped_typo_wins_over_oocuped() {
        let fact = fact(
            r#"{"info":{"ident":"P1"},"piscine":{"occuped":false,"oocuped":true}}"#,
        )
        .unwrap();
        assert!(!fact.occupied);
    }

    #[test]
    fn test_oocuped_typo_wins_over_canonical_spelling() {
        let fact = fact(
            r#"{"info":{"ident":"P1"},"piscine":{"oocuped":false,"occupied":true}}"#,
        )
        .unwrap();
        assert!(!fact.occupied);
    }

    #[test]
    fn test_piscine_parent_wins_over_status_parent() {
        let fact = fact(
            r#"{"info":{"ident":"P1"},"piscine":{"occupied":false},"status":{"occupied":true}}"#,
        )
        .unwrap();
        assert!(!fact.occupied);
    }

    #[test]
    fn test_unknown_shape_defaults_to_occupied() {
        let fact = fact(r#"{"info":{"ident":"P1"},"piscine":{"temp":22}}"#).unwrap();
        assert!(fact.occupied, "unknown telemetry shape must deny access");
    }

    #[test]
    fn test_missing_ident_is_discarded() {
        assert!(fact(r#"{"info":{},"status":{"occupied":false}}"#).is_none());
        assert!(fact(r#"{"status":{"occupied":false}}"#).is_none());
        assert!(fact(r#"{"info":{"ident":42},"status":{"occupied":false}}"#).is_none());
    }

    #[test]
    fn test_malformed_json_is_discarded() {
        assert!(normalize(b"not json at all").is_none());
        assert!(normalize(b"").is_none());
        assert!(normalize(&[0xff, 0xfe, 0x00]).is_none());
    }

    #[test]
    fn test_non_boolean_values_are_coerced() {
        assert!(fact(r#"{"info":{"ident":"P1"},"status":{"occupied":1}}"#).unwrap().occupied);
        assert!(!fact(r#"{"info":{"ident":"P1"},"status":{"occupied":0}}"#).unwrap().occupied);
        assert!(!fact(r#"{"info":{"ident":"P1"},"status":{"occupied":""}}"#).unwrap().occupied);
        assert!(!fact(r#"{"info":{"ident":"P1"},"status":{"occupied":null}}"#).unwrap().occupied);
        assert!(fact(r#"{"info":{"ident":"P1"},"status":{"occupied":"yes"}}"#).unwrap().occupied);
    }
}
