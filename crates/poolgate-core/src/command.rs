//! Outbound actuator commands and dispatch outcomes.
//!
//! A decision is relayed to the device over a per-pool command topic. The
//! dispatch is fire-and-forget beyond delivery-status capture: the outcome
//! records whether the transport was connected and whether the broker
//! acknowledged receipt, and a failed dispatch never un-grants a decision.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::decision::Verdict;
use crate::error::{Error, Result};

/// The command payload published to the device, wire shape
/// `{"pool": ..., "decision": "granted"|"refused", "ts": RFC3339}`.
#[derive(Debug, Clone, Serialize)]
pub struct Command {
    /// The pool the command is addressed to.
    pub pool: String,
    /// The decision being relayed.
    pub decision: Verdict,
    /// When the command was built (UTC).
    pub ts: DateTime<Utc>,
}

impl Command {
    /// Builds a command for the given pool, stamped now.
    #[must_use]
    pub fn new(pool_id: &str, decision: Verdict) -> Self {
        Self {
            pool: pool_id.to_string(),
            decision,
            ts: Utc::now(),
        }
    }

    /// Serializes the command to its JSON wire body.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if JSON encoding fails.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(Error::serialization)
    }
}

/// Builds the per-pool command topic: `<base>/<pool_id>`.
///
/// The configured base is trimmed of trailing separators first, so a base of
/// `cmd/` and `cmd` address the same topic.
#[must_use]
pub fn command_topic(base: &str, pool_id: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), pool_id)
}

/// Delivery status of one command dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Whether the transport was connected at publish time.
    pub connected: bool,
    /// Whether the broker acknowledged receipt within the publish timeout.
    pub acknowledged: bool,
}

impl DispatchOutcome {
    /// An outcome for a publish that never made it onto the wire.
    #[must_use]
    pub const fn undelivered(connected: bool) -> Self {
        Self {
            connected,
            acknowledged: false,
        }
    }

    /// Whether the command is known to have reached the broker.
    #[must_use]
    pub const fn delivered(self) -> bool {
        self.acknowledged
    }
}

/// Publishes decisions to the per-pool command channel.
///
/// Infallible by contract: transport failures are captured in the
/// [`DispatchOutcome`] and logged by the implementation, never returned as
/// errors — decision and dispatch are decoupled.
#[async_trait]
pub trait CommandPublisher: Send + Sync + 'static {
    /// Publishes one decision for one pool, at-least-once intent.
    async fn publish(&self, pool_id: &str, decision: Verdict) -> DispatchOutcome;
}
