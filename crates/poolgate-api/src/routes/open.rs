//! The access-check route.
//!
//! ## Routes
//!
//! - `GET /open?idu=<identity>&idswp=<pool>` - Decide, dispatch, audit, and
//!   return one admission verdict.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use poolgate_core::audit::AccessRecord;
use poolgate_core::decision::{AccessDecision, DecisionReasons, Verdict};
use poolgate_core::observability::access_span;

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

/// Query parameters for the access check.
#[derive(Debug, Deserialize)]
pub struct OpenQuery {
    /// Requesting identity name.
    pub idu: Option<String>,
    /// Pool identifier.
    pub idswp: Option<String>,
}

/// Access-check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct OpenResponse {
    /// Always `true` on the success path.
    pub ok: bool,
    /// Echo of the requesting identity.
    pub idu: String,
    /// Echo of the pool identifier.
    pub idswp: String,
    /// The admission verdict.
    pub decision: Verdict,
    /// The facts behind the verdict.
    pub reasons: DecisionReasons,
}

impl From<AccessDecision> for OpenResponse {
    fn from(decision: AccessDecision) -> Self {
        Self {
            ok: true,
            idu: decision.idu,
            idswp: decision.idswp,
            decision: decision.decision,
            reasons: decision.reasons,
        }
    }
}

/// Builds the access-check router.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/open", get(open))
}

/// `GET /open` - the synchronous access check.
///
/// Validation happens before any store access, decision, dispatch, or audit
/// write: a missing or blank `idu`/`idswp` is rejected with a client error
/// and leaves no trace. On the success path the decision is dispatched to
/// the device and audited, but neither a dispatch failure nor an audit
/// failure changes the verdict returned to the caller.
async fn open(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OpenQuery>,
) -> ApiResult<Json<OpenResponse>> {
    let idu = query.idu.as_deref().unwrap_or("").trim();
    let idswp = query.idswp.as_deref().unwrap_or("").trim();
    if idu.is_empty() || idswp.is_empty() {
        return Err(ApiError::bad_request("missing idu or idswp"));
    }

    let decision = async {
        let decision = state.engine().decide(idu, idswp).await;

        let outcome = state.publisher().publish(idswp, decision.decision).await;
        if !outcome.delivered() {
            tracing::warn!(
                idswp,
                connected = outcome.connected,
                "decision dispatch undelivered"
            );
        }

        if let Err(error) = state.audit().append(AccessRecord::from(&decision)).await {
            // Fail-open audit: a broken ledger never blocks the caller.
            tracing::warn!(idu, idswp, %error, "audit append failed");
        }

        decision
    }
    .instrument(access_span(idu, idswp))
    .await;

    Ok(Json(OpenResponse::from(decision)))
}
