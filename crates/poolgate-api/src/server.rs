//! API server implementation.
//!
//! Provides the health, readiness, and access-check endpoints, and owns the
//! wiring between the HTTP surface and the domain components.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use tower_http::trace::TraceLayer;

use poolgate_core::Result;
use poolgate_core::command::CommandPublisher;
use poolgate_core::decision::DecisionEngine;
use poolgate_core::store::{AuditStore, OccupancyStore};

use crate::config::Config;

// ============================================================================
// Health and Ready Responses
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ReadyResponse {
    /// Service readiness status.
    pub ready: bool,
    /// Optional message about readiness state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    engine: Arc<DecisionEngine>,
    publisher: Arc<dyn CommandPublisher>,
    occupancy_store: Arc<dyn OccupancyStore>,
    audit: Arc<dyn AuditStore>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("engine", &self.engine)
            .field("publisher", &"<CommandPublisher>")
            .field("occupancy_store", &"<OccupancyStore>")
            .field("audit", &"<AuditStore>")
            .finish()
    }
}

impl AppState {
    /// Creates new application state over the given collaborators.
    #[must_use]
    pub fn new(
        config: Config,
        engine: Arc<DecisionEngine>,
        publisher: Arc<dyn CommandPublisher>,
        occupancy_store: Arc<dyn OccupancyStore>,
        audit: Arc<dyn AuditStore>,
    ) -> Self {
        Self {
            config,
            engine,
            publisher,
            occupancy_store,
            audit,
        }
    }

    /// Returns the decision engine.
    #[must_use]
    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// Returns the command publisher.
    #[must_use]
    pub fn publisher(&self) -> &dyn CommandPublisher {
        self.publisher.as_ref()
    }

    /// Returns the audit store.
    #[must_use]
    pub fn audit(&self) -> &dyn AuditStore {
        self.audit.as_ref()
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint handler.
///
/// Returns 200 OK if the service is alive. This is a shallow check that
/// doesn't verify dependencies.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness check endpoint handler.
///
/// Returns 200 OK if the service is ready to accept requests. Probes the
/// occupancy store; a lookup of a missing key is sufficient to validate the
/// connection path without depending on data being present.
async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let check_key = "__poolgate/ready-check";
    match state.occupancy_store.find(check_key).await {
        Ok(_) => (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                message: None,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                ready: false,
                message: Some(format!("store check failed: {e}")),
            }),
        ),
    }
}

// ============================================================================
// Server
// ============================================================================

/// The poolgate API server.
pub struct Server {
    state: Arc<AppState>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server").field("state", &self.state).finish()
    }
}

impl Server {
    /// Creates a new server over prepared application state.
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.state.config
    }

    /// Creates the router with all routes and middleware.
    fn create_router(&self) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/ready", get(ready))
            .merge(crate::routes::access_routes())
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&self.state))
    }

    /// Starts the HTTP server and serves until the process exits.
    ///
    /// # Errors
    ///
    /// Returns an error if the listen socket cannot be bound or the server
    /// fails while running.
    pub async fn serve(&self) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.create_router();

        tracing::info!(http_port = self.state.config.http_port, "starting poolgate API server");

        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            poolgate_core::Error::Internal {
                message: format!("failed to bind to {addr}: {e}"),
            }
        })?;

        axum::serve(listener, router)
            .await
            .map_err(|e| poolgate_core::Error::Internal {
                message: format!("server error: {e}"),
            })?;

        Ok(())
    }

    /// Creates a test router for the server.
    ///
    /// This is useful for integration tests where you want to exercise the
    /// routes without actually binding to a port.
    #[must_use]
    pub fn test_router(&self) -> Router {
        self.create_router()
    }
}
