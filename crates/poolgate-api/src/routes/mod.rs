//! HTTP route handlers.

pub mod open;

use std::sync::Arc;

use axum::Router;

use crate::server::AppState;

/// Access-check routes.
pub fn access_routes() -> Router<Arc<AppState>> {
    open::routes()
}
