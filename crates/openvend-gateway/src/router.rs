//! Route table and service assembly.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use openvend_types::constants;

use crate::handlers::{handle_healthz, handle_webhook};
use crate::state::AppState;

/// Assemble the gateway's router. Shared by the binary and the endpoint
/// tests so both exercise the same service.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/healthz", get(handle_healthz))
        .layer(DefaultBodyLimit::max(constants::MAX_WEBHOOK_BODY_BYTES))
        .with_state(state)
}
