//! Health endpoint.

use axum::{Json, Router, extract::State, routing::get};
use fedinet_core::HealthSnapshot;

use crate::state::AppState;

/// Last computed snapshot; recomputed by the scheduler.
async fn health(State(state): State<AppState>) -> Json<HealthSnapshot> {
    Json(state.health.snapshot().await)
}

/// Health routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
