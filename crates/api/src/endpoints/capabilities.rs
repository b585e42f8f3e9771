//! Capability advertisement and discovery.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use fedinet_common::{AppError, AppResult};
use fedinet_core::CapabilityDocument;
use serde::Deserialize;

use crate::{extractors::ApiJson, state::AppState};

#[derive(Debug, Deserialize)]
struct DiscoverRequest {
    #[serde(default)]
    server_url: String,
}

async fn advertise(State(state): State<AppState>) -> Json<CapabilityDocument> {
    Json(state.guards.capabilities.advertise())
}

/// Negotiate with a remote server, cache first.
async fn discover(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<DiscoverRequest>,
) -> AppResult<Json<CapabilityDocument>> {
    if req.server_url.trim().is_empty() {
        return Err(AppError::Validation("server_url is required".to_string()));
    }

    let doc = state
        .guards
        .capabilities
        .get_capabilities(&req.server_url)
        .await?;
    Ok(Json(doc))
}

/// Capability routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/capabilities", get(advertise))
        .route("/discover", post(discover))
}
