//! Admin endpoints: server blocks, federation mode and rate limits.
//!
//! Authorization is left to the reverse proxy in front of `/admin`.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use fedinet_common::{AppError, AppResult};
use fedinet_core::{BlockInput, BucketInput, PolicyUpdate};
use fedinet_db::entities::{blocked_server, federation_policy, rate_limit_bucket};
use serde::Deserialize;

use crate::{
    extractors::{ApiJson, ApiQuery},
    response::{Created, FederationResponse, Listing},
    state::AppState,
};

#[derive(Debug, Deserialize)]
struct UnblockQuery {
    server_url: Option<String>,
}

async fn list_blocks(State(state): State<AppState>) -> AppResult<Listing<blocked_server::Model>> {
    let blocks = state.guards.blocklist.list_active().await?;
    Ok(Listing::blocks(blocks))
}

async fn block(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<BlockInput>,
) -> AppResult<Created<blocked_server::Model>> {
    let block = state.guards.blocklist.block(input).await?;
    Ok(Created(block))
}

async fn unblock(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UnblockQuery>,
) -> AppResult<FederationResponse<()>> {
    let server_url = query
        .server_url
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::Validation("server_url is required".to_string()))?;

    state.guards.blocklist.unblock(&server_url).await?;
    Ok(FederationResponse::message(format!("{server_url} unblocked")))
}

async fn get_mode(State(state): State<AppState>) -> AppResult<Json<federation_policy::Model>> {
    Ok(Json(state.guards.mode.get_policy().await?))
}

async fn set_mode(
    State(state): State<AppState>,
    ApiJson(update): ApiJson<PolicyUpdate>,
) -> AppResult<Json<federation_policy::Model>> {
    Ok(Json(state.guards.mode.set_policy(update).await?))
}

async fn upsert_limit(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<BucketInput>,
) -> AppResult<Json<rate_limit_bucket::Model>> {
    Ok(Json(state.guards.rate_limiter.upsert_bucket(input).await?))
}

/// Operator routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/blocks", get(list_blocks).post(block).delete(unblock))
        .route("/mode", get(get_mode).put(set_mode))
        .route("/limits", post(upsert_limit))
}
