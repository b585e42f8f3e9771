//! Inbound activity endpoints.

use axum::{Router, extract::State, routing::get};
use fedinet_common::{AppError, AppResult};
use fedinet_core::{INBOX_ENDPOINT, InboxEnvelope, InboxReceipt};
use fedinet_db::entities::inbound_activity;
use serde::Deserialize;

use super::{clamp_limit, default_limit};
use crate::{
    extractors::{ApiJson, ApiQuery},
    response::{FederationResponse, Listing},
    state::AppState,
};

#[derive(Debug, Deserialize)]
struct ListInboxQuery {
    target_id: Option<String>,
    #[serde(default = "default_limit")]
    limit: u64,
}

/// Accept a push from a remote server.
async fn receive(
    State(state): State<AppState>,
    ApiJson(envelope): ApiJson<InboxEnvelope>,
) -> AppResult<FederationResponse<InboxReceipt>> {
    let receipt = state.inbox.receive(envelope).await?;
    let message = if receipt.duplicate {
        "Activity already received"
    } else {
        "Activity received"
    };
    Ok(FederationResponse::ok(message, receipt))
}

async fn list_for_target(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListInboxQuery>,
) -> AppResult<Listing<inbound_activity::Model>> {
    let target_id = query
        .target_id
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::Validation("target_id is required".to_string()))?;

    let activities = state
        .inbox
        .list_for_target(&target_id, clamp_limit(query.limit))
        .await?;
    Ok(Listing::activities(activities))
}

/// Inbox routes.
pub fn router() -> Router<AppState> {
    Router::new().route(INBOX_ENDPOINT, get(list_for_target).post(receive))
}

