//! Outbound activity endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use fedinet_common::{AppError, AppResult};
use fedinet_core::PublishInput;
use fedinet_db::entities::{delivery_attempt, outbound_activity};
use serde::{Deserialize, Serialize};

use super::{clamp_limit, default_limit};
use crate::{
    extractors::{ApiJson, ApiQuery},
    response::{Created, Listing},
    state::AppState,
};

#[derive(Debug, Deserialize)]
struct ListOutboxQuery {
    actor_id: Option<String>,
    #[serde(default = "default_limit")]
    limit: u64,
}

/// Response for a newly published activity.
#[derive(Debug, Serialize)]
pub struct SendResponse {
    /// Id of the new outbound activity.
    pub activity_id: String,
}

/// Publish an activity; delivery happens in the background.
async fn send(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<PublishInput>,
) -> AppResult<Created<SendResponse>> {
    let activity = state.outbox.publish(input).await?;
    Ok(Created(SendResponse {
        activity_id: activity.id,
    }))
}

async fn list_by_actor(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListOutboxQuery>,
) -> AppResult<Listing<outbound_activity::Model>> {
    let actor_id = query
        .actor_id
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| AppError::Validation("actor_id is required".to_string()))?;

    let activities = state
        .outbox
        .list_by_actor(&actor_id, clamp_limit(query.limit))
        .await?;
    Ok(Listing::activities(activities))
}

async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<outbound_activity::Model>> {
    Ok(Json(state.outbox.find(&id).await?))
}

/// Attempt audit trail of one activity.
async fn attempts(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Listing<delivery_attempt::Model>> {
    state.outbox.find(&id).await?;
    let attempts = state.delivery.attempts_for(&id).await?;
    Ok(Listing::attempts(attempts))
}

/// Outbox routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/send", post(send))
        .route("/outbox", get(list_by_actor))
        .route("/outbox/{id}", get(show))
        .route("/outbox/{id}/attempts", get(attempts))
}
