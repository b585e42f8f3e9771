//! Acknowledgment endpoint.

use axum::{Router, extract::State, routing::post};
use fedinet_common::AppResult;
use fedinet_core::{AckOutcome, RecordAckInput};
use fedinet_db::entities::acknowledgment;

use crate::{extractors::ApiJson, response::FederationResponse, state::AppState};

/// Record a remote server's acknowledgment of one of our activities.
async fn record(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<RecordAckInput>,
) -> AppResult<FederationResponse<acknowledgment::Model>> {
    let response = match state.acks.record_ack(input).await? {
        AckOutcome::Recorded(ack) => FederationResponse::ok("Acknowledgment recorded", ack),
        AckOutcome::Duplicate => FederationResponse {
            success: true,
            message: "Acknowledgment already recorded".to_string(),
            data: None,
        },
    };
    Ok(response)
}

/// Acknowledgment routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/ack", post(record))
}
