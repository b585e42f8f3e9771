//! API response types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Success envelope. Errors use the [`fedinet_common::AppError`] envelope.
#[derive(Debug, Serialize)]
pub struct FederationResponse<T: Serialize> {
    /// Whether the request succeeded.
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
    /// Response payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> FederationResponse<T> {
    /// Create a success response carrying `data`.
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl FederationResponse<()> {
    /// Create a success response without data.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for FederationResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// `201 Created` with a JSON body.
#[derive(Debug)]
pub struct Created<T>(pub T);

impl<T: Serialize> IntoResponse for Created<T> {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self.0)).into_response()
    }
}

/// A list response, `{<key>: [...], count}`.
#[derive(Debug, Serialize)]
pub struct Listing<T: Serialize> {
    #[serde(flatten)]
    items: ListingItems<T>,
    count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum ListingItems<T> {
    Activities(Vec<T>),
    Attempts(Vec<T>),
    Blocks(Vec<T>),
}

impl<T: Serialize> Listing<T> {
    /// List under an `activities` key.
    pub fn activities(items: Vec<T>) -> Self {
        Self {
            count: items.len(),
            items: ListingItems::Activities(items),
        }
    }

    /// List under an `attempts` key.
    pub fn attempts(items: Vec<T>) -> Self {
        Self {
            count: items.len(),
            items: ListingItems::Attempts(items),
        }
    }

    /// List under a `blocks` key.
    pub fn blocks(items: Vec<T>) -> Self {
        Self {
            count: items.len(),
            items: ListingItems::Blocks(items),
        }
    }
}

impl<T: Serialize> IntoResponse for Listing<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_listing_uses_named_key() {
        let listing = Listing::attempts(vec![1, 2]);

        assert_eq!(
            serde_json::to_value(&listing).unwrap(),
            json!({"attempts": [1, 2], "count": 2})
        );
    }

    #[test]
    fn test_message_only_response_omits_data() {
        let response = FederationResponse::message("Server unblocked");

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"success": true, "message": "Server unblocked"})
        );
    }
}
