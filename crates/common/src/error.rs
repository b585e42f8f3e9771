//! Error types for fedinet.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
///
/// Variants map one-to-one onto the error `type` strings returned to remote
/// servers and operators, see [`AppError::error_type`].
#[derive(Debug, Error)]
pub enum AppError {
    // === Client Errors ===
    /// Malformed or invalid input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or invalid signature.
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// The remote server is blocked.
    #[error("Server is blocked: {0}")]
    ServerBlocked(String),

    /// The target user blocked the actor.
    #[error("Actor is blocked by target: {0}")]
    ActorBlocked(String),

    /// Request budget spent.
    #[error("Rate limit exceeded for {0}")]
    RateLimited(String),

    /// Protocol violation or capability mismatch.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Capabilities could not be fetched.
    #[error("Capability discovery failed: {0}")]
    DiscoveryFailed(String),

    /// No such record.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflicting concurrent update.
    #[error("Conflict: {0}")]
    Conflict(String),

    // === Server Errors ===
    /// Storage failure.
    #[error("Database error: {0}")]
    Database(String),

    /// Outbound HTTP failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            // 4xx Client Errors
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::ServerBlocked(_) | Self::ActorBlocked(_) | Self::Protocol(_) => {
                StatusCode::FORBIDDEN
            }
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::DiscoveryFailed(_) => StatusCode::BAD_GATEWAY,

            // 5xx Server Errors
            Self::Database(_) | Self::Transport(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error type reported in the `error.type` field.
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Unauthorized(_) => "auth",
            Self::ServerBlocked(_) => "server_blocked",
            Self::ActorBlocked(_) => "actor_blocked",
            Self::RateLimited(_) => "rate_limit",
            Self::Protocol(_) => "protocol",
            Self::DiscoveryFailed(_) => "discovery_failed",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Database(_) | Self::Transport(_) | Self::Config(_) | Self::Internal(_) => {
                "internal"
            }
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Terminal errors are never retried by the delivery engine.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::Unauthorized(_)
                | Self::ServerBlocked(_)
                | Self::ActorBlocked(_)
                | Self::Protocol(_)
        )
    }

    /// Returns the human-readable message without the variant prefix.
    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            Self::Validation(m)
            | Self::Unauthorized(m)
            | Self::ServerBlocked(m)
            | Self::ActorBlocked(m)
            | Self::RateLimited(m)
            | Self::Protocol(m)
            | Self::DiscoveryFailed(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::Database(m)
            | Self::Transport(m)
            | Self::Config(m)
            | Self::Internal(m) => m,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_type = self.error_type();

        if self.is_server_error() {
            tracing::error!(error = %self, error_type, "Server error occurred");
        } else {
            tracing::debug!(error = %self, error_type, "Client error occurred");
        }

        // Internal details stay in the log, not on the wire.
        let (message, details) = if self.is_server_error() {
            ("Internal server error".to_string(), None)
        } else {
            (self.to_string(), Some(self.detail().to_string()))
        };

        let body = Json(json!({
            "success": false,
            "error": {
                "code": status.as_u16(),
                "type": error_type,
                "message": message,
                "details": details,
            }
        }));

        (status, body).into_response()
    }
}

// === From implementations ===

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("invalid JSON: {err}"))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_taxonomy() {
        assert_eq!(
            AppError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::ServerBlocked("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::RateLimited("x".into()).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::Database("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_types() {
        assert_eq!(AppError::Unauthorized("x".into()).error_type(), "auth");
        assert_eq!(AppError::RateLimited("x".into()).error_type(), "rate_limit");
        assert_eq!(AppError::Transport("x".into()).error_type(), "internal");
        assert_eq!(
            AppError::DiscoveryFailed("x".into()).error_type(),
            "discovery_failed"
        );
    }

    #[test]
    fn test_terminal_errors() {
        assert!(AppError::ServerBlocked("x".into()).is_terminal());
        assert!(AppError::Protocol("x".into()).is_terminal());
        assert!(!AppError::Transport("x".into()).is_terminal());
        assert!(!AppError::RateLimited("x".into()).is_terminal());
    }
}
