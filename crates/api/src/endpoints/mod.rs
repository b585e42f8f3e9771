//! API endpoints.

mod ack;
mod admin;
mod capabilities;
mod health;
mod inbox;
mod outbox;

use axum::Router;

use crate::state::AppState;

const DEFAULT_LIMIT: u64 = 50;
const MAX_LIMIT: u64 = 200;

const fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

const fn clamp_limit(limit: u64) -> u64 {
    if limit == 0 {
        DEFAULT_LIMIT
    } else if limit > MAX_LIMIT {
        MAX_LIMIT
    } else {
        limit
    }
}

/// Create the federation router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(inbox::router())
        .merge(outbox::router())
        .merge(ack::router())
        .merge(capabilities::router())
        .merge(health::router())
        .nest("/admin", admin::router())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(0), 50);
        assert_eq!(clamp_limit(10), 10);
        assert_eq!(clamp_limit(5_000), 200);
    }
}
