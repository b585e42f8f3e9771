//! HTTP surface of the federation engine.
//!
//! - **Endpoints**: inbox, outbox, acknowledgments, discovery, health and
//!   the admin routes for blocks, mode and rate limits
//! - **Extractors**: JSON and query extraction that reports malformed input
//!   in the uniform error envelope
//! - **State**: the engine services shared by every handler
//!
//! [`router`] is meant to be nested under `/federation`.

pub mod endpoints;
pub mod extractors;
pub mod response;
pub mod state;

pub use endpoints::router;
pub use response::FederationResponse;
pub use state::AppState;
