//! The federation engine.
//!
//! [`envelope`] defines what travels between servers. [`services`] holds the
//! engine itself: the outbox publisher and delivery engine on the sending
//! side, the inbox processor and acknowledgment tracker on the receiving
//! side, and the guards (blocklist, rate limiter, capability negotiator,
//! mode controller) both sides consult.

pub mod envelope;
pub mod services;

#[cfg(test)]
mod test_support;

pub use envelope::{
    AckEnvelope, CapabilityDocument, InboxEnvelope, PROTOCOL_VERSION, canonical_bytes,
    canonical_json, normalize_server_url,
};
pub use services::*;
