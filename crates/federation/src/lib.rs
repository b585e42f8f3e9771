//! Network-facing implementations of the engine's collaborators.
//!
//! - [`client::HttpTransport`] speaks the federation protocol to remote
//!   servers over HTTP.
//! - [`signature`] signs outbound envelopes with the instance key and
//!   verifies inbound ones.
//! - [`identity::DbIdentityDirectory`] reads actor keys, revocations and
//!   user blocks from the identity service's tables.

pub mod client;
pub mod identity;
pub mod signature;

pub use client::HttpTransport;
pub use identity::DbIdentityDirectory;
pub use signature::{RsaSigner, RsaVerifier};
