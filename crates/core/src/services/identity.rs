//! Identity and cryptography collaborators.
//!
//! Actor keys, key revocations and user-level blocks belong to the identity
//! service; signing and verification belong to the crypto module. The engine
//! only consumes them through these traits.

use async_trait::async_trait;
use fedinet_common::AppResult;

/// Lookups against the identity service.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Current public key (SPKI PEM) of `actor_id`, if the actor is known.
    async fn resolve_public_key(&self, actor_id: &str) -> AppResult<Option<String>>;

    /// Whether `public_key` has been revoked.
    async fn is_key_revoked(&self, public_key: &str) -> AppResult<bool>;

    /// Whether `blocker_id` has blocked `blocked_id`.
    async fn is_user_blocked(&self, blocker_id: &str, blocked_id: &str) -> AppResult<bool>;
}

/// Verifies signatures over canonical activity bytes.
pub trait SignatureVerifier: Send + Sync {
    /// `Ok(false)` for a well-formed signature that does not match.
    fn verify(&self, bytes: &[u8], signature: &str, public_key: &str) -> AppResult<bool>;
}

/// Signs outbound activity bytes with this instance's key.
pub trait ActivitySigner: Send + Sync {
    /// `None` when no signing key is configured.
    fn sign(&self, bytes: &[u8]) -> AppResult<Option<String>>;
}

/// Signer for instances without a key. Envelopes go out unsigned.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpSigner;

impl ActivitySigner for NoOpSigner {
    fn sign(&self, _bytes: &[u8]) -> AppResult<Option<String>> {
        Ok(None)
    }
}
