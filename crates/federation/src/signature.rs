//! RSA signing and verification of activity payloads.

use std::path::Path;

use fedinet_common::{AppError, AppResult, crypto};
use fedinet_core::{ActivitySigner, SignatureVerifier};
use rsa::RsaPrivateKey;

/// Signs with this instance's private key.
#[derive(Clone)]
pub struct RsaSigner {
    private_key: RsaPrivateKey,
}

impl RsaSigner {
    /// Signer for a PKCS#8 PEM private key.
    pub fn from_pem(pem: &str) -> AppResult<Self> {
        Ok(Self {
            private_key: crypto::parse_private_key(pem)?,
        })
    }

    /// Read the key from `path`.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let pem = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read signing key {}: {e}", path.display()))
        })?;
        Self::from_pem(&pem)
    }
}

impl ActivitySigner for RsaSigner {
    fn sign(&self, bytes: &[u8]) -> AppResult<Option<String>> {
        Ok(Some(crypto::sign_bytes(&self.private_key, bytes)))
    }
}

/// RSA PKCS#1 v1.5 / SHA-256 verifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct RsaVerifier;

impl SignatureVerifier for RsaVerifier {
    fn verify(&self, bytes: &[u8], signature: &str, public_key: &str) -> AppResult<bool> {
        crypto::verify_bytes(public_key, bytes, signature)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use fedinet_common::generate_rsa_keypair;
    use fedinet_core::canonical_bytes;
    use serde_json::json;

    #[test]
    fn test_signature_survives_key_reordering() {
        let keypair = generate_rsa_keypair().unwrap();
        let signer = RsaSigner::from_pem(&keypair.private_key_pem).unwrap();

        let sent = json!({"object": "alice", "type": "Follow"});
        let received = json!({"type": "Follow", "object": "alice"});
        let signature = signer.sign(&canonical_bytes(&sent)).unwrap().unwrap();

        assert!(
            RsaVerifier
                .verify(&canonical_bytes(&received), &signature, &keypair.public_key_pem)
                .unwrap()
        );
    }

    #[test]
    fn test_tampered_payload_fails() {
        let keypair = generate_rsa_keypair().unwrap();
        let signer = RsaSigner::from_pem(&keypair.private_key_pem).unwrap();
        let signature = signer
            .sign(&canonical_bytes(&json!({"object": "alice"})))
            .unwrap()
            .unwrap();

        let valid = RsaVerifier
            .verify(
                &canonical_bytes(&json!({"object": "mallory"})),
                &signature,
                &keypair.public_key_pem,
            )
            .unwrap();

        assert!(!valid);
    }

    #[test]
    fn test_missing_key_file() {
        let result = RsaSigner::from_file("/nonexistent/fedinet.pem");
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
