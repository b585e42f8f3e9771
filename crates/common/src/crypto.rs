//! RSA signing primitives for federation envelopes.
//!
//! Signatures are RSASSA-PKCS1-v1_5 with SHA-256 over the canonical bytes of
//! an activity payload, encoded as
//! standard base64.
//!
//! # Examples
//!
//! ```
//! use fedinet_common::crypto::{generate_rsa_keypair, parse_private_key, sign_bytes, verify_bytes};
//!
//! let keypair = generate_rsa_keypair().expect("Failed to generate keypair");
//! let private_key = parse_private_key(&keypair.private_key_pem).expect("Failed to parse");
//!
//! let signature = sign_bytes(&private_key, b"{\"a\":1}");
//! assert!(verify_bytes(&keypair.public_key_pem, b"{\"a\":1}", &signature).expect("verify"));
//! ```

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rsa::{
    RsaPrivateKey, RsaPublicKey,
    pkcs1v15::{Signature, SigningKey, VerifyingKey},
    pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding},
    sha2::Sha256,
    signature::{SignatureEncoding, Signer, Verifier},
};
use sha2::{Digest, Sha256 as Sha256Hasher};

use crate::{AppError, AppResult};

/// RSA key pair in PEM format.
#[derive(Debug, Clone)]
pub struct RsaKeypair {
    /// Public key in PEM format (SPKI encoding).
    pub public_key_pem: String,
    /// Private key in PEM format (PKCS#8 encoding).
    pub private_key_pem: String,
}

/// Default RSA key size (2048 bits).
const RSA_KEY_SIZE: usize = 2048;

/// Generate a new 2048-bit RSA key pair.
pub fn generate_rsa_keypair() -> AppResult<RsaKeypair> {
    let mut rng = rand::thread_rng();

    let private_key = RsaPrivateKey::new(&mut rng, RSA_KEY_SIZE)
        .map_err(|e| AppError::Internal(format!("Failed to generate RSA key: {e}")))?;

    let public_key = RsaPublicKey::from(&private_key);

    let private_key_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| AppError::Internal(format!("Failed to encode private key: {e}")))?
        .to_string();

    let public_key_pem = public_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| AppError::Internal(format!("Failed to encode public key: {e}")))?;

    Ok(RsaKeypair {
        public_key_pem,
        private_key_pem,
    })
}

/// Parse a PKCS#8 PEM private key.
pub fn parse_private_key(pem: &str) -> AppResult<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .map_err(|e| AppError::Config(format!("Failed to parse private key: {e}")))
}

/// Parse an SPKI PEM public key.
pub fn parse_public_key(pem: &str) -> AppResult<RsaPublicKey> {
    RsaPublicKey::from_public_key_pem(pem)
        .map_err(|e| AppError::Unauthorized(format!("Failed to parse public key: {e}")))
}

/// Sign `bytes` and return the base64 signature.
#[must_use]
pub fn sign_bytes(private_key: &RsaPrivateKey, bytes: &[u8]) -> String {
    let signing_key = SigningKey::<Sha256>::new(private_key.clone());
    let signature = signing_key.sign(bytes);
    BASE64.encode(signature.to_bytes())
}

/// Verify a base64 signature over `bytes` with an SPKI PEM public key.
///
/// Returns `Ok(false)` for a well-formed signature that does not match, and
/// an `auth` error when the key or signature cannot be decoded.
pub fn verify_bytes(public_key_pem: &str, bytes: &[u8], signature_b64: &str) -> AppResult<bool> {
    let public_key = parse_public_key(public_key_pem)?;

    let sig_bytes = BASE64
        .decode(signature_b64)
        .map_err(|e| AppError::Unauthorized(format!("Invalid signature encoding: {e}")))?;

    let signature = Signature::try_from(sig_bytes.as_slice())
        .map_err(|e| AppError::Unauthorized(format!("Invalid signature format: {e}")))?;

    let verifying_key = VerifyingKey::<Sha256>::new(public_key);
    Ok(verifying_key.verify(bytes, &signature).is_ok())
}

/// Hex-encoded SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256Hasher::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
