//! Ed25519 signature verification for wallet login
//!
//! Wallets present detached signatures either as plain hex, as base64, or as
//! a JSON object carrying a `signature` field in one of those encodings. The
//! encoding decision is a fixed two-stage rule so behavior stays
//! reproducible: a non-empty all-hex-digit string decodes as hex, anything
//! else as base64.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::Deserialize;

/// Signature material as submitted by the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SignatureInput {
    /// Raw encoded signature string
    Raw(String),
    /// Structured value carrying the signature, as some wallets emit
    Wrapped { signature: String },
}

impl SignatureInput {
    fn as_str(&self) -> &str {
        match self {
            SignatureInput::Raw(s) => s,
            SignatureInput::Wrapped { signature } => signature,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("Invalid signature encoding")]
    InvalidEncoding,

    #[error("Invalid public key encoding")]
    InvalidKeyEncoding,
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Decode submitted signature material. Hex wins when the string matches the
/// strict hex pattern; everything else decodes as base64.
pub fn decode_signature(input: &SignatureInput) -> Result<Vec<u8>, SignatureError> {
    let s = input.as_str();
    if is_hex(s) {
        hex::decode(s).map_err(|_| SignatureError::InvalidEncoding)
    } else {
        BASE64
            .decode(s)
            .map_err(|_| SignatureError::InvalidEncoding)
    }
}

/// Verify a detached Ed25519 signature over `message`.
///
/// A decode failure is an error; a successful decode that fails
/// cryptographically (including wrong-length key or signature material)
/// verifies `false`.
pub fn verify_ed25519(
    message: &str,
    signature: &SignatureInput,
    public_key_b64: &str,
) -> Result<bool, SignatureError> {
    let sig_bytes = decode_signature(signature)?;
    let key_bytes = BASE64
        .decode(public_key_b64)
        .map_err(|_| SignatureError::InvalidKeyEncoding)?;

    let key_bytes: [u8; 32] = match key_bytes.try_into() {
        Ok(k) => k,
        Err(_) => return Ok(false),
    };
    let key = match VerifyingKey::from_bytes(&key_bytes) {
        Ok(k) => k,
        Err(_) => return Ok(false),
    };
    let sig = match Signature::from_slice(&sig_bytes) {
        Ok(s) => s,
        Err(_) => return Ok(false),
    };

    Ok(key.verify(message.as_bytes(), &sig).is_ok())
}
