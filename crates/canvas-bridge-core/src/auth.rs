//! Challenge-response handshake.
//!
//! The bridge sends a single-use nonce; the peer proves it holds the shared
//! secret by answering with `hex(HMAC-SHA256(secret, nonce))`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Nonce size in bytes before hex encoding.
pub const NONCE_LEN: usize = 16;

/// The secret shared between the bridge and every legitimate peer.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret(String);

impl SharedSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Compute `hex(HMAC-SHA256(secret, nonce))`.
    pub fn sign(&self, nonce: &str) -> Result<String, AuthError> {
        let mut mac =
            HmacSha256::new_from_slice(self.0.as_bytes()).map_err(|_| AuthError::InvalidKey)?;
        mac.update(nonce.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

/// A per-connection challenge value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nonce(String);

impl Nonce {
    /// Draw a fresh nonce from the OS random source.
    pub fn generate() -> Result<Self, AuthError> {
        let mut bytes = [0u8; NONCE_LEN];
        getrandom::fill(&mut bytes).map_err(|e| AuthError::Entropy(e.to_string()))?;
        Ok(Self(hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check a peer's answer to this challenge.
    ///
    /// Plain string equality against the lowercase hex digest.
    pub fn verify(&self, secret: &SharedSecret, hash: &str) -> Result<bool, AuthError> {
        Ok(secret.sign(&self.0)? == hash)
    }
}

impl From<String> for Nonce {
    fn from(nonce: String) -> Self {
        Self(nonce)
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Failure to produce or check a handshake value.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("failed to gather entropy for nonce: {0}")]
    Entropy(String),
    #[error("shared secret cannot be used as an HMAC key")]
    InvalidKey,
}
