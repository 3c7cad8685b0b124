//! Byte/string encodings shared by the crypto layers.
//!
//! Wire formats are fixed for interop:
//! - wrapped key token: `base64(nonce) + "." + base64(ciphertext)`
//! - SRP values: lowercase hex
//! - JWK fields and JWE segments: base64url without padding

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;

use crate::error::{CryptoError, Result};
use crate::NONCE_SIZE;

pub fn b64_encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub fn b64_decode(s: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(s)
        .map_err(|e| CryptoError::DecodeFailed(format!("base64: {e}")))
}

pub fn b64url_encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

pub fn b64url_decode(s: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| CryptoError::DecodeFailed(format!("base64url: {e}")))
}

pub fn hex_decode(s: &str) -> Result<Vec<u8>> {
    hex::decode(s).map_err(|e| CryptoError::DecodeFailed(format!("hex: {e}")))
}

/// An opaque wrapped-key blob: a fresh nonce plus the AES-GCM
/// ciphertext of the wrapped key material, carried as one encoded token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedKey {
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
}

impl WrappedKey {
    /// Encode as `base64(nonce) + "." + base64(ciphertext)`.
    pub fn encode(&self) -> String {
        format!("{}.{}", b64_encode(&self.nonce), b64_encode(&self.ciphertext))
    }

    pub fn decode(token: &str) -> Result<Self> {
        let (nonce_b64, ct_b64) = token.split_once('.').ok_or_else(|| {
            CryptoError::DecodeFailed("wrapped key token missing separator".into())
        })?;

        let nonce_bytes = b64_decode(nonce_b64)?;
        let nonce: [u8; NONCE_SIZE] = nonce_bytes.as_slice().try_into().map_err(|_| {
            CryptoError::DecodeFailed(format!(
                "wrapped key nonce has {} bytes (expected {})",
                nonce_bytes.len(),
                NONCE_SIZE
            ))
        })?;

        Ok(Self {
            nonce,
            ciphertext: b64_decode(ct_b64)?,
        })
    }
}
