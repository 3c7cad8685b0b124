//! Symmetric key layer: PBKDF2 key stretching and AES-256-GCM wrapping.
//!
//! A `SecretKey` is deliberately narrow: it wraps and unwraps other key
//! material and round-trips through an export encoding, nothing else.
//! There is no general-purpose encrypt API on it, so a session-derived
//! key can never be reused for unrelated plaintext encryption.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::encoding::{b64_decode, b64_encode};
use crate::error::{CryptoError, Result};
use crate::{KEY_SIZE, NONCE_SIZE};

/// A 256-bit AES-GCM wrapping key. Zeroized on drop.
#[derive(Clone)]
pub struct SecretKey {
    bytes: [u8; KEY_SIZE],
}

impl SecretKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Export the raw key through the fixed base64 encoding.
    pub fn export(&self) -> String {
        b64_encode(&self.bytes)
    }

    /// Import a key previously produced by [`SecretKey::export`].
    pub fn import(encoded: &str) -> Result<Self> {
        let mut raw = b64_decode(encoded)
            .map_err(|e| CryptoError::ImportFailed(e.to_string()))?;
        if raw.len() != KEY_SIZE {
            raw.zeroize();
            return Err(CryptoError::ImportFailed(format!(
                "raw key has {} bytes (expected {})",
                raw.len(),
                KEY_SIZE
            )));
        }
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&raw);
        raw.zeroize();
        Ok(Self { bytes })
    }

    /// Wrap (encrypt) key material under this key.
    ///
    /// The nonce must be fresh from [`generate_nonce`] for every call;
    /// nonce reuse with the same key is a correctness bug, not merely a
    /// weakness.
    pub fn wrap(&self, key_material: &[u8], nonce: &[u8; NONCE_SIZE]) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new(self.bytes.as_slice().into());
        cipher
            .encrypt(Nonce::from_slice(nonce), key_material)
            .map_err(|_| CryptoError::WrapFailed)
    }

    /// Unwrap (decrypt) key material. Fails with [`CryptoError::UnwrapFailed`]
    /// when this key does not match the one used to wrap.
    pub fn unwrap(&self, ciphertext: &[u8], nonce: &[u8; NONCE_SIZE]) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new(self.bytes.as_slice().into());
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::UnwrapFailed)
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Stretch a low-entropy secret into a wrapping key.
///
/// PBKDF2-SHA256; deployments keep `iterations` at 300_000+ so offline
/// guessing of a weak secret stays expensive.
pub fn derive_key_from_password(
    password: &SecretString,
    salt: &[u8],
    iterations: u32,
) -> SecretKey {
    let mut out = [0u8; KEY_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha256>(
        password.expose_secret().as_bytes(),
        salt,
        iterations,
        &mut out,
    );
    SecretKey::from_bytes(out)
}

/// Fresh 96-bit nonce for a single wrap operation.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;

    // Fast KDF for tests only; production uses ClientConfig's floor.
    const TEST_ITERS: u32 = 1_000;

    fn test_key() -> SecretKey {
        SecretKey::from_bytes([42u8; KEY_SIZE])
    }

    #[test]
    fn test_kdf_deterministic() {
        let password = SecretString::from("group-secret");
        let k1 = derive_key_from_password(&password, b"salt-bytes", TEST_ITERS);
        let k2 = derive_key_from_password(&password, b"salt-bytes", TEST_ITERS);
        assert_eq!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_kdf_salt_sensitivity() {
        let password = SecretString::from("group-secret");
        let k1 = derive_key_from_password(&password, b"salt-a", TEST_ITERS);
        let k2 = derive_key_from_password(&password, b"salt-b", TEST_ITERS);
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let key = test_key();
        let nonce = generate_nonce();
        let material = b"some key material";

        let wrapped = key.wrap(material, &nonce).unwrap();
        let unwrapped = key.unwrap(&wrapped, &nonce).unwrap();
        assert_eq!(unwrapped, material);
    }

    #[test]
    fn test_unwrap_wrong_key_fails() {
        let k1 = SecretKey::from_bytes([1u8; KEY_SIZE]);
        let k2 = SecretKey::from_bytes([2u8; KEY_SIZE]);
        let nonce = generate_nonce();

        let wrapped = k1.wrap(b"material", &nonce).unwrap();
        assert!(matches!(
            k2.unwrap(&wrapped, &nonce),
            Err(CryptoError::UnwrapFailed)
        ));
    }

    #[test]
    fn test_unwrap_wrong_nonce_fails() {
        let key = test_key();
        let wrapped = key.wrap(b"material", &[1u8; NONCE_SIZE]).unwrap();
        assert!(matches!(
            key.unwrap(&wrapped, &[2u8; NONCE_SIZE]),
            Err(CryptoError::UnwrapFailed)
        ));
    }

    #[test]
    fn test_export_import_roundtrip() {
        let key = test_key();
        let imported = SecretKey::import(&key.export()).unwrap();
        assert_eq!(imported.as_bytes(), key.as_bytes());
    }

    #[test]
    fn test_import_rejects_wrong_length() {
        let encoded = b64_encode(&[0u8; 16]);
        assert!(matches!(
            SecretKey::import(&encoded),
            Err(CryptoError::ImportFailed(_))
        ));
    }

    #[test]
    fn test_import_rejects_bad_encoding() {
        assert!(matches!(
            SecretKey::import("not!!base64"),
            Err(CryptoError::ImportFailed(_))
        ));
    }

    #[test]
    fn test_nonces_are_unique() {
        let a = generate_nonce();
        let b = generate_nonce();
        assert_ne!(a, b);
    }
}
