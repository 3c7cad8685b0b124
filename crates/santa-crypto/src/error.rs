use thiserror::Error;

pub type Result<T> = std::result::Result<T, CryptoError>;

/// Cryptographic failure conditions.
///
/// Callers pattern-match on these instead of parsing messages. Unwrap
/// and decryption failures are *expected* signals in two places (draw
/// resolution and result parsing) and fatal everywhere else.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("decode failed: {0}")]
    DecodeFailed(String),

    #[error("key wrap failed")]
    WrapFailed,

    #[error("key unwrap failed: wrong wrapping key or corrupted data")]
    UnwrapFailed,

    #[error("key export failed: {0}")]
    ExportFailed(String),

    #[error("key import failed: {0}")]
    ImportFailed(String),

    #[error("unwrapped key is not a valid RSA-OAEP-256 public key: {0}")]
    InvalidPublicKey(String),

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("invalid ephemeral value in key exchange")]
    InvalidEphemeral,

    #[error("crypto parameter mismatch: {0}")]
    ParameterMismatch(String),

    #[error("key generation failed: {0}")]
    KeyGeneration(String),
}
