//! santa-crypto: the cryptographic core of the SuperSanta client
//!
//! Key hierarchy:
//! ```text
//! Group secret ── SRP-6a / PBKDF2 ──> GroupSecretKey (AES-256-GCM, wrap/unwrap only)
//!                                       └── wraps every member's RSA public key
//! User password ─ SRP-6a / PBKDF2 ──> UserPasswordKey (ephemeral)
//!                                       └── wraps the member's RSA private key
//! RSA-2048 keypair (per member)
//!   ├── public:  encrypts the draw result token addressed to this member
//!   └── private: decrypts it; never persisted or transmitted in cleartext
//! ```
//!
//! Neither RSA key ever travels in cleartext: the private key is carried
//! wrapped under the password key, the public key wrapped under the group
//! secret key, which keeps member identities unlinkable at the server.

pub mod asymmetric;
pub mod encoding;
pub mod error;
pub mod pake;
pub mod result_token;
pub mod symmetric;

pub use asymmetric::{generate_keypair, KeyPair, PrivateKey, PublicKey};
pub use encoding::WrappedKey;
pub use error::{CryptoError, Result};
pub use pake::{ChallengeSolution, DerivedVerifier, PakeEngine, PakeParams};
pub use symmetric::{derive_key_from_password, generate_nonce, SecretKey};

/// Size of a symmetric wrapping key in bytes (256-bit AES-GCM).
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit).
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag.
pub const TAG_SIZE: usize = 16;
