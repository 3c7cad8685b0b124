//! Asymmetric key manager: RSA-2048 keypairs, JWK serialization and
//! wrapping under a symmetric key.
//!
//! Key material travels as JWK JSON (`kty: "RSA"`, `alg: "RSA-OAEP-256"`)
//! and is always wrapped before it leaves the process: the private key
//! under the user's password key, the public key under the group secret
//! key. An unwrap under the wrong key fails with `UnwrapFailed`; an
//! unwrap that succeeds but does not deserialize as an RSA-OAEP-256
//! public key fails with `InvalidPublicKey`, which is how a stale or
//! foreign group secret is detected.

use num_bigint::{BigInt, BigUint, ModInverse, Sign};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::encoding::{b64url_decode, b64url_encode, WrappedKey};
use crate::error::{CryptoError, Result};
use crate::symmetric::{generate_nonce, SecretKey};

pub const MODULUS_BITS: usize = 2048;

const JWK_KTY: &str = "RSA";
const JWK_ALG: &str = "RSA-OAEP-256";

/// RSA public half; encrypt-only.
#[derive(Debug, Clone)]
pub struct PublicKey(RsaPublicKey);

/// RSA private half; decrypt-only. Never transmitted or persisted in
/// cleartext.
#[derive(Clone)]
pub struct PrivateKey(RsaPrivateKey);

pub struct KeyPair {
    pub public: PublicKey,
    pub private: PrivateKey,
}

/// Generate a fresh RSA-2048 keypair for a new member.
pub fn generate_keypair() -> Result<KeyPair> {
    let mut rng = rand::thread_rng();
    let private = RsaPrivateKey::new(&mut rng, MODULUS_BITS)
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
    let public = RsaPublicKey::from(&private);
    Ok(KeyPair {
        public: PublicKey(public),
        private: PrivateKey(private),
    })
}

/// Wrap serialized key material (JWK JSON) under a symmetric key with a
/// fresh nonce.
pub fn wrap_key(jwk_json: &str, wrapping_key: &SecretKey) -> Result<WrappedKey> {
    let nonce = generate_nonce();
    let ciphertext = wrapping_key.wrap(jwk_json.as_bytes(), &nonce)?;
    Ok(WrappedKey { nonce, ciphertext })
}

/// Unwrap and validate a public key.
pub fn unwrap_public(wrapped: &WrappedKey, wrapping_key: &SecretKey) -> Result<PublicKey> {
    let mut plaintext = wrapping_key.unwrap(&wrapped.ciphertext, &wrapped.nonce)?;
    let parsed = PublicKey::from_jwk_bytes(&plaintext);
    plaintext.zeroize();
    parsed
}

/// Unwrap and install a private key.
pub fn unwrap_private(wrapped: &WrappedKey, wrapping_key: &SecretKey) -> Result<PrivateKey> {
    let mut plaintext = wrapping_key.unwrap(&wrapped.ciphertext, &wrapped.nonce)?;
    let parsed = PrivateKey::from_jwk_bytes(&plaintext);
    plaintext.zeroize();
    parsed
}

#[derive(Debug, Serialize, Deserialize)]
struct Jwk {
    kty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    alg: Option<String>,
    n: String,
    e: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    d: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    p: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    q: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dq: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    qi: Option<String>,
}

fn uint_to_field(x: &BigUint) -> String {
    b64url_encode(&x.to_bytes_be())
}

fn field_to_uint(field: &str) -> Result<BigUint> {
    Ok(BigUint::from_bytes_be(&b64url_decode(field)?))
}

impl PublicKey {
    /// Serialize as JWK JSON, the wire format for draw submissions.
    pub fn to_jwk(&self) -> String {
        let jwk = Jwk {
            kty: JWK_KTY.into(),
            alg: Some(JWK_ALG.into()),
            n: uint_to_field(self.0.n()),
            e: uint_to_field(self.0.e()),
            d: None,
            p: None,
            q: None,
            dp: None,
            dq: None,
            qi: None,
        };
        serde_json::to_string(&jwk).unwrap_or_else(|_| unreachable!("JWK fields are plain strings"))
    }

    /// Parse and validate a JWK as an RSA-OAEP-256 public key.
    pub fn from_jwk(json: &str) -> Result<Self> {
        Self::from_jwk_bytes(json.as_bytes())
    }

    fn from_jwk_bytes(json: &[u8]) -> Result<Self> {
        let jwk: Jwk = serde_json::from_slice(json)
            .map_err(|e| CryptoError::InvalidPublicKey(format!("not a JWK: {e}")))?;

        if jwk.kty != JWK_KTY {
            return Err(CryptoError::InvalidPublicKey(format!(
                "unexpected key type {:?}",
                jwk.kty
            )));
        }
        if let Some(alg) = &jwk.alg {
            if alg != JWK_ALG {
                return Err(CryptoError::InvalidPublicKey(format!(
                    "unexpected algorithm {alg:?}"
                )));
            }
        }

        let n = field_to_uint(&jwk.n)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        let e = field_to_uint(&jwk.e)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;

        let key = RsaPublicKey::new(n, e)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Ok(Self(key))
    }

    /// RSA-OAEP-SHA256 encryption, used only by the result-token codec.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut rng = rand::thread_rng();
        self.0
            .encrypt(&mut rng, Oaep::new::<Sha256>(), plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)
    }
}

impl PrivateKey {
    /// Serialize as a full private JWK, including the CRT components.
    pub fn to_jwk(&self) -> Result<String> {
        let primes = self.0.primes();
        if primes.len() != 2 {
            return Err(CryptoError::ExportFailed(format!(
                "expected 2 primes, key has {}",
                primes.len()
            )));
        }
        let (p, q) = (&primes[0], &primes[1]);
        let d = self.0.d();
        let one = BigUint::from(1u32);
        let dp = d % (p - &one);
        let dq = d % (q - &one);
        let qi = crt_coefficient(p, q)?;

        let jwk = Jwk {
            kty: JWK_KTY.into(),
            alg: Some(JWK_ALG.into()),
            n: uint_to_field(self.0.n()),
            e: uint_to_field(self.0.e()),
            d: Some(uint_to_field(d)),
            p: Some(uint_to_field(p)),
            q: Some(uint_to_field(q)),
            dp: Some(uint_to_field(&dp)),
            dq: Some(uint_to_field(&dq)),
            qi: Some(uint_to_field(&qi)),
        };
        serde_json::to_string(&jwk).map_err(|e| CryptoError::ExportFailed(e.to_string()))
    }

    pub fn from_jwk(json: &str) -> Result<Self> {
        Self::from_jwk_bytes(json.as_bytes())
    }

    fn from_jwk_bytes(json: &[u8]) -> Result<Self> {
        let jwk: Jwk = serde_json::from_slice(json)
            .map_err(|e| CryptoError::ImportFailed(format!("not a JWK: {e}")))?;

        if jwk.kty != JWK_KTY {
            return Err(CryptoError::ImportFailed(format!(
                "unexpected key type {:?}",
                jwk.kty
            )));
        }

        let missing = || CryptoError::ImportFailed("private JWK missing d/p/q".into());
        let d = jwk.d.as_deref().ok_or_else(missing)?;
        let p = jwk.p.as_deref().ok_or_else(missing)?;
        let q = jwk.q.as_deref().ok_or_else(missing)?;

        let imp = |e: CryptoError| CryptoError::ImportFailed(e.to_string());
        let n = field_to_uint(&jwk.n).map_err(imp)?;
        let e = field_to_uint(&jwk.e).map_err(imp)?;
        let d = field_to_uint(d).map_err(imp)?;
        let p = field_to_uint(p).map_err(imp)?;
        let q = field_to_uint(q).map_err(imp)?;

        let mut key = RsaPrivateKey::from_components(n, e, d, vec![p, q])
            .map_err(|e| CryptoError::ImportFailed(e.to_string()))?;
        key.validate()
            .map_err(|e| CryptoError::ImportFailed(e.to_string()))?;
        key.precompute()
            .map_err(|e| CryptoError::ImportFailed(e.to_string()))?;
        Ok(Self(key))
    }

    /// RSA-OAEP-SHA256 decryption. Failure here is an expected signal
    /// when probing ciphertexts not addressed to this key.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.0
            .decrypt(Oaep::new::<Sha256>(), ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)
    }

    pub fn public(&self) -> PublicKey {
        PublicKey(RsaPublicKey::from(&self.0))
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// qi = q^-1 mod p, normalized into [0, p).
fn crt_coefficient(p: &BigUint, q: &BigUint) -> Result<BigUint> {
    let mut qi = q
        .clone()
        .mod_inverse(p)
        .ok_or_else(|| CryptoError::ExportFailed("primes are not coprime".into()))?;
    if qi.sign() == Sign::Minus {
        qi += BigInt::from(p.clone());
    }
    qi.to_biguint()
        .ok_or_else(|| CryptoError::ExportFailed("negative CRT coefficient".into()))
}
