//! Draw result tokens: compact JWE (RFC 7516), RSA-OAEP-256 + A256GCM.
//!
//! Each draw assignment is the recipient identifier encrypted to one
//! participant's public key as a self-describing five-segment token:
//!
//! `b64url(header) . b64url(wrapped CEK) . b64url(iv) . b64url(ct) . b64url(tag)`
//!
//! Every participant probes every token in the distributed list;
//! exactly one decrypts. A decryption failure is therefore the normal
//! "not addressed to me" signal, not a fault.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::asymmetric::{PrivateKey, PublicKey};
use crate::encoding::{b64url_decode, b64url_encode};
use crate::error::{CryptoError, Result};
use crate::{NONCE_SIZE, TAG_SIZE};

const ALG: &str = "RSA-OAEP-256";
const ENC: &str = "A256GCM";
const CEK_SIZE: usize = 32;

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    enc: String,
}

/// Encrypt `plaintext` to `recipient` as a compact JWE token.
pub fn encrypt(recipient: &PublicKey, plaintext: &[u8]) -> Result<String> {
    let header = Header {
        alg: ALG.into(),
        enc: ENC.into(),
    };
    let header_b64 = b64url_encode(
        serde_json::to_string(&header)
            .map_err(|_| CryptoError::EncryptionFailed)?
            .as_bytes(),
    );

    let mut cek = [0u8; CEK_SIZE];
    rand::thread_rng().fill_bytes(&mut cek);
    let wrapped_cek = recipient.encrypt(&cek)?;

    let mut iv = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);

    let cipher = Aes256Gcm::new(cek.as_slice().into());
    let sealed = cipher
        .encrypt(
            Nonce::from_slice(&iv),
            Payload {
                msg: plaintext,
                aad: header_b64.as_bytes(),
            },
        )
        .map_err(|_| CryptoError::EncryptionFailed)?;
    cek.zeroize();

    // aes-gcm appends the tag; JWE carries it as its own segment
    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_SIZE);

    Ok(format!(
        "{}.{}.{}.{}.{}",
        header_b64,
        b64url_encode(&wrapped_cek),
        b64url_encode(&iv),
        b64url_encode(ciphertext),
        b64url_encode(tag),
    ))
}

/// Decrypt a compact JWE token with `key`.
///
/// Returns `DecodeFailed`/`ParameterMismatch` for malformed or
/// foreign-algorithm tokens, `DecryptionFailed` when the token is well
/// formed but not addressed to this key.
pub fn decrypt(key: &PrivateKey, token: &str) -> Result<Vec<u8>> {
    let segments: Vec<&str> = token.split('.').collect();
    let [header_b64, cek_b64, iv_b64, ct_b64, tag_b64]: [&str; 5] = segments
        .try_into()
        .map_err(|_| CryptoError::DecodeFailed("JWE token must have 5 segments".into()))?;

    let header: Header = serde_json::from_slice(&b64url_decode(header_b64)?)
        .map_err(|e| CryptoError::DecodeFailed(format!("JWE header: {e}")))?;
    if header.alg != ALG || header.enc != ENC {
        return Err(CryptoError::ParameterMismatch(format!(
            "unsupported JWE algorithms {}/{}",
            header.alg, header.enc
        )));
    }

    let wrapped_cek = b64url_decode(cek_b64)?;
    let iv = b64url_decode(iv_b64)?;
    if iv.len() != NONCE_SIZE {
        return Err(CryptoError::DecodeFailed(format!(
            "JWE iv has {} bytes (expected {})",
            iv.len(),
            NONCE_SIZE
        )));
    }

    let mut cek = key.decrypt(&wrapped_cek)?;
    if cek.len() != CEK_SIZE {
        cek.zeroize();
        return Err(CryptoError::DecryptionFailed);
    }

    let mut sealed = b64url_decode(ct_b64)?;
    sealed.extend_from_slice(&b64url_decode(tag_b64)?);

    let cipher = Aes256Gcm::new(cek.as_slice().into());
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(&iv),
            Payload {
                msg: &sealed,
                aad: header_b64.as_bytes(),
            },
        )
        .map_err(|_| CryptoError::DecryptionFailed);
    cek.zeroize();
    plaintext
}
