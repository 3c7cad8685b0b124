//! Anonymous draw orchestration.
//!
//! The organizer side of the protocol: pull every member's wrapped
//! public key (server-shuffled, identities stripped), unwrap them with
//! the group secret key, rotate the list by a uniform non-zero shift and
//! hand the cleartext keys back. The server pairs position i of its
//! retained identity order with rotated key i and encrypts each giver's
//! name to it, so neither party alone learns the assignment.
//!
//! The participant side resolves a result by probing every ciphertext;
//! exactly one must decrypt under this member's private key.

use async_trait::async_trait;
use rand::Rng;

use crate::error::{GroupError, SantaError};
use crate::identity::IdentityContext;
use santa_crypto::CryptoError;

/// A valid assignment needs at least 3 members; with 2 the cyclic
/// rotation is a mutual swap and both assignments are deducible.
pub const MIN_PARTICIPANTS: usize = 3;

/// Server operations the draw needs. `GroupApi` is the live
/// implementation; tests drive the protocol with an in-memory fake.
#[async_trait]
pub trait DrawTransport {
    /// Phase 1: wrapped public keys in server-chosen random order.
    async fn fetch_wrapped_keys(&self) -> Result<Vec<String>, GroupError>;

    /// Phase 3 upload: the rotated cleartext JWKs.
    async fn submit_shuffled_keys(&self, public_keys: Vec<String>) -> Result<(), GroupError>;
}

/// Cyclic rotation moving every element `shift` positions forward, so
/// the key that sat at index i ends up at index i + shift mod len.
///
/// For any `shift` in `[1, len)` no element stays at its index, which is
/// exactly the no-self-assignment guarantee of the draw.
pub fn rotate<T>(mut items: Vec<T>, shift: usize) -> Vec<T> {
    if !items.is_empty() {
        let shift = shift % items.len();
        items.rotate_right(shift);
    }
    items
}

/// Uniform shift in `[1, n)`; never 0, so identity permutations cannot
/// occur.
fn random_shift(n: usize) -> usize {
    rand::thread_rng().gen_range(1..n)
}

/// Run the organizer's side of the draw.
///
/// Aborts with `BadDraw` if any wrapped key fails to unwrap or validate;
/// a corrupted key must stop the draw rather than produce an undeliverable
/// assignment.
pub async fn run_draw(
    transport: &(impl DrawTransport + ?Sized),
    identity: &IdentityContext,
) -> Result<(), SantaError> {
    let wrapped = transport.fetch_wrapped_keys().await?;
    if wrapped.len() < MIN_PARTICIPANTS {
        return Err(GroupError::NotEnoughParticipants.into());
    }

    let mut keys = Vec::with_capacity(wrapped.len());
    for token in &wrapped {
        let key = identity.decrypt_public_key(token).map_err(|e| match e {
            crate::identity::IdentityError::Crypto(
                c @ (CryptoError::UnwrapFailed
                | CryptoError::InvalidPublicKey(_)
                | CryptoError::DecodeFailed(_)),
            ) => SantaError::BadDraw(c),
            other => SantaError::Identity(other),
        })?;
        keys.push(key.to_jwk());
    }

    let shifted = rotate(keys, random_shift(wrapped.len()));
    transport.submit_shuffled_keys(shifted).await?;
    Ok(())
}

/// Resolve this member's draw result from the group's ciphertext list.
///
/// `Ok(None)` means the draw has not run yet (empty list). On a
/// non-empty list exactly one entry must decrypt; when none does the
/// member cannot have a recipient and the draw itself is bad.
pub fn parse_result(
    identity: &IdentityContext,
    results: &[String],
) -> Result<Option<String>, SantaError> {
    if results.is_empty() {
        return Ok(None);
    }

    for ciphertext in results {
        if let Some(name) = identity.try_decrypt_result(ciphertext)? {
            return Ok(Some(name));
        }
    }
    Err(SantaError::BadResult)
}
