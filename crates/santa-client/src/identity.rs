//! Cryptographic identity context.
//!
//! One instance per session, exclusively owning the live group secret
//! key and the user's private key. State machine:
//!
//! ```text
//! Empty ──create/install secret key──> GroupAuthenticated
//!       ──create user keys / import private key──> Complete
//!       ──clear──> Empty
//! ```
//!
//! `create_secret_key` and `create_user_keys` fail closed with
//! `Overwrite` when the target key already exists, so a racing second
//! call can never silently replace live key material.

use std::sync::Arc;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use santa_core::{Storage, StorageError};
use santa_crypto::{
    asymmetric, result_token, CryptoError, PakeEngine, PrivateKey, PublicKey, SecretKey,
    WrappedKey,
};

/// Well-known storage key for the persisted identity blob.
pub const IDENTITY_STORAGE_KEY: &str = "crypto_context";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("refusing to overwrite existing key material; clear the context first")]
    Overwrite,

    #[error("group secret key missing: authenticate to the group first")]
    MissingSecretKey,

    #[error("identity incomplete: private key not installed")]
    Incomplete,

    #[error("no persisted identity found")]
    NotFound,

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Registration material for a new group, produced once at
/// secret-set time. The verifier is stored server-side and is not
/// reversible to the secret.
#[derive(Debug)]
pub struct GroupRegistration {
    /// `verifier_hex + "." + salt_hex`
    pub secret_verifier: String,
}

/// Registration material for a new member: the password verifier plus
/// the two wrapped halves of the fresh keypair. Nothing in here reveals
/// key material to the server.
#[derive(Debug)]
pub struct UserRegistration {
    pub password_verifier: String,
    /// Public key wrapped under the group secret key.
    pub public_key_secret: String,
    /// Private key wrapped under the password-derived key.
    pub private_key_encrypted: String,
}

#[derive(Serialize, Deserialize)]
struct PersistedIdentity {
    secret_key: String,
    private_key: String,
}

pub struct IdentityContext {
    engine: PakeEngine,
    secret_key: Option<SecretKey>,
    private_key: Option<PrivateKey>,
    storage: Arc<dyn Storage>,
}

impl IdentityContext {
    pub fn new(engine: PakeEngine, storage: Arc<dyn Storage>) -> Self {
        Self {
            engine,
            secret_key: None,
            private_key: None,
            storage,
        }
    }

    pub fn has_secret_key(&self) -> bool {
        self.secret_key.is_some()
    }

    pub fn has_private_key(&self) -> bool {
        self.private_key.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.has_secret_key() && self.has_private_key()
    }

    /// Install the group secret key obtained from a group login.
    pub fn install_secret_key(&mut self, key: SecretKey) {
        self.secret_key = Some(key);
    }

    /// Derive the group verifier and secret key for a brand-new group.
    ///
    /// Only valid on an empty context; a second call fails `Overwrite`
    /// with the state unchanged.
    pub async fn create_secret_key(
        &mut self,
        secret: SecretString,
    ) -> Result<GroupRegistration, IdentityError> {
        if self.secret_key.is_some() {
            return Err(IdentityError::Overwrite);
        }

        let engine = self.engine.clone();
        let derived = tokio::task::spawn_blocking(move || engine.derive_verifier(&secret))
            .await
            .expect("verifier derivation task panicked");

        let registration = GroupRegistration {
            secret_verifier: derived.encode(),
        };
        self.secret_key = Some(derived.wrap_key);
        Ok(registration)
    }

    /// Generate this member's keypair and wrap both halves: the private
    /// key under a fresh password-derived key, the public key under the
    /// group secret key.
    pub async fn create_user_keys(
        &mut self,
        password: SecretString,
    ) -> Result<UserRegistration, IdentityError> {
        let Some(secret_key) = &self.secret_key else {
            return Err(IdentityError::MissingSecretKey);
        };
        if self.private_key.is_some() {
            return Err(IdentityError::Overwrite);
        }

        // Key stretching and RSA keygen both belong off the executor.
        let engine = self.engine.clone();
        let (derived, keypair) = tokio::task::spawn_blocking(move || {
            let derived = engine.derive_verifier(&password);
            asymmetric::generate_keypair().map(|kp| (derived, kp))
        })
        .await
        .expect("key generation task panicked")?;

        let private_jwk = keypair.private.to_jwk()?;
        let wrapped_private = asymmetric::wrap_key(&private_jwk, &derived.wrap_key)?;
        let wrapped_public = asymmetric::wrap_key(&keypair.public.to_jwk(), secret_key)?;

        let registration = UserRegistration {
            password_verifier: derived.encode(),
            public_key_secret: wrapped_public.encode(),
            private_key_encrypted: wrapped_private.encode(),
        };
        self.private_key = Some(keypair.private);
        Ok(registration)
    }

    /// Unwrap and install the private key fetched at login, completing
    /// the identity.
    pub fn import_private_key(
        &mut self,
        password_key: &SecretKey,
        wrapped_private: &str,
    ) -> Result<(), IdentityError> {
        let wrapped = WrappedKey::decode(wrapped_private)?;
        let private = asymmetric::unwrap_private(&wrapped, password_key)?;
        self.private_key = Some(private);
        Ok(())
    }

    /// Unwrap and validate another member's public key using the group
    /// secret key.
    pub fn decrypt_public_key(&self, wrapped_public: &str) -> Result<PublicKey, IdentityError> {
        let Some(secret_key) = &self.secret_key else {
            return Err(IdentityError::MissingSecretKey);
        };
        let wrapped = WrappedKey::decode(wrapped_public)?;
        Ok(asymmetric::unwrap_public(&wrapped, secret_key)?)
    }

    /// Probe one draw result ciphertext.
    ///
    /// A failed decryption yields `Ok(None)` by design: it is the
    /// expected signal that the ciphertext was addressed to somebody
    /// else, not an error to surface. Real corruption shows up one
    /// level higher, when *no* ciphertext in a non-empty list resolves.
    pub fn try_decrypt_result(&self, ciphertext: &str) -> Result<Option<String>, IdentityError> {
        let (Some(_), Some(private)) = (&self.secret_key, &self.private_key) else {
            return Err(IdentityError::Incomplete);
        };

        match result_token::decrypt(private, ciphertext) {
            Ok(plaintext) => Ok(String::from_utf8(plaintext).map(Some).unwrap_or(None)),
            Err(_) => Ok(None),
        }
    }

    /// Persist the exported secret key and private key as one blob.
    /// All-or-nothing: an incomplete context cannot be persisted.
    pub fn persist(&self) -> Result<(), IdentityError> {
        let (Some(secret_key), Some(private_key)) = (&self.secret_key, &self.private_key) else {
            return Err(IdentityError::Incomplete);
        };

        let blob = serde_json::to_string(&PersistedIdentity {
            secret_key: secret_key.export(),
            private_key: private_key.to_jwk()?,
        })
        .map_err(|e| CryptoError::ExportFailed(e.to_string()))?;

        self.storage.set(IDENTITY_STORAGE_KEY, &blob)?;
        Ok(())
    }

    /// Restore a persisted identity. Fails `NotFound` when nothing is
    /// persisted and `Incomplete` when either half is missing; on any
    /// failure the context keeps its previous state.
    pub fn restore(&mut self) -> Result<(), IdentityError> {
        if self.is_complete() {
            return Ok(());
        }

        let blob = self
            .storage
            .get(IDENTITY_STORAGE_KEY)?
            .ok_or(IdentityError::NotFound)?;

        let persisted: PersistedIdentity =
            serde_json::from_str(&blob).map_err(|_| IdentityError::Incomplete)?;
        if persisted.secret_key.is_empty() || persisted.private_key.is_empty() {
            return Err(IdentityError::Incomplete);
        }

        let secret_key = SecretKey::import(&persisted.secret_key)?;
        let private_key = PrivateKey::from_jwk(&persisted.private_key)?;

        self.secret_key = Some(secret_key);
        self.private_key = Some(private_key);
        Ok(())
    }

    /// Erase both keys and the persisted blob, returning to Empty.
    pub fn clear(&mut self) {
        self.secret_key = None;
        self.private_key = None;
        if let Err(e) = self.storage.remove(IDENTITY_STORAGE_KEY) {
            tracing::warn!("failed to remove persisted identity: {e}");
        }
    }

    pub(crate) fn secret_key(&self) -> Option<&SecretKey> {
        self.secret_key.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use santa_core::MemoryStorage;
    use santa_crypto::PakeParams;

    fn test_context() -> IdentityContext {
        IdentityContext::new(
            PakeEngine::new(PakeParams { iterations: 1_000 }),
            Arc::new(MemoryStorage::new()),
        )
    }

    #[tokio::test]
    async fn test_create_secret_key_twice_is_overwrite() {
        let mut ctx = test_context();
        ctx.create_secret_key(SecretString::from("secret"))
            .await
            .unwrap();
        let before = ctx.secret_key().unwrap().export();

        let err = ctx
            .create_secret_key(SecretString::from("other"))
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Overwrite));
        // state unchanged by the failed call
        assert_eq!(ctx.secret_key().unwrap().export(), before);
    }

    #[tokio::test]
    async fn test_create_user_keys_requires_secret_key() {
        let mut ctx = test_context();
        let err = ctx
            .create_user_keys(SecretString::from("password"))
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::MissingSecretKey));
    }

    #[tokio::test]
    async fn test_create_user_keys_completes_context() {
        let mut ctx = test_context();
        ctx.create_secret_key(SecretString::from("secret"))
            .await
            .unwrap();
        assert!(!ctx.is_complete());

        let registration = ctx
            .create_user_keys(SecretString::from("password"))
            .await
            .unwrap();
        assert!(ctx.is_complete());

        // the wrapped public key unwraps under the live secret key
        ctx.decrypt_public_key(&registration.public_key_secret)
            .unwrap();

        // a second keypair would overwrite
        let err = ctx
            .create_user_keys(SecretString::from("password"))
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Overwrite));
    }

    #[tokio::test]
    async fn test_import_private_key_roundtrip() {
        let mut alice = test_context();
        alice
            .create_secret_key(SecretString::from("secret"))
            .await
            .unwrap();
        let registration = alice
            .create_user_keys(SecretString::from("password"))
            .await
            .unwrap();

        // a later login derives the same password key and imports the
        // wrapped private key the server stored
        let (_, salt_hex) = registration.password_verifier.split_once('.').unwrap();
        let salt = santa_crypto::encoding::hex_decode(salt_hex).unwrap();
        let password_key = santa_crypto::derive_key_from_password(
            &SecretString::from("password"),
            &salt,
            1_000,
        );

        let mut restored = test_context();
        restored.install_secret_key(SecretKey::import(&alice.secret_key().unwrap().export()).unwrap());
        restored
            .import_private_key(&password_key, &registration.private_key_encrypted)
            .unwrap();
        assert!(restored.is_complete());
    }

    #[tokio::test]
    async fn test_decrypt_public_key_requires_secret_key() {
        let ctx = test_context();
        assert!(matches!(
            ctx.decrypt_public_key("AAAA.BBBB"),
            Err(IdentityError::MissingSecretKey)
        ));
    }

    #[tokio::test]
    async fn test_decrypt_public_key_under_foreign_secret_fails() {
        let mut alice = test_context();
        alice
            .create_secret_key(SecretString::from("secret-a"))
            .await
            .unwrap();
        let registration = alice
            .create_user_keys(SecretString::from("pw"))
            .await
            .unwrap();

        let mut mallory = test_context();
        mallory
            .create_secret_key(SecretString::from("secret-b"))
            .await
            .unwrap();
        assert!(matches!(
            mallory.decrypt_public_key(&registration.public_key_secret),
            Err(IdentityError::Crypto(CryptoError::UnwrapFailed))
        ));
    }

    #[tokio::test]
    async fn test_try_decrypt_result_requires_complete_context() {
        let ctx = test_context();
        assert!(matches!(
            ctx.try_decrypt_result("a.b.c.d.e"),
            Err(IdentityError::Incomplete)
        ));
    }

    #[tokio::test]
    async fn test_try_decrypt_result_none_on_foreign_ciphertext() {
        let mut ctx = test_context();
        ctx.create_secret_key(SecretString::from("secret"))
            .await
            .unwrap();
        ctx.create_user_keys(SecretString::from("pw")).await.unwrap();

        // garbage and foreign tokens both yield None, never an error
        assert_eq!(ctx.try_decrypt_result("not-a-token").unwrap(), None);

        let stranger = santa_crypto::generate_keypair().unwrap();
        let token = result_token::encrypt(&stranger.public, b"someone-else").unwrap();
        assert_eq!(ctx.try_decrypt_result(&token).unwrap(), None);
    }

    #[tokio::test]
    async fn test_persist_restore_roundtrip() {
        let storage = Arc::new(MemoryStorage::new());
        let engine = PakeEngine::new(PakeParams { iterations: 1_000 });

        let mut ctx = IdentityContext::new(engine.clone(), storage.clone());
        ctx.create_secret_key(SecretString::from("secret"))
            .await
            .unwrap();
        ctx.create_user_keys(SecretString::from("pw")).await.unwrap();
        ctx.persist().unwrap();

        let mut restored = IdentityContext::new(engine, storage);
        restored.restore().unwrap();
        assert!(restored.is_complete());
        assert_eq!(
            restored.secret_key().unwrap().export(),
            ctx.secret_key().unwrap().export()
        );
    }

    #[tokio::test]
    async fn test_persist_incomplete_fails() {
        let mut ctx = test_context();
        ctx.create_secret_key(SecretString::from("secret"))
            .await
            .unwrap();
        assert!(matches!(ctx.persist(), Err(IdentityError::Incomplete)));
    }

    #[tokio::test]
    async fn test_restore_not_found() {
        let mut ctx = test_context();
        assert!(matches!(ctx.restore(), Err(IdentityError::NotFound)));
    }

    #[tokio::test]
    async fn test_restore_partial_blob_is_incomplete() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set(
                IDENTITY_STORAGE_KEY,
                r#"{"secret_key":"","private_key":""}"#,
            )
            .unwrap();
        let mut ctx = IdentityContext::new(
            PakeEngine::new(PakeParams { iterations: 1_000 }),
            storage,
        );
        assert!(matches!(ctx.restore(), Err(IdentityError::Incomplete)));
    }

    #[tokio::test]
    async fn test_clear_erases_keys_and_persisted_state() {
        let storage = Arc::new(MemoryStorage::new());
        let mut ctx = IdentityContext::new(
            PakeEngine::new(PakeParams { iterations: 1_000 }),
            storage.clone(),
        );
        ctx.create_secret_key(SecretString::from("secret"))
            .await
            .unwrap();
        ctx.create_user_keys(SecretString::from("pw")).await.unwrap();
        ctx.persist().unwrap();

        ctx.clear();
        assert!(!ctx.has_secret_key());
        assert!(!ctx.has_private_key());
        assert_eq!(storage.get(IDENTITY_STORAGE_KEY).unwrap(), None);
    }
}
