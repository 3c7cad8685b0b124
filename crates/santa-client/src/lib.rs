//! santa-client: the SuperSanta client SDK
//!
//! Orchestrates the full client side of the protocol: SRP logins, the
//! wrapped-key identity lifecycle, group membership and the anonymous
//! draw. All state lives in an explicitly constructed [`SantaClient`];
//! storage is injected so hosts decide where tokens and keys persist.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use santa_client::SantaClient;
//! # use santa_core::{ClientConfig, MemoryStorage};
//! # use secrecy::SecretString;
//! # async fn demo() -> anyhow::Result<()> {
//! let client = SantaClient::new(ClientConfig::default(), Arc::new(MemoryStorage::new()))?;
//! client.login_group("group-id", SecretString::from("the group secret")).await?;
//! let user = client.login_user("alice@example.com", SecretString::from("password")).await?;
//! println!("hello {}", user.username);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod draw;
pub mod dto;
pub mod error;
pub mod group;
pub mod http;
pub mod identity;
pub mod session;

use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::Mutex;

use auth::AuthApi;
use group::GroupApi;
use http::{ApiClient, SharedApiClient};
use identity::IdentityContext;
use session::SessionContext;

use santa_core::{ClientConfig, Group, GroupInfo, Storage, UserSelf};
use santa_crypto::{PakeEngine, PakeParams};

pub use draw::{DrawTransport, MIN_PARTICIPANTS};
pub use error::{AuthError, GroupError, SantaError};
pub use group::NewMember;

/// The SDK entry point. One instance per session; clone-free by design,
/// hosts share it behind their own `Arc` if needed.
pub struct SantaClient {
    auth: AuthApi,
    group: GroupApi,
    identity: Mutex<IdentityContext>,
}

impl SantaClient {
    pub fn new(config: ClientConfig, storage: Arc<dyn Storage>) -> Result<Self, SantaError> {
        let engine = PakeEngine::new(PakeParams {
            iterations: config.kdf_iterations,
        });
        let session = SessionContext::new(storage.clone());
        let api: SharedApiClient =
            Arc::new(ApiClient::new(&config, session).map_err(|e| SantaError::Unknown(e.into()))?);

        Ok(Self {
            auth: AuthApi::new(api.clone(), engine.clone()),
            group: GroupApi::new(api),
            identity: Mutex::new(IdentityContext::new(engine, storage)),
        })
    }

    /// Create a group with `admin` as organizer. Derives the group
    /// verifier and the organizer's keypair locally; the server only
    /// ever sees verifiers and wrapped keys. Log in afterwards to
    /// obtain tokens.
    pub async fn create_group(
        &self,
        name: &str,
        admin: NewMember,
        secret: SecretString,
        password: SecretString,
    ) -> Result<Group, SantaError> {
        let mut identity = self.identity.lock().await;
        identity.clear();

        let registration = identity.create_secret_key(secret).await?;
        let admin_keys = identity.create_user_keys(password).await?;

        Ok(self
            .group
            .create_group(name, registration, admin, admin_keys)
            .await?)
    }

    /// First trust level: prove knowledge of the group secret. Resets
    /// any previous identity and installs the derived group secret key.
    pub async fn login_group(&self, group_id: &str, secret: SecretString) -> Result<(), SantaError> {
        let secret_key = self.auth.login_group(group_id, secret).await?;

        let mut identity = self.identity.lock().await;
        identity.clear();
        identity.install_secret_key(secret_key);
        Ok(())
    }

    /// Second trust level: member login. Completes the identity by
    /// unwrapping the private key stored server-side and persists it.
    pub async fn login_user(
        &self,
        email: &str,
        password: SecretString,
    ) -> Result<UserSelf, SantaError> {
        let password_key = self.auth.login_user(email, password).await?;
        let user = self.auth.get_user().await?;

        let mut identity = self.identity.lock().await;
        identity.import_private_key(&password_key, &user.private_key_encrypted)?;
        identity.persist()?;
        Ok(user)
    }

    /// Join the authenticated group as a new member. Requires a prior
    /// [`login_group`](Self::login_group).
    pub async fn join_group(
        &self,
        member: NewMember,
        password: SecretString,
    ) -> Result<Group, SantaError> {
        let mut identity = self.identity.lock().await;
        let keys = identity.create_user_keys(password).await?;
        Ok(self.group.join_group(member, keys).await?)
    }

    /// Restore a persisted session: validate the saved auth token
    /// against the server and reload the persisted identity. `None`
    /// means no live session; log in again.
    pub async fn bootstrap(&self) -> Result<Option<UserSelf>, SantaError> {
        let Some(user) = self.auth.bootstrap().await? else {
            return Ok(None);
        };

        let mut identity = self.identity.lock().await;
        if let Err(e) = identity.restore() {
            tracing::warn!("session restored without identity: {e}");
        }
        Ok(Some(user))
    }

    /// Drop tokens and key material, local and persisted.
    pub async fn logout(&self) {
        self.auth.logout();
        self.identity.lock().await.clear();
    }

    pub async fn get_user(&self) -> Result<UserSelf, SantaError> {
        Ok(self.auth.get_user().await?)
    }

    pub async fn get_group(&self) -> Result<Group, SantaError> {
        Ok(self.group.get_group().await?)
    }

    pub async fn get_group_info(&self, group_id: &str) -> Result<Option<GroupInfo>, SantaError> {
        Ok(self.group.get_group_info(group_id).await?)
    }

    pub async fn update_wishes(&self, wishes: &str) -> Result<String, SantaError> {
        Ok(self.group.update_wishes(wishes).await?)
    }

    /// Run the draw as organizer. See [`draw::run_draw`] for the
    /// protocol details and failure modes.
    pub async fn draw(&self) -> Result<(), SantaError> {
        let identity = self.identity.lock().await;
        draw::run_draw(&self.group, &identity).await
    }

    /// Resolve this member's recipient, or `None` while the draw has
    /// not run.
    pub async fn parse_result(&self) -> Result<Option<String>, SantaError> {
        let group = self.group.get_group().await?;
        let identity = self.identity.lock().await;
        draw::parse_result(&identity, &group.results)
    }

    /// Remove a member before the draw. Organizer only.
    pub async fn delete_user(&self, user_id: &str) -> Result<(), SantaError> {
        Ok(self.group.delete_user(user_id).await?)
    }

    /// Leave the group and drop the local session entirely.
    pub async fn leave_group(&self) -> Result<(), SantaError> {
        self.group.leave_group().await?;
        self.logout().await;
        Ok(())
    }
}
