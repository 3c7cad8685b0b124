//! Challenge-response authentication flows.
//!
//! Two logins, same shape: fetch an SRP challenge, solve it against the
//! locally derived secret, post the proof, verify the server's proof and
//! keep the resulting token. The stretched private exponent doubles as
//! the wrap key for the matching half of the key hierarchy, so each
//! login also yields a `SecretKey`.

use secrecy::SecretString;

use crate::dto::{
    GroupAuthRequest, GroupAuthResponse, GroupChallengeResponse, GroupLoginRequest,
    GroupLoginResponse, LoginChallengeRequest, LoginChallengeResponse, LoginRequest,
    LoginResponse, SrpAuth,
};
use crate::error::AuthError;
use crate::http::{ApiError, SharedApiClient};
use santa_core::UserSelf;
use santa_crypto::{ChallengeSolution, PakeEngine, SecretKey};

const BASE_PATH: &str = "/auth";

pub struct AuthApi {
    api: SharedApiClient,
    engine: PakeEngine,
}

impl AuthApi {
    pub fn new(api: SharedApiClient, engine: PakeEngine) -> Self {
        Self { api, engine }
    }

    /// Solve an SRP challenge off the async executor; the PBKDF2
    /// stretching inside dominates the cost.
    async fn solve(
        &self,
        challenge: crate::dto::SrpChallenge,
        identity: String,
        secret: SecretString,
    ) -> Result<ChallengeSolution, AuthError> {
        let engine = self.engine.clone();
        tokio::task::spawn_blocking(move || {
            engine.solve_challenge(
                &challenge.server_pub_key,
                &identity,
                &secret,
                &challenge.salt,
            )
        })
        .await
        .expect("challenge solving task panicked")
        .map_err(AuthError::Crypto)
    }

    /// Authenticate to a group with its shared secret.
    ///
    /// Clears any previous session first. On success the group token is
    /// held in the session context and the returned key unwraps the
    /// members' public keys.
    pub async fn login_group(
        &self,
        group_id: &str,
        secret: SecretString,
    ) -> Result<SecretKey, AuthError> {
        self.api.with_session(|s| s.clear());

        let challenge: GroupChallengeResponse = self
            .api
            .get(&format!("{BASE_PATH}/group/{group_id}/challenge"))
            .await
            .map_err(group_challenge_error)?;

        let solution = self
            .solve(challenge.group_challenge, group_id.to_string(), secret)
            .await?;

        let response: GroupLoginResponse = self
            .api
            .post(
                &format!("{BASE_PATH}/group"),
                &GroupLoginRequest {
                    session_id: challenge.session_id,
                    group_auth: SrpAuth {
                        client_pub_key: solution.client_pub_hex.clone(),
                        client_auth: solution.proof_hex.clone(),
                    },
                },
            )
            .await
            .map_err(group_login_error)?;

        if !solution.verify_server_proof(&response.server_auth) {
            return Err(AuthError::Unknown(anyhow::anyhow!(
                "server failed to prove knowledge of the session key"
            )));
        }

        self.api.with_session(|s| s.set_group_token(response.token));
        Ok(solution.wrap_key)
    }

    /// Authenticate a member. Requires a group token; on success the
    /// auth token replaces it and is persisted, and the returned key
    /// unwraps the member's private key.
    pub async fn login_user(
        &self,
        email: &str,
        password: SecretString,
    ) -> Result<SecretKey, AuthError> {
        let group_token = self
            .api
            .with_session(|s| s.group_token().map(String::from))
            .ok_or(AuthError::GroupAuth)?;

        let challenge: LoginChallengeResponse = self
            .api
            .post(
                &format!("{BASE_PATH}/login/challenge"),
                &LoginChallengeRequest {
                    group_token,
                    email: email.to_string(),
                },
            )
            .await
            .map_err(login_challenge_error)?;

        let solution = self
            .solve(challenge.user_challenge, email.to_string(), password)
            .await?;

        let response: LoginResponse = self
            .api
            .post(
                &format!("{BASE_PATH}/login"),
                &LoginRequest {
                    session_id: challenge.session_id,
                    user_auth: SrpAuth {
                        client_pub_key: solution.client_pub_hex.clone(),
                        client_auth: solution.proof_hex.clone(),
                    },
                },
            )
            .await
            .map_err(user_login_error)?;

        if !solution.verify_server_proof(&response.server_auth) {
            return Err(AuthError::Unknown(anyhow::anyhow!(
                "server failed to prove knowledge of the session key"
            )));
        }

        self.api.with_session(|s| {
            s.set_auth_token(response.token);
            s.save();
        });
        Ok(solution.wrap_key)
    }

    /// Fetch the authenticated member's own record.
    pub async fn get_user(&self) -> Result<UserSelf, AuthError> {
        self.api
            .get(&format!("{BASE_PATH}/login"))
            .await
            .map_err(stale_token_error)
    }

    /// Resolve the group id behind the held group token.
    pub async fn get_group_id(&self) -> Result<String, AuthError> {
        let group_token = self
            .api
            .with_session(|s| s.group_token().map(String::from))
            .ok_or(AuthError::GroupAuth)?;

        let response: GroupAuthResponse = self
            .api
            .post(&format!("{BASE_PATH}/group"), &GroupAuthRequest { group_token })
            .await
            .map_err(stale_group_token_error)?;
        Ok(response.group_id)
    }

    pub async fn check_auth_token(&self) -> bool {
        self.get_user().await.is_ok()
    }

    pub async fn check_group_token(&self) -> bool {
        self.get_group_id().await.is_ok()
    }

    pub fn logout(&self) {
        self.api.with_session(|s| s.clear());
    }

    /// Restore a persisted session and validate it against the server.
    ///
    /// Returns the member record when a live session exists; a stale
    /// token clears the session and yields `None`.
    pub async fn bootstrap(&self) -> Result<Option<UserSelf>, AuthError> {
        if !self.api.with_session(|s| s.load()) {
            return Ok(None);
        }

        match self.get_user().await {
            Ok(user) => Ok(Some(user)),
            Err(AuthError::Auth) => {
                self.api.with_session(|s| s.clear());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

// Status-code contract per endpoint. 404 means the looked-up identity
// (group id or email) is unknown, 403 a rejected proof, 401 a missing
// or stale token; anything else is unexpected and kept as the cause.

fn group_challenge_error(e: ApiError) -> AuthError {
    match e.status().map(|s| s.as_u16()) {
        Some(404) => AuthError::BadGroupId,
        _ => AuthError::Unknown(e.into()),
    }
}

fn group_login_error(e: ApiError) -> AuthError {
    match e.status().map(|s| s.as_u16()) {
        Some(403) => AuthError::BadSecret,
        _ => AuthError::Unknown(e.into()),
    }
}

fn login_challenge_error(e: ApiError) -> AuthError {
    match e.status().map(|s| s.as_u16()) {
        Some(401) => AuthError::GroupAuth,
        Some(404) => AuthError::BadEmail,
        _ => AuthError::Unknown(e.into()),
    }
}

fn user_login_error(e: ApiError) -> AuthError {
    match e.status().map(|s| s.as_u16()) {
        Some(403) => AuthError::BadPassword,
        _ => AuthError::Unknown(e.into()),
    }
}

fn stale_token_error(e: ApiError) -> AuthError {
    match e.status().map(|s| s.as_u16()) {
        Some(401) => AuthError::Auth,
        _ => AuthError::Unknown(e.into()),
    }
}

fn stale_group_token_error(e: ApiError) -> AuthError {
    match e.status().map(|s| s.as_u16()) {
        Some(401) => AuthError::GroupAuth,
        _ => AuthError::Unknown(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn status(code: u16) -> ApiError {
        ApiError::Status(StatusCode::from_u16(code).unwrap(), String::new())
    }

    #[test]
    fn test_group_challenge_maps_unknown_group() {
        assert!(matches!(
            group_challenge_error(status(404)),
            AuthError::BadGroupId
        ));
        assert!(matches!(
            group_challenge_error(status(500)),
            AuthError::Unknown(_)
        ));
    }

    #[test]
    fn test_group_login_maps_rejected_secret() {
        assert!(matches!(group_login_error(status(403)), AuthError::BadSecret));
        assert!(matches!(group_login_error(status(500)), AuthError::Unknown(_)));
    }

    #[test]
    fn test_login_challenge_maps_token_and_email() {
        assert!(matches!(
            login_challenge_error(status(401)),
            AuthError::GroupAuth
        ));
        assert!(matches!(
            login_challenge_error(status(404)),
            AuthError::BadEmail
        ));
        assert!(matches!(
            login_challenge_error(status(500)),
            AuthError::Unknown(_)
        ));
    }

    #[test]
    fn test_user_login_maps_rejected_password() {
        assert!(matches!(
            user_login_error(status(403)),
            AuthError::BadPassword
        ));
        assert!(matches!(user_login_error(status(500)), AuthError::Unknown(_)));
    }

    #[test]
    fn test_stale_tokens_map_to_auth_errors() {
        assert!(matches!(stale_token_error(status(401)), AuthError::Auth));
        assert!(matches!(
            stale_group_token_error(status(401)),
            AuthError::GroupAuth
        ));
        assert!(matches!(stale_token_error(status(500)), AuthError::Unknown(_)));
    }
}
