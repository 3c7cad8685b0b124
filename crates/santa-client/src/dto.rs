//! Request/response bodies for the server API.
//!
//! Field names are the wire contract; they never carry key material in
//! cleartext, only verifiers, wrapped keys and opaque tokens.

use serde::{Deserialize, Serialize};

/// One side of an SRP challenge: the salt registered for the identity
/// plus the server's public ephemeral.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SrpChallenge {
    pub salt: String,
    pub server_pub_key: String,
}

/// The client's answer: public ephemeral and session proof.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SrpAuth {
    pub client_pub_key: String,
    pub client_auth: String,
}

#[derive(Debug, Deserialize)]
pub struct GroupChallengeResponse {
    pub session_id: String,
    pub group_challenge: SrpChallenge,
}

#[derive(Debug, Serialize)]
pub struct GroupLoginRequest {
    pub session_id: String,
    pub group_auth: SrpAuth,
}

#[derive(Debug, Deserialize)]
pub struct GroupLoginResponse {
    pub token: String,
    pub server_auth: String,
}

#[derive(Debug, Serialize)]
pub struct LoginChallengeRequest {
    pub group_token: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginChallengeResponse {
    pub session_id: String,
    pub user_challenge: SrpChallenge,
}

#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub session_id: String,
    pub user_auth: SrpAuth,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub server_auth: String,
}

#[derive(Debug, Serialize)]
pub struct GroupAuthRequest {
    pub group_token: String,
}

#[derive(Debug, Deserialize)]
pub struct GroupAuthResponse {
    pub group_id: String,
}

/// Registration payload for a new member. Both keys travel wrapped.
#[derive(Debug, Serialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password_verifier: String,
    pub public_key_secret: String,
    pub private_key_encrypted: String,
}

#[derive(Debug, Serialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub secret_verifier: String,
    pub admin: CreateUserRequest,
}

#[derive(Debug, Serialize)]
pub struct JoinGroupRequest {
    pub group_token: String,
    pub user: CreateUserRequest,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateWishesRequest {
    pub wishes: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWishesResponse {
    pub wishes: String,
}

/// Draw phase 1: the wrapped public keys, in server-chosen random order.
#[derive(Debug, Deserialize)]
pub struct InitDrawResponse {
    pub public_keys_secret: Vec<String>,
}

/// Draw phase 2 upload: the rotated cleartext JWKs.
#[derive(Debug, Serialize)]
pub struct FinishDrawRequest {
    pub public_keys: Vec<String>,
}
