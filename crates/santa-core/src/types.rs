//! Wire data models shared between the API surfaces.
//!
//! Field names follow the server's snake_case JSON exactly.

use serde::{Deserialize, Serialize};

/// A group member as visible to other members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub wishes: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// The authenticated member's own record. Carries the wrapped key
/// material the identity context needs; both blobs are opaque encoded
/// tokens, never cleartext keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSelf {
    pub id: String,
    pub username: String,
    pub email: String,
    pub group_id: String,
    #[serde(default)]
    pub is_admin: bool,
    /// Public key wrapped under the group secret key.
    pub public_key_secret: String,
    /// Private key wrapped under the user's password key.
    pub private_key_encrypted: String,
    #[serde(default)]
    pub wishes: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// A group as returned to authenticated members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    /// Per-recipient result ciphertexts; empty until the draw has run.
    #[serde(default)]
    pub results: Vec<String>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Public group info, available without authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupInfo {
    pub id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_deserializes_without_results() {
        let group: Group = serde_json::from_str(
            r#"{"id":"g1","name":"office","users":[]}"#,
        )
        .unwrap();
        assert!(group.results.is_empty());
    }
}
