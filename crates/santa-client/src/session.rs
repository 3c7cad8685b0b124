//! Bearer-token session context.
//!
//! Holds at most one of the two mutually exclusive tokens: the group
//! token (proves knowledge of the group secret) or the auth token
//! (proves a member login). Setting either clears the other, so a
//! context can never present both trust levels at once.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use santa_core::Storage;

/// Well-known storage key for the persisted auth token.
pub const TOKEN_STORAGE_KEY: &str = "auth_token";

/// Tokens expiring within this margin are treated as already invalid,
/// forcing re-authentication instead of failing mid-operation.
pub const TOKEN_VALIDITY_MARGIN_SECS: i64 = 300;

pub struct SessionContext {
    group_token: Option<String>,
    auth_token: Option<String>,
    storage: Arc<dyn Storage>,
}

impl SessionContext {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            group_token: None,
            auth_token: None,
            storage,
        }
    }

    pub fn set_group_token(&mut self, token: String) {
        self.auth_token = None;
        self.group_token = Some(token);
    }

    pub fn set_auth_token(&mut self, token: String) {
        self.group_token = None;
        self.auth_token = Some(token);
    }

    pub fn group_token(&self) -> Option<&str> {
        self.group_token.as_deref()
    }

    pub fn auth_header(&self) -> Option<String> {
        self.auth_token.as_ref().map(|t| format!("Bearer {t}"))
    }

    pub fn is_auth_token_valid(&self) -> bool {
        self.auth_token
            .as_deref()
            .is_some_and(|t| is_token_valid(t, now_unix()))
    }

    pub fn is_group_token_valid(&self) -> bool {
        self.group_token
            .as_deref()
            .is_some_and(|t| is_token_valid(t, now_unix()))
    }

    /// Persist the auth token; refused when it is absent or near expiry.
    pub fn save(&self) -> bool {
        if !self.is_auth_token_valid() {
            return false;
        }
        let token = self.auth_token.as_deref().unwrap_or_default();
        match self.storage.set(TOKEN_STORAGE_KEY, token) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("failed to persist auth token: {e}");
                false
            }
        }
    }

    /// Restore a persisted auth token if it is still valid.
    pub fn load(&mut self) -> bool {
        if self.is_auth_token_valid() {
            return true;
        }
        match self.storage.get(TOKEN_STORAGE_KEY) {
            Ok(Some(token)) if is_token_valid(&token, now_unix()) => {
                self.group_token = None;
                self.auth_token = Some(token);
                true
            }
            Ok(_) => false,
            Err(e) => {
                tracing::warn!("failed to read persisted auth token: {e}");
                false
            }
        }
    }

    pub fn clear(&mut self) {
        self.group_token = None;
        self.auth_token = None;
        if let Err(e) = self.storage.remove(TOKEN_STORAGE_KEY) {
            tracing::warn!("failed to remove persisted auth token: {e}");
        }
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Stateless token validity check, pure in `now`.
///
/// A JWT is valid when it parses and its `exp` claim is more than
/// [`TOKEN_VALIDITY_MARGIN_SECS`] away. Tokens without an `exp` claim
/// are accepted; malformed tokens are not.
pub fn is_token_valid(token: &str, now: i64) -> bool {
    let mut parts = token.split('.');
    let (Some(_), Some(payload), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    let Ok(payload) = URL_SAFE_NO_PAD.decode(payload) else {
        return false;
    };
    let Ok(claims) = serde_json::from_slice::<serde_json::Value>(&payload) else {
        return false;
    };

    match claims.get("exp").and_then(|v| v.as_i64()) {
        Some(exp) => exp > now + TOKEN_VALIDITY_MARGIN_SECS,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use santa_core::MemoryStorage;

    fn jwt_with_exp(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp}}}"#));
        format!("{header}.{payload}.c2ln")
    }

    #[test]
    fn test_token_valid_outside_margin() {
        let now = 1_700_000_000;
        assert!(is_token_valid(&jwt_with_exp(now + 301), now));
    }

    #[test]
    fn test_token_near_expiry_is_invalid() {
        // Not yet expired, but within the 300s safety margin.
        let now = 1_700_000_000;
        assert!(!is_token_valid(&jwt_with_exp(now + 299), now));
        assert!(!is_token_valid(&jwt_with_exp(now + 300), now));
        assert!(!is_token_valid(&jwt_with_exp(now - 1), now));
    }

    #[test]
    fn test_malformed_token_is_invalid() {
        assert!(!is_token_valid("", 0));
        assert!(!is_token_valid("one.two", 0));
        assert!(!is_token_valid("a.!!!.c", 0));
        assert!(!is_token_valid("a.b.c.d", 0));
    }

    #[test]
    fn test_tokens_are_mutually_exclusive() {
        let mut session = SessionContext::new(Arc::new(MemoryStorage::new()));
        session.set_group_token("group".into());
        session.set_auth_token("auth".into());
        assert_eq!(session.group_token(), None);
        assert_eq!(session.auth_header().as_deref(), Some("Bearer auth"));

        session.set_group_token("group2".into());
        assert_eq!(session.auth_header(), None);
        assert_eq!(session.group_token(), Some("group2"));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let storage = Arc::new(MemoryStorage::new());
        let far_future = now_unix() + 86_400;

        let mut session = SessionContext::new(storage.clone());
        session.set_auth_token(jwt_with_exp(far_future));
        assert!(session.save());

        let mut restored = SessionContext::new(storage);
        assert!(restored.load());
        assert!(restored.is_auth_token_valid());
    }

    #[test]
    fn test_load_rejects_expired_token() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(TOKEN_STORAGE_KEY, &jwt_with_exp(0)).unwrap();

        let mut session = SessionContext::new(storage);
        assert!(!session.load());
    }

    #[test]
    fn test_clear_removes_persisted_token() {
        let storage = Arc::new(MemoryStorage::new());
        let mut session = SessionContext::new(storage.clone());
        session.set_auth_token(jwt_with_exp(now_unix() + 86_400));
        session.save();

        session.clear();
        assert_eq!(storage.get(TOKEN_STORAGE_KEY).unwrap(), None);
        assert!(!session.is_auth_token_valid());
    }
}
