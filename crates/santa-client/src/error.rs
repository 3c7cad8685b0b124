use thiserror::Error;

use crate::http::ApiError;
use crate::identity::IdentityError;
use santa_crypto::CryptoError;

/// Authentication failures. All variants except `Unknown` are
/// recoverable by retrying the relevant login step with corrected input.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("unknown group id")]
    BadGroupId,

    #[error("group secret rejected")]
    BadSecret,

    #[error("group token missing or stale: authenticate to the group first")]
    GroupAuth,

    #[error("no such member email in this group")]
    BadEmail,

    #[error("password rejected")]
    BadPassword,

    #[error("auth token missing or stale")]
    Auth,

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("unexpected auth failure")]
    Unknown(#[source] anyhow::Error),
}

/// Group API failures surfaced for user-facing messaging; none are
/// retried automatically.
#[derive(Debug, Error)]
pub enum GroupError {
    #[error("a draw needs at least 3 participants")]
    NotEnoughParticipants,

    #[error("the draw has already been performed")]
    DrawAlreadyDone,

    #[error("draw session expired, restart the draw")]
    DrawSessionExpired,

    #[error("operation reserved to the group organizer")]
    Forbidden,

    #[error("auth token missing or stale")]
    Auth,

    #[error("unexpected group API failure")]
    Unknown(#[source] anyhow::Error),
}

impl GroupError {
    /// Shared mapping of the server's status-code contract.
    pub(crate) fn from_api(err: ApiError) -> Self {
        match err.status().map(|s| s.as_u16()) {
            Some(401) => GroupError::Auth,
            Some(403) => GroupError::Forbidden,
            Some(409) => GroupError::DrawAlreadyDone,
            Some(460) => GroupError::NotEnoughParticipants,
            Some(461) => GroupError::DrawSessionExpired,
            _ => GroupError::Unknown(err.into()),
        }
    }
}

/// Top-level SDK error.
#[derive(Debug, Error)]
pub enum SantaError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Group(#[from] GroupError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// A public key in the draw failed to unwrap or validate; the run
    /// was aborted rather than completed with corrupted pairs.
    #[error("draw aborted: invalid key material")]
    BadDraw(#[source] CryptoError),

    /// The distributed result list is non-empty but no entry decrypted
    /// for this identity.
    #[error("no draw result could be resolved for this identity")]
    BadResult,

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn status(code: u16) -> ApiError {
        ApiError::Status(StatusCode::from_u16(code).unwrap(), String::new())
    }

    #[test]
    fn test_group_status_contract() {
        assert!(matches!(GroupError::from_api(status(401)), GroupError::Auth));
        assert!(matches!(
            GroupError::from_api(status(403)),
            GroupError::Forbidden
        ));
        assert!(matches!(
            GroupError::from_api(status(409)),
            GroupError::DrawAlreadyDone
        ));
        assert!(matches!(
            GroupError::from_api(status(460)),
            GroupError::NotEnoughParticipants
        ));
        assert!(matches!(
            GroupError::from_api(status(461)),
            GroupError::DrawSessionExpired
        ));
    }

    #[test]
    fn test_unmapped_status_stays_unknown() {
        for code in [400, 404, 500] {
            assert!(matches!(
                GroupError::from_api(status(code)),
                GroupError::Unknown(_)
            ));
        }
    }
}
