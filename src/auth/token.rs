//! Login Token Handler
//! Issue, validate and revoke the opaque per-identity login tokens

use crate::auth::credential_store::CredentialStore;
use crate::auth::models::{AuthError, IdentityKind, IdentityRecord, IssuedToken};
use anyhow::Context;
use chrono::{Duration, Utc};
use clap::ValueEnum;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What to do when a caller presents the right token after it expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExpiredTokenPolicy {
    /// Keep accepting the token.
    #[default]
    Accept,
    /// Store a fresh token, reject the request and hand the new token back.
    Rotate,
    /// Reject the request; the caller must log in again.
    Reject,
}

/// Validates caller tokens against the credential store
pub struct TokenValidator {
    store: Arc<dyn CredentialStore>,
    ttl: Duration,
    policy: ExpiredTokenPolicy,
}

impl TokenValidator {
    pub fn new(store: Arc<dyn CredentialStore>, ttl: Duration, policy: ExpiredTokenPolicy) -> Self {
        Self { store, ttl, policy }
    }

    pub fn policy(&self) -> ExpiredTokenPolicy {
        self.policy
    }

    /// 32 random bytes, hex encoded.
    pub fn generate_token() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Issue a new token, replacing whatever the identity held before.
    pub async fn issue_token(&self, kind: IdentityKind, id: i64) -> Result<IssuedToken, AuthError> {
        let token = Self::generate_token();
        let expires_at = Utc::now()
            .checked_add_signed(self.ttl)
            .context("Invalid token expiry")?;

        if !self
            .store
            .store_token(kind, id, Some(&token), Some(expires_at))
            .await?
        {
            return Err(AuthError::NotFound(kind));
        }

        debug!(
            kind = kind.as_str(),
            id,
            ttl_minutes = self.ttl.num_minutes(),
            "Issued login token"
        );
        Ok(IssuedToken { token, expires_at })
    }

    /// Clear the identity's token.
    pub async fn revoke(&self, kind: IdentityKind, id: i64) -> Result<(), AuthError> {
        if !self.store.store_token(kind, id, None, None).await? {
            return Err(AuthError::NotFound(kind));
        }
        Ok(())
    }

    /// Look the identity up and check the supplied token.
    pub async fn validate_token(
        &self,
        kind: IdentityKind,
        id: i64,
        supplied: &str,
    ) -> Result<String, AuthError> {
        let record = self
            .store
            .find_identity(kind, id)
            .await?
            .ok_or(AuthError::NotFound(kind))?;
        self.check_record(kind, &record, supplied).await
    }

    /// Check a supplied token against an already loaded identity.
    ///
    /// A mismatch is rejected before expiry is considered. Returns the token
    /// that remains valid.
    pub async fn check_record(
        &self,
        kind: IdentityKind,
        record: &IdentityRecord,
        supplied: &str,
    ) -> Result<String, AuthError> {
        if supplied.is_empty() {
            return Err(AuthError::Unauthorized("Missing token"));
        }
        match record.login_token.as_deref() {
            Some(stored) if stored == supplied => {}
            _ => {
                warn!(kind = kind.as_str(), id = record.id, "Token mismatch");
                return Err(AuthError::Unauthorized("Invalid token provided"));
            }
        }

        let expired = match record.token_expiry {
            Some(expiry) => expiry <= Utc::now(),
            None => true,
        };
        if !expired {
            return Ok(supplied.to_string());
        }

        match self.policy {
            ExpiredTokenPolicy::Accept => {
                debug!(kind = kind.as_str(), id = record.id, "Accepting expired token");
                Ok(supplied.to_string())
            }
            ExpiredTokenPolicy::Rotate => {
                let issued = self.issue_token(kind, record.id).await?;
                info!(kind = kind.as_str(), id = record.id, "Expired token rotated");
                Err(AuthError::TokenExpired {
                    rotated: Some(issued.token),
                })
            }
            ExpiredTokenPolicy::Reject => Err(AuthError::TokenExpired { rotated: None }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credential_store::memory::MemoryCredentialStore;

    fn record(id: i64, token: &str, expires_in: Duration) -> IdentityRecord {
        IdentityRecord {
            id,
            role: "admin".to_string(),
            login_token: Some(token.to_string()),
            token_expiry: Some(Utc::now() + expires_in),
            active: true,
        }
    }

    fn validator(store: Arc<MemoryCredentialStore>, policy: ExpiredTokenPolicy) -> TokenValidator {
        TokenValidator::new(store, Duration::hours(1), policy)
    }

    #[tokio::test]
    async fn test_matching_unexpired_token_is_returned_unchanged() {
        let store = Arc::new(
            MemoryCredentialStore::default()
                .with_identity(IdentityKind::Admin, record(5, "abc", Duration::minutes(30))),
        );
        let tokens = validator(store, ExpiredTokenPolicy::Reject);

        let token = tokens
            .validate_token(IdentityKind::Admin, 5, "abc")
            .await
            .unwrap();
        assert_eq!(token, "abc");
    }

    #[tokio::test]
    async fn test_mismatch_is_unauthorized_regardless_of_expiry() {
        let store = Arc::new(
            MemoryCredentialStore::default()
                .with_identity(IdentityKind::Branch, record(12, "xyz", Duration::minutes(30)))
                .with_identity(IdentityKind::Branch, record(13, "xyz", -Duration::minutes(30))),
        );

        for policy in [
            ExpiredTokenPolicy::Accept,
            ExpiredTokenPolicy::Rotate,
            ExpiredTokenPolicy::Reject,
        ] {
            let tokens = validator(store.clone(), policy);
            for id in [12, 13] {
                let err = tokens
                    .validate_token(IdentityKind::Branch, id, "abc")
                    .await
                    .unwrap_err();
                assert!(matches!(err, AuthError::Unauthorized(_)), "{policy:?} {id}");
            }
        }

        // Mismatch never rotates.
        assert_eq!(
            store.identity(IdentityKind::Branch, 13).unwrap().login_token.as_deref(),
            Some("xyz")
        );
    }

    #[tokio::test]
    async fn test_unknown_identity_is_not_found() {
        let tokens = validator(Arc::new(MemoryCredentialStore::default()), ExpiredTokenPolicy::Accept);
        let err = tokens
            .validate_token(IdentityKind::Admin, 1, "abc")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotFound(IdentityKind::Admin)));
    }

    #[tokio::test]
    async fn test_cleared_token_is_unauthorized() {
        let store = Arc::new(MemoryCredentialStore::default().with_identity(
            IdentityKind::Admin,
            IdentityRecord {
                id: 1,
                role: "admin".into(),
                login_token: None,
                token_expiry: None,
                active: true,
            },
        ));
        let tokens = validator(store, ExpiredTokenPolicy::Accept);
        let err = tokens
            .validate_token(IdentityKind::Admin, 1, "anything")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_expired_token_policies() {
        let expired = || record(7, "old", -Duration::minutes(1));

        let store = Arc::new(
            MemoryCredentialStore::default().with_identity(IdentityKind::Admin, expired()),
        );
        let accepted = validator(store.clone(), ExpiredTokenPolicy::Accept)
            .validate_token(IdentityKind::Admin, 7, "old")
            .await
            .unwrap();
        assert_eq!(accepted, "old");

        let err = validator(store.clone(), ExpiredTokenPolicy::Reject)
            .validate_token(IdentityKind::Admin, 7, "old")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired { rotated: None }));
        assert_eq!(
            store.identity(IdentityKind::Admin, 7).unwrap().login_token.as_deref(),
            Some("old")
        );

        let err = validator(store.clone(), ExpiredTokenPolicy::Rotate)
            .validate_token(IdentityKind::Admin, 7, "old")
            .await
            .unwrap_err();
        let AuthError::TokenExpired { rotated: Some(new_token) } = err else {
            panic!("expected rotated token, got {err:?}");
        };
        let stored = store.identity(IdentityKind::Admin, 7).unwrap();
        assert_eq!(stored.login_token.as_deref(), Some(new_token.as_str()));
        assert!(stored.token_expiry.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn test_issue_overwrites_previous_token_and_revoke_clears() {
        let store = Arc::new(
            MemoryCredentialStore::default()
                .with_identity(IdentityKind::Admin, record(3, "first", Duration::minutes(5))),
        );
        let tokens = validator(store.clone(), ExpiredTokenPolicy::Accept);

        let issued = tokens.issue_token(IdentityKind::Admin, 3).await.unwrap();
        assert_eq!(issued.token.len(), 64);
        assert!(tokens
            .validate_token(IdentityKind::Admin, 3, "first")
            .await
            .is_err());
        assert!(tokens
            .validate_token(IdentityKind::Admin, 3, &issued.token)
            .await
            .is_ok());

        tokens.revoke(IdentityKind::Admin, 3).await.unwrap();
        assert!(store.identity(IdentityKind::Admin, 3).unwrap().login_token.is_none());

        let err = tokens.issue_token(IdentityKind::Admin, 99).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound(IdentityKind::Admin)));
    }

    #[test]
    fn test_generated_tokens_are_unique_hex() {
        let a = TokenValidator::generate_token();
        let b = TokenValidator::generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
