//! Composite Guard
//! Required fields, then the permission gate, then the token validator

use crate::auth::credential_store::CredentialStore;
use crate::auth::models::{ActionKey, AuthError, IdentityKind};
use crate::auth::permissions::{check_document, PermissionGate};
use crate::auth::token::TokenValidator;
use std::sync::Arc;
use tracing::warn;

/// A caller that passed the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub kind: IdentityKind,
    pub id: i64,
    pub token: String,
}

/// A request value that may be absent or blank.
pub trait Presence {
    fn is_present(&self) -> bool;
}

impl Presence for Option<String> {
    fn is_present(&self) -> bool {
        self.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
}

impl Presence for Option<i64> {
    fn is_present(&self) -> bool {
        self.is_some()
    }
}

impl<T> Presence for Option<Vec<T>> {
    fn is_present(&self) -> bool {
        self.as_ref().is_some_and(|v| !v.is_empty())
    }
}

impl Presence for Option<bool> {
    fn is_present(&self) -> bool {
        self.is_some()
    }
}

/// Pair a field name with its presence.
pub fn field(name: &'static str, value: &dyn Presence) -> (&'static str, bool) {
    (name, value.is_present())
}

/// Every missing field name, in declaration order.
pub fn missing_fields(fields: &[(&'static str, bool)]) -> Vec<&'static str> {
    fields
        .iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| *name)
        .collect()
}

/// The gate and the validator sharing one credential store.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    gate: PermissionGate,
    tokens: TokenValidator,
}

impl AuthService {
    pub fn new(store: Arc<dyn CredentialStore>, tokens: TokenValidator) -> Self {
        Self {
            gate: PermissionGate::new(store.clone()),
            store,
            tokens,
        }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn gate(&self) -> &PermissionGate {
        &self.gate
    }

    pub fn tokens(&self) -> &TokenValidator {
        &self.tokens
    }

    /// Gate, token, then the active flag for one caller, loading identity
    /// and permission document in a single store acquisition.
    pub async fn admit(
        &self,
        kind: IdentityKind,
        id: i64,
        token: &str,
        action: &ActionKey,
    ) -> Result<Caller, AuthError> {
        let context = self
            .store
            .find_guard_context(kind, id)
            .await?
            .ok_or(AuthError::NotFound(kind))?;

        check_document(
            &context.identity.role,
            context.permission_document.as_deref(),
            action,
        )?;
        let token = self.tokens.check_record(kind, &context.identity, token).await?;
        if !context.identity.active {
            warn!(kind = kind.as_str(), id, "Guard refused: account inactive");
            return Err(AuthError::Inactive(kind));
        }

        Ok(Caller { kind, id, token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credential_store::memory::MemoryCredentialStore;
    use crate::auth::models::IdentityRecord;
    use crate::auth::token::ExpiredTokenPolicy;
    use chrono::{Duration, Utc};

    fn service(store: MemoryCredentialStore) -> AuthService {
        let store: Arc<dyn CredentialStore> = Arc::new(store);
        let tokens = TokenValidator::new(store.clone(), Duration::hours(1), ExpiredTokenPolicy::Accept);
        AuthService::new(store, tokens)
    }

    fn identity(id: i64, role: &str, token: &str) -> IdentityRecord {
        IdentityRecord {
            id,
            role: role.to_string(),
            login_token: Some(token.to_string()),
            token_expiry: Some(Utc::now() + Duration::minutes(10)),
            active: true,
        }
    }

    #[test]
    fn test_missing_fields_lists_every_absent_field() {
        let name: Option<String> = Some("Acme".into());
        let blank: Option<String> = Some("   ".into());
        let none: Option<String> = None;
        let id: Option<i64> = None;
        let emails: Option<Vec<String>> = Some(vec![]);

        let missing = missing_fields(&[
            field("admin_id", &id),
            field("_token", &none),
            field("name", &name),
            field("mobile", &blank),
            field("emails", &emails),
        ]);
        assert_eq!(missing, vec!["admin_id", "_token", "mobile", "emails"]);
        assert!(missing_fields(&[field("name", &name)]).is_empty());
    }

    #[tokio::test]
    async fn test_admit_runs_gate_before_token() {
        let service = service(
            MemoryCredentialStore::default()
                .with_identity(IdentityKind::Admin, identity(5, "viewer", "good"))
                .with_document("viewer", r#"{"customer":{"view":true}}"#),
        );

        // Wrong token and missing permission: the gate answers first.
        let err = service
            .admit(IdentityKind::Admin, 5, "bad", &ActionKey::scoped("customer", "create"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccessDenied(_)));

        let err = service
            .admit(IdentityKind::Admin, 5, "bad", &ActionKey::scoped("customer", "view"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized(_)));

        let caller = service
            .admit(IdentityKind::Admin, 5, "good", &ActionKey::scoped("customer", "view"))
            .await
            .unwrap();
        assert_eq!(
            caller,
            Caller {
                kind: IdentityKind::Admin,
                id: 5,
                token: "good".into()
            }
        );
    }

    #[tokio::test]
    async fn test_admit_rejects_inactive_identity_after_token() {
        let mut suspended = identity(9, "branch", "good");
        suspended.active = false;
        let service = service(
            MemoryCredentialStore::default()
                .with_identity(IdentityKind::Branch, suspended)
                .with_document("branch", r#"{"ticket":true}"#),
        );
        let action = ActionKey::simple("ticket");

        let err = service
            .admit(IdentityKind::Branch, 9, "bad", &action)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized(_)));

        let err = service
            .admit(IdentityKind::Branch, 9, "good", &action)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Inactive(IdentityKind::Branch)));
    }

    #[tokio::test]
    async fn test_admit_unknown_branch_is_not_found() {
        let service = service(MemoryCredentialStore::default());
        let err = service
            .admit(IdentityKind::Branch, 12, "abc", &ActionKey::simple("ticket"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotFound(IdentityKind::Branch)));
    }
}
