//! Permission Gate
//! Role-based checks against per-role JSON permission documents

use crate::auth::credential_store::CredentialStore;
use crate::auth::models::{ActionKey, AuthError, IdentityKind};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct PermissionGate {
    store: Arc<dyn CredentialStore>,
}

impl PermissionGate {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Confirm that the identity's role grants `action`. Read-only.
    pub async fn authorize(
        &self,
        kind: IdentityKind,
        id: i64,
        action: &ActionKey,
    ) -> Result<(), AuthError> {
        let identity = self
            .store
            .find_identity(kind, id)
            .await?
            .ok_or(AuthError::NotFound(kind))?;
        let document = self.store.find_permission_document(&identity.role).await?;
        check_document(&identity.role, document.as_deref(), action)
    }
}

/// Decide `action` against a role's raw permission document.
pub fn check_document(
    role: &str,
    document: Option<&str>,
    action: &ActionKey,
) -> Result<(), AuthError> {
    let Some(raw) = document else {
        warn!(role, %action, "No permission document for role");
        return Err(AuthError::AccessDenied(format!("role {role} has no permissions")));
    };
    let Some(permissions) = parse_document(raw) else {
        warn!(role, "Unreadable permission document");
        return Err(AuthError::AccessDenied(format!(
            "permissions for role {role} could not be read"
        )));
    };

    if grants(&permissions, action) {
        debug!(role, %action, "Permission granted");
        Ok(())
    } else {
        Err(AuthError::AccessDenied(format!("{action} is not allowed")))
    }
}

/// Parse a permission document, unwrapping one level of string encoding.
pub fn parse_document(raw: &str) -> Option<Map<String, Value>> {
    let value = match serde_json::from_str::<Value>(raw).ok()? {
        Value::String(inner) => serde_json::from_str::<Value>(&inner).ok()?,
        other => other,
    };
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Walk the action path. A literal `true` on the way grants the subtree;
/// otherwise the value at the end of the path must be truthy.
pub fn grants(permissions: &Map<String, Value>, action: &ActionKey) -> bool {
    let mut current = permissions;
    let path = action.path();
    for (depth, key) in path.iter().enumerate() {
        let Some(value) = current.get(*key) else {
            return false;
        };
        if depth + 1 == path.len() {
            return is_truthy(value);
        }
        match value {
            Value::Bool(true) => return true,
            Value::Object(next) => current = next,
            _ => return false,
        }
    }
    false
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credential_store::memory::MemoryCredentialStore;
    use crate::auth::models::IdentityRecord;

    fn admin(id: i64, role: &str) -> IdentityRecord {
        IdentityRecord {
            id,
            role: role.to_string(),
            login_token: None,
            token_expiry: None,
            active: true,
        }
    }

    fn gate(store: MemoryCredentialStore) -> PermissionGate {
        PermissionGate::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_viewer_cannot_create_customer() {
        let gate = gate(
            MemoryCredentialStore::default()
                .with_identity(IdentityKind::Admin, admin(5, "viewer"))
                .with_document("viewer", r#"{"customer":{"view":true}}"#),
        );

        let err = gate
            .authorize(IdentityKind::Admin, 5, &ActionKey::scoped("customer", "create"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccessDenied(_)));

        gate.authorize(IdentityKind::Admin, 5, &ActionKey::scoped("customer", "view"))
            .await
            .unwrap();
        // Simple keys only need a truthy value under the key.
        gate.authorize(IdentityKind::Admin, 5, &ActionKey::simple("customer"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_identity_and_missing_document() {
        let gate = gate(
            MemoryCredentialStore::default().with_identity(IdentityKind::Admin, admin(1, "ghost")),
        );

        let err = gate
            .authorize(IdentityKind::Admin, 2, &ActionKey::simple("customer"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotFound(IdentityKind::Admin)));

        let err = gate
            .authorize(IdentityKind::Admin, 1, &ActionKey::simple("customer"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn test_authorize_is_idempotent() {
        let gate = gate(
            MemoryCredentialStore::default()
                .with_identity(IdentityKind::Branch, admin(12, "branch"))
                .with_document("branch", r#"{"ticket":true}"#),
        );
        let action = ActionKey::scoped("ticket", "create");
        for _ in 0..3 {
            gate.authorize(IdentityKind::Branch, 12, &action).await.unwrap();
        }
    }

    #[test]
    fn test_double_encoded_document_is_unwrapped() {
        let inner = r#"{"branch":{"delete":true}}"#;
        let double = serde_json::to_string(inner).unwrap();
        assert!(check_document("admin", Some(&double), &ActionKey::scoped("branch", "delete")).is_ok());

        // Only one level is unwrapped.
        let triple = serde_json::to_string(&double).unwrap();
        assert!(check_document("admin", Some(&triple), &ActionKey::scoped("branch", "delete")).is_err());
    }

    #[test]
    fn test_unparseable_or_non_object_document_denies() {
        let action = ActionKey::simple("customer");
        assert!(check_document("r", Some("{not json"), &action).is_err());
        assert!(check_document("r", Some("[true]"), &action).is_err());
        assert!(check_document("r", None, &action).is_err());
    }

    #[test]
    fn test_truthiness_at_action_key() {
        let doc = parse_document(
            r#"{"a":true,"b":false,"c":0,"d":"","e":null,"f":1,"g":"yes","h":{},"i":{"view":false}}"#,
        )
        .unwrap();
        let allowed = |key: &'static str| grants(&doc, &ActionKey::simple(key));
        assert!(allowed("a"));
        assert!(!allowed("b"));
        assert!(!allowed("c"));
        assert!(!allowed("d"));
        assert!(!allowed("e"));
        assert!(allowed("f"));
        assert!(allowed("g"));
        assert!(allowed("h"));
        assert!(allowed("i"));
        assert!(!allowed("missing"));

        assert!(grants(&doc, &ActionKey::scoped("a", "delete")));
        assert!(!grants(&doc, &ActionKey::scoped("i", "view")));
        assert!(!grants(&doc, &ActionKey::scoped("g", "view")));
    }
}
