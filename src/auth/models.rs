//! Authentication Models
//! Identities, capability keys and the errors raised by the auth core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;

/// The two kinds of identity that can hold a login token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentityKind {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "branch")]
    Branch,
}

impl IdentityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityKind::Admin => "admin",
            IdentityKind::Branch => "branch",
        }
    }

    /// Request field carrying the caller's id for this kind.
    pub fn id_field(&self) -> &'static str {
        match self {
            IdentityKind::Admin => "admin_id",
            IdentityKind::Branch => "branch_id",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IdentityKind::Admin => "Admin",
            IdentityKind::Branch => "Branch",
        }
    }
}

/// Stored credential state for one identity.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityRecord {
    pub id: i64,
    pub role: String,
    pub login_token: Option<String>,
    pub token_expiry: Option<DateTime<Utc>>,
    /// For a branch, both the branch and its customer must be active.
    pub active: bool,
}

/// Identity plus the permission document of its role, loaded together.
#[derive(Debug, Clone)]
pub struct GuardContext {
    pub identity: IdentityRecord,
    pub permission_document: Option<String>,
}

/// Row needed to check a password at login.
#[derive(Debug, Clone)]
pub struct LoginRecord {
    pub id: i64,
    pub password_hash: String,
    pub active: bool,
}

/// A freshly issued login token.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// A requested capability.
///
/// `Simple("customer")` asks for anything under the `customer` key of the
/// role's permission document. `Scoped { resource: "customer", verb: "create" }`
/// asks for `customer.create` specifically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionKey {
    Simple(Cow<'static, str>),
    Scoped {
        resource: Cow<'static, str>,
        verb: Cow<'static, str>,
    },
}

impl ActionKey {
    pub const fn scoped(resource: &'static str, verb: &'static str) -> Self {
        ActionKey::Scoped {
            resource: Cow::Borrowed(resource),
            verb: Cow::Borrowed(verb),
        }
    }

    pub const fn simple(name: &'static str) -> Self {
        ActionKey::Simple(Cow::Borrowed(name))
    }

    /// Parse an action as it arrives on the wire.
    ///
    /// A JSON object with exactly one string entry is scoped, a JSON string is
    /// simple, and anything else is taken verbatim as a simple key.
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw.trim()) {
            Ok(Value::Object(map)) if map.len() == 1 => {
                if let Some((resource, Value::String(verb))) = map.into_iter().next() {
                    return ActionKey::Scoped {
                        resource: Cow::Owned(resource),
                        verb: Cow::Owned(verb),
                    };
                }
                ActionKey::Simple(Cow::Owned(raw.to_string()))
            }
            Ok(Value::String(name)) => ActionKey::Simple(Cow::Owned(name)),
            _ => ActionKey::Simple(Cow::Owned(raw.to_string())),
        }
    }

    /// Keys to walk through the permission document.
    pub fn path(&self) -> Vec<&str> {
        match self {
            ActionKey::Simple(name) => vec![&**name],
            ActionKey::Scoped { resource, verb } => vec![&**resource, &**verb],
        }
    }

    pub fn resource(&self) -> &str {
        match self {
            ActionKey::Simple(name) => &**name,
            ActionKey::Scoped { resource, .. } => &**resource,
        }
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKey::Simple(name) => f.write_str(name),
            ActionKey::Scoped { resource, verb } => {
                let mut map = serde_json::Map::new();
                map.insert(resource.to_string(), Value::String(verb.to_string()));
                write!(f, "{}", Value::Object(map))
            }
        }
    }
}

/// Errors raised by the token validator and permission gate.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{} not found", .0.label())]
    NotFound(IdentityKind),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("Token expired, please log in again")]
    TokenExpired { rotated: Option<String> },
    #[error("Access denied: {0}")]
    AccessDenied(String),
    #[error("{} account is inactive", .0.label())]
    Inactive(IdentityKind),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}
