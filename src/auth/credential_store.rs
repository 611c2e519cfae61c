//! Credential Storage
//! Repository interface for identities and permission documents, with the SQLite backend

use crate::auth::models::{GuardContext, IdentityKind, IdentityRecord, LoginRecord};
use crate::db::{parse_timestamp, Database};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

/// Read/write access to login credentials, injected into the token
/// validator and the permission gate.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_identity(&self, kind: IdentityKind, id: i64) -> Result<Option<IdentityRecord>>;

    async fn find_permission_document(&self, role: &str) -> Result<Option<String>>;

    /// Identity and its role's permission document in one round-trip.
    async fn find_guard_context(&self, kind: IdentityKind, id: i64) -> Result<Option<GuardContext>> {
        let Some(identity) = self.find_identity(kind, id).await? else {
            return Ok(None);
        };
        let permission_document = self.find_permission_document(&identity.role).await?;
        Ok(Some(GuardContext {
            identity,
            permission_document,
        }))
    }

    async fn find_login(&self, kind: IdentityKind, email: &str) -> Result<Option<LoginRecord>>;

    /// Overwrite (or clear, with `None`) the identity's token. Returns false
    /// when the identity does not exist.
    async fn store_token(
        &self,
        kind: IdentityKind,
        id: i64,
        token: Option<&str>,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<bool>;
}

fn identity_table(kind: IdentityKind) -> &'static str {
    match kind {
        IdentityKind::Admin => "admins",
        IdentityKind::Branch => "branches",
    }
}

fn select_identity(conn: &Connection, kind: IdentityKind, id: i64) -> Result<Option<IdentityRecord>> {
    let sql = match kind {
        IdentityKind::Admin => {
            "SELECT id, role, login_token, token_expiry, status FROM admins WHERE id = ?1"
        }
        IdentityKind::Branch => {
            "SELECT b.id, b.role, b.login_token, b.token_expiry, (b.status AND c.status)
             FROM branches b JOIN customers c ON c.id = b.customer_id
             WHERE b.id = ?1"
        }
    };
    let record = conn
        .query_row(sql, params![id], |row| {
            Ok(IdentityRecord {
                id: row.get(0)?,
                role: row.get(1)?,
                login_token: row.get(2)?,
                token_expiry: parse_timestamp(row.get(3)?),
                active: row.get::<_, i64>(4)? != 0,
            })
        })
        .optional()
        .with_context(|| format!("Failed to load {} {id}", kind.as_str()))?;
    Ok(record)
}

fn select_permission_document(conn: &Connection, role: &str) -> Result<Option<String>> {
    let document = conn
        .query_row(
            "SELECT json FROM permissions WHERE role = ?1",
            params![role],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("Failed to load permissions for role {role}"))?;
    Ok(document)
}

#[async_trait]
impl CredentialStore for Database {
    async fn find_identity(&self, kind: IdentityKind, id: i64) -> Result<Option<IdentityRecord>> {
        let conn = self.acquire().await;
        select_identity(&conn, kind, id)
    }

    async fn find_permission_document(&self, role: &str) -> Result<Option<String>> {
        let conn = self.acquire().await;
        select_permission_document(&conn, role)
    }

    async fn find_guard_context(&self, kind: IdentityKind, id: i64) -> Result<Option<GuardContext>> {
        let conn = self.acquire().await;
        let Some(identity) = select_identity(&conn, kind, id)? else {
            return Ok(None);
        };
        let permission_document = select_permission_document(&conn, &identity.role)?;
        Ok(Some(GuardContext {
            identity,
            permission_document,
        }))
    }

    async fn find_login(&self, kind: IdentityKind, email: &str) -> Result<Option<LoginRecord>> {
        let sql = match kind {
            IdentityKind::Admin => "SELECT id, password_hash, status FROM admins WHERE email = ?1",
            IdentityKind::Branch => {
                "SELECT b.id, b.password_hash, (b.status AND c.status)
                 FROM branches b JOIN customers c ON c.id = b.customer_id
                 WHERE b.email = ?1"
            }
        };
        let conn = self.acquire().await;
        let record = conn
            .query_row(sql, params![email], |row| {
                Ok(LoginRecord {
                    id: row.get(0)?,
                    password_hash: row.get(1)?,
                    active: row.get::<_, i64>(2)? != 0,
                })
            })
            .optional()
            .context("Failed to load login record")?;
        Ok(record)
    }

    async fn store_token(
        &self,
        kind: IdentityKind,
        id: i64,
        token: Option<&str>,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let sql = format!(
            "UPDATE {} SET login_token = ?1, token_expiry = ?2 WHERE id = ?3",
            identity_table(kind)
        );
        let conn = self.acquire().await;
        let rows = conn
            .execute(&sql, params![token, expiry.map(|e| e.to_rfc3339()), id])
            .with_context(|| format!("Failed to store token for {} {id}", kind.as_str()))?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-memory store used by the auth unit tests.

    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct MemoryCredentialStore {
        identities: Mutex<HashMap<(IdentityKind, i64), IdentityRecord>>,
        documents: Mutex<HashMap<String, String>>,
    }

    impl MemoryCredentialStore {
        pub fn with_identity(self, kind: IdentityKind, record: IdentityRecord) -> Self {
            self.identities.lock().insert((kind, record.id), record);
            self
        }

        pub fn with_document(self, role: &str, document: &str) -> Self {
            self.documents
                .lock()
                .insert(role.to_string(), document.to_string());
            self
        }

        pub fn identity(&self, kind: IdentityKind, id: i64) -> Option<IdentityRecord> {
            self.identities.lock().get(&(kind, id)).cloned()
        }
    }

    #[async_trait]
    impl CredentialStore for MemoryCredentialStore {
        async fn find_identity(
            &self,
            kind: IdentityKind,
            id: i64,
        ) -> Result<Option<IdentityRecord>> {
            Ok(self.identities.lock().get(&(kind, id)).cloned())
        }

        async fn find_permission_document(&self, role: &str) -> Result<Option<String>> {
            Ok(self.documents.lock().get(role).cloned())
        }

        async fn find_login(&self, _kind: IdentityKind, _email: &str) -> Result<Option<LoginRecord>> {
            Ok(None)
        }

        async fn store_token(
            &self,
            kind: IdentityKind,
            id: i64,
            token: Option<&str>,
            expiry: Option<DateTime<Utc>>,
        ) -> Result<bool> {
            let mut identities = self.identities.lock();
            match identities.get_mut(&(kind, id)) {
                Some(record) => {
                    record.login_token = token.map(str::to_string);
                    record.token_expiry = expiry;
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }
}
