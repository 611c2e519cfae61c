//! SQLite persistence
//! One WAL-mode connection behind an async mutex; every call is a scoped acquisition.

pub mod activity;
pub mod admins;
pub mod applications;
pub mod branches;
pub mod customers;
pub mod spocs;
pub mod tickets;

use anyhow::{Context, Result};
use bcrypt::{hash, DEFAULT_COST};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

/// Role given full access by the seeded permission documents.
pub const SUPER_ADMIN_ROLE: &str = "super_admin";
/// Role assigned to every branch login.
pub const BRANCH_ROLE: &str = "branch";

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file and make sure the schema exists.
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("open database at {db_path}"))?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("enable foreign keys")?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Hold the connection for a sequence of statements. Released on drop.
    pub async fn acquire(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().await
    }

    /// Insert the default super admin and permission documents when absent.
    pub async fn seed_defaults(&self, admin_email: &str, admin_password: &str) -> Result<()> {
        let password_hash = hash(admin_password, DEFAULT_COST).context("hash default password")?;
        let conn = self.acquire().await;

        for (role, document) in default_permission_documents() {
            conn.execute(
                "INSERT OR IGNORE INTO permissions (role, json, updated_at) VALUES (?1, ?2, ?3)",
                params![role, document.to_string(), now_rfc3339()],
            )
            .with_context(|| format!("seed permissions for {role}"))?;
        }

        let admins: i64 = conn
            .query_row("SELECT COUNT(*) FROM admins", [], |row| row.get(0))
            .context("count admins")?;
        if admins == 0 {
            conn.execute(
                "INSERT INTO admins (name, email, mobile, password_hash, role, status, created_at)
                 VALUES (?1, ?2, NULL, ?3, ?4, 1, ?5)",
                params![
                    "Administrator",
                    admin_email,
                    password_hash,
                    SUPER_ADMIN_ROLE,
                    now_rfc3339()
                ],
            )
            .context("insert default admin")?;
            info!(email = admin_email, "Default super admin created");
            warn!("Change the default admin password before exposing this service");
        }

        Ok(())
    }

    /// Replace the permission document of a role.
    pub async fn put_permission_document(&self, role: &str, document: &str) -> Result<()> {
        let conn = self.acquire().await;
        conn.execute(
            "INSERT INTO permissions (role, json, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(role) DO UPDATE SET json = excluded.json, updated_at = excluded.updated_at",
            params![role, document, now_rfc3339()],
        )
        .with_context(|| format!("store permissions for {role}"))?;
        Ok(())
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS admins (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            mobile TEXT,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL,
            status INTEGER NOT NULL DEFAULT 1,
            login_token TEXT,
            token_expiry TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS permissions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            role TEXT UNIQUE NOT NULL,
            json TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS customers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            client_unique_id TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            emails TEXT NOT NULL,
            mobile TEXT,
            address TEXT,
            tat_days INTEGER,
            status INTEGER NOT NULL DEFAULT 1,
            admin_id INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS branches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_id INTEGER NOT NULL REFERENCES customers(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            is_head INTEGER NOT NULL DEFAULT 0,
            status INTEGER NOT NULL DEFAULT 1,
            role TEXT NOT NULL DEFAULT 'branch',
            login_token TEXT,
            token_expiry TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_branches_customer ON branches(customer_id);

        CREATE TABLE IF NOT EXISTS client_spocs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            designation TEXT NOT NULL,
            phone TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            admin_id INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS client_applications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            application_id TEXT UNIQUE NOT NULL,
            branch_id INTEGER NOT NULL REFERENCES branches(id) ON DELETE CASCADE,
            customer_id INTEGER NOT NULL REFERENCES customers(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            employee_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'wip',
            remarks TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_applications_branch ON client_applications(branch_id);

        CREATE TABLE IF NOT EXISTS tickets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ticket_number TEXT UNIQUE NOT NULL,
            branch_id INTEGER NOT NULL REFERENCES branches(id) ON DELETE CASCADE,
            customer_id INTEGER NOT NULL REFERENCES customers(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'open',
            remarks TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS ticket_conversations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ticket_id INTEGER NOT NULL REFERENCES tickets(id) ON DELETE CASCADE,
            sender TEXT NOT NULL,
            message TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS admin_activity_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            admin_id INTEGER NOT NULL,
            module TEXT NOT NULL,
            action TEXT NOT NULL,
            result INTEGER NOT NULL,
            description TEXT NOT NULL,
            created_at TEXT NOT NULL
        );",
    )
    .context("create schema")?;
    Ok(())
}

fn default_permission_documents() -> Vec<(&'static str, serde_json::Value)> {
    vec![
        (
            SUPER_ADMIN_ROLE,
            serde_json::json!({
                "customer": true,
                "branch": true,
                "client_spoc": true,
                "cmt": true,
                "ticket": true,
                "activity_log": true,
            }),
        ),
        (
            "admin",
            serde_json::json!({
                "customer": { "view": true, "create": true, "update": true, "status": true },
                "branch": { "view": true, "create": true, "update": true, "status": true },
                "client_spoc": { "view": true, "create": true, "update": true },
                "cmt": true,
                "ticket": true,
            }),
        ),
        (
            BRANCH_ROLE,
            serde_json::json!({
                "client_application": true,
                "ticket": { "view": true, "create": true, "chat": true },
            }),
        ),
    ]
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

pub(crate) fn parse_timestamp(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// True when the error (or anything it wraps) is a SQLite constraint violation.
pub fn is_constraint_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation
        )
    })
}

pub(crate) fn exists(conn: &Connection, sql: &str, value: &dyn rusqlite::ToSql) -> Result<bool> {
    Ok(conn
        .query_row(sql, [value], |_| Ok(()))
        .optional()?
        .is_some())
}
