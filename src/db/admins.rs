//! Admin accounts

use super::{now_rfc3339, Database};
use crate::models::AdminProfile;
use anyhow::{Context, Result};
use bcrypt::{hash, DEFAULT_COST};
use rusqlite::{params, OptionalExtension, Row};
use tracing::info;

const ADMIN_COLUMNS: &str = "id, name, email, mobile, role, status, created_at";

fn admin_from_row(row: &Row<'_>) -> rusqlite::Result<AdminProfile> {
    Ok(AdminProfile {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        mobile: row.get(3)?,
        role: row.get(4)?,
        status: row.get::<_, i64>(5)? != 0,
        created_at: row.get(6)?,
    })
}

impl Database {
    /// Provision an admin account.
    pub async fn create_admin(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: &str,
    ) -> Result<i64> {
        let password_hash = hash(password, DEFAULT_COST).context("Failed to hash password")?;
        let conn = self.acquire().await;
        conn.execute(
            "INSERT INTO admins (name, email, mobile, password_hash, role, status, created_at)
             VALUES (?1, ?2, NULL, ?3, ?4, 1, ?5)",
            params![name, email, password_hash, role, now_rfc3339()],
        )
        .context("Failed to insert admin")?;
        let id = conn.last_insert_rowid();
        info!(admin_id = id, email, role, "Admin created");
        Ok(id)
    }

    pub async fn get_admin(&self, id: i64) -> Result<Option<AdminProfile>> {
        let conn = self.acquire().await;
        let admin = conn
            .query_row(
                &format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE id = ?1"),
                params![id],
                admin_from_row,
            )
            .optional()
            .context("Failed to load admin")?;
        Ok(admin)
    }

    pub async fn update_admin_password(&self, id: i64, password_hash: &str) -> Result<bool> {
        let conn = self.acquire().await;
        let rows = conn
            .execute(
                "UPDATE admins SET password_hash = ?1 WHERE id = ?2",
                params![password_hash, id],
            )
            .context("Failed to update admin password")?;
        Ok(rows > 0)
    }

    pub async fn set_admin_status(&self, id: i64, active: bool) -> Result<bool> {
        let conn = self.acquire().await;
        let rows = conn
            .execute(
                "UPDATE admins SET status = ?1 WHERE id = ?2",
                params![active as i64, id],
            )
            .context("Failed to update admin status")?;
        Ok(rows > 0)
    }
}
