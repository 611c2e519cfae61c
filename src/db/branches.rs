//! Customer branches

use super::{exists, now_rfc3339, Database, BRANCH_ROLE};
use crate::models::Branch;
use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Row};
use tracing::info;

const BRANCH_COLUMNS: &str = "id, customer_id, name, email, is_head, status, created_at, updated_at";

fn branch_from_row(row: &Row<'_>) -> rusqlite::Result<Branch> {
    Ok(Branch {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        is_head: row.get::<_, i64>(4)? != 0,
        status: row.get::<_, i64>(5)? != 0,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl Database {
    /// Add a non-head branch to an existing customer.
    pub async fn create_branch(
        &self,
        customer_id: i64,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<i64> {
        let now = now_rfc3339();
        let conn = self.acquire().await;
        conn.execute(
            "INSERT INTO branches (customer_id, name, email, password_hash, is_head, status, role,
                                   created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 0, 1, ?5, ?6, ?6)",
            params![customer_id, name, email, password_hash, BRANCH_ROLE, now],
        )
        .context("Failed to insert branch")?;
        let id = conn.last_insert_rowid();
        info!(branch_id = id, customer_id, "Branch created");
        Ok(id)
    }

    pub async fn branch_email_exists(&self, email: &str) -> Result<bool> {
        let conn = self.acquire().await;
        exists(&conn, "SELECT 1 FROM branches WHERE email = ?1", &email)
    }

    pub async fn get_branch(&self, id: i64) -> Result<Option<Branch>> {
        let conn = self.acquire().await;
        let branch = conn
            .query_row(
                &format!("SELECT {BRANCH_COLUMNS} FROM branches WHERE id = ?1"),
                params![id],
                branch_from_row,
            )
            .optional()
            .context("Failed to load branch")?;
        Ok(branch)
    }

    pub async fn list_branches(&self, customer_id: i64) -> Result<Vec<Branch>> {
        let conn = self.acquire().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {BRANCH_COLUMNS} FROM branches WHERE customer_id = ?1 ORDER BY is_head DESC, id"
        ))?;
        let branches = stmt
            .query_map(params![customer_id], branch_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list branches")?;
        Ok(branches)
    }

    pub async fn update_branch(
        &self,
        id: i64,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<bool> {
        let conn = self.acquire().await;
        let rows = conn
            .execute(
                "UPDATE branches SET name = COALESCE(?1, name), email = COALESCE(?2, email),
                                     updated_at = ?3
                 WHERE id = ?4",
                params![name, email, now_rfc3339(), id],
            )
            .context("Failed to update branch")?;
        Ok(rows > 0)
    }

    pub async fn set_branch_status(&self, id: i64, active: bool) -> Result<bool> {
        let conn = self.acquire().await;
        let rows = conn
            .execute(
                "UPDATE branches SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![active as i64, now_rfc3339(), id],
            )
            .context("Failed to update branch status")?;
        Ok(rows > 0)
    }

    pub async fn delete_branch(&self, id: i64) -> Result<bool> {
        let conn = self.acquire().await;
        let rows = conn
            .execute("DELETE FROM branches WHERE id = ?1", params![id])
            .context("Failed to delete branch")?;
        if rows > 0 {
            info!(branch_id = id, "Branch deleted");
        }
        Ok(rows > 0)
    }
}
