//! Client single points of contact

use super::{now_rfc3339, Database};
use crate::models::Spoc;
use anyhow::{Context, Result};
use rusqlite::{params, Row};

fn spoc_from_row(row: &Row<'_>) -> rusqlite::Result<Spoc> {
    Ok(Spoc {
        id: row.get(0)?,
        name: row.get(1)?,
        designation: row.get(2)?,
        phone: row.get(3)?,
        email: row.get(4)?,
        admin_id: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl Database {
    pub async fn create_spoc(
        &self,
        name: &str,
        designation: &str,
        phone: &str,
        email: &str,
        admin_id: i64,
    ) -> Result<i64> {
        let now = now_rfc3339();
        let conn = self.acquire().await;
        conn.execute(
            "INSERT INTO client_spocs (name, designation, phone, email, admin_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![name, designation, phone, email, admin_id, now],
        )
        .context("Failed to insert client spoc")?;
        Ok(conn.last_insert_rowid())
    }

    pub async fn list_spocs(&self) -> Result<Vec<Spoc>> {
        let conn = self.acquire().await;
        let mut stmt = conn.prepare(
            "SELECT id, name, designation, phone, email, admin_id, created_at, updated_at
             FROM client_spocs ORDER BY id DESC",
        )?;
        let spocs = stmt
            .query_map([], spoc_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list client spocs")?;
        Ok(spocs)
    }

    pub async fn update_spoc(
        &self,
        id: i64,
        name: &str,
        designation: &str,
        phone: &str,
        email: &str,
    ) -> Result<bool> {
        let conn = self.acquire().await;
        let rows = conn
            .execute(
                "UPDATE client_spocs SET name = ?1, designation = ?2, phone = ?3, email = ?4,
                                         updated_at = ?5
                 WHERE id = ?6",
                params![name, designation, phone, email, now_rfc3339(), id],
            )
            .context("Failed to update client spoc")?;
        Ok(rows > 0)
    }

    pub async fn delete_spoc(&self, id: i64) -> Result<bool> {
        let conn = self.acquire().await;
        let rows = conn
            .execute("DELETE FROM client_spocs WHERE id = ?1", params![id])
            .context("Failed to delete client spoc")?;
        Ok(rows > 0)
    }
}
