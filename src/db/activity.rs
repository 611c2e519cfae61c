//! Admin activity log

use super::{now_rfc3339, Database};
use crate::models::ActivityEntry;
use anyhow::{Context, Result};
use rusqlite::params;
use tracing::warn;

impl Database {
    /// Append an activity entry.
    ///
    /// Best-effort: a failed write is logged and swallowed so it can never
    /// fail the operation being audited.
    pub async fn record_activity(
        &self,
        admin_id: i64,
        module: &str,
        action: &str,
        result: bool,
        description: &str,
    ) {
        let conn = self.acquire().await;
        if let Err(e) = conn.execute(
            "INSERT INTO admin_activity_logs (admin_id, module, action, result, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![admin_id, module, action, result as i64, description, now_rfc3339()],
        ) {
            warn!(admin_id, module, action, error = %e, "Failed to record activity");
        }
    }

    /// Most recent entries first.
    pub async fn list_activity(&self, limit: i64) -> Result<Vec<ActivityEntry>> {
        let conn = self.acquire().await;
        let mut stmt = conn.prepare(
            "SELECT id, admin_id, module, action, result, description, created_at
             FROM admin_activity_logs ORDER BY id DESC LIMIT ?1",
        )?;
        let entries = stmt
            .query_map(params![limit], |row| {
                Ok(ActivityEntry {
                    id: row.get(0)?,
                    admin_id: row.get(1)?,
                    module: row.get(2)?,
                    action: row.get(3)?,
                    result: row.get::<_, i64>(4)? != 0,
                    description: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list activity log")?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_support::create_test_db;

    #[tokio::test]
    async fn test_activity_newest_first_with_limit() {
        let (db, _temp) = create_test_db().await;
        db.record_activity(1, "customer", "create", true, "Created CL-1")
            .await;
        db.record_activity(1, "branch", "delete", false, "Head branch")
            .await;
        db.record_activity(1, "spoc", "update", true, "Updated 3").await;

        let entries = db.list_activity(2).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].module, "spoc");
        assert_eq!(entries[1].module, "branch");
        assert!(!entries[1].result);
    }

    #[tokio::test]
    async fn test_activity_write_failure_is_swallowed() {
        let (db, _temp) = create_test_db().await;
        {
            let conn = db.acquire().await;
            conn.execute("DROP TABLE admin_activity_logs", []).unwrap();
        }
        // Must not panic or propagate.
        db.record_activity(1, "customer", "delete", true, "gone").await;
        assert!(db.list_activity(10).await.is_err());
    }
}
