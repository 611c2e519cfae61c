//! Client applications tracked by the client master tracker

use super::{exists, now_rfc3339, Database};
use crate::models::{ApplicationStatus, ClientApplication};
use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Row};
use tracing::{info, warn};

const APPLICATION_COLUMNS: &str = "id, application_id, branch_id, customer_id, name, employee_id, \
                                   status, remarks, created_at, updated_at";

fn application_from_row(row: &Row<'_>) -> rusqlite::Result<ClientApplication> {
    let id: i64 = row.get(0)?;
    let raw_status: String = row.get(6)?;
    let status = raw_status.parse().unwrap_or_else(|_| {
        warn!(id, status = %raw_status, "Unknown application status, treating as wip");
        ApplicationStatus::Wip
    });
    Ok(ClientApplication {
        id,
        application_id: row.get(1)?,
        branch_id: row.get(2)?,
        customer_id: row.get(3)?,
        name: row.get(4)?,
        employee_id: row.get(5)?,
        status,
        remarks: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl Database {
    /// Register an application under a branch.
    ///
    /// The public id is `<client_unique_id>-<n>` with `n` counting the
    /// customer's applications, bumped past any id already taken.
    pub async fn create_application(
        &self,
        branch_id: i64,
        customer_id: i64,
        client_unique_id: &str,
        name: &str,
        employee_id: &str,
    ) -> Result<ClientApplication> {
        let now = now_rfc3339();
        let conn = self.acquire().await;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM client_applications WHERE customer_id = ?1",
            params![customer_id],
            |row| row.get(0),
        )?;
        let mut sequence = count + 1;
        let mut application_id = format!("{client_unique_id}-{sequence}");
        while exists(
            &conn,
            "SELECT 1 FROM client_applications WHERE application_id = ?1",
            &application_id,
        )? {
            sequence += 1;
            application_id = format!("{client_unique_id}-{sequence}");
        }

        conn.execute(
            "INSERT INTO client_applications (application_id, branch_id, customer_id, name,
                                              employee_id, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                application_id,
                branch_id,
                customer_id,
                name,
                employee_id,
                ApplicationStatus::Wip.as_str(),
                now,
            ],
        )
        .context("Failed to insert client application")?;
        let id = conn.last_insert_rowid();
        info!(%application_id, branch_id, "Client application created");

        Ok(ClientApplication {
            id,
            application_id,
            branch_id,
            customer_id,
            name: name.to_string(),
            employee_id: employee_id.to_string(),
            status: ApplicationStatus::Wip,
            remarks: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub async fn get_application(&self, application_id: &str) -> Result<Option<ClientApplication>> {
        let conn = self.acquire().await;
        let application = conn
            .query_row(
                &format!(
                    "SELECT {APPLICATION_COLUMNS} FROM client_applications WHERE application_id = ?1"
                ),
                params![application_id],
                application_from_row,
            )
            .optional()
            .context("Failed to load client application")?;
        Ok(application)
    }

    pub async fn list_applications(&self, branch_id: i64) -> Result<Vec<ClientApplication>> {
        let conn = self.acquire().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM client_applications WHERE branch_id = ?1 ORDER BY id DESC"
        ))?;
        let applications = stmt
            .query_map(params![branch_id], application_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list client applications")?;
        Ok(applications)
    }

    pub async fn count_applications_for_customer(&self, customer_id: i64) -> Result<i64> {
        let conn = self.acquire().await;
        let count = conn
            .query_row(
                "SELECT COUNT(*) FROM client_applications WHERE customer_id = ?1",
                params![customer_id],
                |row| row.get(0),
            )
            .context("Failed to count client applications")?;
        Ok(count)
    }

    pub async fn update_application_status(
        &self,
        application_id: &str,
        status: ApplicationStatus,
        remarks: Option<&str>,
    ) -> Result<bool> {
        let conn = self.acquire().await;
        let rows = conn
            .execute(
                "UPDATE client_applications SET status = ?1, remarks = COALESCE(?2, remarks),
                                                updated_at = ?3
                 WHERE application_id = ?4",
                params![status.as_str(), remarks, now_rfc3339(), application_id],
            )
            .context("Failed to update client application")?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::customers::tests::sample_customer;
    use crate::db::test_support::create_test_db;

    #[tokio::test]
    async fn test_application_ids_are_sequential_per_customer() {
        let (db, _temp) = create_test_db().await;
        let created = db
            .create_customer(&sample_customer("CL-9", "head@cl9.example"))
            .await
            .unwrap();

        let first = db
            .create_application(created.head_branch_id, created.customer_id, "CL-9", "Ravi", "E1")
            .await
            .unwrap();
        let second = db
            .create_application(created.head_branch_id, created.customer_id, "CL-9", "Mira", "E2")
            .await
            .unwrap();

        assert_eq!(first.application_id, "CL-9-1");
        assert_eq!(second.application_id, "CL-9-2");
        assert_eq!(first.status, ApplicationStatus::Wip);
        assert_eq!(
            db.count_applications_for_customer(created.customer_id)
                .await
                .unwrap(),
            2
        );
        assert_eq!(
            db.list_applications(created.head_branch_id).await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_update_application_status() {
        let (db, _temp) = create_test_db().await;
        let created = db
            .create_customer(&sample_customer("CL-9", "head@cl9.example"))
            .await
            .unwrap();
        db.create_application(created.head_branch_id, created.customer_id, "CL-9", "Ravi", "E1")
            .await
            .unwrap();

        assert!(db
            .update_application_status("CL-9-1", ApplicationStatus::Insuff, Some("address proof"))
            .await
            .unwrap());
        let app = db.get_application("CL-9-1").await.unwrap().unwrap();
        assert_eq!(app.status, ApplicationStatus::Insuff);
        assert_eq!(app.remarks.as_deref(), Some("address proof"));

        assert!(!db
            .update_application_status("CL-9-7", ApplicationStatus::Completed, None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_unknown_stored_status_reads_as_wip() {
        let (db, _temp) = create_test_db().await;
        let created = db
            .create_customer(&sample_customer("CL-9", "head@cl9.example"))
            .await
            .unwrap();
        db.create_application(created.head_branch_id, created.customer_id, "CL-9", "Ravi", "E1")
            .await
            .unwrap();
        db.acquire()
            .await
            .execute(
                "UPDATE client_applications SET status = 'archived' WHERE application_id = ?1",
                params!["CL-9-1"],
            )
            .unwrap();

        let app = db.get_application("CL-9-1").await.unwrap().unwrap();
        assert_eq!(app.status, ApplicationStatus::Wip);
    }
}
