//! Customers and their head branch

use super::{exists, now_rfc3339, Database, BRANCH_ROLE};
use crate::models::{Customer, CustomerUpdate, NewCustomer};
use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Row};
use tracing::{info, warn};

const CUSTOMER_COLUMNS: &str = "id, client_unique_id, name, emails, mobile, address, tat_days, \
                                status, admin_id, created_at, updated_at";

fn customer_from_row(row: &Row<'_>) -> rusqlite::Result<Customer> {
    let id: i64 = row.get(0)?;
    let raw_emails: String = row.get(3)?;
    let emails = serde_json::from_str(&raw_emails).unwrap_or_else(|e| {
        warn!(customer_id = id, error = %e, "Unreadable emails column, returning none");
        Vec::new()
    });
    Ok(Customer {
        id,
        client_unique_id: row.get(1)?,
        name: row.get(2)?,
        emails,
        mobile: row.get(4)?,
        address: row.get(5)?,
        tat_days: row.get(6)?,
        status: row.get::<_, i64>(7)? != 0,
        admin_id: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Ids produced by creating a customer.
#[derive(Debug, Clone, Copy)]
pub struct CreatedCustomer {
    pub customer_id: i64,
    pub head_branch_id: i64,
}

impl Database {
    /// Insert the customer and its head branch in one transaction.
    pub async fn create_customer(&self, new: &NewCustomer) -> Result<CreatedCustomer> {
        let emails = serde_json::to_string(&new.emails)?;
        let now = now_rfc3339();

        let mut conn = self.acquire().await;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO customers (client_unique_id, name, emails, mobile, address, tat_days,
                                    status, admin_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8, ?8)",
            params![
                new.client_unique_id,
                new.name,
                emails,
                new.mobile,
                new.address,
                new.tat_days,
                new.admin_id,
                now,
            ],
        )
        .context("Failed to insert customer")?;
        let customer_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO branches (customer_id, name, email, password_hash, is_head, status, role,
                                   created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 1, 1, ?5, ?6, ?6)",
            params![
                customer_id,
                new.name,
                new.head_branch_email,
                new.head_branch_password_hash,
                BRANCH_ROLE,
                now,
            ],
        )
        .context("Failed to insert head branch")?;
        let head_branch_id = tx.last_insert_rowid();
        tx.commit()?;

        info!(
            customer_id,
            head_branch_id,
            client_unique_id = %new.client_unique_id,
            "Customer created"
        );
        Ok(CreatedCustomer {
            customer_id,
            head_branch_id,
        })
    }

    pub async fn client_unique_id_exists(&self, client_unique_id: &str) -> Result<bool> {
        let conn = self.acquire().await;
        exists(
            &conn,
            "SELECT 1 FROM customers WHERE client_unique_id = ?1",
            &client_unique_id,
        )
    }

    pub async fn get_customer(&self, id: i64) -> Result<Option<Customer>> {
        let conn = self.acquire().await;
        let customer = conn
            .query_row(
                &format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1"),
                params![id],
                customer_from_row,
            )
            .optional()
            .context("Failed to load customer")?;
        Ok(customer)
    }

    pub async fn list_customers(&self) -> Result<Vec<Customer>> {
        let conn = self.acquire().await;
        let mut stmt =
            conn.prepare(&format!("SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY id DESC"))?;
        let customers = stmt
            .query_map([], customer_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list customers")?;
        Ok(customers)
    }

    /// Apply the provided fields; returns false when the customer does not exist.
    pub async fn update_customer(&self, id: i64, update: &CustomerUpdate) -> Result<bool> {
        let emails = update
            .emails
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let conn = self.acquire().await;
        let rows = conn
            .execute(
                "UPDATE customers SET
                    name = COALESCE(?1, name),
                    emails = COALESCE(?2, emails),
                    mobile = COALESCE(?3, mobile),
                    address = COALESCE(?4, address),
                    tat_days = COALESCE(?5, tat_days),
                    updated_at = ?6
                 WHERE id = ?7",
                params![
                    update.name,
                    emails,
                    update.mobile,
                    update.address,
                    update.tat_days,
                    now_rfc3339(),
                    id,
                ],
            )
            .context("Failed to update customer")?;
        Ok(rows > 0)
    }

    pub async fn set_customer_status(&self, id: i64, active: bool) -> Result<bool> {
        let conn = self.acquire().await;
        let rows = conn
            .execute(
                "UPDATE customers SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![active as i64, now_rfc3339(), id],
            )
            .context("Failed to update customer status")?;
        Ok(rows > 0)
    }

    /// Delete the customer; branches, applications and tickets cascade.
    pub async fn delete_customer(&self, id: i64) -> Result<bool> {
        let conn = self.acquire().await;
        let rows = conn
            .execute("DELETE FROM customers WHERE id = ?1", params![id])
            .context("Failed to delete customer")?;
        if rows > 0 {
            info!(customer_id = id, "Customer deleted");
        }
        Ok(rows > 0)
    }
}
