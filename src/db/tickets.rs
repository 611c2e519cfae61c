//! Support tickets raised by branches

use super::{now_rfc3339, Database};
use crate::models::{Ticket, TicketMessage, TicketStatus};
use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

const TICKET_COLUMNS: &str = "id, ticket_number, branch_id, customer_id, title, description, \
                              status, remarks, created_at, updated_at";

fn ticket_from_row(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    let status: String = row.get(6)?;
    Ok(Ticket {
        id: row.get(0)?,
        ticket_number: row.get(1)?,
        branch_id: row.get(2)?,
        customer_id: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        status: status.parse().unwrap_or(TicketStatus::Open),
        remarks: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Generate a ticket number such as `TCK-3F9A1C2B7D`.
pub fn generate_ticket_number() -> String {
    let id = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("TCK-{}", &id[..10])
}

/// Who wrote a ticket message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketSender {
    Admin,
    Branch,
}

impl TicketSender {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketSender::Admin => "admin",
            TicketSender::Branch => "branch",
        }
    }
}

impl Database {
    pub async fn create_ticket(
        &self,
        branch_id: i64,
        customer_id: i64,
        title: &str,
        description: &str,
    ) -> Result<Ticket> {
        let now = now_rfc3339();
        let ticket_number = generate_ticket_number();
        let conn = self.acquire().await;
        conn.execute(
            "INSERT INTO tickets (ticket_number, branch_id, customer_id, title, description, status,
                                  created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                ticket_number,
                branch_id,
                customer_id,
                title,
                description,
                TicketStatus::Open.as_str(),
                now,
            ],
        )
        .context("Failed to insert ticket")?;

        Ok(Ticket {
            id: conn.last_insert_rowid(),
            ticket_number,
            branch_id,
            customer_id,
            title: title.to_string(),
            description: description.to_string(),
            status: TicketStatus::Open,
            remarks: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// All tickets, or only those of one branch.
    pub async fn list_tickets(&self, branch_id: Option<i64>) -> Result<Vec<Ticket>> {
        let conn = self.acquire().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets
             WHERE (?1 IS NULL OR branch_id = ?1) ORDER BY id DESC"
        ))?;
        let tickets = stmt
            .query_map(params![branch_id], ticket_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list tickets")?;
        Ok(tickets)
    }

    pub async fn get_ticket(&self, ticket_number: &str) -> Result<Option<Ticket>> {
        let conn = self.acquire().await;
        let ticket = conn
            .query_row(
                &format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE ticket_number = ?1"),
                params![ticket_number],
                ticket_from_row,
            )
            .optional()
            .context("Failed to load ticket")?;
        Ok(ticket)
    }

    pub async fn update_ticket(
        &self,
        ticket_number: &str,
        status: TicketStatus,
        remarks: Option<&str>,
    ) -> Result<bool> {
        let conn = self.acquire().await;
        let rows = conn
            .execute(
                "UPDATE tickets SET status = ?1, remarks = COALESCE(?2, remarks), updated_at = ?3
                 WHERE ticket_number = ?4",
                params![status.as_str(), remarks, now_rfc3339(), ticket_number],
            )
            .context("Failed to update ticket")?;
        Ok(rows > 0)
    }

    pub async fn add_ticket_message(
        &self,
        ticket_id: i64,
        sender: TicketSender,
        message: &str,
    ) -> Result<TicketMessage> {
        let now = now_rfc3339();
        let conn = self.acquire().await;
        conn.execute(
            "INSERT INTO ticket_conversations (ticket_id, sender, message, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![ticket_id, sender.as_str(), message, now],
        )
        .context("Failed to insert ticket message")?;
        let id = conn.last_insert_rowid();
        conn.execute(
            "UPDATE tickets SET updated_at = ?1 WHERE id = ?2",
            params![now, ticket_id],
        )?;

        Ok(TicketMessage {
            id,
            ticket_id,
            sender: sender.as_str().to_string(),
            message: message.to_string(),
            created_at: now,
        })
    }

    pub async fn list_ticket_messages(&self, ticket_id: i64) -> Result<Vec<TicketMessage>> {
        let conn = self.acquire().await;
        let mut stmt = conn.prepare(
            "SELECT id, ticket_id, sender, message, created_at FROM ticket_conversations
             WHERE ticket_id = ?1 ORDER BY id",
        )?;
        let messages = stmt
            .query_map(params![ticket_id], |row| {
                Ok(TicketMessage {
                    id: row.get(0)?,
                    ticket_id: row.get(1)?,
                    sender: row.get(2)?,
                    message: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list ticket messages")?;
        Ok(messages)
    }
}
