//! Domain records returned by the store and serialized by the API

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Admin account (password hash and token never leave the store)
#[derive(Debug, Clone, Serialize)]
pub struct AdminProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub mobile: Option<String>,
    pub role: String,
    pub status: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub id: i64,
    pub client_unique_id: String,
    pub name: String,
    pub emails: Vec<String>,
    pub mobile: Option<String>,
    pub address: Option<String>,
    pub tat_days: Option<i64>,
    pub status: bool,
    pub admin_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields accepted when creating a customer together with its head branch.
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub client_unique_id: String,
    pub name: String,
    pub emails: Vec<String>,
    pub mobile: Option<String>,
    pub address: Option<String>,
    pub tat_days: Option<i64>,
    pub admin_id: i64,
    pub head_branch_email: String,
    pub head_branch_password_hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct CustomerUpdate {
    pub name: Option<String>,
    pub emails: Option<Vec<String>>,
    pub mobile: Option<String>,
    pub address: Option<String>,
    pub tat_days: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Branch {
    pub id: i64,
    pub customer_id: i64,
    pub name: String,
    pub email: String,
    pub is_head: bool,
    pub status: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Spoc {
    pub id: i64,
    pub name: String,
    pub designation: String,
    pub phone: String,
    pub email: String,
    pub admin_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Verification status of a client application in the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Wip,
    Insuff,
    Completed,
    Stopcheck,
    Nil,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Wip => "wip",
            ApplicationStatus::Insuff => "insuff",
            ApplicationStatus::Completed => "completed",
            ApplicationStatus::Stopcheck => "stopcheck",
            ApplicationStatus::Nil => "nil",
        }
    }
}

impl FromStr for ApplicationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wip" => Ok(ApplicationStatus::Wip),
            "insuff" => Ok(ApplicationStatus::Insuff),
            "completed" => Ok(ApplicationStatus::Completed),
            "stopcheck" => Ok(ApplicationStatus::Stopcheck),
            "nil" => Ok(ApplicationStatus::Nil),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientApplication {
    pub id: i64,
    pub application_id: String,
    pub branch_id: i64,
    pub customer_id: i64,
    pub name: String,
    pub employee_id: String,
    pub status: ApplicationStatus,
    pub remarks: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Closed => "closed",
        }
    }
}

impl FromStr for TicketStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(TicketStatus::Open),
            "in_progress" => Ok(TicketStatus::InProgress),
            "closed" => Ok(TicketStatus::Closed),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Ticket {
    pub id: i64,
    pub ticket_number: String,
    pub branch_id: i64,
    pub customer_id: i64,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub remarks: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketMessage {
    pub id: i64,
    pub ticket_id: i64,
    pub sender: String,
    pub message: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub id: i64,
    pub admin_id: i64,
    pub module: String,
    pub action: String,
    pub result: bool,
    pub description: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown status: {}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}
