//! Ticket endpoints (admin side)

use super::{admit, opt_id, respond, ApiError, AppState, JsonBody, QueryParams};
use crate::auth::guard::field;
use crate::auth::models::{ActionKey, IdentityKind};
use crate::db::tickets::TicketSender;
use crate::models::{TicketStatus, UnknownStatus};
use axum::{
    extract::State,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

const VIEW: ActionKey = ActionKey::scoped("ticket", "view");
const UPDATE: ActionKey = ActionKey::scoped("ticket", "update");
const CHAT: ActionKey = ActionKey::scoped("ticket", "chat");

#[derive(Debug, Deserialize)]
pub struct TicketListQuery {
    #[serde(default, deserialize_with = "opt_id")]
    pub admin_id: Option<i64>,
    #[serde(rename = "_token")]
    pub token: Option<String>,
    /// Restrict to one branch.
    #[serde(default, deserialize_with = "opt_id")]
    pub branch_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TicketQuery {
    #[serde(default, deserialize_with = "opt_id")]
    pub admin_id: Option<i64>,
    #[serde(rename = "_token")]
    pub token: Option<String>,
    pub ticket_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTicketRequest {
    #[serde(default, deserialize_with = "opt_id")]
    pub admin_id: Option<i64>,
    #[serde(rename = "_token")]
    pub token: Option<String>,
    pub ticket_number: Option<String>,
    pub status: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TicketChatRequest {
    #[serde(default, deserialize_with = "opt_id")]
    pub admin_id: Option<i64>,
    #[serde(rename = "_token")]
    pub token: Option<String>,
    pub ticket_number: Option<String>,
    pub message: Option<String>,
}

/// GET /ticket/list
pub async fn list(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<TicketListQuery>,
) -> Result<Json<Value>, ApiError> {
    let caller = admit(
        &state,
        IdentityKind::Admin,
        query.admin_id,
        &query.token,
        &VIEW,
        &[],
    )
    .await?;

    let tickets = state.db.list_tickets(query.branch_id).await?;
    Ok(respond(
        "Tickets fetched successfully",
        &caller.token,
        json!({ "tickets": tickets }),
    ))
}

/// GET /ticket/view
pub async fn view(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<TicketQuery>,
) -> Result<Json<Value>, ApiError> {
    let caller = admit(
        &state,
        IdentityKind::Admin,
        query.admin_id,
        &query.token,
        &VIEW,
        &[field("ticket_number", &query.ticket_number)],
    )
    .await?;
    let ticket_number = query.ticket_number.unwrap_or_default();

    let ticket = state
        .db
        .get_ticket(ticket_number.trim())
        .await?
        .ok_or_else(|| ApiError::NotFound("Ticket not found".into()))?;
    let conversation = state.db.list_ticket_messages(ticket.id).await?;

    Ok(respond(
        "Ticket fetched successfully",
        &caller.token,
        json!({ "ticket": ticket, "conversation": conversation }),
    ))
}

/// PUT /ticket/update
pub async fn update(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<UpdateTicketRequest>,
) -> Result<Json<Value>, ApiError> {
    let caller = admit(
        &state,
        IdentityKind::Admin,
        payload.admin_id,
        &payload.token,
        &UPDATE,
        &[
            field("ticket_number", &payload.ticket_number),
            field("status", &payload.status),
        ],
    )
    .await?;
    let ticket_number = payload.ticket_number.unwrap_or_default().trim().to_string();
    let status: TicketStatus = payload
        .status
        .unwrap_or_default()
        .parse()
        .map_err(|e: UnknownStatus| ApiError::BadRequest(e.to_string()))?;
    let remarks = payload
        .remarks
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());

    if !state.db.update_ticket(&ticket_number, status, remarks).await? {
        return Err(ApiError::NotFound("Ticket not found".into()));
    }
    state
        .db
        .record_activity(
            caller.id,
            "ticket",
            "update",
            true,
            &format!("Ticket {ticket_number} set to {}", status.as_str()),
        )
        .await;

    Ok(respond("Ticket updated successfully", &caller.token, json!({})))
}

/// POST /ticket/chat
pub async fn chat(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<TicketChatRequest>,
) -> Result<Json<Value>, ApiError> {
    let caller = admit(
        &state,
        IdentityKind::Admin,
        payload.admin_id,
        &payload.token,
        &CHAT,
        &[
            field("ticket_number", &payload.ticket_number),
            field("message", &payload.message),
        ],
    )
    .await?;
    let ticket_number = payload.ticket_number.unwrap_or_default();

    let ticket = state
        .db
        .get_ticket(ticket_number.trim())
        .await?
        .ok_or_else(|| ApiError::NotFound("Ticket not found".into()))?;
    let message = state
        .db
        .add_ticket_message(
            ticket.id,
            TicketSender::Admin,
            payload.message.unwrap_or_default().trim(),
        )
        .await?;
    state
        .db
        .record_activity(
            caller.id,
            "ticket",
            "chat",
            true,
            &format!("Replied on ticket {}", ticket.ticket_number),
        )
        .await;

    Ok(respond(
        "Message sent successfully",
        &caller.token,
        json!({ "message_id": message.id, "conversation_message": message }),
    ))
}
