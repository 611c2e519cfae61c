//! Endpoints used by logged-in branches

use super::{admit, opt_id, respond, ApiError, AppState, JsonBody, QueryParams};
use crate::auth::api::BranchIdentity;
use crate::auth::guard::field;
use crate::auth::models::{ActionKey, IdentityKind};
use crate::db::tickets::TicketSender;
use crate::models::{Branch, Customer};
use axum::{
    extract::State,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

const APPLICATION_CREATE: ActionKey = ActionKey::scoped("client_application", "create");
const APPLICATION_VIEW: ActionKey = ActionKey::scoped("client_application", "view");
const TICKET_CREATE: ActionKey = ActionKey::scoped("ticket", "create");
const TICKET_VIEW: ActionKey = ActionKey::scoped("ticket", "view");
const TICKET_CHAT: ActionKey = ActionKey::scoped("ticket", "chat");

#[derive(Debug, Deserialize)]
pub struct CreateApplicationRequest {
    #[serde(default, deserialize_with = "opt_id")]
    pub branch_id: Option<i64>,
    #[serde(rename = "_token")]
    pub token: Option<String>,
    pub name: Option<String>,
    pub employee_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    #[serde(default, deserialize_with = "opt_id")]
    pub branch_id: Option<i64>,
    #[serde(rename = "_token")]
    pub token: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BranchChatRequest {
    #[serde(default, deserialize_with = "opt_id")]
    pub branch_id: Option<i64>,
    #[serde(rename = "_token")]
    pub token: Option<String>,
    pub ticket_number: Option<String>,
    pub message: Option<String>,
}

/// The calling branch and the customer it belongs to.
async fn branch_and_customer(state: &AppState, branch_id: i64) -> Result<(Branch, Customer), ApiError> {
    let branch = state
        .db
        .get_branch(branch_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Branch not found".into()))?;
    let customer = state
        .db
        .get_customer(branch.customer_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Customer not found".into()))?;
    Ok((branch, customer))
}

/// POST /branch/client-application/create
pub async fn create_application(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateApplicationRequest>,
) -> Result<Json<Value>, ApiError> {
    let caller = admit(
        &state,
        IdentityKind::Branch,
        payload.branch_id,
        &payload.token,
        &APPLICATION_CREATE,
        &[
            field("name", &payload.name),
            field("employee_id", &payload.employee_id),
        ],
    )
    .await?;

    let (branch, customer) = branch_and_customer(&state, caller.id).await?;
    let application = state
        .db
        .create_application(
            branch.id,
            customer.id,
            &customer.client_unique_id,
            payload.name.unwrap_or_default().trim(),
            payload.employee_id.unwrap_or_default().trim(),
        )
        .await?;

    Ok(respond(
        "Client application created successfully",
        &caller.token,
        json!({ "application": application }),
    ))
}

/// GET /branch/client-application/list
pub async fn list_applications(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<BranchIdentity>,
) -> Result<Json<Value>, ApiError> {
    let caller = admit(
        &state,
        IdentityKind::Branch,
        query.branch_id,
        &query.token,
        &APPLICATION_VIEW,
        &[],
    )
    .await?;

    let applications = state.db.list_applications(caller.id).await?;
    Ok(respond(
        "Client applications fetched successfully",
        &caller.token,
        json!({ "applications": applications }),
    ))
}

/// POST /branch/ticket/create
pub async fn create_ticket(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateTicketRequest>,
) -> Result<Json<Value>, ApiError> {
    let caller = admit(
        &state,
        IdentityKind::Branch,
        payload.branch_id,
        &payload.token,
        &TICKET_CREATE,
        &[
            field("title", &payload.title),
            field("description", &payload.description),
        ],
    )
    .await?;

    let (branch, customer) = branch_and_customer(&state, caller.id).await?;
    let ticket = state
        .db
        .create_ticket(
            branch.id,
            customer.id,
            payload.title.unwrap_or_default().trim(),
            payload.description.unwrap_or_default().trim(),
        )
        .await?;

    Ok(respond(
        "Ticket raised successfully",
        &caller.token,
        json!({ "ticket": ticket }),
    ))
}

/// GET /branch/ticket/list
pub async fn list_tickets(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<BranchIdentity>,
) -> Result<Json<Value>, ApiError> {
    let caller = admit(
        &state,
        IdentityKind::Branch,
        query.branch_id,
        &query.token,
        &TICKET_VIEW,
        &[],
    )
    .await?;

    let tickets = state.db.list_tickets(Some(caller.id)).await?;
    Ok(respond(
        "Tickets fetched successfully",
        &caller.token,
        json!({ "tickets": tickets }),
    ))
}

/// POST /branch/ticket/chat
pub async fn ticket_chat(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<BranchChatRequest>,
) -> Result<Json<Value>, ApiError> {
    let caller = admit(
        &state,
        IdentityKind::Branch,
        payload.branch_id,
        &payload.token,
        &TICKET_CHAT,
        &[
            field("ticket_number", &payload.ticket_number),
            field("message", &payload.message),
        ],
    )
    .await?;
    let ticket_number = payload.ticket_number.unwrap_or_default();

    // Another branch's ticket is reported as missing.
    let ticket = match state.db.get_ticket(ticket_number.trim()).await? {
        Some(ticket) if ticket.branch_id == caller.id => ticket,
        Some(_) => {
            warn!(branch_id = caller.id, ticket_number = %ticket_number, "Chat on foreign ticket");
            return Err(ApiError::NotFound("Ticket not found".into()));
        }
        None => return Err(ApiError::NotFound("Ticket not found".into())),
    };

    let message = state
        .db
        .add_ticket_message(
            ticket.id,
            TicketSender::Branch,
            payload.message.unwrap_or_default().trim(),
        )
        .await?;

    Ok(respond(
        "Message sent successfully",
        &caller.token,
        json!({ "message_id": message.id, "conversation_message": message }),
    ))
}
