//! Branch management endpoints (admin side)

use super::{admit, opt_flag, opt_id, respond, ApiError, AppState, JsonBody, QueryParams};
use crate::auth::guard::field;
use crate::auth::models::{ActionKey, IdentityKind};
use crate::models::Branch;
use axum::{
    extract::State,
    Json,
};
use bcrypt::{hash, DEFAULT_COST};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

const CREATE: ActionKey = ActionKey::scoped("branch", "create");
const VIEW: ActionKey = ActionKey::scoped("branch", "view");
const UPDATE: ActionKey = ActionKey::scoped("branch", "update");
const STATUS: ActionKey = ActionKey::scoped("branch", "status");
const DELETE: ActionKey = ActionKey::scoped("branch", "delete");

#[derive(Debug, Deserialize)]
pub struct CreateBranchRequest {
    #[serde(default, deserialize_with = "opt_id")]
    pub admin_id: Option<i64>,
    #[serde(rename = "_token")]
    pub token: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub customer_id: Option<i64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CustomerBranchesQuery {
    #[serde(default, deserialize_with = "opt_id")]
    pub admin_id: Option<i64>,
    #[serde(rename = "_token")]
    pub token: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub customer_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBranchRequest {
    #[serde(default, deserialize_with = "opt_id")]
    pub admin_id: Option<i64>,
    #[serde(rename = "_token")]
    pub token: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub branch_id: Option<i64>,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BranchStatusRequest {
    #[serde(default, deserialize_with = "opt_id")]
    pub admin_id: Option<i64>,
    #[serde(rename = "_token")]
    pub token: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub branch_id: Option<i64>,
    #[serde(default, deserialize_with = "opt_flag")]
    pub status: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct BranchIdQuery {
    #[serde(default, deserialize_with = "opt_id")]
    pub admin_id: Option<i64>,
    #[serde(rename = "_token")]
    pub token: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub branch_id: Option<i64>,
}

/// Load the target branch and refuse when it is the head branch.
async fn non_head_branch(
    state: &AppState,
    admin_id: i64,
    branch_id: i64,
    action: &str,
    refusal: &'static str,
) -> Result<Branch, ApiError> {
    let branch = state
        .db
        .get_branch(branch_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Branch not found".into()))?;
    if branch.is_head {
        warn!(admin_id, branch_id, action, "Head branch change refused");
        state
            .db
            .record_activity(admin_id, "branch", action, false, refusal)
            .await;
        return Err(ApiError::Forbidden(refusal.into()));
    }
    Ok(branch)
}

/// POST /branch/create
pub async fn create(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateBranchRequest>,
) -> Result<Json<Value>, ApiError> {
    let caller = admit(
        &state,
        IdentityKind::Admin,
        payload.admin_id,
        &payload.token,
        &CREATE,
        &[
            field("customer_id", &payload.customer_id),
            field("name", &payload.name),
            field("email", &payload.email),
            field("password", &payload.password),
        ],
    )
    .await?;
    let customer_id = payload.customer_id.unwrap_or_default();
    let name = payload.name.unwrap_or_default().trim().to_string();
    let email = payload.email.unwrap_or_default().trim().to_string();

    if state.db.get_customer(customer_id).await?.is_none() {
        return Err(ApiError::NotFound("Customer not found".into()));
    }
    if state.db.branch_email_exists(&email).await? {
        return Err(ApiError::Conflict(format!(
            "Branch email {email} is already in use"
        )));
    }

    let password_hash = hash(payload.password.unwrap_or_default(), DEFAULT_COST)
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {e}")))?;
    let branch_id = state
        .db
        .create_branch(customer_id, &name, &email, &password_hash)
        .await?;

    state
        .db
        .record_activity(
            caller.id,
            "branch",
            "create",
            true,
            &format!("Created branch {branch_id} for customer {customer_id}"),
        )
        .await;

    Ok(respond(
        "Branch created successfully",
        &caller.token,
        json!({ "branch_id": branch_id }),
    ))
}

/// GET /branch/list-by-customer
pub async fn list_by_customer(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<CustomerBranchesQuery>,
) -> Result<Json<Value>, ApiError> {
    let caller = admit(
        &state,
        IdentityKind::Admin,
        query.admin_id,
        &query.token,
        &VIEW,
        &[field("customer_id", &query.customer_id)],
    )
    .await?;
    let customer_id = query.customer_id.unwrap_or_default();

    let customer = state
        .db
        .get_customer(customer_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Customer not found".into()))?;
    let branches = state.db.list_branches(customer_id).await?;

    Ok(respond(
        "Branches fetched successfully",
        &caller.token,
        json!({ "customer": customer, "branches": branches }),
    ))
}

/// PUT /branch/update
pub async fn update(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<UpdateBranchRequest>,
) -> Result<Json<Value>, ApiError> {
    let caller = admit(
        &state,
        IdentityKind::Admin,
        payload.admin_id,
        &payload.token,
        &UPDATE,
        &[field("branch_id", &payload.branch_id)],
    )
    .await?;
    let branch_id = payload.branch_id.unwrap_or_default();

    let branch = non_head_branch(
        &state,
        caller.id,
        branch_id,
        "update",
        "Cannot edit the head branch",
    )
    .await?;

    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    let email = payload
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());
    if name.is_none() && email.is_none() {
        return Err(ApiError::BadRequest("No fields to update".into()));
    }
    if let Some(email) = email {
        if email != branch.email && state.db.branch_email_exists(email).await? {
            return Err(ApiError::Conflict(format!(
                "Branch email {email} is already in use"
            )));
        }
    }

    state.db.update_branch(branch_id, name, email).await?;
    state
        .db
        .record_activity(
            caller.id,
            "branch",
            "update",
            true,
            &format!("Updated branch {branch_id}"),
        )
        .await;

    Ok(respond("Branch updated successfully", &caller.token, json!({})))
}

/// PUT /branch/status
pub async fn status(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<BranchStatusRequest>,
) -> Result<Json<Value>, ApiError> {
    let caller = admit(
        &state,
        IdentityKind::Admin,
        payload.admin_id,
        &payload.token,
        &STATUS,
        &[
            field("branch_id", &payload.branch_id),
            field("status", &payload.status),
        ],
    )
    .await?;
    let branch_id = payload.branch_id.unwrap_or_default();
    let active = payload.status.unwrap_or_default();

    non_head_branch(
        &state,
        caller.id,
        branch_id,
        "status",
        "Cannot change the status of the head branch",
    )
    .await?;

    state.db.set_branch_status(branch_id, active).await?;
    state
        .db
        .record_activity(
            caller.id,
            "branch",
            "status",
            true,
            &format!(
                "Branch {branch_id} {}",
                if active { "activated" } else { "deactivated" }
            ),
        )
        .await;

    Ok(respond(
        "Branch status updated successfully",
        &caller.token,
        json!({ "active": active }),
    ))
}

/// DELETE /branch/delete
pub async fn delete(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<BranchIdQuery>,
) -> Result<Json<Value>, ApiError> {
    let caller = admit(
        &state,
        IdentityKind::Admin,
        query.admin_id,
        &query.token,
        &DELETE,
        &[field("branch_id", &query.branch_id)],
    )
    .await?;
    let branch_id = query.branch_id.unwrap_or_default();

    non_head_branch(
        &state,
        caller.id,
        branch_id,
        "delete",
        "Cannot delete the head branch",
    )
    .await?;

    state.db.delete_branch(branch_id).await?;
    state
        .db
        .record_activity(
            caller.id,
            "branch",
            "delete",
            true,
            &format!("Deleted branch {branch_id}"),
        )
        .await;

    Ok(respond("Branch deleted successfully", &caller.token, json!({})))
}
