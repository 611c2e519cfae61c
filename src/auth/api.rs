//! Authentication API Endpoints
//! Login, logout, token verification and password change for admins and branches

use crate::api::{opt_id, respond, ApiError, AppState, JsonBody, QueryParams};
use crate::auth::guard::{field, missing_fields};
use crate::auth::models::{IdentityKind, LoginRequest};
use axum::{
    extract::State,
    Json,
};
use bcrypt::{hash, verify, DEFAULT_COST};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub struct AdminIdentity {
    #[serde(default, deserialize_with = "opt_id")]
    pub admin_id: Option<i64>,
    #[serde(rename = "_token")]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BranchIdentity {
    #[serde(default, deserialize_with = "opt_id")]
    pub branch_id: Option<i64>,
    #[serde(rename = "_token")]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    #[serde(default, deserialize_with = "opt_id")]
    pub admin_id: Option<i64>,
    #[serde(rename = "_token")]
    pub token: Option<String>,
    pub new_password: Option<String>,
}

/// Token check without a permission lookup, for the session endpoints.
async fn authenticate(
    state: &AppState,
    kind: IdentityKind,
    id: Option<i64>,
    token: &Option<String>,
    required: &[(&'static str, bool)],
) -> Result<(i64, String), ApiError> {
    let mut missing = missing_fields(&[field(kind.id_field(), &id), field("_token", token)]);
    missing.extend(missing_fields(required));
    match (id, token.as_deref()) {
        (Some(id), Some(token)) if missing.is_empty() => {
            let token = state.auth.tokens().validate_token(kind, id, token).await?;
            Ok((id, token))
        }
        _ => Err(ApiError::MissingFields(missing)),
    }
}

/// Shared login flow: credentials, active flag, fresh token.
async fn login(
    state: &AppState,
    kind: IdentityKind,
    payload: &LoginRequest,
) -> Result<(i64, crate::auth::models::IssuedToken), ApiError> {
    let missing = missing_fields(&[
        field("username", &payload.username),
        field("password", &payload.password),
    ]);
    let (Some(username), Some(password)) = (payload.username.as_deref(), payload.password.as_deref())
    else {
        return Err(ApiError::MissingFields(missing));
    };
    if !missing.is_empty() {
        return Err(ApiError::MissingFields(missing));
    }

    info!(kind = kind.as_str(), username, "Login attempt");

    let Some(record) = state.auth.store().find_login(kind, username.trim()).await? else {
        warn!(kind = kind.as_str(), username, "Login failed: unknown user");
        return Err(ApiError::unauthorized("Invalid username or password"));
    };

    let valid = verify(password, &record.password_hash).unwrap_or_else(|e| {
        warn!(kind = kind.as_str(), id = record.id, error = %e, "Unreadable password hash");
        false
    });
    if !valid {
        warn!(kind = kind.as_str(), username, "Login failed: wrong password");
        return Err(ApiError::unauthorized("Invalid username or password"));
    }

    if !record.active {
        warn!(kind = kind.as_str(), id = record.id, "Login refused: account inactive");
        return Err(ApiError::Forbidden(format!(
            "{} account is inactive",
            kind.label()
        )));
    }

    let issued = state.auth.tokens().issue_token(kind, record.id).await?;
    info!(kind = kind.as_str(), id = record.id, "Login successful");
    Ok((record.id, issued))
}

/// POST /admin/login
pub async fn admin_login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let (admin_id, issued) = login(&state, IdentityKind::Admin, &payload).await?;
    let admin = state
        .db
        .get_admin(admin_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Admin not found".into()))?;

    state
        .db
        .record_activity(admin_id, "auth", "login", true, "Admin logged in")
        .await;

    Ok(respond(
        "Login successful",
        &issued.token,
        json!({ "admin": admin, "token_expiry": issued.expires_at }),
    ))
}

/// GET /admin/logout
pub async fn admin_logout(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<AdminIdentity>,
) -> Result<Json<Value>, ApiError> {
    let (admin_id, _) =
        authenticate(&state, IdentityKind::Admin, query.admin_id, &query.token, &[]).await?;
    state.auth.tokens().revoke(IdentityKind::Admin, admin_id).await?;
    info!(admin_id, "Admin logged out");

    Ok(Json(json!({ "status": true, "message": "Logout successful" })))
}

/// POST /admin/verify-admin-login
pub async fn verify_admin_login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<AdminIdentity>,
) -> Result<Json<Value>, ApiError> {
    let (admin_id, token) =
        authenticate(&state, IdentityKind::Admin, payload.admin_id, &payload.token, &[]).await?;
    let admin = state
        .db
        .get_admin(admin_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Admin not found".into()))?;
    if !admin.status {
        return Err(ApiError::Forbidden("Admin account is inactive".into()));
    }

    Ok(respond("Login verified", &token, json!({ "admin": admin })))
}

/// PUT /admin/update-password
pub async fn update_password(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<UpdatePasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    let (admin_id, token) = authenticate(
        &state,
        IdentityKind::Admin,
        payload.admin_id,
        &payload.token,
        &[field("new_password", &payload.new_password)],
    )
    .await?;
    if !state.db.get_admin(admin_id).await?.is_some_and(|a| a.status) {
        return Err(ApiError::Forbidden("Admin account is inactive".into()));
    }
    let new_password = payload.new_password.unwrap_or_default();

    if new_password.len() < MIN_PASSWORD_LEN {
        state
            .db
            .record_activity(admin_id, "admin", "update_password", false, "Password too short")
            .await;
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let password_hash = hash(&new_password, DEFAULT_COST)
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {e}")))?;
    state.db.update_admin_password(admin_id, &password_hash).await?;
    state
        .db
        .record_activity(admin_id, "admin", "update_password", true, "Password updated")
        .await;

    Ok(respond("Password updated successfully", &token, json!({})))
}

/// POST /branch/login
pub async fn branch_login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let (branch_id, issued) = login(&state, IdentityKind::Branch, &payload).await?;
    let branch = state
        .db
        .get_branch(branch_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Branch not found".into()))?;

    Ok(respond(
        "Login successful",
        &issued.token,
        json!({ "branch": branch, "token_expiry": issued.expires_at }),
    ))
}

/// GET /branch/logout
pub async fn branch_logout(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<BranchIdentity>,
) -> Result<Json<Value>, ApiError> {
    let (branch_id, _) =
        authenticate(&state, IdentityKind::Branch, query.branch_id, &query.token, &[]).await?;
    state.auth.tokens().revoke(IdentityKind::Branch, branch_id).await?;
    info!(branch_id, "Branch logged out");

    Ok(Json(json!({ "status": true, "message": "Logout successful" })))
}

/// POST /branch/verify-branch-login
pub async fn verify_branch_login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<BranchIdentity>,
) -> Result<Json<Value>, ApiError> {
    let (branch_id, token) = authenticate(
        &state,
        IdentityKind::Branch,
        payload.branch_id,
        &payload.token,
        &[],
    )
    .await?;
    let branch = state
        .db
        .get_branch(branch_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Branch not found".into()))?;
    let customer_active = state
        .db
        .get_customer(branch.customer_id)
        .await?
        .is_some_and(|c| c.status);
    if !branch.status || !customer_active {
        return Err(ApiError::Forbidden("Branch account is inactive".into()));
    }

    Ok(respond("Login verified", &token, json!({ "branch": branch })))
}
