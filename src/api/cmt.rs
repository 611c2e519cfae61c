//! Client master tracker: verification status of client applications

use super::{admit, opt_id, respond, ApiError, AppState, JsonBody, QueryParams};
use crate::auth::guard::field;
use crate::auth::models::{ActionKey, IdentityKind};
use crate::models::ApplicationStatus;
use axum::{
    extract::State,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

const VIEW: ActionKey = ActionKey::scoped("cmt", "view");
const UPDATE: ActionKey = ActionKey::scoped("cmt", "update");

#[derive(Debug, Deserialize)]
pub struct ApplicationsQuery {
    #[serde(default, deserialize_with = "opt_id")]
    pub admin_id: Option<i64>,
    #[serde(rename = "_token")]
    pub token: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub branch_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateApplicationRequest {
    #[serde(default, deserialize_with = "opt_id")]
    pub admin_id: Option<i64>,
    #[serde(rename = "_token")]
    pub token: Option<String>,
    pub application_id: Option<String>,
    pub status: Option<String>,
    pub remarks: Option<String>,
}

/// GET /client-master-tracker/applications
pub async fn applications(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ApplicationsQuery>,
) -> Result<Json<Value>, ApiError> {
    let caller = admit(
        &state,
        IdentityKind::Admin,
        query.admin_id,
        &query.token,
        &VIEW,
        &[field("branch_id", &query.branch_id)],
    )
    .await?;
    let branch_id = query.branch_id.unwrap_or_default();

    let branch = state
        .db
        .get_branch(branch_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Branch not found".into()))?;
    let applications = state.db.list_applications(branch_id).await?;

    Ok(respond(
        "Applications fetched successfully",
        &caller.token,
        json!({ "branch": branch, "applications": applications }),
    ))
}

/// PUT /client-master-tracker/update
pub async fn update(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<UpdateApplicationRequest>,
) -> Result<Json<Value>, ApiError> {
    let caller = admit(
        &state,
        IdentityKind::Admin,
        payload.admin_id,
        &payload.token,
        &UPDATE,
        &[
            field("application_id", &payload.application_id),
            field("status", &payload.status),
        ],
    )
    .await?;
    let application_id = payload.application_id.unwrap_or_default().trim().to_string();
    let status: ApplicationStatus = payload
        .status
        .unwrap_or_default()
        .parse()
        .map_err(|e: crate::models::UnknownStatus| ApiError::BadRequest(e.to_string()))?;
    let remarks = payload
        .remarks
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());

    if !state
        .db
        .update_application_status(&application_id, status, remarks)
        .await?
    {
        state
            .db
            .record_activity(
                caller.id,
                "cmt",
                "update",
                false,
                &format!("Unknown application {application_id}"),
            )
            .await;
        return Err(ApiError::NotFound("Application not found".into()));
    }
    state
        .db
        .record_activity(
            caller.id,
            "cmt",
            "update",
            true,
            &format!("Application {application_id} set to {}", status.as_str()),
        )
        .await;

    let application = state.db.get_application(&application_id).await?;
    Ok(respond(
        "Application updated successfully",
        &caller.token,
        json!({ "application": application }),
    ))
}
