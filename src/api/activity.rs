//! Admin activity log endpoint

use super::{admit, opt_id, respond, ApiError, AppState, QueryParams};
use crate::auth::models::{ActionKey, IdentityKind};
use axum::{
    extract::State,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

const VIEW: ActionKey = ActionKey::scoped("activity_log", "view");

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 1000;

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    #[serde(default, deserialize_with = "opt_id")]
    pub admin_id: Option<i64>,
    #[serde(rename = "_token")]
    pub token: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub limit: Option<i64>,
}

/// GET /activity-log/list
pub async fn list(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ActivityQuery>,
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

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let entries = state.db.list_activity(limit).await?;

    Ok(respond(
        "Activity log fetched successfully",
        &caller.token,
        json!({ "logs": entries }),
    ))
}
