//! Client SPOC endpoints

use super::{admit, opt_id, respond, ApiError, AppState, JsonBody, QueryParams};
use crate::auth::api::AdminIdentity;
use crate::auth::guard::field;
use crate::auth::models::{ActionKey, IdentityKind};
use axum::{
    extract::State,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

const CREATE: ActionKey = ActionKey::scoped("client_spoc", "create");
const VIEW: ActionKey = ActionKey::scoped("client_spoc", "view");
const UPDATE: ActionKey = ActionKey::scoped("client_spoc", "update");
const DELETE: ActionKey = ActionKey::scoped("client_spoc", "delete");

#[derive(Debug, Deserialize)]
pub struct SpocRequest {
    #[serde(default, deserialize_with = "opt_id")]
    pub admin_id: Option<i64>,
    #[serde(rename = "_token")]
    pub token: Option<String>,
    /// Only read by update.
    #[serde(default, deserialize_with = "opt_id")]
    pub id: Option<i64>,
    pub name: Option<String>,
    pub designation: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SpocIdQuery {
    #[serde(default, deserialize_with = "opt_id")]
    pub admin_id: Option<i64>,
    #[serde(rename = "_token")]
    pub token: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub id: Option<i64>,
}

struct SpocFields {
    name: String,
    designation: String,
    phone: String,
    email: String,
}

impl SpocRequest {
    fn contact_fields(&self) -> [(&'static str, bool); 4] {
        [
            field("name", &self.name),
            field("designation", &self.designation),
            field("phone", &self.phone),
            field("email", &self.email),
        ]
    }

    fn into_fields(self) -> SpocFields {
        let clean = |v: Option<String>| v.unwrap_or_default().trim().to_string();
        SpocFields {
            name: clean(self.name),
            designation: clean(self.designation),
            phone: clean(self.phone),
            email: clean(self.email),
        }
    }
}

/// POST /client-spoc/create
pub async fn create(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<SpocRequest>,
) -> Result<Json<Value>, ApiError> {
    let caller = admit(
        &state,
        IdentityKind::Admin,
        payload.admin_id,
        &payload.token,
        &CREATE,
        &payload.contact_fields(),
    )
    .await?;

    let spoc = payload.into_fields();
    let id = state
        .db
        .create_spoc(&spoc.name, &spoc.designation, &spoc.phone, &spoc.email, caller.id)
        .await?;
    state
        .db
        .record_activity(
            caller.id,
            "client_spoc",
            "create",
            true,
            &format!("Created client SPOC {id}"),
        )
        .await;

    Ok(respond(
        "Client SPOC created successfully",
        &caller.token,
        json!({ "id": id }),
    ))
}

/// GET /client-spoc/list
pub async fn list(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<AdminIdentity>,
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

    let spocs = state.db.list_spocs().await?;
    Ok(respond(
        "Client SPOCs fetched successfully",
        &caller.token,
        json!({ "client_spocs": spocs }),
    ))
}

/// PUT /client-spoc/update
pub async fn update(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<SpocRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut required = vec![field("id", &payload.id)];
    required.extend(payload.contact_fields());
    let caller = admit(
        &state,
        IdentityKind::Admin,
        payload.admin_id,
        &payload.token,
        &UPDATE,
        &required,
    )
    .await?;

    let id = payload.id.unwrap_or_default();
    let spoc = payload.into_fields();
    if !state
        .db
        .update_spoc(id, &spoc.name, &spoc.designation, &spoc.phone, &spoc.email)
        .await?
    {
        return Err(ApiError::NotFound("Client SPOC not found".into()));
    }
    state
        .db
        .record_activity(
            caller.id,
            "client_spoc",
            "update",
            true,
            &format!("Updated client SPOC {id}"),
        )
        .await;

    Ok(respond("Client SPOC updated successfully", &caller.token, json!({})))
}

/// DELETE /client-spoc/delete
pub async fn delete(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<SpocIdQuery>,
) -> Result<Json<Value>, ApiError> {
    let caller = admit(
        &state,
        IdentityKind::Admin,
        query.admin_id,
        &query.token,
        &DELETE,
        &[field("id", &query.id)],
    )
    .await?;
    let id = query.id.unwrap_or_default();

    if !state.db.delete_spoc(id).await? {
        return Err(ApiError::NotFound("Client SPOC not found".into()));
    }
    state
        .db
        .record_activity(
            caller.id,
            "client_spoc",
            "delete",
            true,
            &format!("Deleted client SPOC {id}"),
        )
        .await;

    Ok(respond("Client SPOC deleted successfully", &caller.token, json!({})))
}
