//! HTTP surface: shared state, the guard helper, and the router

pub mod activity;
pub mod branch_portal;
pub mod branches;
pub mod cmt;
pub mod customers;
pub mod error;
pub mod extract;
pub mod spocs;
pub mod tickets;

pub use error::ApiError;
pub use extract::{JsonBody, QueryParams};

use crate::auth::api as auth_api;
use crate::auth::credential_store::CredentialStore;
use crate::auth::guard::{field, missing_fields, AuthService, Caller};
use crate::auth::models::{ActionKey, IdentityKind};
use crate::auth::token::{ExpiredTokenPolicy, TokenValidator};
use crate::db::Database;
use crate::middleware::{login_rate_limit, RateLimitLayer};
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub auth: Arc<AuthService>,
}

impl AppState {
    pub fn new(db: Database, token_ttl: chrono::Duration, policy: ExpiredTokenPolicy) -> Self {
        let store: Arc<dyn CredentialStore> = Arc::new(db.clone());
        let tokens = TokenValidator::new(store.clone(), token_ttl, policy);
        Self {
            db,
            auth: Arc::new(AuthService::new(store, tokens)),
        }
    }
}

/// Check identity and required fields, then run the guard for `action`.
pub async fn admit(
    state: &AppState,
    kind: IdentityKind,
    id: Option<i64>,
    token: &Option<String>,
    action: &ActionKey,
    required: &[(&'static str, bool)],
) -> Result<Caller, ApiError> {
    let mut missing = missing_fields(&[field(kind.id_field(), &id), field("_token", token)]);
    missing.extend(missing_fields(required));

    match (id, token.as_deref()) {
        (Some(id), Some(token)) if missing.is_empty() => {
            Ok(state.auth.admit(kind, id, token, action).await?)
        }
        _ => Err(ApiError::MissingFields(missing)),
    }
}

/// Success body: `{status: true, message, ...payload, token}`.
pub fn respond(message: impl Into<String>, token: &str, payload: Value) -> Json<Value> {
    let mut body = serde_json::Map::new();
    body.insert("status".into(), Value::Bool(true));
    body.insert("message".into(), Value::String(message.into()));
    if let Value::Object(extra) = payload {
        body.extend(extra);
    }
    body.insert("token".into(), Value::String(token.to_string()));
    Json(Value::Object(body))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Number(i64),
    Text(String),
}

/// Accept an id as a JSON number or a numeric string (query strings carry
/// only strings). Blank, non-numeric and non-positive values count as absent.
pub fn opt_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let id = match Option::<IdRepr>::deserialize(deserializer)? {
        Some(IdRepr::Number(n)) => Some(n),
        Some(IdRepr::Text(s)) => s.trim().parse().ok(),
        None => None,
    };
    Ok(id.filter(|id| *id > 0))
}

/// Boolean flag from JSON or a query string ("1", "true", "active").
pub fn opt_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlagRepr {
        Bool(bool),
        Number(i64),
        Text(String),
    }

    Ok(match Option::<FlagRepr>::deserialize(deserializer)? {
        Some(FlagRepr::Bool(b)) => Some(b),
        Some(FlagRepr::Number(n)) => Some(n != 0),
        Some(FlagRepr::Text(s)) => match s.trim().to_lowercase().as_str() {
            "1" | "true" | "active" => Some(true),
            "0" | "false" | "inactive" => Some(false),
            _ => None,
        },
        None => None,
    })
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": true, "message": "CMT admin backend operational" }))
}

/// Every route, with the login endpoints behind the rate limiter.
pub fn router(state: AppState, limiter: RateLimitLayer) -> Router {
    let login_routes = Router::new()
        .route("/admin/login", post(auth_api::admin_login))
        .route("/branch/login", post(auth_api::branch_login))
        .route_layer(middleware::from_fn_with_state(limiter, login_rate_limit));

    let auth_routes = Router::new()
        .route("/admin/logout", get(auth_api::admin_logout))
        .route("/admin/verify-admin-login", post(auth_api::verify_admin_login))
        .route("/admin/update-password", put(auth_api::update_password))
        .route("/branch/logout", get(auth_api::branch_logout))
        .route("/branch/verify-branch-login", post(auth_api::verify_branch_login));

    let admin_routes = Router::new()
        .route("/customer/create", post(customers::create))
        .route("/customer/list", get(customers::list))
        .route("/customer/overview", get(customers::overview))
        .route("/customer/update", put(customers::update))
        .route("/customer/status", put(customers::status))
        .route("/customer/delete", delete(customers::delete))
        .route("/branch/create", post(branches::create))
        .route("/branch/list-by-customer", get(branches::list_by_customer))
        .route("/branch/update", put(branches::update))
        .route("/branch/status", put(branches::status))
        .route("/branch/delete", delete(branches::delete))
        .route("/client-spoc/create", post(spocs::create))
        .route("/client-spoc/list", get(spocs::list))
        .route("/client-spoc/update", put(spocs::update))
        .route("/client-spoc/delete", delete(spocs::delete))
        .route("/client-master-tracker/applications", get(cmt::applications))
        .route("/client-master-tracker/update", put(cmt::update))
        .route("/ticket/list", get(tickets::list))
        .route("/ticket/view", get(tickets::view))
        .route("/ticket/update", put(tickets::update))
        .route("/ticket/chat", post(tickets::chat))
        .route("/activity-log/list", get(activity::list));

    let branch_routes = Router::new()
        .route(
            "/branch/client-application/create",
            post(branch_portal::create_application),
        )
        .route(
            "/branch/client-application/list",
            get(branch_portal::list_applications),
        )
        .route("/branch/ticket/create", post(branch_portal::create_ticket))
        .route("/branch/ticket/list", get(branch_portal::list_tickets))
        .route("/branch/ticket/chat", post(branch_portal::ticket_chat));

    Router::new()
        .route("/health", get(health_check))
        .merge(login_routes)
        .merge(auth_routes)
        .merge(admin_routes)
        .merge(branch_routes)
        .with_state(state)
}
