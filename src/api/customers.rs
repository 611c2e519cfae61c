//! Customer endpoints

use super::{admit, opt_flag, opt_id, respond, ApiError, AppState, JsonBody, QueryParams};
use crate::auth::api::AdminIdentity;
use crate::auth::guard::field;
use crate::auth::models::{ActionKey, IdentityKind};
use crate::models::{Branch, Customer, CustomerUpdate, NewCustomer};
use axum::{
    extract::State,
    Json,
};
use bcrypt::{hash, DEFAULT_COST};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

const CREATE: ActionKey = ActionKey::scoped("customer", "create");
const VIEW: ActionKey = ActionKey::scoped("customer", "view");
const UPDATE: ActionKey = ActionKey::scoped("customer", "update");
const STATUS: ActionKey = ActionKey::scoped("customer", "status");
const DELETE: ActionKey = ActionKey::scoped("customer", "delete");

#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    #[serde(default, deserialize_with = "opt_id")]
    pub admin_id: Option<i64>,
    #[serde(rename = "_token")]
    pub token: Option<String>,
    pub client_unique_id: Option<String>,
    pub name: Option<String>,
    pub emails: Option<Vec<String>>,
    pub mobile: Option<String>,
    pub address: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub tat_days: Option<i64>,
    /// Login email of the head branch; defaults to the first customer email.
    pub branch_email: Option<String>,
    /// Login password of the head branch.
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCustomerRequest {
    #[serde(default, deserialize_with = "opt_id")]
    pub admin_id: Option<i64>,
    #[serde(rename = "_token")]
    pub token: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub customer_id: Option<i64>,
    pub name: Option<String>,
    pub emails: Option<Vec<String>>,
    pub mobile: Option<String>,
    pub address: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub tat_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CustomerStatusRequest {
    #[serde(default, deserialize_with = "opt_id")]
    pub admin_id: Option<i64>,
    #[serde(rename = "_token")]
    pub token: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub customer_id: Option<i64>,
    #[serde(default, deserialize_with = "opt_flag")]
    pub status: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CustomerIdQuery {
    #[serde(default, deserialize_with = "opt_id")]
    pub admin_id: Option<i64>,
    #[serde(rename = "_token")]
    pub token: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub customer_id: Option<i64>,
}

/// One customer in the overview, with its own failure if its lookups failed.
#[derive(Debug, Serialize)]
pub struct CustomerOverview {
    #[serde(flatten)]
    pub customer: Customer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branches: Option<Vec<Branch>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// POST /customer/create
pub async fn create(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateCustomerRequest>,
) -> Result<Json<Value>, ApiError> {
    let caller = admit(
        &state,
        IdentityKind::Admin,
        payload.admin_id,
        &payload.token,
        &CREATE,
        &[
            field("client_unique_id", &payload.client_unique_id),
            field("name", &payload.name),
            field("emails", &payload.emails),
            field("mobile", &payload.mobile),
            field("password", &payload.password),
        ],
    )
    .await?;

    let client_unique_id = payload.client_unique_id.unwrap_or_default().trim().to_string();
    let emails: Vec<String> = payload
        .emails
        .unwrap_or_default()
        .into_iter()
        .filter_map(|e| non_blank(Some(e)))
        .collect();
    let head_branch_email = non_blank(payload.branch_email)
        .or_else(|| emails.first().cloned())
        .ok_or_else(|| ApiError::MissingFields(vec!["emails"]))?;

    if state.db.client_unique_id_exists(&client_unique_id).await? {
        state
            .db
            .record_activity(caller.id, "customer", "create", false, "Duplicate client unique ID")
            .await;
        return Err(ApiError::Conflict(format!(
            "Client unique ID {client_unique_id} already exists"
        )));
    }
    if state.db.branch_email_exists(&head_branch_email).await? {
        return Err(ApiError::Conflict(format!(
            "Branch email {head_branch_email} is already in use"
        )));
    }

    let password = payload.password.unwrap_or_default();
    let head_branch_password_hash = hash(password, DEFAULT_COST)
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {e}")))?;

    let new = NewCustomer {
        client_unique_id,
        name: payload.name.unwrap_or_default().trim().to_string(),
        emails,
        mobile: non_blank(payload.mobile),
        address: non_blank(payload.address),
        tat_days: payload.tat_days,
        admin_id: caller.id,
        head_branch_email,
        head_branch_password_hash,
    };
    let created = state.db.create_customer(&new).await?;

    state
        .db
        .record_activity(
            caller.id,
            "customer",
            "create",
            true,
            &format!("Created customer {}", new.client_unique_id),
        )
        .await;

    Ok(respond(
        "Customer created successfully",
        &caller.token,
        json!({
            "customer_id": created.customer_id,
            "head_branch_id": created.head_branch_id,
        }),
    ))
}

/// GET /customer/list
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

    let customers = state.db.list_customers().await?;
    Ok(respond(
        "Customers fetched successfully",
        &caller.token,
        json!({ "customers": customers }),
    ))
}

/// GET /customer/overview
///
/// Branches and application counts are loaded per customer concurrently;
/// one customer's failure is reported on that customer only.
pub async fn overview(
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

    let customers = state.db.list_customers().await?;
    let overview: Vec<CustomerOverview> = join_all(customers.into_iter().map(|customer| {
        let db = state.db.clone();
        async move {
            let lookups = async {
                let branches = db.list_branches(customer.id).await?;
                let count = db.count_applications_for_customer(customer.id).await?;
                anyhow::Ok((branches, count))
            };
            match lookups.await {
                Ok((branches, count)) => CustomerOverview {
                    customer,
                    branches: Some(branches),
                    application_count: Some(count),
                    error: None,
                },
                Err(e) => {
                    warn!(customer_id = customer.id, error = %e, "Overview lookup failed");
                    CustomerOverview {
                        customer,
                        branches: None,
                        application_count: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        }
    }))
    .await;

    Ok(respond(
        "Customer overview fetched successfully",
        &caller.token,
        json!({ "customers": overview }),
    ))
}

/// PUT /customer/update
pub async fn update(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<UpdateCustomerRequest>,
) -> Result<Json<Value>, ApiError> {
    let caller = admit(
        &state,
        IdentityKind::Admin,
        payload.admin_id,
        &payload.token,
        &UPDATE,
        &[field("customer_id", &payload.customer_id)],
    )
    .await?;
    let customer_id = payload.customer_id.unwrap_or_default();

    let update = CustomerUpdate {
        name: non_blank(payload.name),
        emails: payload
            .emails
            .map(|emails| emails.into_iter().filter_map(|e| non_blank(Some(e))).collect::<Vec<_>>())
            .filter(|emails| !emails.is_empty()),
        mobile: non_blank(payload.mobile),
        address: non_blank(payload.address),
        tat_days: payload.tat_days,
    };
    if update.name.is_none()
        && update.emails.is_none()
        && update.mobile.is_none()
        && update.address.is_none()
        && update.tat_days.is_none()
    {
        return Err(ApiError::BadRequest("No fields to update".into()));
    }

    if !state.db.update_customer(customer_id, &update).await? {
        return Err(ApiError::NotFound("Customer not found".into()));
    }
    state
        .db
        .record_activity(
            caller.id,
            "customer",
            "update",
            true,
            &format!("Updated customer {customer_id}"),
        )
        .await;

    Ok(respond("Customer updated successfully", &caller.token, json!({})))
}

/// PUT /customer/status
pub async fn status(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CustomerStatusRequest>,
) -> Result<Json<Value>, ApiError> {
    let caller = admit(
        &state,
        IdentityKind::Admin,
        payload.admin_id,
        &payload.token,
        &STATUS,
        &[
            field("customer_id", &payload.customer_id),
            field("status", &payload.status),
        ],
    )
    .await?;
    let customer_id = payload.customer_id.unwrap_or_default();
    let active = payload.status.unwrap_or_default();

    if !state.db.set_customer_status(customer_id, active).await? {
        return Err(ApiError::NotFound("Customer not found".into()));
    }
    info!(customer_id, active, "Customer status changed");
    state
        .db
        .record_activity(
            caller.id,
            "customer",
            "status",
            true,
            &format!(
                "Customer {customer_id} {}",
                if active { "activated" } else { "deactivated" }
            ),
        )
        .await;

    Ok(respond(
        "Customer status updated successfully",
        &caller.token,
        json!({ "active": active }),
    ))
}

/// DELETE /customer/delete
pub async fn delete(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<CustomerIdQuery>,
) -> Result<Json<Value>, ApiError> {
    let caller = admit(
        &state,
        IdentityKind::Admin,
        query.admin_id,
        &query.token,
        &DELETE,
        &[field("customer_id", &query.customer_id)],
    )
    .await?;
    let customer_id = query.customer_id.unwrap_or_default();

    if !state.db.delete_customer(customer_id).await? {
        return Err(ApiError::NotFound("Customer not found".into()));
    }
    state
        .db
        .record_activity(
            caller.id,
            "customer",
            "delete",
            true,
            &format!("Deleted customer {customer_id}"),
        )
        .await;

    Ok(respond("Customer deleted successfully", &caller.token, json!({})))
}
