//! End-to-end tests driving the router in-process.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use cmt_admin_backend::{
    auth::{CredentialStore, ExpiredTokenPolicy, IdentityKind},
    middleware::{RateLimitConfig, RateLimitLayer},
    router, AppState, Database,
};
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::NamedTempFile;
use tower::ServiceExt;

const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "admin123";

struct TestApp {
    app: Router,
    db: Database,
    _temp: NamedTempFile,
}

async fn setup_with(max_requests: u32, policy: ExpiredTokenPolicy) -> TestApp {
    let temp = NamedTempFile::new().unwrap();
    let db = Database::open(temp.path().to_str().unwrap()).unwrap();
    db.seed_defaults(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();

    let state = AppState::new(
        db.clone(),
        chrono::Duration::hours(1),
        policy,
    );
    let limiter = RateLimitLayer::new(RateLimitConfig {
        max_requests,
        window: Duration::from_secs(60),
    });

    TestApp {
        app: router(state, limiter),
        db,
        _temp: temp,
    }
}

async fn setup() -> TestApp {
    setup_with(100, ExpiredTokenPolicy::Accept).await
}

impl TestApp {
    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = match body {
            Some(body) => Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        };

        self.dispatch(request).await
    }

    /// Send a body as-is, optionally with a content type.
    async fn send_raw(&self, uri: &str, content_type: Option<&str>, body: &str) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(Method::POST).uri(uri);
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        self.dispatch(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn dispatch(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn login(&self, path: &str, username: &str, password: &str) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            path,
            Some(json!({ "username": username, "password": password })),
        )
        .await
    }

    /// Log in as the seeded super admin; returns (admin_id, token).
    async fn admin_session(&self) -> (i64, String) {
        let (status, body) = self.login("/admin/login", ADMIN_EMAIL, ADMIN_PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        (
            body["admin"]["id"].as_i64().unwrap(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    /// Create a customer through the API; returns (customer_id, head_branch_id).
    async fn create_customer(&self, admin_id: i64, token: &str, cuid: &str, email: &str) -> (i64, i64) {
        let (status, body) = self
            .send(
                Method::POST,
                "/customer/create",
                Some(json!({
                    "admin_id": admin_id,
                    "_token": token,
                    "client_unique_id": cuid,
                    "name": format!("Customer {cuid}"),
                    "emails": [email],
                    "mobile": "9876543210",
                    "tat_days": 5,
                    "password": "branchpass1",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        (
            body["customer_id"].as_i64().unwrap(),
            body["head_branch_id"].as_i64().unwrap(),
        )
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = setup().await;
    let (status, body) = app.send(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], true);
}

#[tokio::test]
async fn test_missing_fields_are_all_listed() {
    let app = setup().await;
    let (status, body) = app
        .send(Method::POST, "/customer/create", Some(json!({ "name": "Acme" })))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], false);
    assert_eq!(
        body["message"],
        "Missing required fields: admin_id, _token, client_unique_id, emails, mobile, password"
    );
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let app = setup().await;
    let (status, body) = app.login("/admin/login", ADMIN_EMAIL, "not-the-password").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid username or password");

    let (status, _) = app.login("/admin/login", "ghost@example.com", "whatever1").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_overwrites_previous_token_and_logout_clears_it() {
    let app = setup().await;
    let (admin_id, first) = app.admin_session().await;
    let (_, second) = app.admin_session().await;
    assert_ne!(first, second);

    let verify = |token: String| json!({ "admin_id": admin_id, "_token": token });

    let (status, body) = app
        .send(Method::POST, "/admin/verify-admin-login", Some(verify(first)))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid token provided");

    let (status, body) = app
        .send(Method::POST, "/admin/verify-admin-login", Some(verify(second.clone())))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token"], second.as_str());
    assert_eq!(body["admin"]["email"], ADMIN_EMAIL);

    let (status, _) = app
        .send(
            Method::GET,
            &format!("/admin/logout?admin_id={admin_id}&_token={second}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(Method::POST, "/admin/verify-admin-login", Some(verify(second)))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_viewer_role_cannot_create_customer() {
    let app = setup().await;
    app.db
        .create_admin("Viewer", "viewer@example.com", "viewerpass", "viewer")
        .await
        .unwrap();
    app.db
        .put_permission_document("viewer", r#"{"customer":{"view":true}}"#)
        .await
        .unwrap();

    let (status, body) = app
        .login("/admin/login", "viewer@example.com", "viewerpass")
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let viewer_id = body["admin"]["id"].as_i64().unwrap();
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(
            Method::POST,
            "/customer/create",
            Some(json!({
                "admin_id": viewer_id,
                "_token": token,
                "client_unique_id": "CL-9",
                "name": "Blocked",
                "emails": ["blocked@example.com"],
                "mobile": "1234567890",
                "password": "branchpass1",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], false);
    assert!(app.db.list_customers().await.unwrap().is_empty());

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/customer/list?admin_id={viewer_id}&_token={token}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token"], token.as_str());
}

#[tokio::test]
async fn test_permission_is_checked_before_token() {
    let app = setup().await;
    app.db
        .create_admin("Viewer", "viewer@example.com", "viewerpass", "viewer")
        .await
        .unwrap();
    app.db
        .put_permission_document("viewer", r#"{"customer":{"view":true}}"#)
        .await
        .unwrap();
    let (_, body) = app
        .login("/admin/login", "viewer@example.com", "viewerpass")
        .await;
    let viewer_id = body["admin"]["id"].as_i64().unwrap();

    // Bad token and missing permission: permission answers first.
    let (status, _) = app
        .send(
            Method::GET,
            &format!("/activity-log/list?admin_id={viewer_id}&_token=bogus"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            Method::GET,
            &format!("/customer/list?admin_id={viewer_id}&_token=bogus"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_customer_lifecycle_and_head_branch_rules() {
    let app = setup().await;
    let (admin_id, token) = app.admin_session().await;
    let (customer_id, head_branch_id) = app
        .create_customer(admin_id, &token, "CL-1", "ops@cl1.example")
        .await;

    let (status, body) = app
        .send(
            Method::GET,
            &format!(
                "/branch/list-by-customer?admin_id={admin_id}&_token={token}&customer_id={customer_id}"
            ),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["branches"][0]["id"], head_branch_id);
    assert_eq!(body["branches"][0]["is_head"], true);

    let (status, body) = app
        .send(
            Method::DELETE,
            &format!("/branch/delete?admin_id={admin_id}&_token={token}&branch_id={head_branch_id}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Cannot delete the head branch");

    let (status, body) = app
        .send(
            Method::PUT,
            "/branch/update",
            Some(json!({
                "admin_id": admin_id,
                "_token": token,
                "branch_id": head_branch_id,
                "name": "Renamed",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Cannot edit the head branch");

    let (status, body) = app
        .send(
            Method::PUT,
            "/branch/status",
            Some(json!({
                "admin_id": admin_id,
                "_token": token,
                "branch_id": head_branch_id,
                "status": false,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Cannot change the status of the head branch");

    // A second branch can be changed and removed.
    let (status, body) = app
        .send(
            Method::POST,
            "/branch/create",
            Some(json!({
                "admin_id": admin_id,
                "_token": token,
                "customer_id": customer_id,
                "name": "North",
                "email": "north@cl1.example",
                "password": "northpass1",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let branch_id = body["branch_id"].as_i64().unwrap();

    let (status, _) = app
        .send(
            Method::PUT,
            "/branch/status",
            Some(json!({
                "admin_id": admin_id,
                "_token": token,
                "branch_id": branch_id,
                "status": "0",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!app.db.get_branch(branch_id).await.unwrap().unwrap().status);

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/branch/delete?admin_id={admin_id}&_token={token}&branch_id={branch_id}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/customer/delete?admin_id={admin_id}&_token={token}&customer_id={customer_id}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.db.get_branch(head_branch_id).await.unwrap().is_none());

    let entries = app.db.list_activity(50).await.unwrap();
    assert!(entries
        .iter()
        .any(|e| e.module == "branch" && e.action == "delete" && !e.result));
    assert!(entries
        .iter()
        .any(|e| e.module == "customer" && e.action == "delete" && e.result));
}

#[tokio::test]
async fn test_duplicates_conflict() {
    let app = setup().await;
    let (admin_id, token) = app.admin_session().await;
    let (customer_id, _) = app
        .create_customer(admin_id, &token, "CL-2", "ops@cl2.example")
        .await;

    let (status, _) = app
        .send(
            Method::POST,
            "/customer/create",
            Some(json!({
                "admin_id": admin_id,
                "_token": token,
                "client_unique_id": "CL-2",
                "name": "Again",
                "emails": ["other@cl2.example"],
                "mobile": "9876543210",
                "password": "branchpass1",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .send(
            Method::POST,
            "/branch/create",
            Some(json!({
                "admin_id": admin_id,
                "_token": token,
                "customer_id": customer_id,
                "name": "Clash",
                "email": "ops@cl2.example",
                "password": "clashpass1",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let spoc = json!({
        "admin_id": admin_id,
        "_token": token,
        "name": "Priya",
        "designation": "Manager",
        "phone": "5550101",
        "email": "priya@example.com",
    });
    let (status, _) = app
        .send(Method::POST, "/client-spoc/create", Some(spoc.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.send(Method::POST, "/client-spoc/create", Some(spoc)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], false);
}

#[tokio::test]
async fn test_branch_token_mismatch_is_unauthorized() {
    let app = setup().await;
    let (admin_id, token) = app.admin_session().await;
    let (_, head_branch_id) = app
        .create_customer(admin_id, &token, "CL-3", "ops@cl3.example")
        .await;

    let (status, _) = app
        .login("/branch/login", "ops@cl3.example", "branchpass1")
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/branch/ticket/list?branch_id={head_branch_id}&_token=abc"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid token provided");

    let (status, _) = app
        .send(Method::GET, "/branch/ticket/list?branch_id=4040&_token=abc", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_inactive_customer_blocks_branch_login() {
    let app = setup().await;
    let (admin_id, token) = app.admin_session().await;
    let (customer_id, _) = app
        .create_customer(admin_id, &token, "CL-4", "ops@cl4.example")
        .await;

    let (status, _) = app
        .send(
            Method::PUT,
            "/customer/status",
            Some(json!({
                "admin_id": admin_id,
                "_token": token,
                "customer_id": customer_id,
                "status": false,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .login("/branch/login", "ops@cl4.example", "branchpass1")
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_branch_applications_tickets_and_tracker() {
    let app = setup().await;
    let (admin_id, admin_token) = app.admin_session().await;
    let (_, branch_id) = app
        .create_customer(admin_id, &admin_token, "CL-5", "ops@cl5.example")
        .await;

    let (status, body) = app
        .login("/branch/login", "ops@cl5.example", "branchpass1")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["branch"]["id"], branch_id);
    let branch_token = body["token"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(
            Method::POST,
            "/branch/client-application/create",
            Some(json!({
                "branch_id": branch_id,
                "_token": branch_token,
                "name": "Ravi Kumar",
                "employee_id": "EMP-7",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["application"]["application_id"], "CL-5-1");
    assert_eq!(body["application"]["status"], "wip");

    let (status, body) = app
        .send(
            Method::PUT,
            "/client-master-tracker/update",
            Some(json!({
                "admin_id": admin_id,
                "_token": admin_token,
                "application_id": "CL-5-1",
                "status": "completed",
                "remarks": "All checks clear",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["application"]["status"], "completed");

    let (status, _) = app
        .send(
            Method::PUT,
            "/client-master-tracker/update",
            Some(json!({
                "admin_id": admin_id,
                "_token": admin_token,
                "application_id": "CL-5-1",
                "status": "pending",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(
            Method::GET,
            &format!(
                "/client-master-tracker/applications?admin_id={admin_id}&_token={admin_token}&branch_id={branch_id}"
            ),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["applications"].as_array().unwrap().len(), 1);

    let (status, body) = app
        .send(
            Method::POST,
            "/branch/ticket/create",
            Some(json!({
                "branch_id": branch_id,
                "_token": branch_token,
                "title": "Report missing",
                "description": "CL-5-1 report not visible",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let ticket_number = body["ticket"]["ticket_number"].as_str().unwrap().to_string();

    let (status, _) = app
        .send(
            Method::POST,
            "/ticket/chat",
            Some(json!({
                "admin_id": admin_id,
                "_token": admin_token,
                "ticket_number": ticket_number,
                "message": "Looking into it",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(
            Method::POST,
            "/branch/ticket/chat",
            Some(json!({
                "branch_id": branch_id,
                "_token": branch_token,
                "ticket_number": ticket_number,
                "message": "Thanks",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(
            Method::PUT,
            "/ticket/update",
            Some(json!({
                "admin_id": admin_id,
                "_token": admin_token,
                "ticket_number": ticket_number,
                "status": "closed",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(
            Method::GET,
            &format!(
                "/ticket/view?admin_id={admin_id}&_token={admin_token}&ticket_number={ticket_number}"
            ),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ticket"]["status"], "closed");
    let conversation = body["conversation"].as_array().unwrap();
    assert_eq!(conversation.len(), 2);
    assert_eq!(conversation[0]["sender"], "admin");
    assert_eq!(conversation[1]["sender"], "branch");

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/customer/overview?admin_id={admin_id}&_token={admin_token}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["customers"][0]["application_count"], 1);
    assert_eq!(body["customers"][0]["branches"][0]["id"], branch_id);
}

#[tokio::test]
async fn test_update_password_enforces_length() {
    let app = setup().await;
    let (admin_id, token) = app.admin_session().await;

    let (status, _) = app
        .send(
            Method::PUT,
            "/admin/update-password",
            Some(json!({ "admin_id": admin_id, "_token": token, "new_password": "short" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            Method::PUT,
            "/admin/update-password",
            Some(json!({ "admin_id": admin_id, "_token": token, "new_password": "longenough1" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.login("/admin/login", ADMIN_EMAIL, ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.login("/admin/login", ADMIN_EMAIL, "longenough1").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_login_rate_limit() {
    let app = setup_with(2, ExpiredTokenPolicy::Accept).await;

    for _ in 0..2 {
        let (status, _) = app.login("/admin/login", ADMIN_EMAIL, "wrong-password").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    let (status, body) = app.login("/admin/login", ADMIN_EMAIL, ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["status"], false);

    // Only the login routes are limited.
    let (status, _) = app.send(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unreadable_bodies_get_json_errors() {
    let app = setup().await;
    let (admin_id, token) = app.admin_session().await;
    let json = Some("application/json");

    let wrong_type = json!({
        "admin_id": admin_id,
        "_token": token,
        "client_unique_id": "CL-1",
        "name": "Acme",
        "emails": "a@b.c",
        "mobile": "9876543210",
        "password": "branchpass1",
    })
    .to_string();

    for (content_type, body) in [
        (json, wrong_type.as_str()),
        (json, "{not json"),
        (None, r#"{"admin_id": 1}"#),
        (json, r#"{"admin_id": 1.5, "_token": "x"}"#),
    ] {
        let (status, response) = app.send_raw("/customer/create", content_type, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(response["status"], false, "{body}");
        assert!(response["message"].is_string(), "{body}");
    }
    assert!(app.db.list_customers().await.unwrap().is_empty());

    let (status, response) = app
        .send(Method::GET, "/activity-log/list?admin_id=1&_token=a&_token=b", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["status"], false);
}

#[tokio::test]
async fn test_non_positive_ids_are_missing() {
    let app = setup().await;
    let (_, token) = app.admin_session().await;

    for id in ["0", "-4"] {
        let (status, body) = app
            .send(
                Method::GET,
                &format!("/customer/list?admin_id={id}&_token={token}"),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{id}");
        assert_eq!(body["message"], "Missing required fields: admin_id");
    }
}

#[tokio::test]
async fn test_deactivating_customer_ends_open_branch_session() {
    let app = setup().await;
    let (admin_id, admin_token) = app.admin_session().await;
    let (customer_id, branch_id) = app
        .create_customer(admin_id, &admin_token, "CL-6", "ops@cl6.example")
        .await;

    let (_, body) = app
        .login("/branch/login", "ops@cl6.example", "branchpass1")
        .await;
    let branch_token = body["token"].as_str().unwrap().to_string();
    let application = json!({
        "branch_id": branch_id,
        "_token": branch_token,
        "name": "Ravi Kumar",
        "employee_id": "EMP-1",
    });

    let (status, _) = app
        .send(Method::POST, "/branch/client-application/create", Some(application.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(
            Method::PUT,
            "/customer/status",
            Some(json!({
                "admin_id": admin_id,
                "_token": admin_token,
                "customer_id": customer_id,
                "status": false,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(Method::POST, "/branch/client-application/create", Some(application))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Branch account is inactive");

    let (status, _) = app
        .send(
            Method::GET,
            &format!("/branch/ticket/list?branch_id={branch_id}&_token={branch_token}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_deactivating_branch_ends_its_session() {
    let app = setup().await;
    let (admin_id, admin_token) = app.admin_session().await;
    let (customer_id, _) = app
        .create_customer(admin_id, &admin_token, "CL-7", "ops@cl7.example")
        .await;

    let (status, body) = app
        .send(
            Method::POST,
            "/branch/create",
            Some(json!({
                "admin_id": admin_id,
                "_token": admin_token,
                "customer_id": customer_id,
                "name": "North",
                "email": "north@cl7.example",
                "password": "northpass1",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let branch_id = body["branch_id"].as_i64().unwrap();

    let (_, body) = app
        .login("/branch/login", "north@cl7.example", "northpass1")
        .await;
    let branch_token = body["token"].as_str().unwrap().to_string();
    let list_uri = format!("/branch/client-application/list?branch_id={branch_id}&_token={branch_token}");

    let (status, _) = app.send(Method::GET, &list_uri, None).await;
    assert_eq!(status, StatusCode::OK);

    app.db.set_branch_status(branch_id, false).await.unwrap();

    let (status, body) = app.send(Method::GET, &list_uri, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], false);
}

#[tokio::test]
async fn test_deactivated_admin_is_refused() {
    let app = setup().await;
    let (admin_id, token) = app.admin_session().await;
    app.db.set_admin_status(admin_id, false).await.unwrap();

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/customer/list?admin_id={admin_id}&_token={token}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Admin account is inactive");

    let (status, _) = app
        .send(
            Method::PUT,
            "/admin/update-password",
            Some(json!({ "admin_id": admin_id, "_token": token, "new_password": "longenough1" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_expired_token_is_rotated() {
    let app = setup_with(100, ExpiredTokenPolicy::Rotate).await;
    let (admin_id, token) = app.admin_session().await;

    let expired_at = chrono::Utc::now() - chrono::Duration::minutes(5);
    assert!(app
        .db
        .store_token(IdentityKind::Admin, admin_id, Some(&token), Some(expired_at))
        .await
        .unwrap());

    let list_uri = |token: &str| format!("/customer/list?admin_id={admin_id}&_token={token}");
    let (status, body) = app.send(Method::GET, &list_uri(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], false);
    let rotated = body["token"].as_str().unwrap().to_string();
    assert_ne!(rotated, token);

    let stored = app
        .db
        .find_identity(IdentityKind::Admin, admin_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.login_token.as_deref(), Some(rotated.as_str()));
    assert!(stored.token_expiry.unwrap() > chrono::Utc::now());

    let (status, _) = app.send(Method::GET, &list_uri(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.send(Method::GET, &list_uri(&rotated), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token"], rotated.as_str());
}
