//! API error type and its JSON response shape

use crate::auth::models::AuthError;
use crate::db::is_constraint_violation;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("{0}")]
    BadRequest(String),
    /// `token` carries a rotated token back to the caller.
    #[error("{message}")]
    Unauthorized {
        message: String,
        token: Option<String>,
    },
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Too many requests. Please slow down.")]
    TooManyRequests { retry_after_secs: u64 },
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized {
            message: message.into(),
            token: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingFields(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NotFound(_) => ApiError::NotFound(err.to_string()),
            AuthError::Unauthorized(message) => ApiError::unauthorized(message),
            AuthError::TokenExpired { ref rotated } => ApiError::Unauthorized {
                message: err.to_string(),
                token: rotated.clone(),
            },
            AuthError::AccessDenied(_) | AuthError::Inactive(_) => {
                ApiError::Forbidden(err.to_string())
            }
            AuthError::Store(e) => e.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if is_constraint_violation(&err) {
            return ApiError::Conflict("Record already exists".to_string());
        }
        error!(error = %format!("{err:#}"), "Store operation failed");
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "status": false,
            "message": self.to_string(),
        });
        if let ApiError::Unauthorized {
            token: Some(token), ..
        } = &self
        {
            body["token"] = json!(token);
        }

        match self {
            ApiError::TooManyRequests { retry_after_secs } => (
                status,
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                Json(body),
            )
                .into_response(),
            _ => (status, Json(body)).into_response(),
        }
    }
}
