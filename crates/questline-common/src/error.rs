//! API error types and helpers.
//!
//! # Purpose and responsibility
//! Every service returns failures as `{code, message, request_id}` with a
//! status matching the code. Handlers build errors through these helpers so
//! the gateway can pass downstream errors through without rewriting them.
//!
//! # Security considerations
//! - Internal errors log details server-side but return generic messages.
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
}

/// Structured API error returned by handlers.
///
/// # Invariants
/// - `status` must match the semantics of `body.code`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: &str) -> Self {
        Self {
            status,
            body: ErrorResponse {
                code: code.to_string(),
                message: message.to_string(),
                request_id: None,
            },
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.body.request_id = Some(request_id.into());
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub fn api_not_found(message: &str) -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "not_found", message)
}

/// Build a 409 Conflict error.
///
/// The caller picks the code (`already_exists`, `overlapping_campaign`, ...)
/// so clients can tell conflicts apart.
pub fn api_conflict(code: &str, message: &str) -> ApiError {
    ApiError::new(StatusCode::CONFLICT, code, message)
}

/// Build a 500 from an underlying failure.
///
/// Logs the error and returns only `message` to the client.
pub fn api_internal(message: &str, err: &(impl std::fmt::Debug + ?Sized)) -> ApiError {
    tracing::error!(error = ?err, "{message}");
    api_internal_message(message)
}

pub fn api_internal_message(message: &str) -> ApiError {
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

pub fn api_unauthorized(message: &str) -> ApiError {
    ApiError::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

pub fn api_forbidden(message: &str) -> ApiError {
    ApiError::new(StatusCode::FORBIDDEN, "forbidden", message)
}

pub fn api_validation_error(message: &str) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "validation_error", message)
}

pub fn api_unknown_route(message: &str) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "unknown_route", message)
}

/// Downstream service could not be reached or dropped the connection.
pub fn api_upstream_failure(message: &str) -> ApiError {
    ApiError::new(StatusCode::BAD_GATEWAY, "upstream_failure", message)
}

pub fn api_upstream_timeout(message: &str) -> ApiError {
    ApiError::new(StatusCode::GATEWAY_TIMEOUT, "upstream_timeout", message)
}
