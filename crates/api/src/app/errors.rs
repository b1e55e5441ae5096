//! Error envelope: `{"status":"error","code":...,"message":...}`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use shopfront_auth::AuthError;
use shopfront_core::DomainError;
use shopfront_infra::ServiceError;
use shopfront_infra::store::StoreError;

/// Handler error; converts into the error envelope.
#[derive(Debug)]
pub enum ApiError {
    Service(ServiceError),
    /// Body or path could not be parsed.
    BadRequest(String),
}

pub type ApiResult = Result<Response, ApiError>;

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Service(err.into())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Service(err.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Service(err) => service_error_to_response(err),
            ApiError::BadRequest(msg) => json_error(StatusCode::BAD_REQUEST, "bad_request", msg),
        }
    }
}

pub fn service_error_to_response(err: ServiceError) -> Response {
    match err {
        ServiceError::Domain(DomainError::Validation(msg)) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        ServiceError::Domain(DomainError::InvariantViolation(msg)) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        ServiceError::Domain(e @ DomainError::NotFound(_)) => {
            json_error(StatusCode::NOT_FOUND, "not_found", e.to_string())
        }
        ServiceError::Domain(DomainError::Conflict(msg)) => json_error(StatusCode::CONFLICT, "conflict", msg),
        ServiceError::Auth(AuthError::Unauthenticated(msg)) => {
            json_error(StatusCode::UNAUTHORIZED, "unauthenticated", msg)
        }
        ServiceError::Auth(AuthError::Forbidden(msg)) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
        ServiceError::Store(e @ StoreError::Transient(_)) => {
            error!(error = %e, "transient storage failure");
            json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                "storage temporarily unavailable, retry later",
            )
        }
        ServiceError::Store(e) => {
            error!(error = %e, "storage failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "internal server error")
        }
        ServiceError::Internal(msg) => {
            error!(error = %msg, "internal failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal server error")
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "status": "error",
            "code": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
