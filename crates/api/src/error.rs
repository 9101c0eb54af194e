//! API error types with HTTP response mapping.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use payment::PaymentError;
use serde::Serialize;

/// Per-field validation messages, aggregated so a request with several
/// problems gets them all back in one response.
#[derive(Debug, Default, Serialize)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a problem with a field.
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    /// Returns true if no problems were recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fails with a validation error if any problem was recorded.
    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// No usable identity on the request.
    Unauthorized(String),
    /// Identity known, capability check failed.
    Forbidden(String),
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Aggregated per-field request validation failures.
    Validation(FieldErrors),
    /// Domain logic error.
    Domain(DomainError),
    /// Payment layer error.
    Payment(PaymentError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(message) => {
                error_body(StatusCode::UNAUTHORIZED, "unauthorized", &message)
            }
            ApiError::Forbidden(message) => {
                error_body(StatusCode::FORBIDDEN, "forbidden", &message)
            }
            ApiError::NotFound(message) => {
                error_body(StatusCode::NOT_FOUND, "not_found", &message)
            }
            ApiError::BadRequest(message) => {
                error_body(StatusCode::BAD_REQUEST, "bad_request", &message)
            }
            ApiError::Validation(fields) => {
                let body = serde_json::json!({ "errors": fields });
                (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(body)).into_response()
            }
            ApiError::Domain(err) => domain_error_response(err),
            ApiError::Payment(err) => payment_error_response(err),
        }
    }
}

fn error_body(status: StatusCode, code: &str, message: &str) -> Response {
    let body = serde_json::json!({ "error": { "code": code, "message": message } });
    (status, axum::Json(body)).into_response()
}

fn domain_error_response(err: DomainError) -> Response {
    let status = match &err {
        DomainError::InsufficientStock { .. }
        | DomainError::InvalidStatusTransition { .. }
        | DomainError::AlreadyInState { .. }
        | DomainError::GroupNotCancellable { .. }
        | DomainError::CancellationWindowExpired => StatusCode::CONFLICT,
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Storage(_) => {
            tracing::error!(error = %err, "storage failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::BAD_REQUEST,
    };

    // the cart report rides along so the client can show per-line issues
    let body = match &err {
        DomainError::InvalidCart { report } => serde_json::json!({
            "error": { "code": err.code(), "message": err.to_string(), "report": report }
        }),
        _ => serde_json::json!({
            "error": { "code": err.code(), "message": err.to_string() }
        }),
    };
    (status, axum::Json(body)).into_response()
}

fn payment_error_response(err: PaymentError) -> Response {
    let status = match &err {
        PaymentError::SignatureInvalid => StatusCode::UNAUTHORIZED,
        PaymentError::DuplicateTransaction | PaymentError::GroupNotPayable { .. } => {
            StatusCode::CONFLICT
        }
        PaymentError::NotFound { .. } => StatusCode::NOT_FOUND,
        PaymentError::NotDigital => StatusCode::BAD_REQUEST,
        PaymentError::Gateway(_) => StatusCode::BAD_GATEWAY,
        PaymentError::Storage(_) => {
            tracing::error!(error = %err, "storage failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_body(status, err.code(), &err.to_string())
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        ApiError::Payment(err)
    }
}

impl From<storage::StorageError> for ApiError {
    fn from(err: storage::StorageError) -> Self {
        ApiError::Domain(DomainError::Storage(err))
    }
}
