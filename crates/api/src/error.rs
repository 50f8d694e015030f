//! API error types with HTTP response mapping.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::wire::ErrorResponse;
use coordinator::CoordinatorError;
use ledger::LedgerError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Malformed request from the client.
    BadRequest(String),
    /// Ledger operation error.
    Ledger(LedgerError),
    /// Order coordination error.
    Coordinator(CoordinatorError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut failed_step = None;
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Ledger(err) => ledger_error_to_response(err),
            ApiError::Coordinator(err) => {
                failed_step = err.failed_step().map(|step| step.as_str().to_string());
                coordinator_error_to_response(err)
            }
        };

        let body = ErrorResponse {
            error: message,
            failed_step,
        };
        (status, axum::Json(body)).into_response()
    }
}

fn ledger_error_to_response(err: LedgerError) -> (StatusCode, String) {
    if err.is_persistence_failure() {
        tracing::error!(error = %err, "ledger persistence failure");
        return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
    }
    match &err {
        LedgerError::NoAvailability { .. } | LedgerError::ItemNotFound(_) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        _ => (StatusCode::BAD_REQUEST, err.to_string()),
    }
}

fn coordinator_error_to_response(err: CoordinatorError) -> (StatusCode, String) {
    if err.is_unavailability() {
        (StatusCode::CONFLICT, err.to_string())
    } else {
        (StatusCode::BAD_GATEWAY, err.to_string())
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

impl From<CoordinatorError> for ApiError {
    fn from(err: CoordinatorError) -> Self {
        ApiError::Coordinator(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Error decoding request body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(format!("Invalid path parameter: {}", rejection.body_text()))
    }
}
