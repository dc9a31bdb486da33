//! Error responses shared by the ledger routes.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lexledger_core::AdvanceError;
use serde_json::json;
use tracing::error;

/// Builds the `{"error", "message"}` body used by every failure.
pub fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "error": code,
            "message": message.into()
        })),
    )
        .into_response()
}

/// Maps ledger errors to HTTP responses.
///
/// Storage details stay in the logs; the client only learns that something failed.
pub fn map_advance_error(e: &AdvanceError) -> Response {
    let status =
        StatusCode::from_u16(e.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    match e {
        AdvanceError::Storage(_) => {
            error!(error = %e, "Ledger storage failure");
            error_response(status, e.error_code(), "An error occurred")
        }
        AdvanceError::AtomicityFailure(_) => {
            error!(error = %e, "Expense bridge rolled back");
            error_response(status, e.error_code(), e.to_string())
        }
        _ => error_response(status, e.error_code(), e.to_string()),
    }
}

/// Malformed JSON body.
pub fn json_rejection(rejection: &JsonRejection) -> Response {
    error_response(
        StatusCode::BAD_REQUEST,
        "validation_error",
        rejection.body_text(),
    )
}

/// Malformed query string.
pub fn query_rejection(rejection: &QueryRejection) -> Response {
    error_response(
        StatusCode::BAD_REQUEST,
        "validation_error",
        rejection.body_text(),
    )
}

/// Malformed path parameter.
pub fn path_rejection(rejection: &PathRejection) -> Response {
    error_response(
        StatusCode::BAD_REQUEST,
        "validation_error",
        rejection.body_text(),
    )
}
