use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the bounded message queues.
#[derive(Error, Debug)]
pub enum QueueError {
    /// The process-wide cancellation signal fired while the call was
    /// blocked on `push`/`pop`. Not a failure — a normal shutdown.
    #[error("queue operation cancelled")]
    Cancelled,
}

/// Errors surfaced by the in-memory order store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("unknown order id `{0}`")]
    UnknownOrder(String),
}

/// Errors returned by the HTTP submission surface, mapped to status codes
/// in `api.rs`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, msg) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({ "error": msg }))).into_response()
    }
}
