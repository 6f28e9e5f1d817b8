//! # error
//!
//! Error types for every layer of the service.
//!
//! Storage, quote and notification failures each get their own enum so the
//! sweep can decide per record whether to skip, continue or abort.  Handlers
//! return `Result<_, AppError>`, which Axum turns into a structured JSON body
//! so API clients always get a machine-readable response even on failure.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// ─── Persistence ──────────────────────────────────────────────────────────────

/// A failure reported by a persistence backend.
///
/// `Clone` so a single failed cache fill can be handed to every caller that
/// was waiting on it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// The backend could not be reached at all (pool exhausted, DB down).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A write violated a uniqueness or existence constraint.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// Any other I/O failure while talking to the backend.
    #[error("store I/O error: {0}")]
    Io(String),

    /// A stored document could not be (de)serialised.
    #[error("record serialization error: {0}")]
    Serde(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serde(err.to_string())
    }
}

// ─── Quote Source ─────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("quote source unreachable: {0}")]
    Unreachable(String),

    #[error("quote source returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("quote response parse error: {0}")]
    Parse(String),
}

// ─── Notifier ─────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum NotifyError {
    /// The `can_post_notification` guard said no.
    #[error("notification permission not granted")]
    PermissionDenied,

    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

// ─── HTTP Surface ─────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AppError {
    /// The request payload was syntactically correct but semantically invalid.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The persistence backend rejected the operation.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Catch-all for unexpected failures.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Store(StoreError::Constraint(msg)) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Store(StoreError::Unavailable(msg)) => {
                (StatusCode::SERVICE_UNAVAILABLE, msg.clone())
            }
            AppError::Store(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            AppError::Internal(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal error: {err}"),
            ),
        };

        let body = Json(json!({
            "ok":    false,
            "error": message,
        }));

        (status, body).into_response()
    }
}
