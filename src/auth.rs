//! # auth — API Key Middleware
//!
//! Guards every endpoint with an `X-API-Key` header.
//!
//! ## Mode
//! - `API_KEY` unset or empty → **allow all** (dev mode)
//! - `API_KEY` set → every request must carry `X-API-Key: <key>`
//!
//! `/api/health` is always open.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::warn;

use crate::state::SharedState;

pub const API_KEY_HEADER: &str = "X-API-Key";

pub async fn require_api_key(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let expected = state.config.api_key.as_str();

    if expected.is_empty() || request.uri().path() == "/api/health" {
        return next.run(request).await;
    }

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if provided == expected {
        next.run(request).await
    } else {
        warn!(path = request.uri().path(), "❌ Unauthorized request, invalid or missing X-API-Key");
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "ok":    false,
                "error": "Unauthorized: invalid or missing X-API-Key header",
            })),
        )
            .into_response()
    }
}
