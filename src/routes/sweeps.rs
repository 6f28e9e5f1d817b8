//! # routes::sweeps
//!
//! Operational endpoints.
//!
//! | Method | Path                        | Description                         |
//! |--------|-----------------------------|-------------------------------------|
//! | POST   | `/api/sweeps/big-movers`    | Run a big-mover sweep now           |
//! | POST   | `/api/sweeps/price-alerts`  | Run a price-alert sweep now         |
//! | POST   | `/api/cache/invalidate`     | Drop every repository cache         |
//! | DELETE | `/api/notifications`        | Cancel every shown notification     |
//!
//! Manual sweeps accept `?force=true` to bypass the quote cache and stop at
//! the same shutdown signal as the scheduled ones.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::engine::sweep::{run_sweep, SweepError, SweepKind, SweepOutcome};
use crate::error::StoreError;
use crate::state::SharedState;

#[derive(Debug, Default, Deserialize)]
pub struct SweepParams {
    #[serde(default)]
    pub force: bool,
}

/// POST /api/sweeps/big-movers
pub async fn sweep_big_movers(
    State(state): State<SharedState>,
    Query(params): Query<SweepParams>,
) -> impl IntoResponse {
    trigger(&state, SweepKind::BigMovers, params.force).await
}

/// POST /api/sweeps/price-alerts
pub async fn sweep_price_alerts(
    State(state): State<SharedState>,
    Query(params): Query<SweepParams>,
) -> impl IntoResponse {
    trigger(&state, SweepKind::PriceAlerts, params.force).await
}

async fn trigger(state: &SharedState, kind: SweepKind, force: bool) -> (StatusCode, Json<serde_json::Value>) {
    match run_sweep(state, kind, &state.shutdown.signal(), force).await {
        SweepOutcome::Success(report) => (
            StatusCode::OK,
            Json(json!({ "ok": true, "outcome": "SUCCESS", "report": report })),
        ),
        SweepOutcome::Cancelled => (
            StatusCode::OK,
            Json(json!({ "ok": true, "outcome": "CANCELLED", "kind": kind })),
        ),
        SweepOutcome::Failed(err) => {
            let status = match &err {
                SweepError::Quotes(_) => StatusCode::BAD_GATEWAY,
                SweepError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
                SweepError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(json!({ "ok": false, "outcome": "FAILED", "kind": kind, "error": err.to_string() })),
            )
        }
    }
}

/// POST /api/cache/invalidate: after writes made outside this process.
pub async fn invalidate_caches(State(state): State<SharedState>) -> impl IntoResponse {
    state.repos.invalidate_all();
    info!("🧹 all repository caches invalidated");
    Json(json!({ "ok": true, "message": "caches invalidated" }))
}

/// DELETE /api/notifications
pub async fn cancel_notifications(State(state): State<SharedState>) -> impl IntoResponse {
    state.notifier.cancel_all().await;
    Json(json!({ "ok": true, "message": "notifications cancelled" }))
}
