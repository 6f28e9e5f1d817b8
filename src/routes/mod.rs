//! # routes
//!
//! The HTTP surface.
//!
//! | Area          | Module      |
//! |---------------|-------------|
//! | Watchlist, holdings, positions, splits, movers | [`records`] |
//! | Price alerts  | [`alerts`]  |
//! | Manual sweeps, cache, notifications | [`sweeps`] |
//! | Health, WebSocket monitor | [`monitor`] |

use axum::{
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::require_api_key;
use crate::cache::CachedRepository;
use crate::error::AppError;
use crate::models::{normalize_symbol, Record};
use crate::state::SharedState;

pub mod alerts;
pub mod monitor;
pub mod records;
pub mod sweeps;

pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Health & Monitor ──────────────────────────────────────────────────
        .route("/api/health",               get(monitor::health_check))
        .route("/ws/monitor",               get(monitor::ws_monitor))
        // ── Watchlist ─────────────────────────────────────────────────────────
        .route("/api/symbols",              get(records::list_symbols).post(records::add_symbol))
        .route("/api/symbols/:id",          delete(records::delete_symbol))
        // ── Portfolio ─────────────────────────────────────────────────────────
        .route("/api/holdings",             get(records::list_holdings).post(records::add_holding))
        .route("/api/holdings/:id",         delete(records::delete_holding))
        .route("/api/holdings/:id/summary", get(records::holding_summary))
        .route("/api/positions",            post(records::add_position))
        .route("/api/positions/:id",        delete(records::delete_position))
        .route("/api/splits",               post(records::add_split))
        .route("/api/splits/:id",           delete(records::delete_split))
        // ── Alerts ────────────────────────────────────────────────────────────
        .route("/api/alerts",               get(alerts::list_alerts).post(alerts::create_alert))
        .route("/api/alerts/active",        get(alerts::list_active))
        .route("/api/alerts/:id",           delete(alerts::delete_alert))
        .route("/api/alerts/:id/rearm",     post(alerts::rearm_alert))
        .route("/api/movers",               get(records::list_movers))
        // ── Operations ────────────────────────────────────────────────────────
        .route("/api/sweeps/big-movers",    post(sweeps::sweep_big_movers))
        .route("/api/sweeps/price-alerts",  post(sweeps::sweep_price_alerts))
        .route("/api/cache/invalidate",     post(sweeps::invalidate_caches))
        .route("/api/notifications",        delete(sweeps::cancel_notifications))
        // ── Middleware ────────────────────────────────────────────────────────
        .layer(axum::middleware::from_fn_with_state(state.clone(), require_api_key))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ─── Shared Helpers ───────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    /// Echo the deleted record back so the client can offer an undo.
    #[serde(default)]
    pub undo: bool,
}

/// Look up `id`, delete it, and answer in the common shape.
pub(crate) async fn delete_by_id<T: Record>(
    repo: &CachedRepository<T>,
    id: &str,
    offer_undo: bool,
) -> Result<Json<Value>, AppError> {
    let record = repo
        .query_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {id}", T::KIND)))?;

    if !repo.delete(record.clone(), offer_undo).await? {
        return Err(AppError::NotFound(format!("{} {id}", T::KIND)));
    }

    Ok(Json(json!({
        "ok":      true,
        "deleted": id,
        "undo":    offer_undo.then_some(record),
    })))
}

pub(crate) fn require_symbol(raw: &str) -> Result<String, AppError> {
    let symbol = normalize_symbol(raw);
    if symbol.is_empty() {
        return Err(AppError::BadRequest("symbol must not be empty".into()));
    }
    Ok(symbol)
}
