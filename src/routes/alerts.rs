//! # routes::alerts
//!
//! Price alert management.
//!
//! | Method | Path                     | Description                          |
//! |--------|--------------------------|--------------------------------------|
//! | GET    | `/api/alerts`            | All alerts (`?symbol=` to filter)    |
//! | POST   | `/api/alerts`            | Create an alert                      |
//! | GET    | `/api/alerts/active`     | Enabled alerts with a trigger        |
//! | DELETE | `/api/alerts/:id`        | Remove an alert                      |
//! | POST   | `/api/alerts/:id/rearm`  | Re-enable a consumed alert           |

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::AppError;
use crate::models::PriceAlertRecord;
use crate::routes::{delete_by_id, require_symbol, DeleteParams};
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct NewAlert {
    pub symbol: String,
    pub trigger_above: Option<f64>,
    pub trigger_below: Option<f64>,
}

#[derive(Deserialize)]
pub struct AlertFilter {
    pub symbol: Option<String>,
}

/// GET /api/alerts
pub async fn list_alerts(
    State(state): State<SharedState>,
    Query(filter): Query<AlertFilter>,
) -> Result<impl IntoResponse, AppError> {
    let alerts = match filter.symbol {
        Some(symbol) => state.repos.price_alerts.query_by_symbol(&symbol).await?,
        None => state.repos.price_alerts.query().await?,
    };
    Ok(Json(json!({ "ok": true, "count": alerts.len(), "alerts": alerts })))
}

/// GET /api/alerts/active
pub async fn list_active(State(state): State<SharedState>) -> Result<impl IntoResponse, AppError> {
    let alerts = state.repos.price_alerts.query_active().await?;
    Ok(Json(json!({ "ok": true, "count": alerts.len(), "alerts": alerts })))
}

/// POST /api/alerts
pub async fn create_alert(
    State(state): State<SharedState>,
    Json(body): Json<NewAlert>,
) -> Result<impl IntoResponse, AppError> {
    let symbol = require_symbol(&body.symbol)?;

    for trigger in [body.trigger_above, body.trigger_below].into_iter().flatten() {
        if !(trigger.is_finite() && trigger >= 0.0) {
            return Err(AppError::BadRequest(format!("invalid trigger price {trigger}")));
        }
    }

    let alert = PriceAlertRecord::new(&symbol, body.trigger_above, body.trigger_below);
    if !alert.has_trigger() {
        return Err(AppError::BadRequest(
            "set trigger_above, trigger_below or both".into(),
        ));
    }

    let alert = state.repos.price_alerts.insert(alert).await.into_result()?;
    info!(
        id = %alert.id,
        symbol = %alert.symbol,
        above = ?alert.trigger_above,
        below = ?alert.trigger_below,
        "🎯 price alert armed"
    );

    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "alert": alert }))))
}

/// DELETE /api/alerts/:id
pub async fn delete_alert(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<impl IntoResponse, AppError> {
    delete_by_id(&state.repos.price_alerts, &id, params.undo).await
}

/// POST /api/alerts/:id/rearm: the only way a consumed alert fires again.
pub async fn rearm_alert(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let alert = state
        .repos
        .price_alerts
        .query_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("price_alert {id}")))?;

    if !alert.has_trigger() {
        return Err(AppError::BadRequest(format!(
            "alert {id} has no trigger set and cannot be re-armed"
        )));
    }

    let alert = state.repos.price_alerts.insert(alert.rearmed()).await.into_result()?;
    info!(id = %alert.id, symbol = %alert.symbol, "price alert re-armed");

    Ok(Json(json!({ "ok": true, "alert": alert })))
}
