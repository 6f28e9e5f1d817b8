//! # routes::records
//!
//! Watchlist and portfolio CRUD, plus the big-mover report list.
//!
//! | Method | Path                         | Description                       |
//! |--------|------------------------------|-----------------------------------|
//! | GET    | `/api/symbols`               | Watchlist                         |
//! | POST   | `/api/symbols`               | Add a symbol                      |
//! | DELETE | `/api/symbols/:id`           | Remove a symbol                   |
//! | GET    | `/api/holdings`              | Holdings                          |
//! | POST   | `/api/holdings`              | Add a holding                     |
//! | DELETE | `/api/holdings/:id`          | Remove a holding and its lots     |
//! | GET    | `/api/holdings/:id/summary`  | Split-adjusted positions          |
//! | POST   | `/api/positions`             | Add a purchase lot                |
//! | DELETE | `/api/positions/:id`         | Remove a lot                      |
//! | POST   | `/api/splits`                | Record a split                    |
//! | DELETE | `/api/splits/:id`            | Remove a split                    |
//! | GET    | `/api/movers`                | Big-mover reports, newest first   |

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::engine::portfolio::summarize;
use crate::error::{AppError, StoreError};
use crate::models::{
    new_id, EquityType, HoldingRecord, PositionRecord, SplitRecord, SymbolRecord, TradeSide,
};
use crate::routes::{delete_by_id, require_symbol, DeleteParams};
use crate::state::SharedState;

// ─── Request Bodies ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct NewSymbol {
    pub symbol: String,
}

#[derive(Deserialize)]
pub struct NewHolding {
    pub symbol: String,
    pub equity_type: EquityType,
    #[serde(default = "default_side")]
    pub trade_side: TradeSide,
}

fn default_side() -> TradeSide {
    TradeSide::Buy
}

#[derive(Deserialize)]
pub struct NewPosition {
    pub holding_id: String,
    pub share_count: f64,
    pub price: f64,
    /// Defaults to now.
    pub purchase_date: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct NewSplit {
    pub holding_id: String,
    pub pre_split_share_count: f64,
    pub post_split_share_count: f64,
    pub split_date: DateTime<Utc>,
}

// ─── Watchlist ────────────────────────────────────────────────────────────────

/// GET /api/symbols
pub async fn list_symbols(State(state): State<SharedState>) -> Result<impl IntoResponse, AppError> {
    let mut symbols = state.repos.symbols.query().await?;
    symbols.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    Ok(Json(json!({ "ok": true, "count": symbols.len(), "symbols": symbols })))
}

/// POST /api/symbols
pub async fn add_symbol(
    State(state): State<SharedState>,
    Json(body): Json<NewSymbol>,
) -> Result<impl IntoResponse, AppError> {
    let symbol = require_symbol(&body.symbol)?;

    if state.repos.symbols.query_by_symbol(&symbol).await?.is_some() {
        return Err(StoreError::Constraint(format!("{symbol} is already on the watchlist")).into());
    }

    let record = state.repos.symbols.insert(SymbolRecord::new(&symbol)).await.into_result()?;
    info!(symbol = %record.symbol, "👀 watching");

    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "symbol": record }))))
}

/// DELETE /api/symbols/:id
pub async fn delete_symbol(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<impl IntoResponse, AppError> {
    delete_by_id(&state.repos.symbols, &id, params.undo).await
}

// ─── Holdings ─────────────────────────────────────────────────────────────────

/// GET /api/holdings
pub async fn list_holdings(State(state): State<SharedState>) -> Result<impl IntoResponse, AppError> {
    let mut holdings = state.repos.holdings.query().await?;
    holdings.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    Ok(Json(json!({ "ok": true, "count": holdings.len(), "holdings": holdings })))
}

/// POST /api/holdings
pub async fn add_holding(
    State(state): State<SharedState>,
    Json(body): Json<NewHolding>,
) -> Result<impl IntoResponse, AppError> {
    let symbol = require_symbol(&body.symbol)?;
    let record = state
        .repos
        .holdings
        .insert(HoldingRecord::new(&symbol, body.equity_type, body.trade_side))
        .await
        .into_result()?;

    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "holding": record }))))
}

/// DELETE /api/holdings/:id: lots and splits go first, so a failure part
/// way leaves the holding in place.  `?undo=true` echoes all three.
pub async fn delete_holding(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<impl IntoResponse, AppError> {
    let holding = state
        .repos
        .holdings
        .query_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("holding {id}")))?;

    let positions = state.repos.positions.query_by_holding(&id).await?;
    for position in &positions {
        state.repos.positions.delete(position.clone(), params.undo).await?;
    }
    let splits = state.repos.splits.query_by_holding(&id).await?;
    for split in &splits {
        state.repos.splits.delete(split.clone(), params.undo).await?;
    }

    if !state.repos.holdings.delete(holding.clone(), params.undo).await? {
        return Err(AppError::NotFound(format!("holding {id}")));
    }
    info!(%id, symbol = %holding.symbol, positions = positions.len(), splits = splits.len(), "holding removed");

    let undo = params.undo.then(|| {
        json!({ "holding": holding, "positions": positions, "splits": splits })
    });
    Ok(Json(json!({ "ok": true, "deleted": id, "undo": undo })))
}

/// GET /api/holdings/:id/summary
pub async fn holding_summary(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let holding = state
        .repos
        .holdings
        .query_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("holding {id}")))?;

    let positions = state.repos.positions.query_by_holding(&id).await?;
    let splits = state.repos.splits.query_by_holding(&id).await?;

    Ok(Json(json!({ "ok": true, "summary": summarize(&holding, &positions, &splits) })))
}

// ─── Positions & Splits ───────────────────────────────────────────────────────

async fn require_holding(state: &SharedState, holding_id: &str) -> Result<(), AppError> {
    match state.repos.holdings.query_by_id(holding_id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound(format!("holding {holding_id}"))),
    }
}

/// POST /api/positions
pub async fn add_position(
    State(state): State<SharedState>,
    Json(body): Json<NewPosition>,
) -> Result<impl IntoResponse, AppError> {
    if !(body.share_count.is_finite() && body.share_count > 0.0) {
        return Err(AppError::BadRequest("share_count must be positive".into()));
    }
    if !(body.price.is_finite() && body.price >= 0.0) {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }
    require_holding(&state, &body.holding_id).await?;

    let record = state
        .repos
        .positions
        .insert(PositionRecord {
            id: new_id(),
            holding_id: body.holding_id,
            share_count: body.share_count,
            price: body.price,
            purchase_date: body.purchase_date.unwrap_or_else(Utc::now),
        })
        .await
        .into_result()?;

    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "position": record }))))
}

/// DELETE /api/positions/:id
pub async fn delete_position(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<impl IntoResponse, AppError> {
    delete_by_id(&state.repos.positions, &id, params.undo).await
}

/// POST /api/splits
pub async fn add_split(
    State(state): State<SharedState>,
    Json(body): Json<NewSplit>,
) -> Result<impl IntoResponse, AppError> {
    let valid = |n: f64| n.is_finite() && n > 0.0;
    if !valid(body.pre_split_share_count) || !valid(body.post_split_share_count) {
        return Err(AppError::BadRequest("split share counts must be positive".into()));
    }
    require_holding(&state, &body.holding_id).await?;

    let record = state
        .repos
        .splits
        .insert(SplitRecord {
            id: new_id(),
            holding_id: body.holding_id,
            pre_split_share_count: body.pre_split_share_count,
            post_split_share_count: body.post_split_share_count,
            split_date: body.split_date,
        })
        .await
        .into_result()?;

    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "split": record }))))
}

/// DELETE /api/splits/:id
pub async fn delete_split(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<impl IntoResponse, AppError> {
    delete_by_id(&state.repos.splits, &id, params.undo).await
}

// ─── Movers ───────────────────────────────────────────────────────────────────

/// GET /api/movers
pub async fn list_movers(State(state): State<SharedState>) -> Result<impl IntoResponse, AppError> {
    let mut reports = state.repos.big_movers.query().await?;
    reports.sort_by(|a, b| b.last_notified.cmp(&a.last_notified));
    Ok(Json(json!({ "ok": true, "count": reports.len(), "movers": reports })))
}
