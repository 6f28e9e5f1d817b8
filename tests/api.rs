use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use moverwatch::cache::{CachedRepository, Repositories};
use moverwatch::config::AppConfig;
use moverwatch::models::{EquityType, Quote, SessionState, SplitRecord};
use moverwatch::notify::LogNotifier;
use moverwatch::quotes::StaticQuoteSource;
use moverwatch::routes::router;
use moverwatch::state::{AppContext, SharedState};
use moverwatch::store::{MemoryBackend, PersistenceBackend};

fn test_state(api_key: &str, quotes: Vec<Quote>) -> SharedState {
    state_with_repos(api_key, quotes, Repositories::in_memory(32))
}

fn state_with_repos(api_key: &str, quotes: Vec<Quote>, repos: Repositories) -> SharedState {
    let config = AppConfig { api_key: api_key.to_string(), ..AppConfig::default() };
    Arc::new(AppContext::new(
        config,
        repos,
        Arc::new(LogNotifier::new(true)),
        Arc::new(StaticQuoteSource::new(quotes)),
    ))
}

/// A holding with one lot and one split; returns the holding id.
async fn seed_holding(app: &Router) -> String {
    let (_, body) = send(
        app,
        "POST",
        "/api/holdings",
        Some(json!({ "symbol": "NVDA", "equity_type": "STOCK" })),
    )
    .await;
    let holding_id = body["holding"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        app,
        "POST",
        "/api/positions",
        Some(json!({ "holding_id": holding_id, "share_count": 10.0, "price": 500.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        app,
        "POST",
        "/api/splits",
        Some(json!({
            "holding_id": holding_id,
            "pre_split_share_count": 1.0,
            "post_split_share_count": 4.0,
            "split_date": "2099-01-01T00:00:00Z",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    holding_id
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_is_open_but_api_needs_key() {
    let app = router(test_state("secret", vec![]));

    let (status, body) = send(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (status, body) = send(&app, "GET", "/api/symbols", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["ok"], false);

    let req = Request::builder()
        .uri("/api/symbols")
        .header("X-API-Key", "secret")
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn watchlist_add_duplicate_and_delete() {
    let app = router(test_state("", vec![]));

    let (status, body) = send(&app, "POST", "/api/symbols", Some(json!({ "symbol": " nvda " }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["symbol"]["symbol"], "NVDA");
    let id = body["symbol"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(&app, "POST", "/api/symbols", Some(json!({ "symbol": "NVDA" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, "DELETE", &format!("/api/symbols/{id}?undo=true"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["undo"]["symbol"], "NVDA");

    let (status, _) = send(&app, "DELETE", &format!("/api/symbols/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, "GET", "/api/symbols", None).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn price_alert_fires_once_and_can_be_rearmed() {
    let quotes = vec![Quote::new("AAPL", EquityType::Stock, SessionState::Regular, 101.0, 1.0)];
    let app = router(test_state("", quotes));

    let (status, _) = send(&app, "POST", "/api/alerts", Some(json!({ "symbol": "AAPL" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        "/api/alerts",
        Some(json!({ "symbol": "AAPL", "trigger_above": 100.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["alert"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "POST", "/api/sweeps/price-alerts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "SUCCESS");
    assert_eq!(body["report"]["notified"], 1);

    let (_, body) = send(&app, "GET", "/api/alerts/active", None).await;
    assert_eq!(body["count"], 0);

    let (_, body) = send(&app, "POST", "/api/sweeps/price-alerts", None).await;
    assert_eq!(body["report"]["candidates"], 0);

    let (status, body) = send(&app, "POST", &format!("/api/alerts/{id}/rearm"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["alert"]["enabled"], true);

    let (_, body) = send(&app, "GET", "/api/alerts/active", None).await;
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn big_mover_sweep_records_report() {
    let quotes = vec![Quote::new("BTC-USD", EquityType::Crypto, SessionState::Regular, 40_000.0, -25.0)];
    let app = router(test_state("", quotes));

    send(
        &app,
        "POST",
        "/api/holdings",
        Some(json!({ "symbol": "btc-usd", "equity_type": "CRYPTO" })),
    )
    .await;

    let (_, body) = send(&app, "POST", "/api/sweeps/big-movers", None).await;
    assert_eq!(body["report"]["candidates"], 1);
    assert_eq!(body["report"]["notified"], 1);

    let (_, body) = send(&app, "POST", "/api/sweeps/big-movers?force=true", None).await;
    assert_eq!(body["report"]["suppressed"], 1);

    let (_, body) = send(&app, "GET", "/api/movers", None).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["movers"][0]["symbol"], "BTC-USD");
    assert_eq!(body["movers"][0]["last_state"], "REGULAR");
}

#[tokio::test]
async fn holding_summary_is_split_adjusted() {
    let app = router(test_state("", vec![]));

    let (_, body) = send(
        &app,
        "POST",
        "/api/holdings",
        Some(json!({ "symbol": "NVDA", "equity_type": "STOCK", "trade_side": "BUY" })),
    )
    .await;
    let holding_id = body["holding"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "POST",
        "/api/positions",
        Some(json!({
            "holding_id": holding_id,
            "share_count": 10.0,
            "price": 500.0,
            "purchase_date": "2024-01-02T15:00:00Z",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &app,
        "POST",
        "/api/splits",
        Some(json!({
            "holding_id": holding_id,
            "pre_split_share_count": 1.0,
            "post_split_share_count": 10.0,
            "split_date": "2024-06-10T00:00:00Z",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "GET", &format!("/api/holdings/{holding_id}/summary"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["total_shares"], 100.0);
    assert_eq!(body["summary"]["cost_basis"], 5000.0);

    let (status, _) = send(
        &app,
        "POST",
        "/api/positions",
        Some(json!({ "holding_id": "missing", "share_count": 1.0, "price": 1.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn holding_delete_undo_carries_lots_and_splits() {
    let app = router(test_state("", vec![]));
    let holding_id = seed_holding(&app).await;

    let (status, body) = send(&app, "DELETE", &format!("/api/holdings/{holding_id}?undo=true"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["undo"]["holding"]["id"], holding_id.as_str());
    assert_eq!(body["undo"]["positions"].as_array().unwrap().len(), 1);
    assert_eq!(body["undo"]["positions"][0]["share_count"], 10.0);
    assert_eq!(body["undo"]["splits"].as_array().unwrap().len(), 1);

    let (_, body) = send(&app, "GET", "/api/holdings", None).await;
    assert_eq!(body["count"], 0);

    let (status, body) = send(&app, "DELETE", &format!("/api/holdings/{holding_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn holding_survives_a_failed_cascade() {
    let splits_backend = Arc::new(MemoryBackend::<SplitRecord>::new());
    let repos = Repositories {
        splits: Arc::new(CachedRepository::new(
            splits_backend.clone() as Arc<dyn PersistenceBackend<SplitRecord>>,
            32,
        )),
        ..Repositories::in_memory(32)
    };
    let app = router(state_with_repos("", vec![], repos));
    let holding_id = seed_holding(&app).await;

    splits_backend.set_fail_writes(true);
    let (status, _) = send(&app, "DELETE", &format!("/api/holdings/{holding_id}"), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = send(&app, "GET", &format!("/api/holdings/{holding_id}/summary"), None).await;
    assert_eq!(status, StatusCode::OK);

    splits_backend.set_fail_writes(false);
    let (status, _) = send(&app, "DELETE", &format!("/api/holdings/{holding_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, "GET", "/api/holdings", None).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn manual_sweep_stops_on_shutdown() {
    let quotes = vec![Quote::new("NVDA", EquityType::Stock, SessionState::Regular, 120.0, 15.0)];
    let state = test_state("", quotes);
    let app = router(state.clone());
    send(&app, "POST", "/api/symbols", Some(json!({ "symbol": "NVDA" }))).await;

    state.shutdown.cancel();
    let (status, body) = send(&app, "POST", "/api/sweeps/big-movers", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "CANCELLED");

    let (_, body) = send(&app, "GET", "/api/movers", None).await;
    assert_eq!(body["count"], 0);
}
