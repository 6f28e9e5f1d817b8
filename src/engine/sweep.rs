//! # engine::sweep
//!
//! One pass of each alert engine:
//!
//! ```text
//! universe → quotes → candidate filter → deduper (per candidate) → report
//! ```
//!
//! Failures are isolated per candidate.  The whole sweep only stops early on
//! cancellation, on a quote source failure, or when the store reports it is
//! unavailable.  The result is always a [`SweepOutcome`], never a panic or a
//! bare error.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::engine::dedup::{DedupError, DedupOutcome};
use crate::engine::evaluation::{big_mover_candidates, price_alert_candidates};
use crate::error::{QuoteError, StoreError};
use crate::events::MonitorEvent;
use crate::models::Quote;
use crate::scheduler::CancelSignal;
use crate::state::AppContext;

// ─── Types ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SweepKind {
    BigMovers,
    PriceAlerts,
}

impl fmt::Display for SweepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepKind::BigMovers => write!(f, "big-movers"),
            SweepKind::PriceAlerts => write!(f, "price-alerts"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    pub kind: SweepKind,
    /// Well-formed quotes looked at.
    pub evaluated: usize,
    pub candidates: usize,
    /// State written and the notification shown.
    pub notified: usize,
    /// State written, notification blocked or not delivered.
    pub undelivered: usize,
    pub suppressed: usize,
    /// Malformed quotes plus candidates whose state could not be written.
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SweepReport {
    fn start(kind: SweepKind) -> Self {
        let now = Utc::now();
        Self {
            kind,
            evaluated: 0,
            candidates: 0,
            notified: 0,
            undelivered: 0,
            suppressed: 0,
            failed: 0,
            started_at: now,
            finished_at: now,
        }
    }

    fn tally(&mut self, outcome: &DedupOutcome) {
        match outcome {
            DedupOutcome::Notified { .. } => self.notified += 1,
            DedupOutcome::Blocked { .. } | DedupOutcome::Undelivered { .. } => self.undelivered += 1,
            DedupOutcome::Suppressed => self.suppressed += 1,
        }
    }

    fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }
}

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("quotes: {0}")]
    Quotes(#[from] QuoteError),
}

/// How a sweep ended.  Cancellation is a normal outcome, not an error.
#[derive(Debug)]
pub enum SweepOutcome {
    Success(SweepReport),
    Cancelled,
    Failed(SweepError),
}

// ─── Dispatch ─────────────────────────────────────────────────────────────────

/// Run one sweep of `kind`, log how it ended and tell monitor clients.
pub async fn run_sweep(
    ctx: &AppContext,
    kind: SweepKind,
    cancel: &CancelSignal,
    force_refresh: bool,
) -> SweepOutcome {
    info!(%kind, force_refresh, "🔍 sweep started");

    let outcome = match kind {
        SweepKind::BigMovers => run_big_mover_sweep(ctx, cancel, force_refresh).await,
        SweepKind::PriceAlerts => run_price_alert_sweep(ctx, cancel, force_refresh).await,
    };

    match &outcome {
        SweepOutcome::Success(report) => {
            info!(
                %kind,
                evaluated   = report.evaluated,
                candidates  = report.candidates,
                notified    = report.notified,
                undelivered = report.undelivered,
                suppressed  = report.suppressed,
                failed      = report.failed,
                "✅ sweep finished"
            );
            ctx.broadcast(&MonitorEvent::SweepFinished { report: Box::new(report.clone()) });
        }
        SweepOutcome::Cancelled => {
            info!(%kind, "sweep cancelled");
            ctx.broadcast(&MonitorEvent::SweepCancelled { kind });
        }
        SweepOutcome::Failed(err) => {
            error!(%kind, error = %err, "❌ sweep failed");
            ctx.broadcast(&MonitorEvent::SweepFailed { kind, error: err.to_string() });
        }
    }

    outcome
}

// ─── Big Movers ───────────────────────────────────────────────────────────────

pub async fn run_big_mover_sweep(
    ctx: &AppContext,
    cancel: &CancelSignal,
    force_refresh: bool,
) -> SweepOutcome {
    let mut report = SweepReport::start(SweepKind::BigMovers);

    let symbols = match ctx.repos.tracked_symbols().await {
        Ok(symbols) => symbols,
        Err(e) => return SweepOutcome::Failed(e.into()),
    };
    if symbols.is_empty() {
        return SweepOutcome::Success(report.finish());
    }

    let quotes = match fetch_quotes(ctx, cancel, force_refresh, &symbols).await {
        Ok(Some(quotes)) => quotes,
        Ok(None) => return SweepOutcome::Cancelled,
        Err(e) => return SweepOutcome::Failed(e),
    };
    let quotes = well_formed(quotes, &mut report);

    let candidates = big_mover_candidates(&quotes);
    report.candidates = candidates.len();

    for quote in candidates {
        if cancel.is_cancelled() {
            return SweepOutcome::Cancelled;
        }

        match ctx.deduper.process_big_mover(quote, Utc::now()).await {
            Ok(outcome) => {
                report.tally(&outcome);
                if outcome.is_written() {
                    ctx.broadcast(&MonitorEvent::BigMoverNotified {
                        symbol: quote.symbol.clone(),
                        state: quote.current_session.state,
                        price: quote.current_session.price,
                        percent: quote.current_session.percent,
                        outcome,
                    });
                }
            }
            Err(DedupError::Persistence(StoreError::Unavailable(msg))) => {
                return SweepOutcome::Failed(StoreError::Unavailable(msg).into());
            }
            Err(e) => {
                report.failed += 1;
                error!(symbol = %quote.symbol, error = %e, "big mover skipped");
            }
        }
    }

    SweepOutcome::Success(report.finish())
}

// ─── Price Alerts ─────────────────────────────────────────────────────────────

pub async fn run_price_alert_sweep(
    ctx: &AppContext,
    cancel: &CancelSignal,
    force_refresh: bool,
) -> SweepOutcome {
    let mut report = SweepReport::start(SweepKind::PriceAlerts);

    let alerts = match ctx.repos.price_alerts.query_active().await {
        Ok(alerts) => alerts,
        Err(e) => return SweepOutcome::Failed(e.into()),
    };
    if alerts.is_empty() {
        return SweepOutcome::Success(report.finish());
    }

    let mut symbols: Vec<String> = alerts.iter().map(|a| a.symbol.clone()).collect();
    symbols.sort();
    symbols.dedup();

    let quotes = match fetch_quotes(ctx, cancel, force_refresh, &symbols).await {
        Ok(Some(quotes)) => quotes,
        Ok(None) => return SweepOutcome::Cancelled,
        Err(e) => return SweepOutcome::Failed(e),
    };
    let quotes = well_formed(quotes, &mut report);

    let candidates = price_alert_candidates(&alerts, &quotes);
    report.candidates = candidates.len();

    for (alert, quote) in candidates {
        if cancel.is_cancelled() {
            return SweepOutcome::Cancelled;
        }

        match ctx.deduper.process_price_alert(alert, quote, Utc::now()).await {
            Ok(outcome) => {
                report.tally(&outcome);
                if outcome.is_written() {
                    ctx.broadcast(&MonitorEvent::PriceAlertTriggered {
                        alert_id: alert.id.clone(),
                        symbol: alert.symbol.clone(),
                        price: quote.current_session.price,
                        outcome,
                    });
                }
            }
            Err(DedupError::Persistence(StoreError::Unavailable(msg))) => {
                return SweepOutcome::Failed(StoreError::Unavailable(msg).into());
            }
            Err(e) => {
                report.failed += 1;
                error!(id = %alert.id, symbol = %alert.symbol, error = %e, "price alert skipped");
            }
        }
    }

    SweepOutcome::Success(report.finish())
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// `Ok(None)` when cancelled while waiting on the quote source.
async fn fetch_quotes(
    ctx: &AppContext,
    cancel: &CancelSignal,
    force_refresh: bool,
    symbols: &[String],
) -> Result<Option<Vec<Quote>>, SweepError> {
    if cancel.is_cancelled() {
        return Ok(None);
    }
    tokio::select! {
        _ = cancel.cancelled() => Ok(None),
        quotes = ctx.quotes.get_quotes(force_refresh, symbols) => Ok(Some(quotes?)),
    }
}

fn well_formed(quotes: Vec<Quote>, report: &mut SweepReport) -> Vec<Quote> {
    let (good, bad): (Vec<Quote>, Vec<Quote>) = quotes.into_iter().partition(Quote::is_well_formed);
    for quote in &bad {
        warn!(symbol = %quote.symbol, "malformed quote skipped");
    }
    report.failed += bad.len();
    report.evaluated = good.len();
    good
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::cache::Repositories;
    use crate::config::AppConfig;
    use crate::models::{EquityType, HoldingRecord, PriceAlertRecord, SessionState, SymbolRecord, TradeSide};
    use crate::notify::LogNotifier;
    use crate::quotes::StaticQuoteSource;
    use crate::scheduler::cancel_pair;

    fn make_quote(symbol: &str, price: f64, percent: f64) -> Quote {
        Quote::new(symbol, EquityType::Stock, SessionState::Regular, price, percent)
    }

    fn make_ctx(quotes: Vec<Quote>) -> (AppContext, Arc<LogNotifier>) {
        let notifier = Arc::new(LogNotifier::new(true));
        let ctx = AppContext::new(
            AppConfig::default(),
            Repositories::in_memory(32),
            notifier.clone(),
            Arc::new(StaticQuoteSource::new(quotes)),
        );
        (ctx, notifier)
    }

    fn expect_report(outcome: SweepOutcome) -> SweepReport {
        match outcome {
            SweepOutcome::Success(report) => report,
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_big_mover_sweep_then_cooldown() {
        let (ctx, notifier) = make_ctx(vec![
            make_quote("NVDA", 130.0, 12.0),
            make_quote("AAPL", 190.0, 1.0),
            make_quote("TSLA", f64::NAN, 40.0),
        ]);
        ctx.repos.symbols.insert(SymbolRecord::new("NVDA")).await;
        ctx.repos.symbols.insert(SymbolRecord::new("TSLA")).await;
        ctx.repos
            .holdings
            .insert(HoldingRecord::new("AAPL", EquityType::Stock, TradeSide::Buy))
            .await;

        let mut monitor = ctx.broadcast_tx.subscribe();

        let first = expect_report(run_sweep(&ctx, SweepKind::BigMovers, &CancelSignal::never(), false).await);
        assert_eq!(first.evaluated, 2);
        assert_eq!(first.candidates, 1);
        assert_eq!(first.notified, 1);
        assert_eq!(first.failed, 1);
        assert_eq!(notifier.active().len(), 1);

        let frame = monitor.try_recv().unwrap();
        assert!(frame.contains("BIG_MOVER_NOTIFIED"));

        // Same session, seconds later: inside the cool-down.
        let second = expect_report(run_big_mover_sweep(&ctx, &CancelSignal::never(), false).await);
        assert_eq!(second.candidates, 1);
        assert_eq!(second.notified, 0);
        assert_eq!(second.suppressed, 1);
    }

    #[tokio::test]
    async fn test_price_alert_sweep_consumes_alerts() {
        let (ctx, _notifier) = make_ctx(vec![make_quote("AAPL", 101.0, 1.0), make_quote("MSFT", 300.0, 0.0)]);
        let hit = PriceAlertRecord::new("AAPL", Some(100.0), None);
        let miss = PriceAlertRecord::new("MSFT", Some(500.0), Some(200.0));
        ctx.repos.price_alerts.insert(hit.clone()).await;
        ctx.repos.price_alerts.insert(miss.clone()).await;

        let report = expect_report(run_price_alert_sweep(&ctx, &CancelSignal::never(), false).await);
        assert_eq!(report.candidates, 1);
        assert_eq!(report.notified, 1);

        let active = ctx.repos.price_alerts.query_active().await.unwrap();
        assert_eq!(active, vec![miss]);

        let again = expect_report(run_price_alert_sweep(&ctx, &CancelSignal::never(), false).await);
        assert_eq!(again.candidates, 0);
    }

    #[tokio::test]
    async fn test_cancelled_sweep_is_not_a_failure() {
        let (ctx, notifier) = make_ctx(vec![make_quote("NVDA", 130.0, 12.0)]);
        ctx.repos.symbols.insert(SymbolRecord::new("NVDA")).await;

        let (handle, signal) = cancel_pair();
        handle.cancel();

        let outcome = run_sweep(&ctx, SweepKind::BigMovers, &signal, false).await;
        assert!(matches!(outcome, SweepOutcome::Cancelled));
        assert!(notifier.active().is_empty());
        assert!(ctx.repos.big_movers.query().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_universe_succeeds() {
        let (ctx, _) = make_ctx(vec![]);
        let report = expect_report(run_big_mover_sweep(&ctx, &CancelSignal::never(), false).await);
        assert_eq!(report.evaluated, 0);
        assert_eq!(report.candidates, 0);
    }
}
