//! # engine::dedup — Notification Deduper
//!
//! Decides, for each candidate a sweep produced, whether the user actually
//! gets told about it.
//!
//! ## Big movers (recurring cool-down)
//! ```text
//! no report for symbol              → notify, create report
//! session state changed             → notify, re-snapshot   (resets cool-down)
//! same state, now - last >= 6h      → notify, re-snapshot
//! same state, inside the window     → suppress              (no write)
//! ```
//!
//! ## Price alerts (one-shot)
//! A triggered alert is written back disabled with `last_notified = now`, so
//! the `Active` lookup stops returning it until the user re-arms it.
//!
//! State is always persisted *before* the notifier is called.  A crash in
//! between loses at most one notification.
//!
//! Read → decide → write runs under a per-key lock (symbol for big movers,
//! alert id for price alerts), so a manual sweep overlapping a scheduled one
//! sees the other's write instead of racing it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::cache::{BigMoverReportRepository, PriceAlertRepository};
use crate::engine::evaluation::price_alert_triggered;
use crate::error::StoreError;
use crate::models::{BigMoverReportRecord, PriceAlertRecord, Quote, SessionState};
use crate::notify::{AlertType, ChannelInfo, NotificationIdMap, NotificationPayload, Notifier, NotifyId};

/// Default big-mover cool-down: 6 hours.
pub const DEFAULT_COOLDOWN_SECS: u64 = 6 * 60 * 60;

// ─── Decision ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotifyReason {
    FirstSighting,
    SessionChanged { from: SessionState, to: SessionState },
    CooldownElapsed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BigMoverDecision {
    /// Persist `record`, then notify.
    Notify {
        record: BigMoverReportRecord,
        reason: NotifyReason,
    },
    Suppress {
        last_notified: DateTime<Utc>,
        next_eligible: DateTime<Utc>,
    },
}

/// The big-mover policy, free of any I/O.
pub fn decide_big_mover(
    existing: Option<&BigMoverReportRecord>,
    quote: &Quote,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> BigMoverDecision {
    let Some(report) = existing else {
        return BigMoverDecision::Notify {
            record: BigMoverReportRecord::from_quote(quote, now),
            reason: NotifyReason::FirstSighting,
        };
    };

    let state = quote.current_session.state;
    if state != report.last_state {
        return BigMoverDecision::Notify {
            record: report.refreshed(quote, now),
            reason: NotifyReason::SessionChanged { from: report.last_state, to: state },
        };
    }

    if now.signed_duration_since(report.last_notified) >= cooldown {
        return BigMoverDecision::Notify {
            record: report.refreshed(quote, now),
            reason: NotifyReason::CooldownElapsed,
        };
    }

    BigMoverDecision::Suppress {
        last_notified: report.last_notified,
        next_eligible: report.last_notified + cooldown,
    }
}

// ─── Outcome ──────────────────────────────────────────────────────────────────

/// What happened to one candidate.  Everything except `Suppressed` means
/// state was written.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DedupOutcome {
    Notified { id: NotifyId },
    /// `can_post_notification` said no.
    Blocked { id: NotifyId },
    /// The notifier accepted the call but delivery failed.
    Undelivered { id: NotifyId, error: String },
    Suppressed,
}

impl DedupOutcome {
    /// State was persisted for this candidate.
    pub fn is_written(&self) -> bool {
        !matches!(self, DedupOutcome::Suppressed)
    }
}

#[derive(Debug, Error)]
pub enum DedupError {
    #[error("failed to persist notification state: {0}")]
    Persistence(#[from] StoreError),
}

// ─── Key Locks ────────────────────────────────────────────────────────────────

/// One async mutex per key, created on demand.  Entries nobody holds are
/// pruned whenever a new key is added.
#[derive(Default)]
struct KeyLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let cell = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            match map.get(key) {
                Some(cell) => Arc::clone(cell),
                None => {
                    map.retain(|_, cell| Arc::strong_count(cell) > 1);
                    let cell = Arc::new(AsyncMutex::new(()));
                    map.insert(key.to_string(), Arc::clone(&cell));
                    cell
                }
            }
        };
        cell.lock_owned().await
    }
}

// ─── Deduper ──────────────────────────────────────────────────────────────────

pub struct NotificationDeduper {
    big_movers: Arc<BigMoverReportRepository>,
    price_alerts: Arc<PriceAlertRepository>,
    notifier: Arc<dyn Notifier>,
    ids: Arc<NotificationIdMap>,
    cooldown: Duration,
    symbol_locks: KeyLocks,
    alert_locks: KeyLocks,
}

impl NotificationDeduper {
    pub fn new(
        big_movers: Arc<BigMoverReportRepository>,
        price_alerts: Arc<PriceAlertRepository>,
        notifier: Arc<dyn Notifier>,
        ids: Arc<NotificationIdMap>,
        cooldown: Duration,
    ) -> Self {
        Self {
            big_movers,
            price_alerts,
            notifier,
            ids,
            cooldown,
            symbol_locks: KeyLocks::default(),
            alert_locks: KeyLocks::default(),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub async fn process_big_mover(
        &self,
        quote: &Quote,
        now: DateTime<Utc>,
    ) -> Result<DedupOutcome, DedupError> {
        let guard = self.symbol_locks.lock(&quote.symbol).await;
        let existing = self.big_movers.query_by_symbol(&quote.symbol).await?;

        let (record, reason) = match decide_big_mover(existing.as_ref(), quote, now, self.cooldown) {
            BigMoverDecision::Suppress { last_notified, next_eligible } => {
                debug!(
                    symbol = %quote.symbol,
                    %last_notified,
                    %next_eligible,
                    "big mover suppressed (cool-down)"
                );
                return Ok(DedupOutcome::Suppressed);
            }
            BigMoverDecision::Notify { record, reason } => (record, reason),
        };

        let record = self.big_movers.insert(record).await.into_result()?;
        drop(guard);
        info!(symbol = %record.symbol, ?reason, percent = record.last_percent, "📈 big mover");

        let id = self.ids.get_id(AlertType::BigMover, &record.symbol);
        Ok(self.deliver(id, AlertType::BigMover, &big_mover_payload(quote)).await)
    }

    /// `alert` is the caller's snapshot; the stored version is re-read so an
    /// alert consumed or edited since the sweep started is not fired twice.
    pub async fn process_price_alert(
        &self,
        alert: &PriceAlertRecord,
        quote: &Quote,
        now: DateTime<Utc>,
    ) -> Result<DedupOutcome, DedupError> {
        let guard = self.alert_locks.lock(&alert.id).await;
        let current = self
            .price_alerts
            .query_by_id(&alert.id)
            .await?
            .filter(PriceAlertRecord::is_active);

        let Some(current) = current else {
            debug!(id = %alert.id, symbol = %alert.symbol, "price alert no longer active");
            return Ok(DedupOutcome::Suppressed);
        };

        let price = quote.current_session.price;
        if !price_alert_triggered(&current, price) {
            debug!(id = %current.id, price, "price alert thresholds changed, not triggered");
            return Ok(DedupOutcome::Suppressed);
        }

        let fired = self.price_alerts.insert(current.mark_alerted(now)).await.into_result()?;
        drop(guard);
        info!(id = %fired.id, symbol = %fired.symbol, price, "🎯 price alert triggered");

        let id = self.ids.get_id(AlertType::PriceAlert, &fired.symbol);
        Ok(self.deliver(id, AlertType::PriceAlert, &price_alert_payload(&fired, price)).await)
    }

    async fn deliver(
        &self,
        id: NotifyId,
        alert_type: AlertType,
        payload: &NotificationPayload,
    ) -> DedupOutcome {
        if !self.notifier.can_post_notification() {
            warn!(%id, symbol = %payload.symbol, "notification permission not granted, nothing shown");
            return DedupOutcome::Blocked { id };
        }

        match self.notifier.show(id, &ChannelInfo::for_alert(alert_type), payload).await {
            Ok(handle) => DedupOutcome::Notified { id: handle.id },
            Err(e) => {
                warn!(%id, symbol = %payload.symbol, error = %e, "notification not delivered");
                DedupOutcome::Undelivered { id, error: e.to_string() }
            }
        }
    }
}

// ─── Payloads ─────────────────────────────────────────────────────────────────

fn big_mover_payload(quote: &Quote) -> NotificationPayload {
    let session = &quote.current_session;
    let direction = if session.percent >= 0.0 { "up" } else { "down" };
    NotificationPayload {
        symbol: quote.symbol.clone(),
        title: format!("{} is {} {:.2}%", quote.symbol, direction, session.percent.abs()),
        body: format!("{:.2} in the {} session", session.price, session.state),
    }
}

fn price_alert_payload(alert: &PriceAlertRecord, price: f64) -> NotificationPayload {
    let crossed = match (alert.trigger_above, alert.trigger_below) {
        (Some(above), _) if price >= above => format!("at or above {above:.2}"),
        (_, Some(below)) => format!("at or below {below:.2}"),
        _ => "past your alert".to_string(),
    };
    NotificationPayload {
        symbol: alert.symbol.clone(),
        title: format!("{} price alert", alert.symbol),
        body: format!("{} is {crossed} (now {price:.2})", alert.symbol),
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
