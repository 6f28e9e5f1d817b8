//! # notify
//!
//! The boundary to whatever actually shows notifications to the user.
//!
//! Every `show` must be preceded by a [`Notifier::can_post_notification`]
//! check; a missing permission is logged and swallowed by the caller, never
//! escalated.  Two implementations ship:
//! - [`LogNotifier`]: writes to the tracing log and keeps the set of
//!   currently shown notifications (replace-by-id semantics)
//! - [`WebhookNotifier`]: POSTs a JSON envelope to an HTTP endpoint

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::error::NotifyError;

pub mod id_map;

pub use id_map::{AlertType, NotificationIdMap, NotifyId};

// ─── Channels & Payloads ──────────────────────────────────────────────────────

/// Notification channel a message is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const BIG_MOVER_CHANNEL: ChannelInfo = ChannelInfo {
    id: "big_movers",
    name: "Big Movers",
    description: "Tracked symbols moving sharply in the current session",
};

pub const PRICE_ALERT_CHANNEL: ChannelInfo = ChannelInfo {
    id: "price_alerts",
    name: "Price Alerts",
    description: "Price thresholds you asked to be told about",
};

impl ChannelInfo {
    pub fn for_alert(alert_type: AlertType) -> Self {
        match alert_type {
            AlertType::BigMover => BIG_MOVER_CHANNEL,
            AlertType::PriceAlert => PRICE_ALERT_CHANNEL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationPayload {
    pub symbol: String,
    pub title: String,
    pub body: String,
}

/// Returned by a successful `show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NotificationHandle {
    pub id: NotifyId,
}

// ─── Notifier ─────────────────────────────────────────────────────────────────

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Permission guard; check before every `show`.
    fn can_post_notification(&self) -> bool;

    /// Show `payload` in slot `id`, replacing whatever that slot held.
    async fn show(
        &self,
        id: NotifyId,
        channel: &ChannelInfo,
        payload: &NotificationPayload,
    ) -> Result<NotificationHandle, NotifyError>;

    async fn cancel(&self, id: NotifyId);

    async fn cancel_all(&self);
}

// ─── LogNotifier ──────────────────────────────────────────────────────────────

pub struct LogNotifier {
    enabled: bool,
    shown: Mutex<BTreeMap<NotifyId, NotificationPayload>>,
}

impl LogNotifier {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, shown: Mutex::new(BTreeMap::new()) }
    }

    fn shown(&self) -> MutexGuard<'_, BTreeMap<NotifyId, NotificationPayload>> {
        self.shown.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Notifications currently on screen, by slot id.
    pub fn active(&self) -> Vec<(NotifyId, NotificationPayload)> {
        self.shown().iter().map(|(id, p)| (*id, p.clone())).collect()
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn can_post_notification(&self) -> bool {
        self.enabled
    }

    async fn show(
        &self,
        id: NotifyId,
        channel: &ChannelInfo,
        payload: &NotificationPayload,
    ) -> Result<NotificationHandle, NotifyError> {
        if !self.enabled {
            return Err(NotifyError::PermissionDenied);
        }
        let replaced = self.shown().insert(id, payload.clone()).is_some();
        info!(
            %id,
            channel = channel.id,
            symbol  = %payload.symbol,
            replaced,
            "🔔 {}: {}", payload.title, payload.body
        );
        Ok(NotificationHandle { id })
    }

    async fn cancel(&self, id: NotifyId) {
        if self.shown().remove(&id).is_some() {
            info!(%id, "notification cancelled");
        }
    }

    async fn cancel_all(&self) {
        let mut shown = self.shown();
        let n = shown.len();
        shown.clear();
        info!(count = n, "all notifications cancelled");
    }
}

// ─── WebhookNotifier ──────────────────────────────────────────────────────────

/// POSTs `{"action": "show" | "cancel" | "cancel_all", ...}` to `url`.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    enabled: bool,
}

impl WebhookNotifier {
    pub fn new(client: reqwest::Client, url: String, enabled: bool) -> Self {
        Self { client, url, enabled }
    }

    async fn post(&self, body: serde_json::Value) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, url = %self.url, "notification webhook unreachable");
                NotifyError::Delivery(format!("webhook unreachable: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(http_status = %status, body = %text, "notification webhook rejected");
            return Err(NotifyError::Delivery(format!("webhook HTTP {status}: {text}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn can_post_notification(&self) -> bool {
        self.enabled
    }

    async fn show(
        &self,
        id: NotifyId,
        channel: &ChannelInfo,
        payload: &NotificationPayload,
    ) -> Result<NotificationHandle, NotifyError> {
        if !self.enabled {
            return Err(NotifyError::PermissionDenied);
        }
        self.post(json!({
            "action":  "show",
            "id":      id,
            "channel": channel,
            "payload": payload,
        }))
        .await?;
        Ok(NotificationHandle { id })
    }

    async fn cancel(&self, id: NotifyId) {
        if let Err(e) = self.post(json!({ "action": "cancel", "id": id })).await {
            warn!(%id, error = %e, "cancel not delivered");
        }
    }

    async fn cancel_all(&self) {
        if let Err(e) = self.post(json!({ "action": "cancel_all" })).await {
            warn!(error = %e, "cancel_all not delivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_payload(symbol: &str, body: &str) -> NotificationPayload {
        NotificationPayload {
            symbol: symbol.into(),
            title: format!("{symbol} alert"),
            body: body.into(),
        }
    }

    #[tokio::test]
    async fn test_show_same_id_replaces() {
        let notifier = LogNotifier::new(true);
        let id = NotifyId(42);
        notifier.show(id, &BIG_MOVER_CHANNEL, &make_payload("AAPL", "up 11%")).await.unwrap();
        notifier.show(id, &BIG_MOVER_CHANNEL, &make_payload("AAPL", "up 14%")).await.unwrap();

        let active = notifier.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].1.body, "up 14%");
    }

    #[tokio::test]
    async fn test_disabled_notifier_refuses() {
        let notifier = LogNotifier::new(false);
        assert!(!notifier.can_post_notification());
        let result = notifier
            .show(NotifyId(1), &PRICE_ALERT_CHANNEL, &make_payload("AAPL", "x"))
            .await;
        assert!(matches!(result, Err(NotifyError::PermissionDenied)));
        assert!(notifier.active().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_and_cancel_all() {
        let notifier = LogNotifier::new(true);
        for i in 0..3 {
            notifier.show(NotifyId(i), &PRICE_ALERT_CHANNEL, &make_payload("AAPL", "x")).await.unwrap();
        }
        notifier.cancel(NotifyId(1)).await;
        assert_eq!(notifier.active().len(), 2);
        notifier.cancel_all().await;
        assert!(notifier.active().is_empty());
    }
}
