//! # events
//!
//! Defines [`MonitorEvent`], every event the service broadcasts to
//! `/ws/monitor` clients.
//!
//! Events travel over a `broadcast::Sender<String>` as pre-serialised JSON,
//! so one frame is built per event no matter how many clients listen.

use serde::Serialize;

use crate::engine::dedup::DedupOutcome;
use crate::engine::sweep::{SweepKind, SweepReport};
use crate::models::SessionState;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitorEvent {
    /// A repository wrote or deleted a record.
    RecordChanged {
        kind: &'static str,
        change: &'static str,
        id: String,
        record: serde_json::Value,
    },

    /// A big mover got past the deduper.
    BigMoverNotified {
        symbol: String,
        state: SessionState,
        price: f64,
        percent: f64,
        outcome: DedupOutcome,
    },

    /// A price alert fired and was consumed.
    PriceAlertTriggered {
        alert_id: String,
        symbol: String,
        price: f64,
        outcome: DedupOutcome,
    },

    SweepFinished {
        report: Box<SweepReport>,
    },

    SweepCancelled {
        kind: SweepKind,
    },

    SweepFailed {
        kind: SweepKind,
        error: String,
    },
}

impl MonitorEvent {
    #[inline]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"event":"SERIALIZATION_ERROR"}"#.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tag_and_fields() {
        let json = MonitorEvent::SweepCancelled { kind: SweepKind::PriceAlerts }.to_json();
        assert_eq!(json, r#"{"event":"SWEEP_CANCELLED","kind":"PRICE_ALERTS"}"#);

        let value: serde_json::Value = serde_json::from_str(
            &MonitorEvent::RecordChanged {
                kind: "symbol",
                change: "INSERT",
                id: "abc".into(),
                record: serde_json::json!({ "symbol": "AAPL" }),
            }
            .to_json(),
        )
        .unwrap();
        assert_eq!(value["event"], "RECORD_CHANGED");
        assert_eq!(value["record"]["symbol"], "AAPL");
    }
}
