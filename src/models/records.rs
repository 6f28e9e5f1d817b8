//! # models::records
//!
//! The six persisted entity types.
//!
//! Every record is an immutable value identified by an opaque string id, and
//! two records are equal when their ids are equal.  "Mutation" means building
//! a new value (see the `with_*` / `mark_*` helpers) and handing it to the
//! owning repository's `insert`, which decides create vs update.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::models::quote::{normalize_symbol, EquityType, Quote, SessionState};

pub type Id = String;

/// Fresh opaque id for a new record.
pub fn new_id() -> Id {
    Uuid::new_v4().to_string()
}

// ─── Lookup ───────────────────────────────────────────────────────────────────

/// Secondary keys a repository can serve from its keyed sub-caches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "key", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Lookup {
    Symbol(String),
    Holding(Id),
    /// Price alerts that are enabled and have at least one trigger set.
    Active,
}

// ─── Record ───────────────────────────────────────────────────────────────────

/// Common surface every persisted entity exposes to the storage layer.
pub trait Record:
    Clone + std::fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Stable collection name, used for table rows and log fields.
    const KIND: &'static str;

    fn id(&self) -> &str;

    /// Whether this record belongs in the result set of `lookup`.
    fn matches(&self, lookup: &Lookup) -> bool;
}

macro_rules! equal_by_id {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl PartialEq for $ty {
                fn eq(&self, other: &Self) -> bool {
                    self.id == other.id
                }
            }
            impl Eq for $ty {}
        )+
    };
}

equal_by_id!(
    SymbolRecord,
    HoldingRecord,
    PositionRecord,
    SplitRecord,
    PriceAlertRecord,
    BigMoverReportRecord,
);

// ─── SymbolRecord ─────────────────────────────────────────────────────────────

/// A watchlist entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub id: Id,
    pub symbol: String,
}

impl SymbolRecord {
    pub fn new(symbol: &str) -> Self {
        Self { id: new_id(), symbol: normalize_symbol(symbol) }
    }
}

impl Record for SymbolRecord {
    const KIND: &'static str = "symbol";

    fn id(&self) -> &str {
        &self.id
    }

    fn matches(&self, lookup: &Lookup) -> bool {
        matches!(lookup, Lookup::Symbol(s) if *s == self.symbol)
    }
}

// ─── HoldingRecord ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// A symbol the user holds (long or short); positions and splits hang off it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldingRecord {
    pub id: Id,
    pub symbol: String,
    pub equity_type: EquityType,
    pub trade_side: TradeSide,
}

impl HoldingRecord {
    pub fn new(symbol: &str, equity_type: EquityType, trade_side: TradeSide) -> Self {
        Self {
            id: new_id(),
            symbol: normalize_symbol(symbol),
            equity_type,
            trade_side,
        }
    }
}

impl Record for HoldingRecord {
    const KIND: &'static str = "holding";

    fn id(&self) -> &str {
        &self.id
    }

    fn matches(&self, lookup: &Lookup) -> bool {
        matches!(lookup, Lookup::Symbol(s) if *s == self.symbol)
    }
}

// ─── PositionRecord ───────────────────────────────────────────────────────────

/// One purchase lot of a holding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionRecord {
    pub id: Id,
    pub holding_id: Id,
    pub share_count: f64,
    /// Price paid per share.
    pub price: f64,
    pub purchase_date: DateTime<Utc>,
}

impl Record for PositionRecord {
    const KIND: &'static str = "position";

    fn id(&self) -> &str {
        &self.id
    }

    fn matches(&self, lookup: &Lookup) -> bool {
        matches!(lookup, Lookup::Holding(h) if *h == self.holding_id)
    }
}

// ─── SplitRecord ──────────────────────────────────────────────────────────────

/// A stock split applied to a holding, e.g. 1 → 4 shares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitRecord {
    pub id: Id,
    pub holding_id: Id,
    pub pre_split_share_count: f64,
    pub post_split_share_count: f64,
    pub split_date: DateTime<Utc>,
}

impl SplitRecord {
    /// Multiplier applied to share counts acquired before the split.
    pub fn ratio(&self) -> f64 {
        self.post_split_share_count / self.pre_split_share_count
    }
}

impl Record for SplitRecord {
    const KIND: &'static str = "split";

    fn id(&self) -> &str {
        &self.id
    }

    fn matches(&self, lookup: &Lookup) -> bool {
        matches!(lookup, Lookup::Holding(h) if *h == self.holding_id)
    }
}

// ─── PriceAlertRecord ─────────────────────────────────────────────────────────

/// A user-defined, single-shot watch for a symbol crossing a price.
///
/// Firing consumes the alert (`enabled = false`); only an explicit re-arm
/// makes it eligible again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceAlertRecord {
    pub id: Id,
    pub symbol: String,
    pub last_notified: Option<DateTime<Utc>>,
    pub trigger_above: Option<f64>,
    pub trigger_below: Option<f64>,
    pub enabled: bool,
}

impl PriceAlertRecord {
    pub fn new(symbol: &str, trigger_above: Option<f64>, trigger_below: Option<f64>) -> Self {
        Self {
            id: new_id(),
            symbol: normalize_symbol(symbol),
            last_notified: None,
            trigger_above,
            trigger_below,
            enabled: true,
        }
    }

    #[inline]
    pub fn has_trigger(&self) -> bool {
        self.trigger_above.is_some() || self.trigger_below.is_some()
    }

    /// Enabled and able to fire.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.enabled && self.has_trigger()
    }

    /// Consumed copy: disabled, stamped with the time it fired.
    pub fn mark_alerted(&self, now: DateTime<Utc>) -> Self {
        Self {
            enabled: false,
            last_notified: Some(now),
            ..self.clone()
        }
    }

    /// Re-enabled copy; thresholds and `last_notified` are kept.
    pub fn rearmed(&self) -> Self {
        Self { enabled: true, ..self.clone() }
    }
}

impl Record for PriceAlertRecord {
    const KIND: &'static str = "price_alert";

    fn id(&self) -> &str {
        &self.id
    }

    fn matches(&self, lookup: &Lookup) -> bool {
        match lookup {
            Lookup::Symbol(s) => *s == self.symbol,
            Lookup::Active => self.is_active(),
            Lookup::Holding(_) => false,
        }
    }
}

// ─── BigMoverReportRecord ─────────────────────────────────────────────────────

/// What we last told the user about a big mover.  At most one per symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BigMoverReportRecord {
    pub id: Id,
    pub symbol: String,
    pub last_notified: DateTime<Utc>,
    pub last_state: SessionState,
    pub last_price: f64,
    pub last_percent: f64,
}

impl BigMoverReportRecord {
    /// First report for a symbol.
    pub fn from_quote(quote: &Quote, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            symbol: quote.symbol.clone(),
            last_notified: now,
            last_state: quote.current_session.state,
            last_price: quote.current_session.price,
            last_percent: quote.current_session.percent,
        }
    }

    /// Same report (same id), re-snapshotted from a newer quote.
    pub fn refreshed(&self, quote: &Quote, now: DateTime<Utc>) -> Self {
        Self {
            last_notified: now,
            last_state: quote.current_session.state,
            last_price: quote.current_session.price,
            last_percent: quote.current_session.percent,
            ..self.clone()
        }
    }
}

impl Record for BigMoverReportRecord {
    const KIND: &'static str = "big_mover_report";

    fn id(&self) -> &str {
        &self.id
    }

    fn matches(&self, lookup: &Lookup) -> bool {
        matches!(lookup, Lookup::Symbol(s) if *s == self.symbol)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_is_by_id() {
        let a = SymbolRecord::new("aapl");
        let mut b = a.clone();
        b.symbol = "MSFT".into();
        assert_eq!(a, b);
        assert_ne!(a, SymbolRecord::new("aapl"));
    }

    #[test]
    fn test_symbol_is_normalized() {
        assert_eq!(SymbolRecord::new("  tsla ").symbol, "TSLA");
    }

    #[test]
    fn test_mark_alerted_consumes_alert() {
        let now = Utc::now();
        let alert = PriceAlertRecord::new("AAPL", Some(100.0), None);
        assert!(alert.matches(&Lookup::Active));

        let fired = alert.mark_alerted(now);
        assert_eq!(fired.id, alert.id);
        assert!(!fired.enabled);
        assert_eq!(fired.last_notified, Some(now));
        assert!(!fired.matches(&Lookup::Active));
        assert!(fired.matches(&Lookup::Symbol("AAPL".into())));

        assert!(fired.rearmed().matches(&Lookup::Active));
    }

    #[test]
    fn test_alert_without_trigger_is_never_active() {
        let alert = PriceAlertRecord::new("AAPL", None, None);
        assert!(alert.enabled);
        assert!(!alert.is_active());
    }

    #[test]
    fn test_report_refresh_keeps_id() {
        let t0 = Utc::now();
        let q1 = Quote::new("NVDA", EquityType::Stock, SessionState::Regular, 100.0, 12.0);
        let q2 = Quote::new("NVDA", EquityType::Stock, SessionState::AfterHours, 95.0, -5.0);

        let report = BigMoverReportRecord::from_quote(&q1, t0);
        let next = report.refreshed(&q2, t0 + chrono::Duration::minutes(1));
        assert_eq!(next.id, report.id);
        assert_eq!(next.last_state, SessionState::AfterHours);
        assert_eq!(next.last_price, 95.0);
    }
}
