//! # engine::evaluation
//!
//! **Alert Evaluation**: stateless candidate filters run at the top of each
//! sweep.
//!
//! ```text
//! Big mover:    percent >  upper(asset class)   OR   percent <= lower(asset class)
//! Price alert:  price   >= trigger_above        OR   price   <= trigger_below
//! ```
//!
//! The big-mover comparators are deliberately asymmetric: the upper bound is
//! strict, the lower bound inclusive.  An exact −10.0 % stock move qualifies,
//! an exact +10.0 % move does not.

use std::collections::HashMap;

use crate::models::{EquityType, PriceAlertRecord, Quote};

// ─── Thresholds ───────────────────────────────────────────────────────────────

/// Percent bounds outside which a session move counts as "big".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoverThreshold {
    pub upper: f64,
    pub lower: f64,
}

pub const STOCK_THRESHOLD: MoverThreshold = MoverThreshold { upper: 10.0, lower: -10.0 };
pub const OPTION_THRESHOLD: MoverThreshold = MoverThreshold { upper: 30.0, lower: -30.0 };
pub const CRYPTO_THRESHOLD: MoverThreshold = MoverThreshold { upper: 25.0, lower: -25.0 };

pub fn threshold_for(equity_type: EquityType) -> MoverThreshold {
    match equity_type {
        EquityType::Stock => STOCK_THRESHOLD,
        EquityType::Option => OPTION_THRESHOLD,
        EquityType::Crypto => CRYPTO_THRESHOLD,
    }
}

// ─── Big Movers ───────────────────────────────────────────────────────────────

#[inline]
pub fn is_big_mover(quote: &Quote) -> bool {
    let t = threshold_for(quote.equity_type);
    let percent = quote.current_session.percent;
    percent > t.upper || percent <= t.lower
}

pub fn big_mover_candidates(quotes: &[Quote]) -> Vec<&Quote> {
    quotes.iter().filter(|q| is_big_mover(q)).collect()
}

// ─── Price Alerts ─────────────────────────────────────────────────────────────

#[inline]
pub fn price_alert_triggered(alert: &PriceAlertRecord, price: f64) -> bool {
    let above = alert.trigger_above.map_or(false, |t| price >= t);
    let below = alert.trigger_below.map_or(false, |t| price <= t);
    above || below
}

/// Enabled alerts whose symbol has a live quote that crosses a trigger,
/// paired with that quote.
pub fn price_alert_candidates<'a>(
    alerts: &'a [PriceAlertRecord],
    quotes: &'a [Quote],
) -> Vec<(&'a PriceAlertRecord, &'a Quote)> {
    let by_symbol: HashMap<&str, &Quote> =
        quotes.iter().map(|q| (q.symbol.as_str(), q)).collect();

    alerts
        .iter()
        .filter(|a| a.enabled)
        .filter_map(|a| by_symbol.get(a.symbol.as_str()).map(|q| (a, *q)))
        .filter(|(a, q)| price_alert_triggered(a, q.current_session.price))
        .collect()
}

// ─── Tests ────────────────────────────────────────────────────────────────────
