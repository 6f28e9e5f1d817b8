//! # models::quote
//!
//! Defines [`Quote`], the market snapshot the quote source returns for each
//! tracked symbol at the start of a sweep.
//!
//! Only the fields the alert engines read are modelled: the asset class (to
//! pick thresholds) and the *current* trading session's state, price and
//! percent change.

use serde::{Deserialize, Serialize};

// ─── EquityType ───────────────────────────────────────────────────────────────

/// Asset class of a symbol.  Drives the big-mover thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EquityType {
    Stock,
    Option,
    Crypto,
}

// ─── SessionState ─────────────────────────────────────────────────────────────

/// Which trading session a quote's price and percent belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    PreMarket,
    Regular,
    AfterHours,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::PreMarket => write!(f, "pre-market"),
            SessionState::Regular => write!(f, "regular"),
            SessionState::AfterHours => write!(f, "after-hours"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

// ─── Session ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub state: SessionState,
    /// Last traded price in this session.
    pub price: f64,
    /// Percent change for this session, e.g. `10.5` for +10.5 %.
    pub percent: f64,
}

// ─── Quote ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Upper-case ticker, e.g. `"AAPL"`, `"BTC-USD"`.
    pub symbol: String,
    pub equity_type: EquityType,
    pub current_session: Session,
}

impl Quote {
    pub fn new(symbol: &str, equity_type: EquityType, state: SessionState, price: f64, percent: f64) -> Self {
        Self {
            symbol: normalize_symbol(symbol),
            equity_type,
            current_session: Session { state, price, percent },
        }
    }

    /// `false` when the feed handed us NaN/infinite numbers.
    #[inline]
    pub fn is_well_formed(&self) -> bool {
        self.current_session.price.is_finite() && self.current_session.percent.is_finite()
    }
}

/// Symbols are compared case-insensitively everywhere; store them upper-case.
#[inline]
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}
