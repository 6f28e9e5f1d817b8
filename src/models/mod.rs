//! Domain models shared across the whole service.

pub mod quote;
pub mod records;

pub use quote::{normalize_symbol, EquityType, Quote, Session, SessionState};
pub use records::{
    new_id, BigMoverReportRecord, HoldingRecord, Id, Lookup, PositionRecord, PriceAlertRecord,
    Record, SplitRecord, SymbolRecord, TradeSide,
};
