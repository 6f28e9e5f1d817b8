//! # engine::portfolio
//!
//! Split-adjusted view of one holding.
//!
//! A split dated after a position's purchase multiplies that position's
//! share count by `post / pre` and divides its per-share price by the same
//! ratio, so the cost basis of every lot is unchanged.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{HoldingRecord, PositionRecord, SplitRecord};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdjustedPosition {
    pub id: String,
    pub purchase_date: DateTime<Utc>,
    pub share_count: f64,
    pub price: f64,
    pub cost_basis: f64,
    /// Product of every split ratio applied to this lot.
    pub split_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingSummary {
    pub holding: HoldingRecord,
    pub positions: Vec<AdjustedPosition>,
    pub total_shares: f64,
    pub cost_basis: f64,
    /// `cost_basis / total_shares`; `None` while nothing is held.
    pub average_price: Option<f64>,
}

pub fn adjust_position(position: &PositionRecord, splits: &[SplitRecord]) -> AdjustedPosition {
    let split_factor: f64 = splits
        .iter()
        .filter(|s| s.split_date > position.purchase_date && s.pre_split_share_count > 0.0)
        .map(SplitRecord::ratio)
        .product();

    AdjustedPosition {
        id: position.id.clone(),
        purchase_date: position.purchase_date,
        share_count: position.share_count * split_factor,
        price: position.price / split_factor,
        cost_basis: position.share_count * position.price,
        split_factor,
    }
}

/// Positions come back oldest first.
pub fn summarize(
    holding: &HoldingRecord,
    positions: &[PositionRecord],
    splits: &[SplitRecord],
) -> HoldingSummary {
    let mut adjusted: Vec<AdjustedPosition> = positions
        .iter()
        .filter(|p| p.holding_id == holding.id)
        .map(|p| adjust_position(p, splits))
        .collect();
    adjusted.sort_by_key(|p| p.purchase_date);

    let total_shares: f64 = adjusted.iter().map(|p| p.share_count).sum();
    let cost_basis: f64 = adjusted.iter().map(|p| p.cost_basis).sum();

    HoldingSummary {
        holding: holding.clone(),
        positions: adjusted,
        total_shares,
        cost_basis,
        average_price: (total_shares > 0.0).then(|| cost_basis / total_shares),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{new_id, EquityType, TradeSide};
    use chrono::{Duration, TimeZone};

    fn make_position(holding: &HoldingRecord, shares: f64, price: f64, date: DateTime<Utc>) -> PositionRecord {
        PositionRecord {
            id: new_id(),
            holding_id: holding.id.clone(),
            share_count: shares,
            price,
            purchase_date: date,
        }
    }

    fn make_split(holding: &HoldingRecord, pre: f64, post: f64, date: DateTime<Utc>) -> SplitRecord {
        SplitRecord {
            id: new_id(),
            holding_id: holding.id.clone(),
            pre_split_share_count: pre,
            post_split_share_count: post,
            split_date: date,
        }
    }

    #[test]
    fn test_split_applies_only_to_older_lots() {
        let holding = HoldingRecord::new("NVDA", EquityType::Stock, TradeSide::Buy);
        let t0 = Utc.with_ymd_and_hms(2024, 1, 2, 15, 0, 0).unwrap();
        let split_at = t0 + Duration::days(150);

        let old = make_position(&holding, 10.0, 500.0, t0);
        let new = make_position(&holding, 5.0, 120.0, split_at + Duration::days(1));
        let splits = vec![make_split(&holding, 1.0, 10.0, split_at)];

        let summary = summarize(&holding, &[new, old], &splits);

        assert_eq!(summary.positions[0].share_count, 100.0);
        assert_eq!(summary.positions[0].price, 50.0);
        assert_eq!(summary.positions[0].cost_basis, 5_000.0);
        assert_eq!(summary.positions[1].split_factor, 1.0);

        assert_eq!(summary.total_shares, 105.0);
        assert_eq!(summary.cost_basis, 5_600.0);
    }

    #[test]
    fn test_splits_compound() {
        let holding = HoldingRecord::new("AAPL", EquityType::Stock, TradeSide::Buy);
        let t0 = Utc.with_ymd_and_hms(2019, 6, 1, 0, 0, 0).unwrap();
        let lot = make_position(&holding, 1.0, 400.0, t0);
        let splits = vec![
            make_split(&holding, 1.0, 4.0, t0 + Duration::days(60)),
            make_split(&holding, 1.0, 2.0, t0 + Duration::days(900)),
        ];

        let adjusted = adjust_position(&lot, &splits);
        assert_eq!(adjusted.split_factor, 8.0);
        assert_eq!(adjusted.share_count, 8.0);
        assert_eq!(adjusted.price, 50.0);
    }

    #[test]
    fn test_empty_holding() {
        let holding = HoldingRecord::new("TSLA", EquityType::Stock, TradeSide::Sell);
        let summary = summarize(&holding, &[], &[]);
        assert_eq!(summary.total_shares, 0.0);
        assert_eq!(summary.average_price, None);
    }
}
