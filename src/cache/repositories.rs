//! # cache::repositories
//!
//! The six concrete repositories and their typed lookups.

use std::sync::Arc;

use crate::cache::repository::CachedRepository;
use crate::error::StoreError;
use crate::models::{
    normalize_symbol, BigMoverReportRecord, HoldingRecord, Lookup, PositionRecord,
    PriceAlertRecord, Record, SplitRecord, SymbolRecord,
};
use crate::store::{MemoryBackend, PersistenceBackend};

pub type SymbolRepository = CachedRepository<SymbolRecord>;
pub type HoldingRepository = CachedRepository<HoldingRecord>;
pub type PositionRepository = CachedRepository<PositionRecord>;
pub type SplitRepository = CachedRepository<SplitRecord>;
pub type PriceAlertRepository = CachedRepository<PriceAlertRecord>;
pub type BigMoverReportRepository = CachedRepository<BigMoverReportRecord>;

impl CachedRepository<SymbolRecord> {
    pub async fn query_by_symbol(&self, symbol: &str) -> Result<Option<SymbolRecord>, StoreError> {
        let hits = self.query_by(&Lookup::Symbol(normalize_symbol(symbol))).await?;
        Ok(hits.into_iter().next())
    }
}

impl CachedRepository<HoldingRecord> {
    pub async fn query_by_symbol(&self, symbol: &str) -> Result<Vec<HoldingRecord>, StoreError> {
        self.query_by(&Lookup::Symbol(normalize_symbol(symbol))).await
    }
}

impl CachedRepository<PositionRecord> {
    pub async fn query_by_holding(&self, holding_id: &str) -> Result<Vec<PositionRecord>, StoreError> {
        self.query_by(&Lookup::Holding(holding_id.to_string())).await
    }
}

impl CachedRepository<SplitRecord> {
    pub async fn query_by_holding(&self, holding_id: &str) -> Result<Vec<SplitRecord>, StoreError> {
        self.query_by(&Lookup::Holding(holding_id.to_string())).await
    }
}

impl CachedRepository<PriceAlertRecord> {
    pub async fn query_by_symbol(&self, symbol: &str) -> Result<Vec<PriceAlertRecord>, StoreError> {
        self.query_by(&Lookup::Symbol(normalize_symbol(symbol))).await
    }

    /// Enabled alerts with at least one trigger set.
    pub async fn query_active(&self) -> Result<Vec<PriceAlertRecord>, StoreError> {
        self.query_by(&Lookup::Active).await
    }
}

impl CachedRepository<BigMoverReportRecord> {
    /// The live report for `symbol`.  Should there ever be more than one,
    /// the most recently notified wins.
    pub async fn query_by_symbol(
        &self,
        symbol: &str,
    ) -> Result<Option<BigMoverReportRecord>, StoreError> {
        let hits = self.query_by(&Lookup::Symbol(normalize_symbol(symbol))).await?;
        Ok(hits.into_iter().max_by_key(|r| r.last_notified))
    }
}

// ─── Repositories ─────────────────────────────────────────────────────────────

/// One repository per entity type, shared by the sweeps and the HTTP layer.
#[derive(Clone)]
pub struct Repositories {
    pub symbols: Arc<SymbolRepository>,
    pub holdings: Arc<HoldingRepository>,
    pub positions: Arc<PositionRepository>,
    pub splits: Arc<SplitRepository>,
    pub price_alerts: Arc<PriceAlertRepository>,
    pub big_movers: Arc<BigMoverReportRepository>,
}

/// Hands out a backend per entity type.
pub trait BackendFactory {
    fn backend<T: Record>(&self) -> Arc<dyn PersistenceBackend<T>>;
}

/// Fresh, empty in-process storage for every entity type.
pub struct InMemory;

impl BackendFactory for InMemory {
    fn backend<T: Record>(&self) -> Arc<dyn PersistenceBackend<T>> {
        Arc::new(MemoryBackend::<T>::new())
    }
}

#[cfg(feature = "postgres")]
impl BackendFactory for sqlx::PgPool {
    fn backend<T: Record>(&self) -> Arc<dyn PersistenceBackend<T>> {
        Arc::new(crate::store::postgres::PgBackend::<T>::new(self.clone()))
    }
}

impl Repositories {
    pub fn build(factory: &impl BackendFactory, bus_capacity: usize) -> Self {
        Self {
            symbols: Arc::new(CachedRepository::new(factory.backend(), bus_capacity)),
            holdings: Arc::new(CachedRepository::new(factory.backend(), bus_capacity)),
            positions: Arc::new(CachedRepository::new(factory.backend(), bus_capacity)),
            splits: Arc::new(CachedRepository::new(factory.backend(), bus_capacity)),
            price_alerts: Arc::new(CachedRepository::new(factory.backend(), bus_capacity)),
            big_movers: Arc::new(CachedRepository::new(factory.backend(), bus_capacity)),
        }
    }

    pub fn in_memory(bus_capacity: usize) -> Self {
        Self::build(&InMemory, bus_capacity)
    }

    /// Clear every cache, e.g. after writes made outside this process.
    pub fn invalidate_all(&self) {
        self.symbols.invalidate();
        self.holdings.invalidate();
        self.positions.invalidate();
        self.splits.invalidate();
        self.price_alerts.invalidate();
        self.big_movers.invalidate();
    }

    /// Watchlist symbols plus held symbols, de-duplicated and sorted.
    pub async fn tracked_symbols(&self) -> Result<Vec<String>, StoreError> {
        let mut symbols: Vec<String> = self
            .symbols
            .query()
            .await?
            .into_iter()
            .map(|s| s.symbol)
            .chain(self.holdings.query().await?.into_iter().map(|h| h.symbol))
            .collect();
        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }
}
