//! Cached repository layer: single-flight cells, the generic repository and
//! its six per-entity instantiations.

pub mod cell;
pub mod repositories;
pub mod repository;

pub use repositories::{
    BackendFactory, BigMoverReportRepository, HoldingRepository, InMemory, PositionRepository,
    PriceAlertRepository, Repositories, SplitRepository, SymbolRepository,
};
pub use repository::{CachedRepository, InsertResult};
