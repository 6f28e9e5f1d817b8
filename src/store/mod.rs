//! # store
//!
//! Durable storage behind the cached repositories.
//!
//! The backend is the single source of truth: it survives restarts, the
//! caches in front of it do not.  Each entity type gets its own backend
//! instance; the repository above it decides create vs update and owns all
//! cache state.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{Lookup, Record};

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryBackend;

/// Durable CRUD for one entity type.
#[async_trait]
pub trait PersistenceBackend<T: Record>: Send + Sync {
    /// Every stored record of this type.
    async fn query(&self) -> Result<Vec<T>, StoreError>;

    async fn query_by_id(&self, id: &str) -> Result<Option<T>, StoreError>;

    /// Records matching a secondary key.
    async fn query_by(&self, lookup: &Lookup) -> Result<Vec<T>, StoreError>;

    /// Store a record whose id does not exist yet.
    async fn create(&self, record: &T) -> Result<(), StoreError>;

    /// Replace the stored record with the same id.
    async fn update(&self, record: &T) -> Result<(), StoreError>;

    /// `Ok(false)` when nothing with that id was stored.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;
}
