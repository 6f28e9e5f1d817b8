//! # cache::repository
//!
//! [`CachedRepository`]: the in-memory cache in front of one entity type's
//! [`PersistenceBackend`].
//!
//! ## Caches
//! ```text
//! all        ValueCell<Vec<T>>              query()
//! by_id      KeyedCell<Id, Option<T>>       query_by_id(id)
//! by_lookup  KeyedCell<Lookup, Vec<T>>      query_by(lookup)
//! ```
//! Each is filled single-flight: concurrent misses on one key share one
//! backend read.  A miss on a keyed cache fetches only that key.
//!
//! ## Writes
//! Strictly ordered: backend write → cache invalidation → change event.
//! A failed write touches neither the caches nor the bus.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::bus::{ChangeEvent, ChangeEventBus, Subscription};
use crate::cache::cell::{KeyedCell, ValueCell};
use crate::error::StoreError;
use crate::models::{Id, Lookup, Record};
use crate::store::PersistenceBackend;

// ─── InsertResult ─────────────────────────────────────────────────────────────

/// Outcome of [`CachedRepository::insert`].
#[derive(Debug, Clone, PartialEq)]
pub enum InsertResult<T> {
    /// No record with this id existed; it was created.
    Insert(T),
    /// A record with this id existed; it was replaced.
    Update(T),
    /// The backend rejected the write.  Caches and subscribers are untouched.
    Fail(T, StoreError),
}

impl<T> InsertResult<T> {
    pub fn is_ok(&self) -> bool {
        !matches!(self, InsertResult::Fail(..))
    }

    /// The written record, or the store error.
    pub fn into_result(self) -> Result<T, StoreError> {
        match self {
            InsertResult::Insert(r) | InsertResult::Update(r) => Ok(r),
            InsertResult::Fail(_, err) => Err(err),
        }
    }
}

// ─── Repository ───────────────────────────────────────────────────────────────

pub struct CachedRepository<T: Record> {
    backend: Arc<dyn PersistenceBackend<T>>,
    all: ValueCell<Vec<T>>,
    by_id: KeyedCell<Id, Option<T>>,
    by_lookup: KeyedCell<Lookup, Vec<T>>,
    bus: ChangeEventBus<T>,
}

/// Repository work must run on the async runtime's workers; being called
/// from anywhere else is a programming error.
#[inline]
fn assert_on_runtime() {
    debug_assert!(
        tokio::runtime::Handle::try_current().is_ok(),
        "repository used outside of a Tokio runtime"
    );
}

impl<T: Record> CachedRepository<T> {
    pub fn new(backend: Arc<dyn PersistenceBackend<T>>, bus_capacity: usize) -> Self {
        Self {
            backend,
            all: ValueCell::new(),
            by_id: KeyedCell::new(),
            by_lookup: KeyedCell::new(),
            bus: ChangeEventBus::new(bus_capacity),
        }
    }

    // ─── Reads ────────────────────────────────────────────────────────────────

    /// The full collection.
    pub async fn query(&self) -> Result<Vec<T>, StoreError> {
        assert_on_runtime();
        let backend = Arc::clone(&self.backend);
        self.all
            .get_or_fetch(move || async move {
                debug!(kind = T::KIND, "cache miss: full collection");
                backend.query().await
            })
            .await
    }

    pub async fn query_by_id(&self, id: &str) -> Result<Option<T>, StoreError> {
        assert_on_runtime();
        let backend = Arc::clone(&self.backend);
        let key = id.to_string();
        self.by_id
            .get_or_fetch(&key, || {
                let id = key.clone();
                async move {
                    debug!(kind = T::KIND, id = %id, "cache miss: by id");
                    backend.query_by_id(&id).await
                }
            })
            .await
    }

    pub async fn query_by(&self, lookup: &Lookup) -> Result<Vec<T>, StoreError> {
        assert_on_runtime();
        let backend = Arc::clone(&self.backend);
        self.by_lookup
            .get_or_fetch(lookup, || {
                let lookup = lookup.clone();
                async move {
                    debug!(kind = T::KIND, lookup = ?lookup, "cache miss: by lookup");
                    backend.query_by(&lookup).await
                }
            })
            .await
    }

    // ─── Writes ───────────────────────────────────────────────────────────────

    /// Create or replace `record`, deciding by whether its id is stored.
    pub async fn insert(&self, record: T) -> InsertResult<T> {
        assert_on_runtime();

        let previous = match self.backend.query_by_id(record.id()).await {
            Ok(previous) => previous,
            Err(err) => {
                error!(kind = T::KIND, id = record.id(), error = %err, "existence check failed");
                return InsertResult::Fail(record, err);
            }
        };

        let written = match &previous {
            None => self.backend.create(&record).await,
            Some(_) => self.backend.update(&record).await,
        };

        if let Err(err) = written {
            error!(kind = T::KIND, id = record.id(), error = %err, "insert failed");
            return InsertResult::Fail(record, err);
        }

        self.invalidate_for(previous.as_ref(), &record);

        match previous {
            None => {
                info!(kind = T::KIND, id = record.id(), "record inserted");
                self.bus.publish(ChangeEvent::Insert(record.clone()));
                InsertResult::Insert(record)
            }
            Some(_) => {
                info!(kind = T::KIND, id = record.id(), "record updated");
                self.bus.publish(ChangeEvent::Update(record.clone()));
                InsertResult::Update(record)
            }
        }
    }

    /// Remove `record`.  `offer_undo` is a hint for the caller's UI layer and
    /// does not change what happens here.
    pub async fn delete(&self, record: T, offer_undo: bool) -> Result<bool, StoreError> {
        assert_on_runtime();

        let removed = match self.backend.delete(record.id()).await {
            Ok(removed) => removed,
            Err(err) => {
                error!(kind = T::KIND, id = record.id(), error = %err, "delete failed");
                return Err(err);
            }
        };

        if removed {
            self.all.invalidate();
            self.by_id.invalidate(&record.id().to_string());
            // The caller's copy may be stale, so every lookup could hold it.
            self.by_lookup.clear();
            info!(kind = T::KIND, id = record.id(), offer_undo, "record deleted");
            self.bus.publish(ChangeEvent::Delete(record));
        }

        Ok(removed)
    }

    /// Drop every cached entry for this entity type.
    pub fn invalidate(&self) {
        self.all.invalidate();
        self.by_id.clear();
        self.by_lookup.clear();
        debug!(kind = T::KIND, "cache invalidated");
    }

    fn invalidate_for(&self, previous: Option<&T>, next: &T) {
        self.all.invalidate();
        self.by_id.invalidate(&next.id().to_string());
        self.by_lookup.invalidate_where(|lookup| {
            next.matches(lookup) || previous.map_or(false, |p| p.matches(lookup))
        });
    }

    // ─── Events ───────────────────────────────────────────────────────────────

    pub fn subscribe(&self) -> Subscription<T> {
        self.bus.subscribe()
    }

    pub fn bus(&self) -> &ChangeEventBus<T> {
        &self.bus
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
