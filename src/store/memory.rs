//! # store::memory
//!
//! In-process [`PersistenceBackend`] used by the default binary and by tests.
//!
//! Counts reads so callers can observe how often the cache actually reached
//! storage, and can simulate a slow or failing store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::models::{Id, Lookup, Record};
use crate::store::PersistenceBackend;

pub struct MemoryBackend<T> {
    records: RwLock<HashMap<Id, T>>,
    reads: AtomicUsize,
    fail_writes: AtomicBool,
    latency: Option<Duration>,
}

impl<T: Record> MemoryBackend<T> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            reads: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
            latency: None,
        }
    }

    /// Every read and write sleeps this long first.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Pre-populate without going through a repository.
    pub fn seeded(records: impl IntoIterator<Item = T>) -> Self {
        let map = records
            .into_iter()
            .map(|r| (r.id().to_string(), r))
            .collect();
        Self {
            records: RwLock::new(map),
            ..Self::new()
        }
    }

    /// Number of read calls served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// While set, `create`/`update`/`delete` fail with [`StoreError::Io`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Write behind the repository's back (an "out-of-band" write).
    pub async fn put_direct(&self, record: T) {
        self.records.write().await.insert(record.id().to_string(), record);
    }

    async fn before_read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    async fn before_write(&self) -> Result<(), StoreError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(format!("{} write rejected", T::KIND)));
        }
        Ok(())
    }
}

impl<T: Record> Default for MemoryBackend<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Record> PersistenceBackend<T> for MemoryBackend<T> {
    async fn query(&self) -> Result<Vec<T>, StoreError> {
        self.before_read().await;
        let mut all: Vec<T> = self.records.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(all)
    }

    async fn query_by_id(&self, id: &str) -> Result<Option<T>, StoreError> {
        self.before_read().await;
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn query_by(&self, lookup: &Lookup) -> Result<Vec<T>, StoreError> {
        self.before_read().await;
        let mut hits: Vec<T> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.matches(lookup))
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(hits)
    }

    async fn create(&self, record: &T) -> Result<(), StoreError> {
        self.before_write().await?;
        let mut records = self.records.write().await;
        if records.contains_key(record.id()) {
            return Err(StoreError::Constraint(format!(
                "{} {} already exists",
                T::KIND,
                record.id()
            )));
        }
        records.insert(record.id().to_string(), record.clone());
        Ok(())
    }

    async fn update(&self, record: &T) -> Result<(), StoreError> {
        self.before_write().await?;
        let mut records = self.records.write().await;
        match records.get_mut(record.id()) {
            Some(slot) => {
                *slot = record.clone();
                Ok(())
            }
            None => Err(StoreError::Constraint(format!(
                "{} {} does not exist",
                T::KIND,
                record.id()
            ))),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.before_write().await?;
        Ok(self.records.write().await.remove(id).is_some())
    }
}
