//! # cache::cell
//!
//! Single-flight memo cells.
//!
//! A [`KeyedCell`] maps each key to one shared in-flight fetch.  Concurrent
//! callers asking for the same unresolved key await the *same* future and all
//! receive the same `Ok`/`Err`.  A successful result stays cached until the
//! key is invalidated; a failed one is dropped so the next caller retries.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};

use crate::error::StoreError;

type SharedFetch<V> = Shared<BoxFuture<'static, Result<V, StoreError>>>;

struct Slot<V> {
    /// Distinguishes this fill from a later one under the same key.
    generation: u64,
    fetch: SharedFetch<V>,
}

// ─── KeyedCell ────────────────────────────────────────────────────────────────

pub struct KeyedCell<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
    next_generation: AtomicU64,
}

impl<K, V> KeyedCell<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    // The lock is never held across an await, so a poisoned map is still
    // structurally sound.
    fn slots(&self) -> MutexGuard<'_, HashMap<K, Slot<V>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached value for `key`, or run `fetch` once and share its result.
    ///
    /// `fetch` is only called when no fill for `key` is cached or in flight.
    pub async fn get_or_fetch<F, Fut>(&self, key: &K, fetch: F) -> Result<V, StoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, StoreError>> + Send + 'static,
    {
        let (generation, shared) = {
            let mut slots = self.slots();
            match slots.get(key) {
                Some(slot) => (slot.generation, slot.fetch.clone()),
                None => {
                    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                    let shared = fetch().boxed().shared();
                    slots.insert(
                        key.clone(),
                        Slot { generation, fetch: shared.clone() },
                    );
                    (generation, shared)
                }
            }
        };

        let result = shared.await;

        if result.is_err() {
            let mut slots = self.slots();
            if slots.get(key).map(|s| s.generation) == Some(generation) {
                slots.remove(key);
            }
        }

        result
    }

    /// Whether a fill (finished or in flight) exists for `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.slots().contains_key(key)
    }

    pub fn invalidate(&self, key: &K) {
        self.slots().remove(key);
    }

    /// Drop every key for which `stale` returns `true`.
    pub fn invalidate_where(&self, mut stale: impl FnMut(&K) -> bool) {
        self.slots().retain(|k, _| !stale(k));
    }

    pub fn clear(&self) {
        self.slots().clear();
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for KeyedCell<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

// ─── ValueCell ────────────────────────────────────────────────────────────────

/// Single-value variant of [`KeyedCell`].
pub struct ValueCell<V> {
    inner: KeyedCell<(), V>,
}

impl<V: Clone + Send + Sync + 'static> ValueCell<V> {
    pub fn new() -> Self {
        Self { inner: KeyedCell::new() }
    }

    pub async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<V, StoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, StoreError>> + Send + 'static,
    {
        self.inner.get_or_fetch(&(), fetch).await
    }

    pub fn is_cached(&self) -> bool {
        self.inner.contains(&())
    }

    pub fn invalidate(&self) {
        self.inner.clear();
    }
}

impl<V: Clone + Send + Sync + 'static> Default for ValueCell<V> {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    fn counting_fetch(
        calls: &Arc<AtomicUsize>,
        value: u32,
    ) -> impl Future<Output = Result<u32, StoreError>> + Send + 'static {
        let calls = Arc::clone(calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(value)
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let cell = KeyedCell::<&str, u32>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b, c) = tokio::join!(
            cell.get_or_fetch(&"AAPL", || counting_fetch(&calls, 1)),
            cell.get_or_fetch(&"AAPL", || counting_fetch(&calls, 2)),
            cell.get_or_fetch(&"AAPL", || counting_fetch(&calls, 3)),
        );

        assert_eq!((a, b, c), (Ok(1), Ok(1), Ok(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let cell = KeyedCell::<&str, u32>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        assert_eq!(cell.get_or_fetch(&"AAPL", || counting_fetch(&calls, 1)).await, Ok(1));
        assert_eq!(cell.get_or_fetch(&"MSFT", || counting_fetch(&calls, 2)).await, Ok(2));
        assert_eq!(cell.get_or_fetch(&"AAPL", || counting_fetch(&calls, 9)).await, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_is_shared_then_forgotten() {
        let cell = KeyedCell::<&str, u32>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let failing = || {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Err::<u32, _>(StoreError::Unavailable("down".into()))
            }
        };

        let (a, b) = tokio::join!(cell.get_or_fetch(&"K", failing), cell.get_or_fetch(&"K", failing));
        assert_eq!(a, Err(StoreError::Unavailable("down".into())));
        assert_eq!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!cell.contains(&"K"));

        assert_eq!(cell.get_or_fetch(&"K", || counting_fetch(&calls, 5)).await, Ok(5));
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let cell = ValueCell::<u32>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        assert_eq!(cell.get_or_fetch(|| counting_fetch(&calls, 1)).await, Ok(1));
        assert!(cell.is_cached());
        cell.invalidate();
        assert!(!cell.is_cached());
        assert_eq!(cell.get_or_fetch(|| counting_fetch(&calls, 2)).await, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_where() {
        let cell = KeyedCell::<u32, u32>::new();
        for k in 0..4 {
            let _ = cell.get_or_fetch(&k, move || async move { Ok(k) }).await;
        }
        cell.invalidate_where(|k| k % 2 == 0);
        assert_eq!(cell.len(), 2);
        assert!(cell.contains(&1) && cell.contains(&3));
    }
}
