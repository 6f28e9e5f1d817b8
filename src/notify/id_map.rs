//! # notify::id_map
//!
//! [`NotificationIdMap`]: stable notification slot ids.
//!
//! Re-showing a notification under the same id replaces the previous one
//! instead of stacking a duplicate, so the id for a given (type, key) must
//! never change while the process lives.  Ids are derived, not persisted:
//! after a restart they are simply recomputed.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    BigMover,
    PriceAlert,
}

impl AlertType {
    #[inline]
    pub fn ordinal(self) -> i32 {
        match self {
            AlertType::BigMover => 0,
            AlertType::PriceAlert => 1,
        }
    }
}

/// Platform-level address of one notification slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotifyId(pub i32);

impl std::fmt::Display for NotifyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Default)]
pub struct NotificationIdMap {
    ids: Mutex<HashMap<AlertType, HashMap<String, NotifyId>>>,
}

impl NotificationIdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for `(alert_type, key)`: `hash(key) + ordinal(alert_type)`,
    /// computed on first use and memoised for the process lifetime.
    pub fn get_id(&self, alert_type: AlertType, key: &str) -> NotifyId {
        let mut ids = self.ids.lock().unwrap_or_else(PoisonError::into_inner);
        *ids.entry(alert_type)
            .or_default()
            .entry(key.to_string())
            .or_insert_with(|| NotifyId(hash_key(key).wrapping_add(alert_type.ordinal())))
    }

    /// Number of memoised ids across all alert types.
    pub fn len(&self) -> usize {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(HashMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn hash_key(key: &str) -> i32 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_key_same_id() {
        let map = NotificationIdMap::new();
        let first = map.get_id(AlertType::BigMover, "AAPL");
        let second = map.get_id(AlertType::BigMover, "AAPL");
        assert_eq!(first, second);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_type_changes_id() {
        let map = NotificationIdMap::new();
        let mover = map.get_id(AlertType::BigMover, "AAPL");
        let alert = map.get_id(AlertType::PriceAlert, "AAPL");
        assert_ne!(mover, alert);
        assert_eq!(alert.0, mover.0.wrapping_add(1));
    }

    #[test]
    fn test_equal_keys_across_maps() {
        // Memoisation is per process, the derivation itself is deterministic.
        let a = NotificationIdMap::new();
        let b = NotificationIdMap::new();
        assert_eq!(
            a.get_id(AlertType::PriceAlert, "MSFT"),
            b.get_id(AlertType::PriceAlert, &String::from("MSFT"))
        );
    }
}
