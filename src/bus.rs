//! # bus
//!
//! [`ChangeEventBus`]: one broadcast stream per entity type.
//!
//! ## Delivery contract
//! - Every subscriber that is attached at the moment of `publish` receives
//!   the event once.
//! - No replay: a subscriber attached after a publish never sees it.
//! - Bounded, drop-oldest: a subscriber that falls more than `capacity`
//!   events behind loses the oldest ones (logged) and keeps going.  Publish
//!   never waits on a slow subscriber.

use serde::Serialize;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tracing::{debug, warn};

// ─── ChangeEvent ──────────────────────────────────────────────────────────────

/// What happened to a record, carrying the record as written.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "change", content = "record", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeEvent<T> {
    Insert(T),
    Update(T),
    Delete(T),
}

impl<T> ChangeEvent<T> {
    pub fn record(&self) -> &T {
        match self {
            ChangeEvent::Insert(r) | ChangeEvent::Update(r) | ChangeEvent::Delete(r) => r,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChangeEvent::Insert(_) => "INSERT",
            ChangeEvent::Update(_) => "UPDATE",
            ChangeEvent::Delete(_) => "DELETE",
        }
    }
}

// ─── Bus ──────────────────────────────────────────────────────────────────────

pub struct ChangeEventBus<T> {
    tx: broadcast::Sender<ChangeEvent<T>>,
}

impl<T: Clone + Send + 'static> ChangeEventBus<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Deliver to every active subscriber; returns how many there were.
    /// Zero subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent<T>) -> usize {
        let label = event.label();
        match self.tx.send(event) {
            Ok(n) => {
                debug!(change = label, subscribers = n, "change event published");
                n
            }
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self) -> Subscription<T> {
        Subscription { rx: self.tx.subscribe() }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

// ─── Subscription ─────────────────────────────────────────────────────────────

pub struct Subscription<T> {
    rx: broadcast::Receiver<ChangeEvent<T>>,
}

impl<T: Clone> Subscription<T> {
    /// Next event, or `None` once the bus is gone.  Lag is logged and skipped.
    pub async fn recv(&mut self) -> Option<ChangeEvent<T>> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(n)) => {
                    warn!(skipped = n, "change subscriber lagged, oldest events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant; `None` when nothing is pending.
    pub fn try_recv(&mut self) -> Option<ChangeEvent<T>> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(n)) => {
                    warn!(skipped = n, "change subscriber lagged, oldest events dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let bus = ChangeEventBus::<u32>::new(4);
        assert_eq!(bus.publish(ChangeEvent::Insert(1)), 0);
    }

    #[test]
    fn test_no_replay_for_late_subscriber() {
        let bus = ChangeEventBus::new(4);
        let mut early = bus.subscribe();
        bus.publish(ChangeEvent::Insert(1));
        let mut late = bus.subscribe();

        assert_eq!(early.try_recv(), Some(ChangeEvent::Insert(1)));
        assert_eq!(late.try_recv(), None);
    }

    #[test]
    fn test_subscribers_are_independent() {
        let bus = ChangeEventBus::new(4);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.publish(ChangeEvent::Update(7)), 2);

        assert_eq!(a.try_recv(), Some(ChangeEvent::Update(7)));
        assert_eq!(a.try_recv(), None);
        assert_eq!(b.try_recv(), Some(ChangeEvent::Update(7)));
    }

    #[test]
    fn test_slow_subscriber_drops_oldest() {
        let bus = ChangeEventBus::new(2);
        let mut slow = bus.subscribe();
        let mut fast = bus.subscribe();

        for i in 0..5 {
            bus.publish(ChangeEvent::Insert(i));
            assert_eq!(fast.try_recv(), Some(ChangeEvent::Insert(i)));
        }

        // Only the newest `capacity` events survive for the laggard.
        assert_eq!(slow.try_recv(), Some(ChangeEvent::Insert(3)));
        assert_eq!(slow.try_recv(), Some(ChangeEvent::Insert(4)));
        assert_eq!(slow.try_recv(), None);
    }
}
