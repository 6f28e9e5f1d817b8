//! # scheduler
//!
//! Periodic sweeps plus the cooperative cancellation they honour.
//!
//! ```text
//! big movers    every BIG_MOVER_INTERVAL_SECS   (30 min)
//! price alerts  every PRICE_ALERT_INTERVAL_SECS (15 min)
//! ```
//! The two loops are independent tasks and may overlap; they write disjoint
//! entity types.  A tick that comes due while a sweep is still running is
//! skipped, not queued.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::engine::sweep::{run_sweep, SweepKind};
use crate::state::SharedState;

// ─── Cancellation ─────────────────────────────────────────────────────────────

/// Fires every [`CancelSignal`] made from it.  Dropping the handle does
/// *not* cancel.
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal { rx: self.tx.subscribe() }
    }
}

impl CancelSignal {
    /// A signal nobody can fire.
    pub fn never() -> Self {
        cancel_pair().1
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled; never resolves for a signal whose handle is
    /// gone without having fired.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

// ─── Loops ────────────────────────────────────────────────────────────────────

pub fn spawn_sweeps(state: SharedState, cancel: CancelSignal) -> Vec<JoinHandle<()>> {
    let big_movers = state.config.big_mover_interval();
    let price_alerts = state.config.price_alert_interval();
    vec![
        spawn_loop(state.clone(), cancel.clone(), SweepKind::BigMovers, big_movers),
        spawn_loop(state, cancel, SweepKind::PriceAlerts, price_alerts),
    ]
}

fn spawn_loop(state: SharedState, cancel: CancelSignal, kind: SweepKind, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(%kind, every_secs = period.as_secs(), "⏱️ sweep scheduled");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    run_sweep(&state, kind, &cancel, false).await;
                }
            }
        }

        info!(%kind, "sweep loop stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_reaches_every_signal() {
        let (handle, signal) = cancel_pair();
        let other = handle.signal();
        let copy = signal.clone();
        assert!(!signal.is_cancelled());

        let waiter = tokio::spawn(async move { copy.cancelled().await });
        handle.cancel();

        waiter.await.unwrap();
        assert!(signal.is_cancelled());
        assert!(other.is_cancelled());
    }

    #[tokio::test]
    async fn test_never_does_not_fire() {
        let signal = CancelSignal::never();
        assert!(!signal.is_cancelled());
        let timed_out = tokio::time::timeout(Duration::from_millis(20), signal.cancelled()).await;
        assert!(timed_out.is_err());
    }
}
