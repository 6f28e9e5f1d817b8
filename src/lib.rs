//! # moverwatch
//!
//! Watches a watchlist and a portfolio for big intraday moves and
//! user-defined price alerts, and decides which of them are worth a
//! notification.
//!
//! ```text
//!  scheduler ──▶ sweep ──▶ quotes ──▶ evaluation ──▶ deduper ──▶ notifier
//!                                                      │
//!                                                      ▼
//!  HTTP API ──────────────────────────────────▶ CachedRepository<T> ──▶ PersistenceBackend
//!                                                      │
//!                                                      ▼ ChangeEventBus
//!                                               /ws/monitor clients
//! ```

pub mod auth;
pub mod bus;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod models;
pub mod notify;
pub mod quotes;
pub mod routes;
pub mod scheduler;
pub mod state;
pub mod store;
