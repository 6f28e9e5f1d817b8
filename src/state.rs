//! # state
//!
//! [`AppContext`]: everything the sweeps and the HTTP handlers share,
//! built once at startup and passed around as `Arc<AppContext>`.
//!
//! There is no global registry: whoever needs a repository, the notifier or
//! the quote source gets it from the context it was handed.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::{CachedRepository, Repositories};
use crate::config::AppConfig;
use crate::engine::NotificationDeduper;
use crate::events::MonitorEvent;
use crate::models::Record;
use crate::notify::{LogNotifier, NotificationIdMap, Notifier, WebhookNotifier};
use crate::quotes::{HttpQuoteSource, QuoteSource};
use crate::scheduler::{cancel_pair, CancelHandle, CancelSignal};

/// Monitor frames buffered per WebSocket client.
const MONITOR_CHANNEL_CAPACITY: usize = 256;

// ─── AppContext ───────────────────────────────────────────────────────────────

pub struct AppContext {
    pub config: AppConfig,

    // ── Storage ───────────────────────────────────────────────────────────────
    pub repos: Repositories,

    // ── Notifications ─────────────────────────────────────────────────────────
    pub ids: Arc<NotificationIdMap>,
    pub notifier: Arc<dyn Notifier>,
    pub deduper: NotificationDeduper,

    // ── Market Data ───────────────────────────────────────────────────────────
    pub quotes: Arc<dyn QuoteSource>,

    // ── Monitor / WebSocket ───────────────────────────────────────────────────
    /// Pre-serialised [`MonitorEvent`] JSON for `/ws/monitor` clients.
    pub broadcast_tx: broadcast::Sender<String>,

    // ── Lifecycle ─────────────────────────────────────────────────────────────
    /// Fired on shutdown; scheduled and manual sweeps both listen to it.
    pub shutdown: CancelHandle,
}

pub type SharedState = Arc<AppContext>;

impl AppContext {
    pub fn new(
        config: AppConfig,
        repos: Repositories,
        notifier: Arc<dyn Notifier>,
        quotes: Arc<dyn QuoteSource>,
    ) -> Self {
        let (broadcast_tx, _) = broadcast::channel(MONITOR_CHANNEL_CAPACITY);
        let ids = Arc::new(NotificationIdMap::new());
        let deduper = NotificationDeduper::new(
            Arc::clone(&repos.big_movers),
            Arc::clone(&repos.price_alerts),
            Arc::clone(&notifier),
            Arc::clone(&ids),
            config.cooldown(),
        );

        let (shutdown, _) = cancel_pair();

        Self { config, repos, ids, notifier, deduper, quotes, broadcast_tx, shutdown }
    }

    /// Send to every WebSocket client.  No listeners is fine.
    pub fn broadcast(&self, event: &MonitorEvent) {
        let _ = self.broadcast_tx.send(event.to_json());
    }
}

// ─── Construction ─────────────────────────────────────────────────────────────

/// Wire the production context from `config`: storage backend, notifier and
/// quote source.
pub async fn build_state(config: AppConfig) -> anyhow::Result<SharedState> {
    let http_client = reqwest::Client::new();
    let repos = build_repositories(&config).await?;

    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => {
            info!(url = %url, "notifications → webhook");
            Arc::new(WebhookNotifier::new(http_client.clone(), url.clone(), config.notifications_enabled))
        }
        None => {
            info!("notifications → log");
            Arc::new(LogNotifier::new(config.notifications_enabled))
        }
    };

    if config.quote_source_url.is_none() {
        warn!("QUOTE_SOURCE_URL not set, sweeps will find no quotes");
    }
    let quotes: Arc<dyn QuoteSource> = Arc::new(HttpQuoteSource::new(
        http_client,
        config.quote_source_url.clone(),
        config.quote_cache_ttl(),
    ));

    Ok(Arc::new(AppContext::new(config, repos, notifier, quotes)))
}

#[cfg(feature = "postgres")]
async fn build_repositories(config: &AppConfig) -> anyhow::Result<Repositories> {
    use anyhow::Context as _;

    match &config.database_url {
        Some(url) => {
            let pool = crate::store::postgres::init_pool(url)
                .await
                .context("connecting to DATABASE_URL")?;
            info!("🗄️ storage → postgres");
            Ok(Repositories::build(&pool, config.event_bus_capacity))
        }
        None => {
            warn!("DATABASE_URL not set, storage is in-memory only");
            Ok(Repositories::in_memory(config.event_bus_capacity))
        }
    }
}

#[cfg(not(feature = "postgres"))]
async fn build_repositories(config: &AppConfig) -> anyhow::Result<Repositories> {
    if config.database_url.is_some() {
        warn!("DATABASE_URL ignored: built without the `postgres` feature");
    }
    info!("🗄️ storage → in-memory");
    Ok(Repositories::in_memory(config.event_bus_capacity))
}

// ─── Change Forwarding ────────────────────────────────────────────────────────

/// Bridge every repository's change bus onto the monitor channel.
pub fn spawn_change_forwarders(state: &SharedState, cancel: CancelSignal) -> Vec<JoinHandle<()>> {
    let repos = &state.repos;
    let tx = &state.broadcast_tx;
    vec![
        forward(&repos.symbols, tx.clone(), cancel.clone()),
        forward(&repos.holdings, tx.clone(), cancel.clone()),
        forward(&repos.positions, tx.clone(), cancel.clone()),
        forward(&repos.splits, tx.clone(), cancel.clone()),
        forward(&repos.price_alerts, tx.clone(), cancel.clone()),
        forward(&repos.big_movers, tx.clone(), cancel),
    ]
}

fn forward<T: Record>(
    repo: &CachedRepository<T>,
    tx: broadcast::Sender<String>,
    cancel: CancelSignal,
) -> JoinHandle<()> {
    // Subscribe before spawning so nothing published after this returns is missed.
    let mut changes = repo.subscribe();
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = changes.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            let record = event.record();
            let frame = MonitorEvent::RecordChanged {
                kind: T::KIND,
                change: event.label(),
                id: record.id().to_string(),
                record: serde_json::to_value(record).unwrap_or(serde_json::Value::Null),
            };
            let _ = tx.send(frame.to_json());
        }
    })
}
