//! # moverwatch — service entry point
//!
//! ```text
//!  ┌──────────────┐  every 30 min   ┌──────────────────────────────┐
//!  │  scheduler   │ ──────────────▶ │ big-mover sweep              │──┐
//!  │              │  every 15 min   │ price-alert sweep            │  │  notify
//!  └──────────────┘ ──────────────▶ └──────────────────────────────┘  ├──────────▶ log / webhook
//!                                              │ read / write         │
//!  ┌──────────────┐  /api/*         ┌──────────▼───────────────────┐  │
//!  │  client      │ ──────────────▶ │ AppContext (repositories)    │──┘
//!  └──────────────┘ ◀── /ws/monitor └──────────────────────────────┘
//! ```
//!
//! See [`moverwatch::config`] for the environment variables.

use std::net::SocketAddr;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use moverwatch::config::AppConfig;
use moverwatch::routes::router;
use moverwatch::scheduler::spawn_sweeps;
use moverwatch::state::{build_state, spawn_change_forwarders};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Load .env ──────────────────────────────────────────────────────────
    dotenvy::dotenv().ok();

    // ── 2. Structured logging ─────────────────────────────────────────────────
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("moverwatch=debug".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    // ── 3. Config & shared state ──────────────────────────────────────────────
    let config = AppConfig::from_env();
    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("invalid BIND_ADDR {:?}", config.bind_addr))?;

    let state = build_state(config).await?;

    // ── 4. Background tasks ───────────────────────────────────────────────────
    let signal = state.shutdown.signal();
    let mut tasks = spawn_change_forwarders(&state, signal.clone());
    tasks.extend(spawn_sweeps(state.clone(), signal));

    // ── 5. Serve until Ctrl-C ─────────────────────────────────────────────────
    let app = router(state.clone());

    info!(?addr, "🚀 moverwatch starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
            state.shutdown.cancel();
        })
        .await?;

    for task in tasks {
        let _ = task.await;
    }
    info!("👋 moverwatch stopped");

    Ok(())
}
