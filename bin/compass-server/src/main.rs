//! compass-server – entry point.
//!
//! Startup order:
//! 1. Load `.env` if present, then parse configuration from the environment.
//! 2. Initialise structured tracing (JSON in production, pretty in dev).
//! 3. Build the Gemini gateway and the in-memory session history.
//! 4. Render the chat page.
//! 5. Build the Axum router and start the HTTP server with graceful shutdown.

mod config;
mod error;
mod middleware;
mod prompt;
mod relay;
mod routes;
mod schemas;
mod session;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use compass_gateway::GeminiGateway;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::session::InMemoryHistoryStore;
use crate::state::AppState;

/// Upper bound on how often idle sessions are swept.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let env_file = config::load_env_file(None);
    let cfg = Config::from_env()?;

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: COMPASS_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "compass-server starting");
    if let Some(path) = &env_file {
        info!(path = %path.display(), "environment loaded from file");
    }

    // ── 3. Model gateway and session history ───────────────────────────────────
    let gateway = GeminiGateway::new(cfg.gemini())?;
    info!(model = %gateway.model(), api_base = %cfg.api_base, "model gateway ready");

    let history = Arc::new(InMemoryHistoryStore::new(cfg.session_ttl));
    spawn_session_sweeper(Arc::clone(&history), cfg.session_ttl.min(MAX_SWEEP_INTERVAL));

    // ── 4. Chat page ───────────────────────────────────────────────────────────
    let index_html = routes::page::render_index(&cfg)?;

    // ── 5. Shared application state ────────────────────────────────────────────
    let state = Arc::new(AppState {
        config: Arc::new(cfg.clone()),
        gateway: Arc::new(gateway),
        history,
        index_html: index_html.into(),
    });

    // ── 6. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("compass-server stopped");
    Ok(())
}

/// Periodically drop sessions that have been idle longer than their TTL.
fn spawn_session_sweeper(history: Arc<InMemoryHistoryStore>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
        loop {
            ticker.tick().await;
            let purged = history.purge_expired(chrono::Utc::now());
            if purged > 0 {
                debug!(purged, remaining = history.len(), "expired sessions swept");
            }
        }
    });
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
