//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use compass_gateway::ModelGateway;

use crate::config::Config;
use crate::session::HistoryStore;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Upstream model.
    pub gateway: Arc<dyn ModelGateway>,
    /// Per-session conversation history.
    pub history: Arc<dyn HistoryStore>,
    /// Chat page, rendered once at startup.
    pub index_html: Arc<str>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}
