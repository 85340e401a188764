//! Server configuration, loaded from environment variables at startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use compass_gateway::GeminiConfig;
use compass_gateway::gemini::DEFAULT_API_BASE;
use thiserror::Error;

use crate::prompt::COMPANY_CONTEXT;

/// Raised when the environment cannot produce a usable [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,

    #[error("failed to read company context from {path}: {source}")]
    ContextFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Runtime configuration for compass-server.
///
/// Only the API key is mandatory; every other field has a default.
#[derive(Clone)]
pub struct Config {
    /// TCP address to bind (default: `"127.0.0.1:5000"`).
    pub bind_address: String,

    /// Credential for the Generative Language API.
    pub api_key: String,

    /// Model identifier (default: `"gemini-2.5-flash"`).
    pub model: String,

    /// Base URL of the model API.
    pub api_base: String,

    /// Preamble placed at the top of every prompt.
    pub company_context: String,

    /// Idle lifetime of a browser session.
    pub session_ttl: Duration,

    /// Comma-separated CORS origins; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let company_context = match std::env::var_os("COMPASS_CONTEXT_FILE") {
            Some(path) => {
                let path = PathBuf::from(path);
                std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::ContextFile { path, source })?
            }
            None => COMPANY_CONTEXT.to_owned(),
        };

        Ok(Self {
            bind_address: env_or("COMPASS_BIND", "127.0.0.1:5000"),
            api_key,
            model: env_or("COMPASS_MODEL", "gemini-2.5-flash"),
            api_base: env_or("COMPASS_API_BASE", DEFAULT_API_BASE),
            company_context,
            session_ttl: Duration::from_secs(parse_env("COMPASS_SESSION_TTL_SECS", 2 * 60 * 60)),
            cors_allowed_origins: std::env::var("COMPASS_CORS_ORIGINS").ok(),
            log_level: env_or("COMPASS_LOG", "info"),
            log_json: std::env::var("COMPASS_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }

    /// Connection settings handed to the model gateway.
    pub fn gemini(&self) -> GeminiConfig {
        GeminiConfig {
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            api_base: self.api_base.clone(),
        }
    }
}

/// Load a dotenv file into the process environment.
///
/// With no `path`, `.env` is searched for from the working directory upward.
/// Variables already set in the environment are left untouched.  Returns the
/// file that was read, or `None` when there was nothing to load.
pub fn load_env_file(path: Option<&Path>) -> Option<PathBuf> {
    match path {
        Some(path) => dotenvy::from_path(path).ok().map(|_| path.to_path_buf()),
        None => dotenvy::dotenv().ok(),
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("company_context_len", &self.company_context.len())
            .field("session_ttl", &self.session_ttl)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("log_level", &self.log_level)
            .field("log_json", &self.log_json)
            .finish()
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn env_file_populates_missing_variables() {
        let key = format!("COMPASS_DOTENV_{}", uuid::Uuid::new_v4().simple());
        let path = std::env::temp_dir().join(format!("{key}.env"));
        std::fs::write(&path, format!("{key}=from-file\n")).unwrap();

        assert_eq!(load_env_file(Some(&path)), Some(path.clone()));
        assert_eq!(std::env::var(&key).unwrap(), "from-file");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_env_file_is_not_an_error() {
        let path = std::env::temp_dir().join(format!("{}.env", uuid::Uuid::new_v4()));
        assert_eq!(load_env_file(Some(&path)), None);
    }
}
