use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    /// Directory for persistent state (SQLite database).
    /// Defaults to current working directory.
    pub state_dir: PathBuf,
    /// Bound on each store round-trip; expiry surfaces as a 500.
    pub store_timeout: Duration,
    /// Base URL for the approval links embedded in notifications.
    /// If not set, notifications carry the raw token only.
    pub approval_base_url: Option<String>,
    /// Webhook URL for the delivery channel. If not set, notifications
    /// go to the service log instead.
    pub notify_webhook_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        let state_dir = env::var("STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let store_timeout_ms = env::var("STORE_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse::<u64>()
            .context("STORE_TIMEOUT_MS must be a valid number")?;

        let approval_base_url = parse_optional_url(env::var("APPROVAL_BASE_URL").ok());
        let notify_webhook_url = parse_optional_url(env::var("NOTIFY_WEBHOOK_URL").ok());

        Ok(Config {
            port,
            state_dir,
            store_timeout: Duration::from_millis(store_timeout_ms),
            approval_base_url,
            notify_webhook_url,
        })
    }
}

/// Parse an optional URL from an environment value.
///
/// Returns None if the value is missing, empty, or contains only
/// whitespace, so an accidentally blank variable behaves like an unset
/// one.
pub fn parse_optional_url(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
