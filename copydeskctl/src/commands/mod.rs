pub mod access;
pub mod config;
pub mod export;
pub mod report;
pub mod users;

use std::env;

use anyhow::{Context, Result};
use backend::BackendClient;
use chrono::{DateTime, Utc};
use config_loader::ConfigManager;

/// Builds a client from the backend config file or `COPYDESK_*` variables.
pub fn connect() -> Result<BackendClient> {
    let manager = ConfigManager::new();
    let config = manager
        .load_backend()
        .with_context(|| format!("Failed to load backend config ({:?})", manager.config_path()))?;
    tracing::debug!(url = %config.url, "connecting to backend");
    BackendClient::new(&config).context("Invalid backend config")
}

/// clap value parser for RFC 3339 timestamps.
pub fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp ({})", e))
}

pub fn check_range(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Result<()> {
    if let (Some(f), Some(t)) = (from, to) {
        if f > t {
            anyhow::bail!("--from ({}) is after --to ({})", f.to_rfc3339(), t.to_rfc3339());
        }
    }
    Ok(())
}

pub fn should_use_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    atty::is(atty::Stream::Stdout)
}

pub fn format_tokens(tokens: Option<u64>) -> String {
    match tokens {
        None | Some(u64::MAX) => "unlimited".to_string(),
        Some(n) => n.to_string(),
    }
}

pub fn format_instant(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}
