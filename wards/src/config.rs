use std::time::Duration;

use thiserror::Error;

/// Quota applied to principals whose record carries no `tokensAllowed`.
pub const UNLIMITED_TOKENS: u64 = u64::MAX;

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_DENIAL_MESSAGE: &str = "Access denied: your subscription has expired or your \
                                          token limit has been reached. Please contact support.";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is malformed: {message}")]
    Malformed { var: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Upper bound for each store read made during an evaluation.
    pub lookup_timeout: Duration,
    pub default_tokens_allowed: u64,
    /// Shown to end users for every denial, whichever gate failed.
    pub denial_message: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            default_tokens_allowed: UNLIMITED_TOKENS,
            denial_message: DEFAULT_DENIAL_MESSAGE.to_string(),
        }
    }
}

/// Reads `WARDS_LOOKUP_TIMEOUT` (humantime, e.g. `5s`),
/// `WARDS_DEFAULT_TOKENS_ALLOWED` and `WARDS_DENIAL_MESSAGE`.
pub fn load_from_env() -> Result<PolicyConfig, ConfigError> {
    let mut cfg = PolicyConfig::default();

    if let Some(raw) = non_empty_var("WARDS_LOOKUP_TIMEOUT") {
        let timeout =
            humantime::parse_duration(&raw).map_err(|e| ConfigError::Malformed {
                var: "WARDS_LOOKUP_TIMEOUT",
                message: e.to_string(),
            })?;
        if timeout.is_zero() {
            return Err(ConfigError::Malformed {
                var: "WARDS_LOOKUP_TIMEOUT",
                message: "must be greater than zero".to_string(),
            });
        }
        cfg.lookup_timeout = timeout;
    }

    if let Some(raw) = non_empty_var("WARDS_DEFAULT_TOKENS_ALLOWED") {
        cfg.default_tokens_allowed = match raw.to_ascii_lowercase().as_str() {
            "unlimited" => UNLIMITED_TOKENS,
            _ => raw.parse().map_err(|_| ConfigError::Malformed {
                var: "WARDS_DEFAULT_TOKENS_ALLOWED",
                message: format!("'{}' is not a non-negative integer", raw),
            })?,
        };
    }

    if let Some(raw) = non_empty_var("WARDS_DENIAL_MESSAGE") {
        cfg.denial_message = raw;
    }

    Ok(cfg)
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
