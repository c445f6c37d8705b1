use jsonschema::{Draft, JSONSchema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

pub mod secrets;
pub use secrets::{
    redact_secrets_in_config, resolve_secrets_in_config, EnvFileSecretProvider, SecretError,
    SecretProvider,
};

/// JSON Schema every backend config document must satisfy, after secret
/// references have been resolved.
pub const BACKEND_CONFIG_SCHEMA: &str = r#"{
    "$schema": "http://json-schema.org/draft-07/schema#",
    "type": "object",
    "properties": {
        "url": { "type": "string", "pattern": "^https?://" },
        "apiKey": { "type": "string", "minLength": 1 },
        "jwtSecret": { "type": "string", "minLength": 1 },
        "timeout": { "type": "string", "default": "30s" },
        "connectTimeout": { "type": "string", "default": "10s" },
        "maxRetries": { "type": "integer", "minimum": 1, "maximum": 10, "default": 3 }
    },
    "required": ["url", "apiKey"],
    "additionalProperties": false
}"#;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    ConfigFileNotFound { path: String },

    #[error("Schema compilation failed: {message}")]
    SchemaCompilationFailed { message: String },

    #[error("Config validation failed ({} error(s))", errors.len())]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("JSON parsing failed: {message}")]
    JsonParsingFailed { message: String },

    #[error("IO error: {message}")]
    IoError { message: String },

    #[error("Secret resolution failed: {error}")]
    SecretResolutionFailed { error: SecretError },

    #[error("Invalid duration for {field}: {message}")]
    InvalidDuration { field: String, message: String },
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub json_pointer: String,
    pub message: String,
    pub schema_path: String,
}

/// Connection settings for the hosted backend (REST, auth, functions).
#[derive(Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub url: String,
    pub api_key: String,
    /// HS256 secret the backend signs access tokens with. Required by the
    /// admin server, optional for the CLI.
    pub jwt_secret: Option<String>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_retries: u32,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url)
            .field("api_key", &"***")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "***"))
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct RawBackendConfig {
    url: String,
    api_key: String,
    #[serde(default)]
    jwt_secret: Option<String>,
    #[serde(default = "default_timeout")]
    timeout: String,
    #[serde(default = "default_connect_timeout")]
    connect_timeout: String,
    #[serde(default = "default_max_retries")]
    max_retries: u32,
}

fn default_timeout() -> String {
    "30s".to_string()
}

fn default_connect_timeout() -> String {
    "10s".to_string()
}

fn default_max_retries() -> u32 {
    3
}

impl BackendConfig {
    /// Effective settings as JSON with credentials masked.
    pub fn redacted(&self) -> Value {
        let mut value = serde_json::json!({
            "url": self.url,
            "apiKey": self.api_key,
            "jwtSecret": self.jwt_secret,
            "timeout": humantime::format_duration(self.timeout).to_string(),
            "connectTimeout": humantime::format_duration(self.connect_timeout).to_string(),
            "maxRetries": self.max_retries,
        });
        redact_secrets_in_config(&mut value);
        value
    }

    fn from_raw(raw: RawBackendConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            url: raw.url.trim_end_matches('/').to_string(),
            api_key: raw.api_key,
            jwt_secret: raw.jwt_secret.filter(|s| !s.is_empty()),
            timeout: parse_duration("timeout", &raw.timeout)?,
            connect_timeout: parse_duration("connectTimeout", &raw.connect_timeout)?,
            max_retries: raw.max_retries,
        })
    }
}

fn parse_duration(field: &str, raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw).map_err(|e| ConfigError::InvalidDuration {
        field: field.to_string(),
        message: e.to_string(),
    })
}

pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config_path: Self::find_config_path(),
        }
    }

    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    fn find_config_path() -> PathBuf {
        if let Ok(path) = std::env::var("COPYDESK_CONFIG") {
            return PathBuf::from(path);
        }
        let local = PathBuf::from(".copydesk/backend.json");
        if local.exists() {
            return local;
        }
        dirs::config_dir()
            .map(|dir| dir.join("copydesk").join("backend.json"))
            .filter(|p| p.exists())
            .unwrap_or(local)
    }

    /// Loads the backend config from the config file when it exists, otherwise
    /// from `COPYDESK_*` environment variables.
    #[instrument(skip(self))]
    pub fn load_backend(&self) -> Result<BackendConfig, ConfigError> {
        self.load_backend_with_secrets(&EnvFileSecretProvider::new())
    }

    #[instrument(skip(self, provider))]
    pub fn load_backend_with_secrets<P: SecretProvider + ?Sized>(
        &self,
        provider: &P,
    ) -> Result<BackendConfig, ConfigError> {
        let mut value = if self.config_path.exists() {
            debug!("Loading backend config from {:?}", self.config_path);
            read_json(&self.config_path)?
        } else {
            debug!("No config file at {:?}, reading environment", self.config_path);
            backend_value_from_env()
        };

        resolve_secrets_in_config(&mut value, provider)
            .map_err(|e| ConfigError::SecretResolutionFailed { error: e })?;
        validate_backend_value(&value)?;

        let raw: RawBackendConfig =
            serde_json::from_value(value).map_err(|e| ConfigError::JsonParsingFailed {
                message: e.to_string(),
            })?;
        BackendConfig::from_raw(raw)
    }

    /// Validates an arbitrary file against the backend schema without loading it.
    pub fn validate_file(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate_file_with_secrets(path, &EnvFileSecretProvider::new())
    }

    #[instrument(skip(self, provider))]
    pub fn validate_file_with_secrets<P: SecretProvider + ?Sized>(
        &self,
        path: &Path,
        provider: &P,
    ) -> Result<(), ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigFileNotFound {
                path: path.to_string_lossy().to_string(),
            });
        }
        let mut value = read_json(path)?;
        resolve_secrets_in_config(&mut value, provider)
            .map_err(|e| ConfigError::SecretResolutionFailed { error: e })?;
        validate_backend_value(&value)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

fn read_json(path: &Path) -> Result<Value, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        message: format!("Failed to read config file: {}", e),
    })?;
    serde_json::from_str(&content).map_err(|e| ConfigError::JsonParsingFailed {
        message: e.to_string(),
    })
}

fn backend_value_from_env() -> Value {
    let mut obj = Map::new();
    let string_vars = [
        ("url", "COPYDESK_BACKEND_URL"),
        ("apiKey", "COPYDESK_API_KEY"),
        ("jwtSecret", "COPYDESK_JWT_SECRET"),
        ("timeout", "COPYDESK_HTTP_TIMEOUT"),
        ("connectTimeout", "COPYDESK_CONNECT_TIMEOUT"),
    ];
    for (field, var) in string_vars {
        if let Some(v) = std::env::var(var).ok().filter(|v| !v.trim().is_empty()) {
            obj.insert(field.to_string(), Value::String(v));
        }
    }
    if let Ok(raw) = std::env::var("COPYDESK_MAX_RETRIES") {
        // Non-numeric input is left as a string so schema validation reports it.
        let v = raw
            .trim()
            .parse::<u64>()
            .map(Value::from)
            .unwrap_or(Value::String(raw));
        obj.insert("maxRetries".to_string(), v);
    }
    Value::Object(obj)
}

fn validate_backend_value(config: &Value) -> Result<(), ConfigError> {
    let schema_value: Value =
        serde_json::from_str(BACKEND_CONFIG_SCHEMA).map_err(|e| ConfigError::JsonParsingFailed {
            message: e.to_string(),
        })?;
    let schema = JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&schema_value)
        .map_err(|e| ConfigError::SchemaCompilationFailed {
            message: e.to_string(),
        })?;

    if let Err(errors) = schema.validate(config) {
        let errors = errors
            .map(|error| ValidationError {
                json_pointer: error.instance_path.to_string(),
                message: error.to_string(),
                schema_path: error.schema_path.to_string(),
            })
            .collect();
        return Err(ConfigError::ValidationFailed { errors });
    }
    Ok(())
}
