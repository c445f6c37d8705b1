use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

static SECRET_URI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^secret://([^/]+)/(.+)$").expect("secret uri pattern compiles"));

const SENSITIVE_KEY_PARTS: &[&str] = &["password", "secret", "token", "key"];

#[derive(Error, Debug)]
pub enum SecretError {
    #[error("Secret not found: {scope}/{key}")]
    SecretNotFound { scope: String, key: String },

    #[error("Failed to read secrets file: {path} - {message}")]
    SecretsFileError { path: String, message: String },

    #[error("Failed to parse secrets file: {message}")]
    SecretsParseError { message: String },
}

pub trait SecretProvider: Send + Sync {
    fn resolve(&self, scope: &str, key: &str) -> Result<String, SecretError>;
}

/// Resolves `secret://scope/key` references from `SECRET_<SCOPE>_<KEY>`
/// environment variables first, then from a JSON file shaped
/// `{ "<scope>": { "<key>": "<value>" } }`.
pub struct EnvFileSecretProvider {
    secrets_file_path: Option<PathBuf>,
    cached_secrets: OnceCell<HashMap<String, HashMap<String, String>>>,
}

impl EnvFileSecretProvider {
    pub fn new() -> Self {
        let secrets_file_path = env::var("COPYDESK_SECRETS_FILE")
            .map(PathBuf::from)
            .ok()
            .or_else(|| {
                let default_path = PathBuf::from(".copydesk/secrets.json");
                default_path.exists().then_some(default_path)
            });

        Self {
            secrets_file_path,
            cached_secrets: OnceCell::new(),
        }
    }

    pub fn with_secrets_file<P: Into<PathBuf>>(secrets_file_path: P) -> Self {
        Self {
            secrets_file_path: Some(secrets_file_path.into()),
            cached_secrets: OnceCell::new(),
        }
    }

    fn load_secrets_from_file(
        &self,
    ) -> Result<HashMap<String, HashMap<String, String>>, SecretError> {
        let Some(ref path) = self.secrets_file_path else {
            return Ok(HashMap::new());
        };
        debug!("Loading secrets from file: {:?}", path);

        let content = fs::read_to_string(path).map_err(|e| SecretError::SecretsFileError {
            path: path.to_string_lossy().to_string(),
            message: e.to_string(),
        })?;
        let parsed: HashMap<String, HashMap<String, Value>> = serde_json::from_str(&content)
            .map_err(|e| SecretError::SecretsParseError {
                message: e.to_string(),
            })?;

        let mut secrets = HashMap::new();
        for (scope, entries) in parsed {
            let mut scope_secrets = HashMap::new();
            for (key, value) in entries {
                match value {
                    Value::String(s) => {
                        scope_secrets.insert(key, s);
                    }
                    other => warn!(
                        "Ignoring non-string secret {}/{} ({})",
                        scope,
                        key,
                        kind_of(&other)
                    ),
                }
            }
            secrets.insert(scope, scope_secrets);
        }
        Ok(secrets)
    }

    fn cached(&self) -> &HashMap<String, HashMap<String, String>> {
        self.cached_secrets.get_or_init(|| {
            self.load_secrets_from_file().unwrap_or_else(|e| {
                warn!("Failed to load secrets from file: {}", e);
                HashMap::new()
            })
        })
    }
}

impl SecretProvider for EnvFileSecretProvider {
    fn resolve(&self, scope: &str, key: &str) -> Result<String, SecretError> {
        let env_var_name = format!(
            "SECRET_{}_{}",
            scope.to_uppercase().replace('-', "_"),
            key.to_uppercase().replace('-', "_")
        );
        if let Ok(value) = env::var(&env_var_name) {
            debug!("Resolved secret {}/{} from {}", scope, key, env_var_name);
            return Ok(value);
        }

        if let Some(value) = self.cached().get(scope).and_then(|s| s.get(key)) {
            debug!("Resolved secret {}/{} from secrets file", scope, key);
            return Ok(value.clone());
        }

        Err(SecretError::SecretNotFound {
            scope: scope.to_string(),
            key: key.to_string(),
        })
    }
}

impl Default for EnvFileSecretProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Replaces every `secret://scope/key` string in `config`, at any depth.
pub fn resolve_secrets_in_config<P: SecretProvider + ?Sized>(
    config: &mut Value,
    provider: &P,
) -> Result<(), SecretError> {
    match config {
        Value::String(s) => {
            if let Some(captures) = SECRET_URI.captures(s) {
                let resolved = provider.resolve(&captures[1], &captures[2])?;
                *s = resolved;
            }
        }
        Value::Object(obj) => {
            for v in obj.values_mut() {
                resolve_secrets_in_config(v, provider)?;
            }
        }
        Value::Array(arr) => {
            for item in arr.iter_mut() {
                resolve_secrets_in_config(item, provider)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Masks values under sensitive-looking keys, for printing effective config.
pub fn redact_secrets_in_config(config: &mut Value) {
    match config {
        Value::Object(obj) => {
            for (key, v) in obj.iter_mut() {
                let lower = key.to_lowercase();
                if SENSITIVE_KEY_PARTS.iter().any(|part| lower.contains(part)) {
                    if let Value::String(s) = v {
                        *s = "***".to_string();
                    }
                } else {
                    redact_secrets_in_config(v);
                }
            }
        }
        Value::Array(arr) => {
            for item in arr.iter_mut() {
                redact_secrets_in_config(item);
            }
        }
        _ => {}
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
