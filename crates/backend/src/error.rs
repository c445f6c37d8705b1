use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend request failed: {message}")]
    RequestFailed { message: String },

    #[error("Backend authentication failed: {message}")]
    AuthFailed { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Invalid request: {message}")]
    Validation { message: String },

    #[error("Invalid backend response: {message}")]
    InvalidResponse { message: String },

    #[error("Backend configuration error: {message}")]
    Config { message: String },
}

/// Error body shapes returned by the REST, auth and functions endpoints.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

const UNIQUE_VIOLATION: &str = "23505";

impl BackendError {
    pub fn validation(message: impl Into<String>) -> Self {
        BackendError::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        BackendError::NotFound {
            message: message.into(),
        }
    }

    /// Maps a non-success response to an error. `body` is the raw response text.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let detail = parsed
            .error_description
            .or(parsed.message)
            .or(parsed.msg)
            .or(parsed.error)
            .unwrap_or_else(|| status.to_string());
        let code = parsed.code.map(|c| match c {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });

        if code.as_deref() == Some(UNIQUE_VIOLATION) || status == StatusCode::CONFLICT {
            return BackendError::Conflict { message: detail };
        }
        match status.as_u16() {
            401 | 403 => BackendError::AuthFailed { message: detail },
            404 => BackendError::NotFound { message: detail },
            400..=499 => BackendError::Validation { message: detail },
            _ => BackendError::RequestFailed {
                message: format!("Server error {}: {}", status.as_u16(), detail),
            },
        }
    }

    /// Transport failures and 5xx responses may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BackendError::RequestFailed { .. })
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::InvalidResponse {
                message: e.to_string(),
            }
        } else {
            BackendError::RequestFailed {
                message: format!("HTTP request failed: {}", e),
            }
        }
    }
}
