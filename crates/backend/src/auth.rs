//! Password sign-in against the backend's auth endpoints.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use wards::{Credentials, IdentityError, IdentityProvider, Session, SessionPrincipal};

use crate::client::BackendClient;
use crate::error::BackendError;

const TOKEN_PATH: &str = "/auth/v1/token";
const LOGOUT_PATH: &str = "/auth/v1/logout";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl TokenResponse {
    fn into_session(self, fallback_email: &str) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .or_else(|| {
                self.expires_in
                    .map(|secs| Utc::now() + chrono::Duration::seconds(secs))
            });
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            principal: SessionPrincipal {
                id: self.user.id,
                email: self
                    .user
                    .email
                    .unwrap_or_else(|| fallback_email.to_string()),
            },
        }
    }
}

/// Holds at most one session and publishes every change on a watch channel.
pub struct SessionManager {
    client: Arc<BackendClient>,
    state: watch::Sender<Option<Session>>,
}

impl SessionManager {
    pub fn new(client: Arc<BackendClient>) -> Self {
        let (state, _) = watch::channel(None);
        Self { client, state }
    }

    /// Starts from a session obtained elsewhere, such as a bearer token
    /// presented to the admin API.
    pub fn with_session(client: Arc<BackendClient>, session: Session) -> Self {
        let (state, _) = watch::channel(Some(session));
        Self { client, state }
    }

    /// Exchanges the current refresh token for a new session.
    pub async fn refresh(&self) -> Result<Session, IdentityError> {
        let current = self.state.borrow().clone().ok_or(IdentityError::NoSession)?;
        let refresh_token = current.refresh_token.ok_or(IdentityError::NoSession)?;

        let request = self
            .client
            .request(Method::POST, TOKEN_PATH, None)
            .map_err(unavailable)?
            .query(&[("grant_type", "refresh_token")]);
        let response: TokenResponse = self
            .client
            .send_json(request, &json!({ "refresh_token": refresh_token }))
            .await
            .map_err(|e| match e {
                BackendError::AuthFailed { .. } | BackendError::Validation { .. } => {
                    IdentityError::NoSession
                }
                other => unavailable(other),
            })?;

        let session = response.into_session(&current.principal.email);
        self.state.send_replace(Some(session.clone()));
        Ok(session)
    }
}

fn unavailable(e: BackendError) -> IdentityError {
    IdentityError::Unavailable {
        message: e.to_string(),
    }
}

#[async_trait]
impl IdentityProvider for SessionManager {
    async fn current_session(&self) -> Result<Option<Session>, IdentityError> {
        Ok(self.state.borrow().clone())
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, IdentityError> {
        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            return Err(IdentityError::InvalidCredentials);
        }
        let request = self
            .client
            .request(Method::POST, TOKEN_PATH, None)
            .map_err(unavailable)?
            .query(&[("grant_type", "password")]);
        let body = json!({
            "email": credentials.email,
            "password": credentials.password,
        });

        let response: TokenResponse =
            self.client
                .send_json(request, &body)
                .await
                .map_err(|e| match e {
                    // The auth endpoint answers bad passwords with 400 invalid_grant.
                    BackendError::AuthFailed { .. } | BackendError::Validation { .. } => {
                        IdentityError::InvalidCredentials
                    }
                    other => unavailable(other),
                })?;

        let session = response.into_session(&credentials.email);
        info!(email = %session.principal.email, "Signed in");
        self.state.send_replace(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        let Some(session) = self.state.send_replace(None) else {
            debug!("Sign-out with no active session");
            return Ok(());
        };

        let request = self
            .client
            .request(Method::POST, LOGOUT_PATH, Some(&session.access_token))
            .map_err(unavailable)?;
        match self.client.send_empty(request).await {
            Ok(()) => Ok(()),
            // An already revoked token is as signed out as it gets.
            Err(BackendError::AuthFailed { .. }) | Err(BackendError::NotFound { .. }) => Ok(()),
            Err(e) => {
                warn!(email = %session.principal.email, error = %e, "Remote sign-out failed");
                Err(unavailable(e))
            }
        }
    }

    fn on_session_change(&self) -> watch::Receiver<Option<Session>> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_in_is_used_when_expires_at_is_absent() {
        let before = Utc::now();
        let response: TokenResponse = serde_json::from_value(json!({
            "access_token": "a",
            "expires_in": 3600,
            "user": { "id": "u1" }
        }))
        .unwrap();
        let session = response.into_session("fallback@example.com");
        assert_eq!(session.principal.email, "fallback@example.com");
        let expires = session.expires_at.unwrap();
        assert!(expires >= before + chrono::Duration::seconds(3599));
    }

    #[test]
    fn expires_at_epoch_seconds_are_decoded() {
        let response: TokenResponse = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_at": 1_718_452_800,
            "user": { "id": "u1", "email": "u1@example.com" }
        }))
        .unwrap();
        let session = response.into_session("ignored@example.com");
        assert_eq!(
            session.expires_at,
            Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).single()
        );
        assert_eq!(session.refresh_token.as_deref(), Some("r"));
        assert_eq!(session.principal.email, "u1@example.com");
    }
}
