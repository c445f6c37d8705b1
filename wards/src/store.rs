//! Seams between the access policy and the data it reads.
//!
//! The policy never talks to a database directly; the composition root hands
//! it implementations of these traits (the hosted backend in production, the
//! [`crate::memory`] stores in tests).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use crate::model::Principal;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("store unavailable: {message}")]
    Unavailable { message: String },

    #[error("store returned an invalid record: {message}")]
    InvalidRecord { message: String },
}

#[async_trait]
pub trait PrincipalStore: Send + Sync {
    async fn get_principal(&self, id: &str) -> Result<Option<Principal>, LookupError>;
}

#[async_trait]
pub trait UsageLedger: Send + Sync {
    /// Sum of tokens used by `principal_id` with `from <= occurred_at <= to`.
    /// A `None` bound leaves that side of the range open.
    async fn sum_usage(
        &self,
        principal_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<u64, LookupError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPrincipal {
    pub id: String,
    pub email: String,
}

/// An authenticated session as issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "refreshToken", default)]
    pub refresh_token: Option<String>,
    #[serde(rename = "expiresAt", default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub principal: SessionPrincipal,
}

#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("identity provider unavailable: {message}")]
    Unavailable { message: String },

    #[error("no active session")]
    NoSession,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_session(&self) -> Result<Option<Session>, IdentityError>;

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, IdentityError>;

    async fn sign_out(&self) -> Result<(), IdentityError>;

    /// Every sign-in, sign-out and restore is published on this channel.
    fn on_session_change(&self) -> watch::Receiver<Option<Session>>;
}
