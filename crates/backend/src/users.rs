use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};
use wards::Role;

use crate::client::BackendClient;
use crate::error::BackendError;
use crate::functions::{ADMIN_CREATE_USER, ADMIN_DELETE_USER};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Account creation request. Creating auth users needs the service role, so
/// it goes through a serverless function rather than the REST tables.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_allowed: Option<u64>,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

impl NewUser {
    pub fn validate(&self) -> Result<(), BackendError> {
        if self.email.trim().is_empty() || !self.email.contains('@') {
            return Err(BackendError::validation("a valid email is required"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(BackendError::validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if let (Some(start), Some(end)) = (self.subscription_start, self.subscription_end) {
            if start > end {
                return Err(BackendError::validation(
                    "subscriptionStart must not be after subscriptionEnd",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedUser {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
struct CreateUserResponse {
    user: CreatedUser,
}

pub struct Users<'a> {
    client: &'a BackendClient,
}

impl BackendClient {
    pub fn users(&self) -> Users<'_> {
        Users { client: self }
    }
}

impl Users<'_> {
    #[instrument(skip(self, user), fields(email = %user.email))]
    pub async fn create(&self, user: &NewUser) -> Result<CreatedUser, BackendError> {
        user.validate()?;
        let response: CreateUserResponse = self.client.invoke(ADMIN_CREATE_USER, user).await?;
        info!(user_id = %response.user.id, "Created user");
        Ok(response.user)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), BackendError> {
        if id.trim().is_empty() {
            return Err(BackendError::validation("user id is required"));
        }
        self.client
            .invoke_unit(ADMIN_DELETE_USER, &json!({ "userId": id }))
            .await?;
        info!(user_id = %id, "Deleted user");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: &str, password: &str) -> NewUser {
        NewUser {
            email: email.into(),
            password: password.into(),
            full_name: None,
            role: None,
            subscription_start: None,
            subscription_end: None,
            tokens_allowed: None,
        }
    }

    #[test]
    fn validation_rules() {
        assert!(user("a@example.com", "longenough").validate().is_ok());
        assert!(user("", "longenough").validate().is_err());
        assert!(user("not-an-email", "longenough").validate().is_err());
        assert!(user("a@example.com", "short").validate().is_err());
    }

    #[test]
    fn debug_hides_password() {
        let shown = format!("{:?}", user("a@example.com", "hunter2hunter2"));
        assert!(!shown.contains("hunter2"));
    }
}
