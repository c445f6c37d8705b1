use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Capability level of a principal. Admin routes require [`Role::Admin`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// An account subject to the access policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub email: String,
    #[serde(rename = "subscriptionStart", default)]
    pub subscription_start: Option<DateTime<Utc>>,
    #[serde(rename = "subscriptionEnd", default)]
    pub subscription_end: Option<DateTime<Utc>>,
    /// `None` means no quota was configured for this account.
    #[serde(rename = "tokensAllowed", default)]
    pub tokens_allowed: Option<u64>,
    #[serde(default)]
    pub role: Role,
}

impl Principal {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            subscription_start: None,
            subscription_end: None,
            tokens_allowed: None,
            role: Role::User,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// One billable operation in the usage ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    #[serde(rename = "principalId")]
    pub principal_id: String,
    #[serde(rename = "tokensUsed")]
    pub tokens_used: u64,
    #[serde(rename = "occurredAt")]
    pub occurred_at: DateTime<Utc>,
}

/// Why an access check was denied. Only ever logged or returned to admins;
/// end users see the generic denial message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    InvalidInput,
    PrincipalLookupFailure,
    SubscriptionExpired,
    QuotaExceeded,
}

impl std::fmt::Display for DenialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DenialKind::InvalidInput => "invalid_input",
            DenialKind::PrincipalLookupFailure => "principal_lookup_failure",
            DenialKind::SubscriptionExpired => "subscription_expired",
            DenialKind::QuotaExceeded => "quota_exceeded",
        };
        f.write_str(s)
    }
}

/// Outcome of a single access evaluation. Recomputed on every check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub granted: bool,
    pub reason: String,
    #[serde(rename = "evaluatedAt")]
    pub evaluated_at: DateTime<Utc>,
    #[serde(rename = "subscriptionValid")]
    pub subscription_valid: bool,
    #[serde(rename = "withinQuota")]
    pub within_quota: bool,
    #[serde(rename = "tokensUsedInPeriod")]
    pub tokens_used_in_period: u64,
    #[serde(rename = "tokensAllowed")]
    pub tokens_allowed: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub denial: Option<DenialKind>,
    /// Set when the usage ledger could not be read and the quota gate passed
    /// without data.
    #[serde(rename = "usageLookupDegraded", default)]
    pub usage_lookup_degraded: bool,
}

pub const GRANTED_REASON: &str = "access granted";

impl AccessDecision {
    pub(crate) fn denied(
        kind: DenialKind,
        message: &str,
        evaluated_at: DateTime<Utc>,
        tokens_allowed: u64,
    ) -> Self {
        Self {
            granted: false,
            reason: message.to_string(),
            evaluated_at,
            subscription_valid: false,
            within_quota: false,
            tokens_used_in_period: 0,
            tokens_allowed,
            denial: Some(kind),
            usage_lookup_degraded: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_is_case_insensitive() {
        assert_eq!(Role::parse("Admin"), Some(Role::Admin));
        assert_eq!(Role::parse(" user "), Some(Role::User));
        assert_eq!(Role::parse("owner"), None);
    }

    #[test]
    fn decision_serializes_camel_case_and_hides_empty_denial() {
        let d = AccessDecision {
            granted: true,
            reason: GRANTED_REASON.to_string(),
            evaluated_at: Utc::now(),
            subscription_valid: true,
            within_quota: true,
            tokens_used_in_period: 10,
            tokens_allowed: 100,
            denial: None,
            usage_lookup_degraded: false,
        };
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v["tokensUsedInPeriod"], 10);
        assert_eq!(v["subscriptionValid"], true);
        assert!(v.get("denial").is_none());
    }

    #[test]
    fn principal_defaults_missing_fields() {
        let p: Principal =
            serde_json::from_str(r#"{"id":"u1","email":"a@example.com"}"#).unwrap();
        assert_eq!(p.role, Role::User);
        assert!(p.tokens_allowed.is_none());
        assert!(p.subscription_end.is_none());
    }
}
