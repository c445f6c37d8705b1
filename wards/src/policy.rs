use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::config::PolicyConfig;
use crate::model::{AccessDecision, DenialKind, Principal, GRANTED_REASON};
use crate::store::{PrincipalStore, UsageLedger};
use crate::window::SubscriptionWindow;

/// Decides whether a principal may use the product right now.
///
/// Two gates are evaluated: the subscription window and the token quota
/// within that window. Principal lookup failures deny access; usage ledger
/// failures let the quota gate pass.
pub struct AccessPolicy {
    principals: Arc<dyn PrincipalStore>,
    usage: Arc<dyn UsageLedger>,
    cfg: PolicyConfig,
}

enum PrincipalFetch {
    Found(Principal),
    Missing,
    Failed(String),
}

impl AccessPolicy {
    pub fn new(
        principals: Arc<dyn PrincipalStore>,
        usage: Arc<dyn UsageLedger>,
        cfg: PolicyConfig,
    ) -> Self {
        Self {
            principals,
            usage,
            cfg,
        }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.cfg
    }

    pub async fn check_access(&self, principal_id: &str, email: &str) -> AccessDecision {
        self.check_access_at(principal_id, email, Utc::now()).await
    }

    #[instrument(skip(self, now), fields(principal = %principal_id, email = %email))]
    pub async fn check_access_at(
        &self,
        principal_id: &str,
        email: &str,
        now: DateTime<Utc>,
    ) -> AccessDecision {
        if principal_id.trim().is_empty() || email.trim().is_empty() {
            warn!("access check rejected: principal id and email are required");
            return self.deny(DenialKind::InvalidInput, now, self.cfg.default_tokens_allowed);
        }

        let principal = match self.fetch_principal(principal_id).await {
            PrincipalFetch::Found(p) => p,
            PrincipalFetch::Missing => {
                warn!("access denied: no principal record");
                return self.deny(
                    DenialKind::PrincipalLookupFailure,
                    now,
                    self.cfg.default_tokens_allowed,
                );
            }
            PrincipalFetch::Failed(message) => {
                warn!(error = %message, "access denied: principal lookup failed");
                return self.deny(
                    DenialKind::PrincipalLookupFailure,
                    now,
                    self.cfg.default_tokens_allowed,
                );
            }
        };

        let tokens_allowed = principal
            .tokens_allowed
            .unwrap_or(self.cfg.default_tokens_allowed);
        let window =
            SubscriptionWindow::new(principal.subscription_start, principal.subscription_end);

        if !window.is_valid_at(now) {
            warn!(
                start = ?window.start,
                end = ?window.end,
                "access denied: subscription not valid"
            );
            return self.deny(DenialKind::SubscriptionExpired, now, tokens_allowed);
        }

        let (from, to) = window.usage_range();
        let usage = timeout(
            self.cfg.lookup_timeout,
            self.usage.sum_usage(&principal.id, from, to),
        )
        .await;
        let (tokens_used, degraded) = match usage {
            Ok(Ok(sum)) => (sum, false),
            Ok(Err(e)) => {
                warn!(error = %e, "usage lookup failed; quota gate passes");
                (0, true)
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.cfg.lookup_timeout.as_millis() as u64,
                    "usage lookup timed out; quota gate passes"
                );
                (0, true)
            }
        };

        let within_quota = degraded || tokens_used <= tokens_allowed;
        if !within_quota {
            warn!(tokens_used, tokens_allowed, "access denied: quota exceeded");
            let mut decision = self.deny(DenialKind::QuotaExceeded, now, tokens_allowed);
            decision.subscription_valid = true;
            decision.tokens_used_in_period = tokens_used;
            return decision;
        }

        info!(tokens_used, tokens_allowed, degraded, "access granted");
        AccessDecision {
            granted: true,
            reason: GRANTED_REASON.to_string(),
            evaluated_at: now,
            subscription_valid: true,
            within_quota: true,
            tokens_used_in_period: tokens_used,
            tokens_allowed,
            denial: None,
            usage_lookup_degraded: degraded,
        }
    }

    /// Admin capability check. Anything short of a readable admin record is
    /// treated as "not an admin".
    #[instrument(skip(self))]
    pub async fn is_admin(&self, principal_id: &str) -> bool {
        if principal_id.trim().is_empty() {
            return false;
        }
        match self.fetch_principal(principal_id).await {
            PrincipalFetch::Found(p) => {
                debug!(role = %p.role, "resolved principal role");
                p.is_admin()
            }
            PrincipalFetch::Missing => false,
            PrincipalFetch::Failed(message) => {
                warn!(error = %message, "role lookup failed");
                false
            }
        }
    }

    async fn fetch_principal(&self, principal_id: &str) -> PrincipalFetch {
        match timeout(
            self.cfg.lookup_timeout,
            self.principals.get_principal(principal_id),
        )
        .await
        {
            Ok(Ok(Some(p))) => PrincipalFetch::Found(p),
            Ok(Ok(None)) => PrincipalFetch::Missing,
            Ok(Err(e)) => PrincipalFetch::Failed(e.to_string()),
            Err(_) => PrincipalFetch::Failed(format!(
                "timed out after {}ms",
                self.cfg.lookup_timeout.as_millis()
            )),
        }
    }

    fn deny(&self, kind: DenialKind, now: DateTime<Utc>, tokens_allowed: u64) -> AccessDecision {
        AccessDecision::denied(kind, &self.cfg.denial_message, now, tokens_allowed)
    }
}
