use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::model::AccessDecision;
use crate::policy::AccessPolicy;
use crate::store::{Credentials, IdentityError, IdentityProvider, Session};

#[derive(Error, Debug)]
pub enum GateError {
    #[error("sign-in failed: {0}")]
    SignIn(#[from] IdentityError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum LoginOutcome {
    Admitted {
        session: Session,
        decision: AccessDecision,
    },
    /// The session was signed out again; the decision explains why.
    Denied { decision: AccessDecision },
    NoSession,
}

impl LoginOutcome {
    pub fn is_admitted(&self) -> bool {
        matches!(self, LoginOutcome::Admitted { .. })
    }

    pub fn decision(&self) -> Option<&AccessDecision> {
        match self {
            LoginOutcome::Admitted { decision, .. } | LoginOutcome::Denied { decision } => {
                Some(decision)
            }
            LoginOutcome::NoSession => None,
        }
    }
}

/// Runs the access policy on every explicit login and every session restore,
/// signing the session out again when access is denied.
pub struct LoginGate<I: IdentityProvider + ?Sized> {
    identity: Arc<I>,
    policy: Arc<AccessPolicy>,
}

impl<I: IdentityProvider + ?Sized> LoginGate<I> {
    pub fn new(identity: Arc<I>, policy: Arc<AccessPolicy>) -> Self {
        Self { identity, policy }
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome, GateError> {
        let session = self.identity.sign_in(credentials).await?;
        Ok(self.admit(session).await)
    }

    pub async fn restore(&self) -> Result<LoginOutcome, GateError> {
        match self.identity.current_session().await? {
            Some(session) => Ok(self.admit(session).await),
            None => Ok(LoginOutcome::NoSession),
        }
    }

    async fn admit(&self, session: Session) -> LoginOutcome {
        let decision = self
            .policy
            .check_access(&session.principal.id, &session.principal.email)
            .await;

        if decision.granted {
            info!(principal = %session.principal.id, "session admitted");
            return LoginOutcome::Admitted { session, decision };
        }

        if let Err(e) = self.identity.sign_out().await {
            warn!(principal = %session.principal.id, error = %e, "forced sign-out failed");
        }
        LoginOutcome::Denied { decision }
    }
}
