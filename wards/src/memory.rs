//! In-process stores.
//!
//! Used by tests across the workspace and by anything that needs an
//! [`AccessPolicy`](crate::policy::AccessPolicy) without a backend. Each store
//! counts lookups and can be told to fail or stall, which is how the
//! fail-open/fail-closed behaviour is exercised.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::model::{Principal, UsageRecord};
use crate::store::{
    Credentials, IdentityError, IdentityProvider, LookupError, PrincipalStore, Session,
    SessionPrincipal, UsageLedger,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct FaultInjection {
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
    lookups: AtomicUsize,
}

impl FaultInjection {
    async fn enter(&self, what: &str) -> Result<(), LookupError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.delay);
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(LookupError::Unavailable {
                message: format!("{what} unavailable (injected)"),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPrincipalStore {
    principals: Mutex<HashMap<String, Principal>>,
    faults: FaultInjection,
}

impl InMemoryPrincipalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, principal: Principal) {
        lock(&self.principals).insert(principal.id.clone(), principal);
    }

    pub fn fail_lookups(&self, fail: bool) {
        self.faults.fail.store(fail, Ordering::SeqCst);
    }

    pub fn delay_lookups(&self, delay: Option<Duration>) {
        *lock(&self.faults.delay) = delay;
    }

    pub fn lookups(&self) -> usize {
        self.faults.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PrincipalStore for InMemoryPrincipalStore {
    async fn get_principal(&self, id: &str) -> Result<Option<Principal>, LookupError> {
        self.faults.enter("principal store").await?;
        Ok(lock(&self.principals).get(id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryUsageLedger {
    records: Mutex<Vec<UsageRecord>>,
    faults: FaultInjection,
}

impl InMemoryUsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, principal_id: &str, tokens_used: u64, occurred_at: DateTime<Utc>) {
        lock(&self.records).push(UsageRecord {
            principal_id: principal_id.to_string(),
            tokens_used,
            occurred_at,
        });
    }

    pub fn fail_lookups(&self, fail: bool) {
        self.faults.fail.store(fail, Ordering::SeqCst);
    }

    pub fn delay_lookups(&self, delay: Option<Duration>) {
        *lock(&self.faults.delay) = delay;
    }

    pub fn lookups(&self) -> usize {
        self.faults.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UsageLedger for InMemoryUsageLedger {
    async fn sum_usage(
        &self,
        principal_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<u64, LookupError> {
        self.faults.enter("usage ledger").await?;
        let total = lock(&self.records)
            .iter()
            .filter(|r| r.principal_id == principal_id)
            .filter(|r| from.map_or(true, |f| r.occurred_at >= f))
            .filter(|r| to.map_or(true, |t| r.occurred_at <= t))
            .fold(0u64, |acc, r| acc.saturating_add(r.tokens_used));
        Ok(total)
    }
}

struct Account {
    id: String,
    password: String,
}

/// Password-checking identity provider holding a single current session.
pub struct InMemoryIdentity {
    accounts: Mutex<HashMap<String, Account>>,
    session: watch::Sender<Option<Session>>,
    sign_outs: AtomicUsize,
    issued: AtomicUsize,
}

impl Default for InMemoryIdentity {
    fn default() -> Self {
        let (session, _) = watch::channel(None);
        Self {
            accounts: Mutex::new(HashMap::new()),
            session,
            sign_outs: AtomicUsize::new(0),
            issued: AtomicUsize::new(0),
        }
    }
}

impl InMemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_account(&self, id: &str, email: &str, password: &str) {
        lock(&self.accounts).insert(
            email.to_ascii_lowercase(),
            Account {
                id: id.to_string(),
                password: password.to_string(),
            },
        );
    }

    /// Installs a session as if it had been restored from storage.
    pub fn restore(&self, session: Session) {
        self.session.send_replace(Some(session));
    }

    pub fn sign_outs(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentity {
    async fn current_session(&self) -> Result<Option<Session>, IdentityError> {
        Ok(self.session.borrow().clone())
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, IdentityError> {
        let email = credentials.email.to_ascii_lowercase();
        let id = {
            let accounts = lock(&self.accounts);
            match accounts.get(&email) {
                Some(acct) if acct.password == credentials.password => acct.id.clone(),
                _ => return Err(IdentityError::InvalidCredentials),
            }
        };
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let session = Session {
            access_token: format!("access-{id}-{n}"),
            refresh_token: Some(format!("refresh-{id}-{n}")),
            expires_at: None,
            principal: SessionPrincipal { id, email },
        };
        self.session.send_replace(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        self.session.send_replace(None);
        Ok(())
    }

    fn on_session_change(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }
}
