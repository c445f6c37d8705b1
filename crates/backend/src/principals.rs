use async_trait::async_trait;
use tracing::{debug, instrument};
use wards::{LookupError, Principal, PrincipalStore, Role};

use crate::client::BackendClient;
use crate::error::BackendError;
use crate::models::{PrincipalUpdate, UserProfile, PROFILES};
use crate::rest::{effective_limit, Order, Query};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrincipalFilter {
    /// Case-insensitive match on email or full name.
    pub search: Option<String>,
    pub role: Option<Role>,
    pub limit: Option<u32>,
}

/// Admin view of the `profiles` table.
pub struct Principals<'a> {
    client: &'a BackendClient,
}

impl BackendClient {
    pub fn principals(&self) -> Principals<'_> {
        Principals { client: self }
    }
}

impl PrincipalFilter {
    fn query(&self) -> Query {
        let mut query = Query::new();
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            query = query.search_any(&["email", "full_name"], search);
        }
        if let Some(role) = self.role {
            query = query.eq("role", role.to_string());
        }
        query.order("created_at", Order::Desc)
    }
}

impl Principals<'_> {
    /// Newest first, at most `filter.limit` rows.
    #[instrument(skip(self))]
    pub async fn list(&self, filter: &PrincipalFilter) -> Result<Vec<UserProfile>, BackendError> {
        let query = filter.query().limit(effective_limit(filter.limit));
        self.client.select(PROFILES, &query).await
    }

    /// Every profile matching `filter`; `filter.limit` is ignored.
    #[instrument(skip(self))]
    pub async fn list_all(
        &self,
        filter: &PrincipalFilter,
    ) -> Result<Vec<UserProfile>, BackendError> {
        let query = filter.query().order("id", Order::Asc);
        self.client.select_all(PROFILES, &query).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<UserProfile>, BackendError> {
        self.client
            .select_one(PROFILES, &Query::new().eq("id", id))
            .await
    }

    #[instrument(skip(self, update))]
    pub async fn update(
        &self,
        id: &str,
        update: &PrincipalUpdate,
    ) -> Result<UserProfile, BackendError> {
        if update.is_empty() {
            return Err(BackendError::validation("update has no fields"));
        }
        if let (Some(start), Some(end)) = (update.subscription_start, update.subscription_end) {
            if start > end {
                return Err(BackendError::validation(
                    "subscriptionStart must not be after subscriptionEnd",
                ));
            }
        }
        let rows: Vec<UserProfile> = self
            .client
            .update(PROFILES, &Query::new().eq("id", id), update)
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::not_found(format!("user {}", id)))
    }
}

#[async_trait]
impl PrincipalStore for BackendClient {
    async fn get_principal(&self, id: &str) -> Result<Option<Principal>, LookupError> {
        match self.principals().get(id).await {
            Ok(profile) => Ok(profile.map(Principal::from)),
            Err(BackendError::NotFound { .. }) => Ok(None),
            Err(BackendError::InvalidResponse { message }) => {
                debug!(principal_id = %id, "Undecodable profile row");
                Err(LookupError::InvalidRecord { message })
            }
            Err(e) => Err(LookupError::Unavailable {
                message: e.to_string(),
            }),
        }
    }
}
