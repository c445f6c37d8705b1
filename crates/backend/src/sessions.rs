use chrono::{DateTime, Utc};

use crate::client::BackendClient;
use crate::error::BackendError;
use crate::models::{CopySession, SavedOutput, COPY_SESSIONS, SAVED_OUTPUTS};
use crate::rest::{effective_limit, Order, Query};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub user_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

impl SessionFilter {
    fn query(&self) -> Query {
        let mut query = Query::new();
        if let Some(user_id) = &self.user_id {
            query = query.eq("user_id", user_id);
        }
        if let Some(from) = self.from {
            query = query.gte("created_at", from);
        }
        if let Some(to) = self.to {
            query = query.lte("created_at", to);
        }
        query.order("created_at", Order::Desc)
    }
}

pub struct Sessions<'a> {
    client: &'a BackendClient,
}

impl BackendClient {
    pub fn sessions(&self) -> Sessions<'_> {
        Sessions { client: self }
    }

    pub fn outputs(&self) -> Outputs<'_> {
        Outputs { client: self }
    }
}

impl Sessions<'_> {
    /// Newest first, at most `filter.limit` rows.
    pub async fn list(&self, filter: &SessionFilter) -> Result<Vec<CopySession>, BackendError> {
        let query = filter.query().limit(effective_limit(filter.limit));
        self.client.select(COPY_SESSIONS, &query).await
    }

    /// Every session matching `filter`; `filter.limit` is ignored.
    pub async fn list_all(&self, filter: &SessionFilter) -> Result<Vec<CopySession>, BackendError> {
        let query = filter.query().order("id", Order::Asc);
        self.client.select_all(COPY_SESSIONS, &query).await
    }

    pub async fn get(&self, id: &str) -> Result<CopySession, BackendError> {
        self.client
            .select_one(COPY_SESSIONS, &Query::new().eq("id", id))
            .await?
            .ok_or_else(|| BackendError::not_found(format!("session {}", id)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputFilter {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

/// Copy saved by users from their sessions.
pub struct Outputs<'a> {
    client: &'a BackendClient,
}

impl Outputs<'_> {
    pub async fn list(&self, filter: &OutputFilter) -> Result<Vec<SavedOutput>, BackendError> {
        let mut query = Query::new();
        if let Some(user_id) = &filter.user_id {
            query = query.eq("user_id", user_id);
        }
        if let Some(session_id) = &filter.session_id {
            query = query.eq("session_id", session_id);
        }
        self.client
            .select(SAVED_OUTPUTS, &query.order("created_at", Order::Desc))
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), BackendError> {
        self.client
            .delete(SAVED_OUTPUTS, &Query::new().eq("id", id))
            .await
    }
}
