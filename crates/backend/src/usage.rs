use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::instrument;
use wards::{LookupError, UsageLedger, UsageRecord};

use crate::client::BackendClient;
use crate::error::BackendError;
use crate::models::{UsageRow, TOKEN_USAGE};
use crate::rest::{Order, Query};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageFilter {
    pub user_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl UsageFilter {
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
        query
    }
}

#[derive(Debug, Deserialize)]
struct TokensOnly {
    tokens_used: u64,
}

/// Read access to the append-only `token_usage` ledger.
pub struct Usage<'a> {
    client: &'a BackendClient,
}

impl BackendClient {
    pub fn usage(&self) -> Usage<'_> {
        Usage { client: self }
    }
}

impl Usage<'_> {
    /// Every matching ledger row, newest first.
    #[instrument(skip(self))]
    pub async fn list(&self, filter: &UsageFilter) -> Result<Vec<UsageRecord>, BackendError> {
        let query = filter.query().order("created_at", Order::Desc);
        let rows: Vec<UsageRow> = self.client.select_all(TOKEN_USAGE, &query).await?;
        Ok(rows.into_iter().map(UsageRecord::from).collect())
    }

    /// Total tokens over `filter`, inclusive of both bounds. Reads every
    /// page, so a server row cap cannot hide usage.
    #[instrument(skip(self))]
    pub async fn sum(&self, filter: &UsageFilter) -> Result<u64, BackendError> {
        let query = filter
            .query()
            .select("tokens_used")
            .order("created_at", Order::Asc);
        let rows: Vec<TokensOnly> = self.client.select_all(TOKEN_USAGE, &query).await?;
        Ok(rows
            .iter()
            .fold(0u64, |acc, r| acc.saturating_add(r.tokens_used)))
    }
}

#[async_trait]
impl UsageLedger for BackendClient {
    async fn sum_usage(
        &self,
        principal_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<u64, LookupError> {
        let filter = UsageFilter {
            user_id: Some(principal_id.to_string()),
            from,
            to,
        };
        self.usage().sum(&filter).await.map_err(|e| match e {
            BackendError::InvalidResponse { message } => LookupError::InvalidRecord { message },
            other => LookupError::Unavailable {
                message: other.to_string(),
            },
        })
    }
}
