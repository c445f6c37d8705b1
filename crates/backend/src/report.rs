//! Per-user usage rollups for the dashboard.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;
use wards::UsageRecord;

use crate::client::BackendClient;
use crate::error::BackendError;
use crate::models::{CopySession, UserProfile};
use crate::principals::PrincipalFilter;
use crate::sessions::SessionFilter;
use crate::usage::UsageFilter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUsage {
    pub user_id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub session_count: u64,
    pub tokens_used: u64,
    /// `None` reads as unlimited.
    pub tokens_allowed: Option<u64>,
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageTotals {
    pub users: u64,
    pub sessions: u64,
    pub tokens_used: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReport {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub rows: Vec<UserUsage>,
    pub totals: UsageTotals,
}

/// Aggregates sessions and ledger entries per profile. Sessions and usage
/// for users without a profile are dropped. Rows are sorted by tokens used,
/// highest first, then by email.
pub fn usage_report(
    profiles: &[UserProfile],
    sessions: &[CopySession],
    usage: &[UsageRecord],
) -> Vec<UserUsage> {
    let mut rows: HashMap<&str, UserUsage> = profiles
        .iter()
        .map(|p| {
            (
                p.id.as_str(),
                UserUsage {
                    user_id: p.id.clone(),
                    email: p.email.clone(),
                    full_name: p.full_name.clone(),
                    session_count: 0,
                    tokens_used: 0,
                    tokens_allowed: p.tokens_allowed,
                    last_activity: None,
                },
            )
        })
        .collect();

    for s in sessions {
        if let Some(row) = rows.get_mut(s.user_id.as_str()) {
            row.session_count += 1;
            row.last_activity = row.last_activity.max(Some(s.created_at));
        }
    }
    for u in usage {
        if let Some(row) = rows.get_mut(u.principal_id.as_str()) {
            row.tokens_used = row.tokens_used.saturating_add(u.tokens_used);
            row.last_activity = row.last_activity.max(Some(u.occurred_at));
        }
    }

    let mut rows: Vec<UserUsage> = rows.into_values().collect();
    rows.sort_by(|a, b| {
        b.tokens_used
            .cmp(&a.tokens_used)
            .then_with(|| a.email.cmp(&b.email))
    });
    rows
}

pub fn totals(rows: &[UserUsage]) -> UsageTotals {
    rows.iter().fold(UsageTotals::default(), |mut t, r| {
        t.users += 1;
        t.sessions += r.session_count;
        t.tokens_used = t.tokens_used.saturating_add(r.tokens_used);
        t
    })
}

impl BackendClient {
    /// Reads every profile, plus all sessions and usage in `[from, to]`, and
    /// rolls them up.
    #[instrument(skip(self))]
    pub async fn fetch_usage_report(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<UsageReport, BackendError> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(BackendError::validation("from must not be after to"));
            }
        }
        let profiles = self
            .principals()
            .list_all(&PrincipalFilter::default())
            .await?;
        let sessions = self
            .sessions()
            .list_all(&SessionFilter {
                user_id: None,
                from,
                to,
                limit: None,
            })
            .await?;
        let usage = self
            .usage()
            .list(&UsageFilter {
                user_id: None,
                from,
                to,
            })
            .await?;

        let rows = usage_report(&profiles, &sessions, &usage);
        let totals = totals(&rows);
        Ok(UsageReport {
            from,
            to,
            rows,
            totals,
        })
    }
}
