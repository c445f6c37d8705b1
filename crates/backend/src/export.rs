//! CSV downloads of dashboard tables.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::BackendError;
use crate::models::{CopySession, UserProfile};
use crate::report::UserUsage;

pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

fn ts(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

fn opt_num(n: Option<u64>) -> String {
    n.map(|n| n.to_string()).unwrap_or_default()
}

fn write_rows<I>(header: &[&str], rows: I) -> Result<Vec<u8>, BackendError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let failed = |e: csv::Error| BackendError::InvalidResponse {
        message: format!("Failed to write CSV: {}", e),
    };
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header).map_err(failed)?;
    for row in rows {
        writer.write_record(&row).map_err(failed)?;
    }
    writer
        .into_inner()
        .map_err(|e| BackendError::InvalidResponse {
            message: format!("Failed to flush CSV: {}", e),
        })
}

pub fn users_csv(profiles: &[UserProfile]) -> Result<Vec<u8>, BackendError> {
    write_rows(
        &[
            "id",
            "email",
            "full_name",
            "role",
            "subscription_start",
            "subscription_end",
            "tokens_allowed",
            "created_at",
        ],
        profiles.iter().map(|p| {
            vec![
                p.id.clone(),
                p.email.clone(),
                p.full_name.clone().unwrap_or_default(),
                p.role().to_string(),
                ts(p.subscription_start),
                ts(p.subscription_end),
                opt_num(p.tokens_allowed),
                ts(p.created_at),
            ]
        }),
    )
}

pub fn sessions_csv(sessions: &[CopySession]) -> Result<Vec<u8>, BackendError> {
    write_rows(
        &[
            "id",
            "user_id",
            "template_id",
            "title",
            "tokens_used",
            "created_at",
        ],
        sessions.iter().map(|s| {
            vec![
                s.id.clone(),
                s.user_id.clone(),
                s.template_id.clone().unwrap_or_default(),
                s.title.clone().unwrap_or_default(),
                s.tokens_used.to_string(),
                ts(Some(s.created_at)),
            ]
        }),
    )
}

pub fn usage_report_csv(rows: &[UserUsage]) -> Result<Vec<u8>, BackendError> {
    write_rows(
        &[
            "user_id",
            "email",
            "full_name",
            "sessions",
            "tokens_used",
            "tokens_allowed",
            "last_activity",
        ],
        rows.iter().map(|r| {
            vec![
                r.user_id.clone(),
                r.email.clone(),
                r.full_name.clone().unwrap_or_default(),
                r.session_count.to_string(),
                r.tokens_used.to_string(),
                opt_num(r.tokens_allowed),
                ts(r.last_activity),
            ]
        }),
    )
}
