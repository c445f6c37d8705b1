pub mod access;
pub mod activity;
pub mod content;
pub mod export;
pub mod session;
pub mod users;

use chrono::{DateTime, Utc};

use crate::AppError;

/// Rejects limits outside `1..=1000`.
pub(crate) fn check_limit(limit: Option<u32>) -> Result<Option<u32>, AppError> {
    match limit {
        Some(l) if l == 0 || l > backend::rest::MAX_LIMIT => Err(AppError::bad_request(
            "invalid 'limit': must be 1..=1000",
        )),
        other => Ok(other),
    }
}

fn parse_instant(name: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, AppError> {
    raw.filter(|s| !s.trim().is_empty())
        .map(|s| {
            DateTime::parse_from_rfc3339(s.trim())
                .map(|t| t.with_timezone(&Utc))
                .map_err(|_| {
                    AppError::bad_request(format!("invalid '{}': expected an RFC 3339 timestamp", name))
                })
        })
        .transpose()
}

/// Parses optional `from`/`to` query values and checks `from <= to`.
pub(crate) fn parse_range(
    from: Option<&str>,
    to: Option<&str>,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), AppError> {
    let from = parse_instant("from", from)?;
    let to = parse_instant("to", to)?;
    if let (Some(f), Some(t)) = (from, to) {
        if f > t {
            return Err(AppError::bad_request("invalid range: 'from' is after 'to'"));
        }
    }
    Ok((from, to))
}
