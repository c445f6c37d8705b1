// CSV downloads.

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use backend::export::{self, CSV_CONTENT_TYPE};

use super::activity::{ListSessionsQuery, RangeQuery};
use super::parse_range;
use super::users::ListUsersQuery;
use crate::{AppResult, AppState};

fn attachment(filename: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, CSV_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

#[axum::debug_handler]
pub async fn users_csv(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> AppResult<Response> {
    let filter = query.to_filter()?;
    // Without an explicit limit the export covers the whole table.
    let users = match filter.limit {
        Some(_) => state.backend.principals().list(&filter).await?,
        None => state.backend.principals().list_all(&filter).await?,
    };
    Ok(attachment("users.csv", export::users_csv(&users)?))
}

#[axum::debug_handler]
pub async fn sessions_csv(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> AppResult<Response> {
    let filter = query.to_filter()?;
    let sessions = match filter.limit {
        Some(_) => state.backend.sessions().list(&filter).await?,
        None => state.backend.sessions().list_all(&filter).await?,
    };
    Ok(attachment("sessions.csv", export::sessions_csv(&sessions)?))
}

#[axum::debug_handler]
pub async fn usage_csv(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> AppResult<Response> {
    let (from, to) = parse_range(query.from.as_deref(), query.to.as_deref())?;
    let report = state.backend.fetch_usage_report(from, to).await?;
    Ok(attachment("usage.csv", export::usage_report_csv(&report.rows)?))
}
