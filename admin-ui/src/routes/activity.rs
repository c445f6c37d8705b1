// Sessions, saved outputs and the usage report.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use backend::sessions::{OutputFilter, SessionFilter};
use backend::{CopySession, SavedOutput, UsageReport};
use serde::{Deserialize, Serialize};

use super::{check_limit, parse_range};
use crate::{AppError, AppResult, AppState};

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListSessionsQuery {
    pub user_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<u32>,
}

impl ListSessionsQuery {
    pub(crate) fn to_filter(&self) -> Result<SessionFilter, AppError> {
        let (from, to) = parse_range(self.from.as_deref(), self.to.as_deref())?;
        Ok(SessionFilter {
            user_id: self.user_id.clone(),
            from,
            to,
            limit: check_limit(self.limit)?,
        })
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListOutputsQuery {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct RangeQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct SessionDetail {
    pub session: CopySession,
    pub outputs: Vec<SavedOutput>,
}

#[axum::debug_handler]
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> AppResult<Json<Vec<CopySession>>> {
    let filter = query.to_filter()?;
    Ok(Json(state.backend.sessions().list(&filter).await?))
}

#[axum::debug_handler]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<SessionDetail>> {
    let session = state.backend.sessions().get(&id).await?;
    let outputs = state
        .backend
        .outputs()
        .list(&OutputFilter {
            user_id: None,
            session_id: Some(id),
        })
        .await?;
    Ok(Json(SessionDetail { session, outputs }))
}

#[axum::debug_handler]
pub async fn list_outputs(
    State(state): State<AppState>,
    Query(query): Query<ListOutputsQuery>,
) -> AppResult<Json<Vec<SavedOutput>>> {
    let filter = OutputFilter {
        user_id: query.user_id,
        session_id: query.session_id,
    };
    Ok(Json(state.backend.outputs().list(&filter).await?))
}

#[axum::debug_handler]
pub async fn delete_output(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.backend.outputs().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn usage_report(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> AppResult<Json<UsageReport>> {
    let (from, to) = parse_range(query.from.as_deref(), query.to.as_deref())?;
    Ok(Json(state.backend.fetch_usage_report(from, to).await?))
}
