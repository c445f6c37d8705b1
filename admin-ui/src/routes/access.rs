use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use tracing::debug;
use wards::AccessDecision;

use crate::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCheckBody {
    pub principal_id: String,
    pub email: String,
}

/// Evaluates the access policy for an arbitrary principal. Always 200: a
/// denial is a decision, not an error.
#[axum::debug_handler]
pub async fn check_access(
    State(state): State<AppState>,
    Json(body): Json<AccessCheckBody>,
) -> Json<AccessDecision> {
    debug!("Admin access check for {}", body.principal_id);
    Json(state.policy.check_access(&body.principal_id, &body.email).await)
}

#[axum::debug_handler]
pub async fn user_access(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<AccessDecision>> {
    let profile = state
        .backend
        .principals()
        .get(&id)
        .await?
        .ok_or_else(|| AppError::from(backend::BackendError::not_found(format!("user {}", id))))?;
    Ok(Json(
        state.policy.check_access(&profile.id, &profile.email).await,
    ))
}
