use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use backend::{BackendError, NewUser, PrincipalFilter, PrincipalUpdate, UserProfile};
use serde::Deserialize;
use tracing::info;
use wards::Role;

use super::check_limit;
use crate::{AppError, AppResult, AppState};

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ListUsersQuery {
    pub search: Option<String>,
    pub role: Option<String>,
    pub limit: Option<u32>,
}

impl ListUsersQuery {
    pub(crate) fn to_filter(&self) -> Result<PrincipalFilter, AppError> {
        let role = match self.role.as_deref().filter(|r| !r.trim().is_empty()) {
            Some(raw) => Some(Role::parse(raw).ok_or_else(|| {
                AppError::bad_request("invalid 'role': expected one of user, admin")
            })?),
            None => None,
        };
        Ok(PrincipalFilter {
            search: self.search.clone(),
            role,
            limit: check_limit(self.limit)?,
        })
    }
}

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> AppResult<Json<Vec<UserProfile>>> {
    let filter = query.to_filter()?;
    let users = state.backend.principals().list(&filter).await?;
    info!("Retrieved {} users", users.len());
    Ok(Json(users))
}

#[axum::debug_handler]
pub async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<NewUser>,
) -> AppResult<Response> {
    let created = state.backend.users().create(&body).await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

#[axum::debug_handler]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<UserProfile>> {
    state
        .backend
        .principals()
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| BackendError::not_found(format!("user {}", id)).into())
}

#[axum::debug_handler]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<PrincipalUpdate>,
) -> AppResult<Json<UserProfile>> {
    let updated = state.backend.principals().update(&id, &body).await?;
    info!(user_id = %id, "Updated user");
    Ok(Json(updated))
}

#[axum::debug_handler]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.backend.users().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
