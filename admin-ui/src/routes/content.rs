// Templates and prefills.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use backend::prefills::PrefillFilter;
use backend::templates::TemplateFilter;
use backend::{NewPrefill, NewTemplate, Prefill, PrefillPatch, Template, TemplatePatch};
use serde::Deserialize;

use crate::{AppResult, AppState};

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListTemplatesQuery {
    pub owner_id: Option<String>,
    pub search: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListPrefillsQuery {
    pub owner_id: Option<String>,
    pub template_id: Option<String>,
}

#[axum::debug_handler]
pub async fn list_templates(
    State(state): State<AppState>,
    Query(query): Query<ListTemplatesQuery>,
) -> AppResult<Json<Vec<Template>>> {
    let filter = TemplateFilter {
        owner_id: query.owner_id,
        search: query.search,
    };
    Ok(Json(state.backend.templates().list(&filter).await?))
}

#[axum::debug_handler]
pub async fn create_template(
    State(state): State<AppState>,
    Json(body): Json<NewTemplate>,
) -> AppResult<Response> {
    let created = state.backend.templates().create(&body).await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

#[axum::debug_handler]
pub async fn get_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Template>> {
    Ok(Json(state.backend.templates().get(&id).await?))
}

#[axum::debug_handler]
pub async fn update_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TemplatePatch>,
) -> AppResult<Json<Template>> {
    Ok(Json(state.backend.templates().update(&id, &body).await?))
}

#[axum::debug_handler]
pub async fn delete_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.backend.templates().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn list_prefills(
    State(state): State<AppState>,
    Query(query): Query<ListPrefillsQuery>,
) -> AppResult<Json<Vec<Prefill>>> {
    let filter = PrefillFilter {
        owner_id: query.owner_id,
        template_id: query.template_id,
    };
    Ok(Json(state.backend.prefills().list(&filter).await?))
}

#[axum::debug_handler]
pub async fn create_prefill(
    State(state): State<AppState>,
    Json(body): Json<NewPrefill>,
) -> AppResult<Response> {
    let created = state.backend.prefills().create(&body).await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

#[axum::debug_handler]
pub async fn get_prefill(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Prefill>> {
    Ok(Json(state.backend.prefills().get(&id).await?))
}

#[axum::debug_handler]
pub async fn update_prefill(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<PrefillPatch>,
) -> AppResult<Json<Prefill>> {
    Ok(Json(state.backend.prefills().update(&id, &body).await?))
}

#[axum::debug_handler]
pub async fn delete_prefill(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.backend.prefills().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
