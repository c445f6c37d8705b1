// Library interface for admin-ui

pub mod auth;
pub mod routes;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use backend::{BackendClient, BackendError};
use serde_json::json;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing::error;
use wards::AccessPolicy;

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<BackendClient>,
    pub policy: Arc<AccessPolicy>,
    /// HS256 secret the backend signs user access tokens with.
    pub jwt_secret: Arc<String>,
}

impl AppState {
    pub fn new(
        backend: Arc<BackendClient>,
        policy: Arc<AccessPolicy>,
        jwt_secret: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            policy,
            jwt_secret: Arc::new(jwt_secret.into()),
        }
    }
}

#[derive(Debug)]
pub struct AppError {
    pub status_code: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError {
            status_code: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        let status_code = match &err {
            BackendError::Validation { .. } => StatusCode::BAD_REQUEST,
            BackendError::NotFound { .. } => StatusCode::NOT_FOUND,
            BackendError::Conflict { .. } => StatusCode::CONFLICT,
            BackendError::Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            BackendError::AuthFailed { .. }
            | BackendError::RequestFailed { .. }
            | BackendError::InvalidResponse { .. } => StatusCode::BAD_GATEWAY,
        };
        if status_code.is_server_error() {
            error!("Backend call failed: {}", err);
        }
        AppError {
            status_code,
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status_code, Json(json!({ "error": self.message }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

async fn health() -> impl IntoResponse {
    "OK"
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "not found" })),
    )
}

pub fn create_app(state: AppState) -> Router {
    let admin = Router::new()
        .route("/api/access/check", post(routes::access::check_access))
        .route(
            "/api/users",
            get(routes::users::list_users).post(routes::users::create_user),
        )
        .route(
            "/api/users/:id",
            get(routes::users::get_user)
                .patch(routes::users::update_user)
                .delete(routes::users::delete_user),
        )
        .route("/api/users/:id/access", get(routes::access::user_access))
        .route(
            "/api/templates",
            get(routes::content::list_templates).post(routes::content::create_template),
        )
        .route(
            "/api/templates/:id",
            get(routes::content::get_template)
                .patch(routes::content::update_template)
                .delete(routes::content::delete_template),
        )
        .route(
            "/api/prefills",
            get(routes::content::list_prefills).post(routes::content::create_prefill),
        )
        .route(
            "/api/prefills/:id",
            get(routes::content::get_prefill)
                .patch(routes::content::update_prefill)
                .delete(routes::content::delete_prefill),
        )
        .route("/api/sessions", get(routes::activity::list_sessions))
        .route("/api/sessions/:id", get(routes::activity::get_session))
        .route("/api/outputs", get(routes::activity::list_outputs))
        .route(
            "/api/outputs/:id",
            axum::routing::delete(routes::activity::delete_output),
        )
        .route("/api/reports/usage", get(routes::activity::usage_report))
        .route("/api/export/users.csv", get(routes::export::users_csv))
        .route("/api/export/sessions.csv", get(routes::export::sessions_csv))
        .route("/api/export/usage.csv", get(routes::export::usage_csv))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/api/auth/login", post(routes::session::login))
        .route("/api/auth/restore", post(routes::session::restore))
        .route("/api/auth/logout", post(routes::session::logout))
        .merge(admin)
        .fallback(not_found)
        .layer(
            TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()),
        )
        .with_state(state)
}
