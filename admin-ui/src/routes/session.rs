// Sign-in, session restore and sign-out for dashboard users.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use backend::SessionManager;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};
use wards::{
    AccessDecision, Credentials, GateError, IdentityError, IdentityProvider, LoginGate,
    LoginOutcome, Session,
};

use crate::auth::{bearer_token, validate_jwt, validate_jwt_allow_expired, AuthError, Claims};
use crate::AppState;

// The denial kind stays in the logs; users only get the generic message.
fn public_decision(decision: &AccessDecision) -> AccessDecision {
    AccessDecision {
        denial: None,
        ..decision.clone()
    }
}

fn outcome_response(state: &AppState, outcome: LoginOutcome) -> Response {
    match outcome {
        LoginOutcome::Admitted { session, decision } => (
            StatusCode::OK,
            Json(json!({
                "session": session,
                "decision": public_decision(&decision),
            })),
        )
            .into_response(),
        LoginOutcome::Denied { decision } => (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": state.policy.config().denial_message,
                "decision": public_decision(&decision),
            })),
        )
            .into_response(),
        LoginOutcome::NoSession => AuthError::MissingToken.into_response(),
    }
}

fn gate_error_response(err: GateError) -> Response {
    match err {
        GateError::SignIn(IdentityError::InvalidCredentials) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid email or password" })),
        )
            .into_response(),
        GateError::SignIn(IdentityError::NoSession) => AuthError::MissingToken.into_response(),
        GateError::SignIn(IdentityError::Unavailable { message }) => {
            error!("Identity provider unavailable: {}", message);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "sign-in is temporarily unavailable" })),
            )
                .into_response()
        }
    }
}

#[axum::debug_handler]
pub async fn login(State(state): State<AppState>, Json(credentials): Json<Credentials>) -> Response {
    let identity = Arc::new(SessionManager::new(state.backend.clone()));
    let gate = LoginGate::new(identity, state.policy.clone());

    match gate.login(&credentials).await {
        Ok(outcome) => {
            if let Some(d) = outcome.decision() {
                info!(email = %credentials.email, granted = d.granted, "Login evaluated");
            }
            outcome_response(&state, outcome)
        }
        Err(e) => gate_error_response(e),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RestoreRequest {
    #[serde(rename = "refreshToken", default)]
    pub refresh_token: Option<String>,
}

/// Re-evaluates access for the session behind the presented access token.
/// An expired token is exchanged for a new session when the body carries a
/// refresh token. A denied session is signed out at the backend.
#[axum::debug_handler]
pub async fn restore(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let token = match bearer_token(&headers) {
        Ok(t) => t.to_string(),
        Err(e) => return e.into_response(),
    };
    let request: RestoreRequest = if body.is_empty() {
        RestoreRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(r) => r,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": format!("invalid restore body: {}", e) })),
                )
                    .into_response()
            }
        }
    };
    let refresh_token = request.refresh_token.filter(|t| !t.is_empty());

    let identity = match validate_jwt(&token, &state.jwt_secret) {
        Ok(claims) => {
            let mut session = match resolve_session(&state, claims, &token).await {
                Ok(s) => s,
                Err(response) => return response,
            };
            session.refresh_token = refresh_token;
            SessionManager::with_session(state.backend.clone(), session)
        }
        Err(e) => {
            let Some(refresh_token) = refresh_token else {
                return e.into_response();
            };
            let claims = match validate_jwt_allow_expired(&token, &state.jwt_secret) {
                Ok(c) => c,
                Err(e) => return e.into_response(),
            };
            let mut session = match resolve_session(&state, claims, &token).await {
                Ok(s) => s,
                Err(response) => return response,
            };
            session.refresh_token = Some(refresh_token);
            let identity = SessionManager::with_session(state.backend.clone(), session);
            match identity.refresh().await {
                Ok(refreshed) => {
                    info!(user_id = %refreshed.principal.id, "Expired session refreshed");
                }
                Err(IdentityError::NoSession) => return AuthError::InvalidToken.into_response(),
                Err(e) => return gate_error_response(GateError::SignIn(e)),
            }
            identity
        }
    };

    let gate = LoginGate::new(Arc::new(identity), state.policy.clone());
    match gate.restore().await {
        Ok(outcome) => outcome_response(&state, outcome),
        Err(e) => gate_error_response(e),
    }
}

/// Session for a verified token. Tokens without an email claim take the
/// address from the principal's profile.
async fn resolve_session(
    state: &AppState,
    mut claims: Claims,
    token: &str,
) -> Result<Session, Response> {
    if claims.email.as_deref().map_or(true, str::is_empty) {
        match state.backend.principals().get(&claims.sub).await {
            Ok(Some(profile)) => claims.email = Some(profile.email),
            Ok(None) => {
                warn!(user_id = %claims.sub, "Token without email and no profile");
                return Err(AuthError::InvalidToken.into_response());
            }
            Err(e) => {
                error!("Profile lookup for token email failed: {}", e);
                return Err((
                    StatusCode::BAD_GATEWAY,
                    Json(json!({ "error": "session restore is temporarily unavailable" })),
                )
                    .into_response());
            }
        }
    }
    Ok(claims.into_session(token))
}

#[axum::debug_handler]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Ok(token) = bearer_token(&headers) else {
        return StatusCode::NO_CONTENT.into_response();
    };
    let claims = match validate_jwt(token, &state.jwt_secret) {
        Ok(c) => c,
        Err(e) => return e.into_response(),
    };

    let identity = SessionManager::with_session(state.backend.clone(), claims.into_session(token));
    if let Err(e) = identity.sign_out().await {
        warn!("Sign-out failed: {}", e);
        return (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": "sign-out failed" })),
        )
            .into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}
