// Bearer-token authentication for the admin API.
//
// Access tokens are issued by the backend's auth service and signed with its
// HS256 secret. A valid token only proves identity; admin routes additionally
// require the principal's role to be admin.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{TimeZone, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};
use wards::{Session, SessionPrincipal};

use crate::AppState;

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: usize,
    #[serde(default)]
    pub iat: Option<usize>,
}

impl Claims {
    /// The session this token represents, for handing to the login gate.
    pub fn into_session(self, access_token: &str) -> Session {
        let expires_at = Utc.timestamp_opt(self.exp as i64, 0).single();
        Session {
            access_token: access_token.to_string(),
            refresh_token: None,
            expires_at,
            principal: SessionPrincipal {
                id: self.sub,
                email: self.email.unwrap_or_default(),
            },
        }
    }
}

/// Raw bearer token from the Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidToken)?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidToken)
}

pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, AuthError> {
    decode_claims(token, secret, true)
}

/// Signature-checked claims of a token that may have expired. Only good for
/// identifying whose refresh token is being exchanged.
pub fn validate_jwt_allow_expired(token: &str, secret: &str) -> Result<Claims, AuthError> {
    decode_claims(token, secret, false)
}

fn decode_claims(token: &str, secret: &str, check_expiry: bool) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    // Backend tokens carry an audience of their own; identity comes from `sub`.
    validation.validate_aud = false;
    validation.validate_exp = check_expiry;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        warn!("JWT validation failed: {}", e);
        AuthError::InvalidToken
    })?;

    Ok(token_data.claims)
}

/// Extract and validate JWT from Authorization header
pub fn extract_and_validate_jwt(headers: &HeaderMap, secret: &str) -> Result<Claims, AuthError> {
    validate_jwt(bearer_token(headers)?, secret)
}

/// Middleware for admin routes: valid token, then an admin role. The
/// validated [`Claims`] are added to the request extensions.
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let claims = match extract_and_validate_jwt(request.headers(), &state.jwt_secret) {
        Ok(c) => c,
        Err(e) => return e.into_response(),
    };

    if !state.policy.is_admin(&claims.sub).await {
        return AuthError::NotAdmin {
            subject: claims.sub,
        }
        .into_response();
    }

    debug!("Admin auth successful for subject: {}", claims.sub);
    request.extensions_mut().insert(claims);
    next.run(request).await
}

/// Authentication errors
#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    NotAdmin { subject: String },
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AuthError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "missing_token",
                "Authorization header with Bearer token is required",
            ),
            AuthError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "JWT token is invalid or expired",
            ),
            AuthError::NotAdmin { ref subject } => {
                warn!("Non-admin subject {} denied admin route", subject);
                (
                    StatusCode::FORBIDDEN,
                    "not_admin",
                    "Admin role is required",
                )
            }
        };

        (
            status,
            Json(json!({
                "code": code,
                "message": message,
            })),
        )
            .into_response()
    }
}
