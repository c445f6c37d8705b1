#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use admin_ui::{create_app, AppState};
use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use axum::Router;
use backend::BackendClient;
use chrono::Utc;
use config_loader::BackendConfig;
use httptest::{matchers::*, responders::*, Expectation, Server};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use wards::config::PolicyConfig;
use wards::AccessPolicy;

pub const JWT_SECRET: &str = "test-jwt-secret";

pub fn app(server: &Server) -> Router {
    let backend = Arc::new(
        BackendClient::new(&BackendConfig {
            url: format!("http://{}", server.addr()),
            api_key: "service-key".to_string(),
            jwt_secret: Some(JWT_SECRET.to_string()),
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(1),
            max_retries: 1,
        })
        .unwrap(),
    );
    let policy = Arc::new(AccessPolicy::new(
        backend.clone(),
        backend.clone(),
        PolicyConfig::default(),
    ));
    create_app(AppState::new(backend, policy, JWT_SECRET))
}

pub fn token(sub: &str, email: &str) -> String {
    encode(
        &Header::default(),
        &json!({
            "sub": sub,
            "email": email,
            "aud": "authenticated",
            "exp": Utc::now().timestamp() + 600,
        }),
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn token_with_claims(claims: Value) -> String {
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn expired_token(sub: &str, email: &str) -> String {
    token_with_claims(json!({
        "sub": sub,
        "email": email,
        "exp": Utc::now().timestamp() - 3600,
    }))
}

/// Serves the profile lookup the admin guard performs for `sub`.
pub fn expect_profile(server: &Server, sub: &str, role: &str) {
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/rest/v1/profiles"),
            request::query(url_decoded(contains(("id", eq(format!("eq.{}", sub)))))),
        ])
        .times(1..)
        .respond_with(json_encoded(json!([
            { "id": sub, "email": format!("{}@example.com", sub), "role": role }
        ]))),
    );
}

pub fn as_admin(builder: axum::http::request::Builder) -> axum::http::request::Builder {
    builder.header(
        "Authorization",
        format!("Bearer {}", token("admin-1", "admin-1@example.com")),
    )
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    as_admin(Request::builder().uri(uri))
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    as_admin(Request::builder().method(method).uri(uri))
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}
