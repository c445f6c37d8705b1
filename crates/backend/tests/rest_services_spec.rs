use std::time::Duration;

use backend::models::PrincipalUpdate;
use backend::principals::PrincipalFilter;
use backend::templates::TemplateFilter;
use backend::{BackendClient, BackendError, NewPrefill, NewTemplate, NewUser, TemplatePatch};
use chrono::{TimeZone, Utc};
use config_loader::BackendConfig;
use httptest::{matchers::*, responders::*, Expectation, Server};
use serde_json::json;

fn client(server: &Server, max_retries: u32) -> BackendClient {
    BackendClient::new(&BackendConfig {
        url: format!("http://{}", server.addr()),
        api_key: "service-key".to_string(),
        jwt_secret: None,
        timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(1),
        max_retries,
    })
    .unwrap()
}

fn template_row(id: &str, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "owner_id": "owner-1",
        "name": name,
        "content": "Write a headline for {{product}}",
        "created_at": "2024-06-01T00:00:00Z"
    })
}

#[tokio::test]
async fn list_principals_sends_search_and_auth_headers() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/rest/v1/profiles"),
            request::headers(contains(("apikey", "service-key"))),
            request::headers(contains(("authorization", "Bearer service-key"))),
            request::query(url_decoded(contains((
                "or",
                "(email.ilike.*ann*,full_name.ilike.*ann*)"
            )))),
            request::query(url_decoded(contains(("limit", "25")))),
        ])
        .respond_with(json_encoded(json!([
            { "id": "u1", "email": "ann@example.com", "full_name": "Ann", "role": "admin" }
        ]))),
    );

    let rows = client(&server, 1)
        .principals()
        .list(&PrincipalFilter {
            search: Some("ann".into()),
            role: None,
            limit: Some(25),
        })
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].full_name.as_deref(), Some("Ann"));
}

#[tokio::test]
async fn principal_update_rejects_inverted_window_without_request() {
    let server = Server::run();
    let update = PrincipalUpdate {
        subscription_start: Some(Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap()),
        subscription_end: Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()),
        ..PrincipalUpdate::default()
    };
    let err = client(&server, 1)
        .principals()
        .update("u1", &update)
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Validation { .. }));
}

#[tokio::test]
async fn principal_update_patches_by_id() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("PATCH", "/rest/v1/profiles"),
            request::query(url_decoded(contains(("id", "eq.u1")))),
            request::headers(contains(("prefer", "return=representation"))),
            request::body(json_decoded(eq(json!({ "tokens_allowed": 2000 })))),
        ])
        .respond_with(json_encoded(json!([
            { "id": "u1", "email": "u1@example.com", "tokens_allowed": 2000 }
        ]))),
    );

    let updated = client(&server, 1)
        .principals()
        .update(
            "u1",
            &PrincipalUpdate {
                tokens_allowed: Some(2000),
                ..PrincipalUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.tokens_allowed, Some(2000));
}

#[tokio::test]
async fn duplicate_template_name_is_conflict_and_nothing_is_inserted() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/rest/v1/templates"),
            request::query(url_decoded(contains(("owner_id", "eq.owner-1")))),
            request::query(url_decoded(contains(("name", "eq.Headlines")))),
        ])
        .respond_with(json_encoded(json!([{ "id": "t1" }]))),
    );
    // No POST expectation: an insert would fail the server's verification.

    let err = client(&server, 1)
        .templates()
        .create(&NewTemplate {
            owner_id: "owner-1".into(),
            name: "  Headlines ".into(),
            description: None,
            content: "Write a headline".into(),
            category: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Conflict { .. }));
}

#[tokio::test]
async fn template_create_inserts_trimmed_name() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/rest/v1/templates"))
            .respond_with(json_encoded(json!([]))),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/rest/v1/templates"),
            request::body(json_decoded(eq(json!({
                "owner_id": "owner-1",
                "name": "Headlines",
                "content": "Write a headline for {{product}}"
            })))),
        ])
        .respond_with(
            status_code(201).body(json!([template_row("t9", "Headlines")]).to_string()),
        ),
    );

    let created = client(&server, 1)
        .templates()
        .create(&NewTemplate {
            owner_id: "owner-1".into(),
            name: "Headlines ".into(),
            description: None,
            content: "Write a headline for {{product}}".into(),
            category: None,
        })
        .await
        .unwrap();
    assert_eq!(created.id, "t9");
}

#[tokio::test]
async fn template_rename_checks_other_templates_of_same_owner() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/rest/v1/templates"),
            request::query(url_decoded(contains(("id", "eq.t1")))),
        ])
        .respond_with(json_encoded(json!([template_row("t1", "Old")]))),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/rest/v1/templates"),
            request::query(url_decoded(contains(("id", "neq.t1")))),
            request::query(url_decoded(contains(("name", "eq.Taken")))),
        ])
        .respond_with(json_encoded(json!([{ "id": "t2" }]))),
    );

    let err = client(&server, 1)
        .templates()
        .update(
            "t1",
            &TemplatePatch {
                name: Some("Taken".into()),
                ..TemplatePatch::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Conflict { .. }));
}

#[tokio::test]
async fn unique_violation_from_insert_maps_to_conflict() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/rest/v1/templates"))
            .respond_with(json_encoded(json!([]))),
    );
    server.expect(
        Expectation::matching(request::method_path("POST", "/rest/v1/templates")).respond_with(
            status_code(409).body(r#"{"code":"23505","message":"duplicate key value"}"#),
        ),
    );

    let err = client(&server, 1)
        .templates()
        .create(&NewTemplate {
            owner_id: "owner-1".into(),
            name: "Race".into(),
            description: None,
            content: "c".into(),
            category: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Conflict { .. }));
}

#[tokio::test]
async fn template_listing_filters_by_owner() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/rest/v1/templates"),
            request::query(url_decoded(contains(("owner_id", "eq.owner-1")))),
            request::query(url_decoded(contains(("order", "name.asc")))),
        ])
        .respond_with(json_encoded(json!([
            template_row("t1", "A"),
            template_row("t2", "B")
        ]))),
    );

    let rows = client(&server, 1)
        .templates()
        .list(&TemplateFilter {
            owner_id: Some("owner-1".into()),
            search: None,
        })
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn prefill_fields_must_be_an_object() {
    let server = Server::run();
    let err = client(&server, 1)
        .prefills()
        .create(&NewPrefill {
            owner_id: "owner-1".into(),
            template_id: "t1".into(),
            name: "Spring sale".into(),
            fields: json!(["not", "an", "object"]),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Validation { .. }));
}

#[tokio::test]
async fn create_user_goes_through_admin_function() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/functions/v1/admin-create-user"),
            request::body(json_decoded(eq(json!({
                "email": "new@example.com",
                "password": "longenough",
                "tokensAllowed": 5000
            })))),
        ])
        .respond_with(json_encoded(json!({
            "user": { "id": "u-new", "email": "new@example.com" }
        }))),
    );

    let created = client(&server, 1)
        .users()
        .create(&NewUser {
            email: "new@example.com".into(),
            password: "longenough".into(),
            full_name: None,
            role: None,
            subscription_start: None,
            subscription_end: None,
            tokens_allowed: Some(5000),
        })
        .await
        .unwrap();
    assert_eq!(created.id, "u-new");
}

#[tokio::test]
async fn short_password_never_reaches_backend() {
    let server = Server::run();
    let err = client(&server, 1)
        .users()
        .create(&NewUser {
            email: "new@example.com".into(),
            password: "short".into(),
            full_name: None,
            role: None,
            subscription_start: None,
            subscription_end: None,
            tokens_allowed: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Validation { .. }));
}

#[tokio::test]
async fn delete_user_accepts_empty_response() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/functions/v1/admin-delete-user"),
            request::body(json_decoded(eq(json!({ "userId": "u1" })))),
        ])
        .respond_with(status_code(204)),
    );
    client(&server, 1).users().delete("u1").await.unwrap();
}

#[tokio::test]
async fn reads_retry_server_errors_then_succeed() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/rest/v1/copy_sessions"))
            .times(3)
            .respond_with(cycle![
                status_code(503),
                status_code(502),
                json_encoded(json!([{
                    "id": "s1",
                    "user_id": "u1",
                    "tokens_used": 42,
                    "created_at": "2024-06-01T00:00:00Z"
                }])),
            ]),
    );

    let rows = client(&server, 3)
        .sessions()
        .list(&Default::default())
        .await
        .unwrap();
    assert_eq!(rows[0].tokens_used, 42);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/rest/v1/copy_sessions"))
            .times(1)
            .respond_with(status_code(400).body(r#"{"message":"bad filter"}"#)),
    );

    let err = client(&server, 3)
        .sessions()
        .list(&Default::default())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        BackendError::Validation {
            message: "bad filter".into()
        }
    );
}

#[tokio::test]
async fn usage_report_rolls_up_all_tables() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/rest/v1/profiles")).respond_with(
            json_encoded(json!([
                { "id": "u1", "email": "a@example.com" },
                { "id": "u2", "email": "b@example.com" }
            ])),
        ),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/rest/v1/copy_sessions"),
            request::query(url_decoded(contains((
                "created_at",
                "gte.2024-06-01T00:00:00.000Z"
            )))),
        ])
        .respond_with(json_encoded(json!([
            { "id": "s1", "user_id": "u2", "created_at": "2024-06-02T00:00:00Z" }
        ]))),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/rest/v1/token_usage")).respond_with(
            json_encoded(json!([
                { "user_id": "u2", "tokens_used": 700, "created_at": "2024-06-02T00:00:00Z" },
                { "user_id": "u1", "tokens_used": 100, "created_at": "2024-06-03T00:00:00Z" }
            ])),
        ),
    );

    let from = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let report = client(&server, 1)
        .fetch_usage_report(Some(from), None)
        .await
        .unwrap();
    assert_eq!(report.rows[0].email, "b@example.com");
    assert_eq!(report.rows[0].session_count, 1);
    assert_eq!(report.totals.tokens_used, 800);
    assert_eq!(report.totals.users, 2);
}
