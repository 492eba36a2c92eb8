//! Common test utilities for integration tests.
//!
//! Builds the real router over in-memory stores and a static identity
//! resolver, with request helpers shared by every suite.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request},
    Router,
};
use engine::{EngineConfig, GroupRegistry};
use store::{MemoryCheckpointStore, MemoryMetadataStore};
use tower::ServiceExt;
use unfair_wheel_api::app::create_app;
use unfair_wheel_api::config::Config;
use unfair_wheel_api::identity::{Identity, StaticIdentityResolver};
use unfair_wheel_api::metadata::MetadataIndex;
use uuid::Uuid;

/// Bearer token of the primary test user (owner in most suites).
pub const TOKEN_U1: &str = "token-u1";
/// Token of a user whose verified email is `ada@x`.
pub const TOKEN_ADA: &str = "token-ada";
/// Token of an authenticated user unrelated to any group.
pub const TOKEN_OUTSIDER: &str = "token-outsider";

pub struct TestApp {
    pub router: Router,
    pub registry: Arc<GroupRegistry>,
    pub u1: Identity,
    pub ada: Identity,
    pub outsider: Identity,
}

pub fn test_config() -> Config {
    serde_json::from_value(serde_json::json!({
        "server": { "host": "127.0.0.1", "port": 0, "request_timeout_secs": 30 },
        "logging": { "level": "debug", "format": "pretty" },
        "security": {},
        "auth": { "secret": "test-secret", "resolver_url": "http://localhost:0" },
        "engine": {},
    }))
    .expect("test config must deserialize")
}

fn test_identity(emails: &[&str], display_name: &str) -> Identity {
    Identity {
        user_id: Uuid::new_v4(),
        verified_emails: emails.iter().map(|e| e.to_string()).collect(),
        primary_email: emails.first().expect("at least one email").to_string(),
        display_name: display_name.to_string(),
    }
}

/// Creates the application with spin timing shrunk to milliseconds so spin
/// suites resolve quickly.
pub fn create_test_app() -> TestApp {
    let engine_config = EngineConfig {
        spin_duration_ms: 20..30,
        ..EngineConfig::default()
    };
    let registry = Arc::new(GroupRegistry::new(
        engine_config,
        Arc::new(MemoryCheckpointStore::new()),
    ));
    let metadata = Arc::new(MetadataIndex::new(Arc::new(MemoryMetadataStore::new())));

    let u1 = test_identity(&["u1@x"], "User One");
    let ada = test_identity(&["ada@x"], "Ada");
    let outsider = test_identity(&["outsider@x"], "Outsider");

    let resolver = StaticIdentityResolver::new()
        .with_identity(TOKEN_U1, u1.clone())
        .with_identity(TOKEN_ADA, ada.clone())
        .with_identity(TOKEN_OUTSIDER, outsider.clone());

    let router = create_app(test_config(), registry.clone(), metadata, Arc::new(resolver));

    TestApp {
        router,
        registry,
        u1,
        ada,
        outsider,
    }
}

/// Build a JSON request with authentication.
pub fn json_request_with_auth(
    method: Method,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .expect("request must build")
}

/// Build a bodyless request with authentication.
pub fn request_with_auth(method: Method, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request must build")
}

/// Build an unauthenticated GET request.
pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("request must build")
}

/// Helper to parse a JSON response body.
pub async fn parse_response_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body must be readable");
    serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
}

/// Create a group as `U1` and return its id and owner participant id.
pub async fn create_group(app: &TestApp, name: &str) -> (Uuid, Uuid) {
    let response = app
        .router
        .clone()
        .oneshot(json_request_with_auth(
            Method::POST,
            "/groups",
            serde_json::json!({ "name": name }),
            TOKEN_U1,
        ))
        .await
        .expect("request must succeed");
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);

    let body = parse_response_body(response).await;
    let group_id = body["id"].as_str().expect("group id").parse().expect("uuid");
    let owner_participant_id = body["ownerParticipantId"]
        .as_str()
        .expect("owner participant id")
        .parse()
        .expect("uuid");
    (group_id, owner_participant_id)
}

/// Add a participant as `U1`; returns the new participant's id.
pub async fn add_participant(
    app: &TestApp,
    group_id: Uuid,
    name: &str,
    email: Option<&str>,
) -> Uuid {
    let mut body = serde_json::json!({ "name": name });
    if let Some(email) = email {
        body["emailId"] = serde_json::Value::String(email.to_string());
    }

    let response = app
        .router
        .clone()
        .oneshot(json_request_with_auth(
            Method::POST,
            &format!("/groups/{group_id}/participants"),
            body,
            TOKEN_U1,
        ))
        .await
        .expect("request must succeed");
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);

    let body = parse_response_body(response).await;
    body["id"].as_str().expect("participant id").parse().expect("uuid")
}
