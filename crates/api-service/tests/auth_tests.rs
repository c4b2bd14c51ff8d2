//! Authentication integration tests.
//!
//! Drives a spawned API server over HTTP in each token mode and checks the
//! status codes, error bodies and identities clients observe.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use api_test_utils::{
    jwks_document, sign_hs256, TestApiServer, TestRsaKey, TestTokenBuilder, TEST_CLIENT_ID,
    TEST_LOCAL_SECRET, TEST_REGION, TEST_USER_POOL_ID,
};
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::HashMap;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Remote-mode server whose key set is served by `mock_server`.
async fn spawn_remote(mode: &str, mock_server: &MockServer) -> TestApiServer {
    let vars = HashMap::from([
        ("AUTH_MODE".to_string(), mode.to_string()),
        ("AWS_REGION".to_string(), TEST_REGION.to_string()),
        ("COGNITO_USER_POOL_ID".to_string(), TEST_USER_POOL_ID.to_string()),
        ("COGNITO_APP_CLIENT_ID".to_string(), TEST_CLIENT_ID.to_string()),
        (
            "AUTH_JWKS_URL".to_string(),
            format!("{}{}", mock_server.uri(), JWKS_PATH),
        ),
    ]);
    TestApiServer::spawn(vars).await.unwrap()
}

async fn get_me(server: &TestApiServer, authorization: Option<&str>) -> reqwest::Response {
    let mut request = reqwest::Client::new().get(format!("{}/api/v1/me", server.url()));
    if let Some(value) = authorization {
        request = request.header("Authorization", value);
    }
    request.send().await.unwrap()
}

// ============================================================================
// Local mode
// ============================================================================

#[tokio::test]
async fn test_local_token_returns_identity() {
    let server = TestApiServer::spawn_local().await.unwrap();
    let token = sign_hs256(&TestTokenBuilder::local().build(), TEST_LOCAL_SECRET).unwrap();

    let response = get_me(&server, Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["sub"], "user-1");
    assert_eq!(body["email"], "a@example.com");
}

#[tokio::test]
async fn test_dev_token_round_trip() {
    let server = TestApiServer::spawn_local().await.unwrap();
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/dev/token", server.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    let token = body["token"].as_str().unwrap().to_string();

    let response = get_me(&server, Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let identity: Value = response.json().await.unwrap();
    assert_eq!(identity["sub"], "user-1");
    assert_eq!(identity["email"], "user1@example.com");
}

#[tokio::test]
async fn test_lowercase_bearer_scheme_accepted() {
    let server = TestApiServer::spawn_local().await.unwrap();
    let token = sign_hs256(&TestTokenBuilder::local().build(), TEST_LOCAL_SECRET).unwrap();

    let response = get_me(&server, Some(&format!("bearer {token}"))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_wrong_secret_rejected() {
    let server = TestApiServer::spawn_local().await.unwrap();
    let token = sign_hs256(&TestTokenBuilder::local().build(), "not-the-secret").unwrap();

    let response = get_me(&server, Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");
    assert_eq!(body["error"]["reason"], "signature_invalid");
}

#[tokio::test]
async fn test_expired_local_token_rejected() {
    let server = TestApiServer::spawn_local().await.unwrap();
    let token = sign_hs256(
        &TestTokenBuilder::local().expires_in(-3600).build(),
        TEST_LOCAL_SECRET,
    )
    .unwrap();

    let response = get_me(&server, Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["reason"], "token_expired");
}

#[tokio::test]
async fn test_local_token_for_other_audience_rejected() {
    let server = TestApiServer::spawn_local().await.unwrap();
    let token = sign_hs256(
        &TestTokenBuilder::local().with_audience("someone-else").build(),
        TEST_LOCAL_SECRET,
    )
    .unwrap();

    let response = get_me(&server, Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["reason"], "claim_mismatch");
}

// ============================================================================
// Missing or unusable credentials
// ============================================================================

#[tokio::test]
async fn test_missing_authorization_header() {
    let server = TestApiServer::spawn_local().await.unwrap();

    let response = get_me(&server, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get("www-authenticate").unwrap(),
        "Bearer realm=\"api\""
    );

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_non_bearer_schemes_rejected() {
    let server = TestApiServer::spawn_local().await.unwrap();

    for value in ["Basic dXNlcjpwYXNz", "Bearer", "Bearer    ", "Token abc"] {
        let response = get_me(&server, Some(value)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{value:?}");

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"]["code"], "UNAUTHENTICATED", "{value:?}");
    }
}

#[tokio::test]
async fn test_garbage_token_is_malformed() {
    let server = TestApiServer::spawn_local().await.unwrap();

    let response = get_me(&server, Some("Bearer not.a.jwt")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response
        .headers()
        .get("www-authenticate")
        .unwrap()
        .to_str()
        .unwrap()
        .contains("invalid_token"));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["reason"], "malformed_token");
}

// ============================================================================
// Remote modes
// ============================================================================

#[tokio::test]
async fn test_remote_access_token_accepted() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(&[TestRsaKey::primary()])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let server = spawn_remote("cognito_access", &mock_server).await;
    let token = TestRsaKey::primary()
        .sign(&TestTokenBuilder::cognito_access().for_user("user-42").without_email().build())
        .unwrap();

    for _ in 0..2 {
        let response = get_me(&server, Some(&format!("Bearer {token}"))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["sub"], "user-42");
        assert!(body["email"].is_null());
    }
}

#[tokio::test]
async fn test_remote_id_token_accepted() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(&[TestRsaKey::primary()])))
        .mount(&mock_server)
        .await;

    let server = spawn_remote("cognito_id", &mock_server).await;
    let token = TestRsaKey::primary()
        .sign(&TestTokenBuilder::cognito_id().build())
        .unwrap();

    let response = get_me(&server, Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["email"], "a@example.com");
}

#[tokio::test]
async fn test_id_token_rejected_in_access_mode() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(&[TestRsaKey::primary()])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let server = spawn_remote("cognito_access", &mock_server).await;
    let token = TestRsaKey::primary()
        .sign(&TestTokenBuilder::cognito_id().build())
        .unwrap();

    let response = get_me(&server, Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["reason"], "claim_mismatch");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("token_use"));
}

#[tokio::test]
async fn test_local_style_token_rejected_in_remote_mode() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(&[TestRsaKey::primary()])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let server = spawn_remote("cognito_access", &mock_server).await;
    let token = sign_hs256(&TestTokenBuilder::cognito_access().build(), TEST_LOCAL_SECRET).unwrap();

    let response = get_me(&server, Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["reason"], "algorithm_mismatch");
}

#[tokio::test]
async fn test_unavailable_key_source_is_503() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let server = spawn_remote("cognito_access", &mock_server).await;
    let token = TestRsaKey::primary()
        .sign(&TestTokenBuilder::cognito_access().build())
        .unwrap();

    let response = get_me(&server, Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.headers().get("www-authenticate").is_none());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
    assert_eq!(body["error"]["reason"], "key_source_unavailable");
}

#[tokio::test]
async fn test_unknown_kid_is_401() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(&[TestRsaKey::primary()])))
        .mount(&mock_server)
        .await;

    let server = spawn_remote("cognito_access", &mock_server).await;
    let token = TestRsaKey::secondary()
        .sign(&TestTokenBuilder::cognito_access().build())
        .unwrap();

    let response = get_me(&server, Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["reason"], "unknown_signing_key");
}
