//! OAuth 2.0 token lifecycle integration tests using wiremock
//!
//! Drives `OAuth2Client` against a mock Microsoft account token endpoint:
//!
//! - Code exchange caches the access token and persists the refresh token.
//! - Refresh without a stored refresh token never touches the network.
//! - Expired access tokens are refreshed transparently by `is_logged_in`.
//! - Non-200 responses and malformed bodies are hard errors; a 200 without
//!   `access_token` is a soft `false`.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use onenote_sync::auth::client::TokenRequestMethod;
use onenote_sync::auth::token::AccessToken;
use onenote_sync::auth::token_store::{MemoryTokenStore, TokenStore};
use onenote_sync::error::OneNoteError;
use onenote_sync::session::Session;
use onenote_sync::OAuth2Client;

use common::{mock_provider, oauth_client};

const TOKEN_PATH: &str = "/oauth20_token.srf";

fn token_body(access: &str, refresh: Option<&str>) -> serde_json::Value {
    let mut body = serde_json::json!({
        "token_type": "bearer",
        "access_token": access,
        "expires_in": 3600,
        "scope": "office.onenote_update wl.skydrive wl.offline_access",
    });
    if let Some(refresh) = refresh {
        body["refresh_token"] = serde_json::Value::String(refresh.to_string());
    }
    body
}

// ---------------------------------------------------------------------------
// Code exchange
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_exchange_code_caches_token_and_stores_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=validcode"))
        .and(body_string_contains("client_secret=test-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("T", Some("R"))))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::default());
    let client = oauth_client(&server.uri(), store.clone());
    let mut session = Session::new("42");

    let before = Utc::now();
    assert!(client.is_logged_in(&mut session, Some("validcode")).await.unwrap());
    let after = Utc::now();

    let token = session.access_token().expect("token cached");
    assert_eq!(token.token, "T");
    assert!(token.expires_at >= before + Duration::seconds(3590));
    assert!(token.expires_at <= after + Duration::seconds(3590));
    assert_eq!(store.get("42").unwrap().unwrap().token, "R");
}

#[tokio::test]
async fn test_exchange_code_with_get_sends_query_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .and(query_param("code", "abc"))
        .and(query_param("grant_type", "authorization_code"))
        .and(query_param("redirect_uri", "https://lms.example.com/msaccount/redirect"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("T", Some("R"))))
        .expect(1)
        .mount(&server)
        .await;

    let mut provider = mock_provider(&server.uri());
    provider.code_exchange_method = TokenRequestMethod::Get;
    let client = OAuth2Client::new(
        reqwest::Client::new(),
        provider,
        Arc::new(MemoryTokenStore::default()),
    );
    let mut session = Session::new("42");

    assert!(client.exchange_code(&mut session, "abc").await.unwrap());
}

#[tokio::test]
async fn test_exchange_code_non_200_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(serde_json::json!({"error": "invalid_grant"})),
        )
        .mount(&server)
        .await;

    let client = oauth_client(&server.uri(), Arc::new(MemoryTokenStore::default()));
    let mut session = Session::new("42");

    let err = client
        .exchange_code(&mut session, "stale")
        .await
        .expect_err("400 must be an error");
    match err.downcast_ref::<OneNoteError>() {
        Some(OneNoteError::TokenEndpoint { status, body }) => {
            assert_eq!(*status, 400);
            assert!(body.contains("invalid_grant"));
        }
        other => panic!("expected TokenEndpoint error, got {:?}", other),
    }
    assert!(session.access_token().is_none());
}

#[tokio::test]
async fn test_exchange_code_malformed_body_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let client = oauth_client(&server.uri(), Arc::new(MemoryTokenStore::default()));
    let mut session = Session::new("42");

    let err = client.exchange_code(&mut session, "code").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<OneNoteError>(),
        Some(OneNoteError::Serialization(_))
    ));
}

#[tokio::test]
async fn test_exchange_code_without_access_token_is_soft_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"refresh_token": "R"})),
        )
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::default());
    let client = oauth_client(&server.uri(), store.clone());
    let mut session = Session::new("42");

    assert!(!client.exchange_code(&mut session, "code").await.unwrap());
    assert!(session.access_token().is_none());
    assert!(store.get("42").unwrap().is_none());
}

#[tokio::test]
async fn test_is_logged_in_without_code_or_token_is_false() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = oauth_client(&server.uri(), Arc::new(MemoryTokenStore::default()));
    let mut session = Session::new("42");

    assert!(!client.is_logged_in(&mut session, None).await.unwrap());
    assert!(!client.is_logged_in(&mut session, Some("")).await.unwrap());
}

// ---------------------------------------------------------------------------
// Refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_refresh_without_stored_token_makes_no_network_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("T", Some("R"))))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = oauth_client(&server.uri(), Arc::new(MemoryTokenStore::default()));
    let mut session = Session::new("42");

    assert!(!client.refresh(&mut session).await.unwrap());
    assert!(session.access_token().is_none());
}

#[tokio::test]
async fn test_refresh_rotates_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=R1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("T2", Some("R2"))))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::default());
    store.upsert("42", "R1").unwrap();
    let client = oauth_client(&server.uri(), store.clone());
    let mut session = Session::new("42");

    assert!(client.refresh(&mut session).await.unwrap());
    assert_eq!(session.access_token().unwrap().token, "T2");
    assert_eq!(store.get("42").unwrap().unwrap().token, "R2");
}

#[tokio::test]
async fn test_refresh_keeps_stored_token_when_response_omits_it() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("T2", None)))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::default());
    store.upsert("42", "R1").unwrap();
    let client = oauth_client(&server.uri(), store.clone());
    let mut session = Session::new("42");

    assert!(client.refresh(&mut session).await.unwrap());
    assert_eq!(store.get("42").unwrap().unwrap().token, "R1");
}

#[tokio::test]
async fn test_expired_token_is_refreshed_then_reused_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("fresh", Some("R2"))))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::default());
    store.upsert("42", "R1").unwrap();
    let client = oauth_client(&server.uri(), store);
    let mut session = Session::new("42");
    session.store_access_token(AccessToken::from_expires_in("stale".to_string(), 5));
    assert!(session.access_token().unwrap().is_expired());

    assert!(client.is_logged_in(&mut session, None).await.unwrap());
    assert_eq!(session.access_token().unwrap().token, "fresh");

    // The fresh token is used as-is; the mock's expect(1) fails on a second call.
    assert!(client.is_logged_in(&mut session, None).await.unwrap());
}

#[tokio::test]
async fn test_expired_token_with_failed_refresh_logs_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::default());
    store.upsert("42", "R1").unwrap();
    let client = oauth_client(&server.uri(), store.clone());
    let mut session = Session::new("42");
    session.store_access_token(AccessToken::from_expires_in("stale".to_string(), 0));

    assert!(!client.is_logged_in(&mut session, None).await.unwrap());
    assert!(session.access_token().is_none());
    // Logging out never deletes the durable refresh token.
    assert_eq!(store.get("42").unwrap().unwrap().token, "R1");
}

#[tokio::test]
async fn test_refresh_tokens_are_scoped_per_user() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("refresh_token=R-alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("TA", Some("R-alice2"))))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::default());
    store.upsert("alice", "R-alice").unwrap();
    store.upsert("bob", "R-bob").unwrap();
    let client = oauth_client(&server.uri(), store.clone());

    let mut alice = Session::new("alice");
    assert!(client.refresh(&mut alice).await.unwrap());
    assert_eq!(store.get("alice").unwrap().unwrap().token, "R-alice2");
    assert_eq!(store.get("bob").unwrap().unwrap().token, "R-bob");
}
