// Session controller tests against a mock Aviator backend.
//
// These drive startup, login and logout end to end through the real HTTP
// client and check both the published state and the token store.

use std::sync::Arc;
use std::time::Duration;

use mockito::{Matcher, Server};
use serde_json::json;

use anyhow::anyhow;
use chacha20poly1305::Key;

use aviator_core::auth::{
    AuthState, EncryptedTokenStore, KeySource, MemoryTokenStore, PostLoginSession,
    SessionController, StaticKeySource, TokenStore,
};
use aviator_core::ApiClient;

// ==================================================================================================
// Test Helpers
// ==================================================================================================

const REFRESH_PATH: &str = "/api/sessions/getRefreshToken";
const SESSION_PATH: &str = "/api/sessions/login";

fn controller(
    base_url: &str,
    store: Arc<dyn TokenStore>,
    policy: PostLoginSession,
) -> SessionController {
    let api = ApiClient::new(base_url, None).expect("Failed to create API client");
    SessionController::new(api, store, policy)
}

/// Key source for a keychain that refuses every request
struct LockedKeychain;

impl KeySource for LockedKeychain {
    fn key(&self) -> anyhow::Result<Key> {
        Err(anyhow!("keychain is locked"))
    }
}

fn authenticated(token: &str) -> AuthState {
    AuthState::Authenticated {
        session_token: token.to_string(),
    }
}

// ==================================================================================================
// Startup
// ==================================================================================================

#[tokio::test]
async fn test_start_without_token_skips_network() {
    let mut server = Server::new_async().await;
    let exchange = server
        .mock("POST", SESSION_PATH)
        .expect(0)
        .create_async()
        .await;

    let ctl = controller(
        &server.url(),
        Arc::new(MemoryTokenStore::new()),
        PostLoginSession::default(),
    );
    assert_eq!(ctl.start().await, AuthState::Unauthenticated);
    assert_eq!(ctl.state(), AuthState::Unauthenticated);

    exchange.assert_async().await;
}

#[tokio::test]
async fn test_start_exchanges_stored_token() {
    let mut server = Server::new_async().await;
    let exchange = server
        .mock("POST", SESSION_PATH)
        .match_body(Matcher::Json(json!({ "refreshToken": "stored-refresh-token" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message": "ok", "token": "fresh-session", "success": true}"#)
        .create_async()
        .await;

    let store = Arc::new(MemoryTokenStore::with_token("stored-refresh-token"));
    let ctl = controller(&server.url(), store.clone(), PostLoginSession::default());
    let mut rx = ctl.subscribe();

    assert_eq!(ctl.start().await, authenticated("fresh-session"));
    assert_eq!(ctl.session_token().as_deref(), Some("fresh-session"));
    assert_eq!(*rx.borrow_and_update(), authenticated("fresh-session"));
    assert_eq!(store.load().as_deref(), Some("stored-refresh-token"));

    exchange.assert_async().await;
}

#[tokio::test]
async fn test_start_rejected_exchange_keeps_token() {
    let mut server = Server::new_async().await;
    let _exchange = server
        .mock("POST", SESSION_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message": "expired", "token": "", "success": false}"#)
        .create_async()
        .await;

    let store = Arc::new(MemoryTokenStore::with_token("stored-refresh-token"));
    let ctl = controller(&server.url(), store.clone(), PostLoginSession::default());

    assert_eq!(ctl.start().await, AuthState::Unauthenticated);
    assert_eq!(store.load().as_deref(), Some("stored-refresh-token"));
}

#[tokio::test]
async fn test_start_server_error_keeps_token() {
    let mut server = Server::new_async().await;
    let _exchange = server
        .mock("POST", SESSION_PATH)
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;

    let store = Arc::new(MemoryTokenStore::with_token("stored-refresh-token"));
    let ctl = controller(&server.url(), store.clone(), PostLoginSession::default());

    assert_eq!(ctl.start().await, AuthState::Unauthenticated);
    assert_eq!(store.load().as_deref(), Some("stored-refresh-token"));
}

#[tokio::test]
async fn test_start_transport_error_keeps_token() {
    // Nothing listens on the discard port
    let store = Arc::new(MemoryTokenStore::with_token("stored-refresh-token"));
    let api = ApiClient::new("http://127.0.0.1:9", Some(Duration::from_secs(5)))
        .expect("Failed to create API client");
    let ctl = SessionController::new(api, store.clone(), PostLoginSession::default());

    assert_eq!(ctl.start().await, AuthState::Unauthenticated);
    assert_eq!(store.load().as_deref(), Some("stored-refresh-token"));
}

#[tokio::test]
async fn test_start_undecryptable_token_is_unauthenticated() {
    let mut server = Server::new_async().await;
    let exchange = server
        .mock("POST", SESSION_PATH)
        .expect(0)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    EncryptedTokenStore::new(dir.path(), StaticKeySource::new([1; 32]))
        .save("stored-refresh-token")
        .unwrap();

    // Same file, different key: the platform key was invalidated
    let store = Arc::new(EncryptedTokenStore::new(
        dir.path(),
        StaticKeySource::new([2; 32]),
    ));
    let ctl = controller(&server.url(), store.clone(), PostLoginSession::default());

    assert_eq!(ctl.start().await, AuthState::Unauthenticated);
    assert!(store.path().exists());
    exchange.assert_async().await;
}

// ==================================================================================================
// Login
// ==================================================================================================

#[tokio::test]
async fn test_login_empty_token_is_refused() {
    let mut server = Server::new_async().await;
    let login = server
        .mock("POST", REFRESH_PATH)
        .match_body(Matcher::Json(json!({ "email": "a@b.com", "password": "pw" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"token": "", "message": "bad creds"}"#)
        .create_async()
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    let ctl = controller(&server.url(), store.clone(), PostLoginSession::default());

    assert_eq!(ctl.login("a@b.com", "pw").await, AuthState::Unauthenticated);
    assert_eq!(store.load(), None);
    login.assert_async().await;
}

#[tokio::test]
async fn test_login_short_token_leaves_previous_token() {
    let mut server = Server::new_async().await;
    let _login = server
        .mock("POST", REFRESH_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"token": "abcdefghij", "message": "ok"}"#)
        .create_async()
        .await;

    let store = Arc::new(MemoryTokenStore::with_token("previous-refresh-token"));
    let ctl = controller(&server.url(), store.clone(), PostLoginSession::default());

    assert_eq!(ctl.login("a@b.com", "pw").await, AuthState::Unauthenticated);
    assert_eq!(store.load().as_deref(), Some("previous-refresh-token"));
}

#[tokio::test]
async fn test_login_stores_refresh_token() {
    let mut server = Server::new_async().await;
    let _login = server
        .mock("POST", REFRESH_PATH)
        .match_body(Matcher::Json(json!({ "email": "a@b.com", "password": "longpw" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"token": "abcdefghijk", "message": "ok"}"#)
        .create_async()
        .await;
    let exchange = server
        .mock("POST", SESSION_PATH)
        .expect(0)
        .create_async()
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    let ctl = controller(&server.url(), store.clone(), PostLoginSession::RefreshToken);

    assert_eq!(ctl.login("a@b.com", "longpw").await, authenticated("abcdefghijk"));
    assert_eq!(store.load().as_deref(), Some("abcdefghijk"));
    exchange.assert_async().await;
}

#[tokio::test]
async fn test_login_with_exchange_policy() {
    let mut server = Server::new_async().await;
    let _login = server
        .mock("POST", REFRESH_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"token": "abcdefghijk", "message": "ok"}"#)
        .create_async()
        .await;
    let exchange = server
        .mock("POST", SESSION_PATH)
        .match_body(Matcher::Json(json!({ "refreshToken": "abcdefghijk" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message": "ok", "token": "session-xyz", "success": true}"#)
        .create_async()
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    let ctl = controller(&server.url(), store.clone(), PostLoginSession::Exchange);

    assert_eq!(ctl.login("a@b.com", "longpw").await, authenticated("session-xyz"));
    assert_eq!(store.load().as_deref(), Some("abcdefghijk"));
    exchange.assert_async().await;
}

#[tokio::test]
async fn test_login_exchange_policy_failure_keeps_new_token() {
    let mut server = Server::new_async().await;
    let _login = server
        .mock("POST", REFRESH_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"token": "new-refresh-token", "message": "ok"}"#)
        .create_async()
        .await;
    let exchange = server
        .mock("POST", SESSION_PATH)
        .match_body(Matcher::Json(json!({ "refreshToken": "new-refresh-token" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message": "try later", "token": "", "success": false}"#)
        .create_async()
        .await;

    let store = Arc::new(MemoryTokenStore::with_token("old-refresh-token"));
    let ctl = controller(&server.url(), store.clone(), PostLoginSession::Exchange);

    assert_eq!(ctl.login("a@b.com", "longpw").await, AuthState::Unauthenticated);
    assert_eq!(ctl.state(), AuthState::Unauthenticated);
    assert_eq!(store.load().as_deref(), Some("new-refresh-token"));
    exchange.assert_async().await;
}

#[tokio::test]
async fn test_login_storage_failure_is_unauthenticated() {
    let mut server = Server::new_async().await;
    let login = server
        .mock("POST", REFRESH_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"token": "abcdefghijk", "message": "ok"}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(EncryptedTokenStore::new(dir.path(), LockedKeychain));
    let ctl = controller(&server.url(), store.clone(), PostLoginSession::default());

    assert_eq!(ctl.login("a@b.com", "longpw").await, AuthState::Unauthenticated);
    assert_eq!(ctl.session_token(), None);
    assert_eq!(store.load(), None);
    assert!(!store.path().exists());
    login.assert_async().await;
}

#[tokio::test]
async fn test_login_server_error_is_unauthenticated() {
    let mut server = Server::new_async().await;
    let _login = server
        .mock("POST", REFRESH_PATH)
        .with_status(503)
        .create_async()
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    let ctl = controller(&server.url(), store.clone(), PostLoginSession::default());

    assert_eq!(ctl.login("a@b.com", "pw").await, AuthState::Unauthenticated);
    assert_eq!(store.load(), None);
}

#[tokio::test]
async fn test_overlapping_logins_resolve_in_call_order() {
    let mut server = Server::new_async().await;
    let _first = server
        .mock("POST", REFRESH_PATH)
        .match_body(Matcher::PartialJson(json!({ "email": "first@b.com" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"token": "first-refresh-token", "message": "ok"}"#)
        .create_async()
        .await;
    let _second = server
        .mock("POST", REFRESH_PATH)
        .match_body(Matcher::PartialJson(json!({ "email": "second@b.com" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"token": "second-refresh-token", "message": "ok"}"#)
        .create_async()
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    let ctl = controller(&server.url(), store.clone(), PostLoginSession::default());

    let (first, second) = tokio::join!(
        ctl.login("first@b.com", "pw"),
        ctl.login("second@b.com", "pw")
    );
    assert_eq!(first, authenticated("first-refresh-token"));
    assert_eq!(second, authenticated("second-refresh-token"));
    assert_eq!(ctl.state(), authenticated("second-refresh-token"));
    assert_eq!(store.load().as_deref(), Some("second-refresh-token"));
}

// ==================================================================================================
// Logout
// ==================================================================================================

#[tokio::test]
async fn test_logout_from_any_state() {
    let mut server = Server::new_async().await;
    let _login = server
        .mock("POST", REFRESH_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"token": "abcdefghijk", "message": "ok"}"#)
        .create_async()
        .await;

    // From Loading
    let store = Arc::new(MemoryTokenStore::with_token("stored-refresh-token"));
    let ctl = controller(&server.url(), store.clone(), PostLoginSession::default());
    assert_eq!(ctl.state(), AuthState::Loading);
    assert_eq!(ctl.logout(), AuthState::Unauthenticated);
    assert_eq!(store.load(), None);

    // From Authenticated, twice
    ctl.login("a@b.com", "longpw").await;
    assert!(ctl.state().is_authenticated());
    ctl.logout();
    ctl.logout();
    assert_eq!(ctl.state(), AuthState::Unauthenticated);
    assert_eq!(store.load(), None);
}

// ==================================================================================================
// Persistence across restarts
// ==================================================================================================

#[tokio::test]
async fn test_login_then_restart_restores_session() {
    let mut server = Server::new_async().await;
    let _login = server
        .mock("POST", REFRESH_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"token": "persisted-refresh-token", "message": "ok"}"#)
        .create_async()
        .await;
    let exchange = server
        .mock("POST", SESSION_PATH)
        .match_body(Matcher::Json(json!({ "refreshToken": "persisted-refresh-token" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message": "ok", "token": "next-day-session", "success": true}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let key = [9u8; 32];

    let first_run = controller(
        &server.url(),
        Arc::new(EncryptedTokenStore::new(dir.path(), StaticKeySource::new(key))),
        PostLoginSession::default(),
    );
    assert!(first_run.login("a@b.com", "longpw").await.is_authenticated());
    drop(first_run);

    let second_run = controller(
        &server.url(),
        Arc::new(EncryptedTokenStore::new(dir.path(), StaticKeySource::new(key))),
        PostLoginSession::default(),
    );
    assert_eq!(second_run.start().await, authenticated("next-day-session"));
    exchange.assert_async().await;
}
