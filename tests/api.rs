// ==============================================================================
// tests/api.rs - End-to-End Request Chain Tests
// ==============================================================================
// Description: Drives the full router (normalizer, rate limiter, auth) with
//              in-process requests and a manual clock
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::TimeDelta;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

use auth_gateway::clock::ManualClock;
use auth_gateway::config::{Config, GovernanceConfig, ServerConfig};
use auth_gateway::error::StoreError;
use auth_gateway::security::hash_password;
use auth_gateway::store::{InMemoryUserStore, NewUser, UserRecord, UserStore};
use auth_gateway::{build_router, AppState};

const PASSWORD: &str = "correct horse battery";

// Hashing is deliberately slow; compute the fixture digest once
fn password_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(PASSWORD).unwrap())
}

fn test_config(token_ttl_secs: u64, rate_threshold: u32) -> Arc<Config> {
    Arc::new(Config {
        governance: GovernanceConfig {
            secret: "integration-test-secret-0123456789abcdef".to_string(),
            token_ttl: Duration::from_secs(token_ttl_secs),
            rate_window: Duration::from_secs(60),
            rate_threshold,
        },
        server: ServerConfig {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            database_url: None,
            cors_allowed_origins: vec!["http://localhost:3000".to_string()],
            login_page: false,
            static_dir: PathBuf::from("./static"),
            sweep_interval: Duration::from_secs(60),
            trust_forwarded_for: false,
        },
    })
}

struct TestApp {
    router: Router,
    clock: Arc<ManualClock>,
    users: Arc<InMemoryUserStore>,
    state: AppState,
}

impl TestApp {
    fn new(token_ttl_secs: u64, rate_threshold: u32) -> Self {
        let clock = Arc::new(ManualClock::starting_now());
        let users = Arc::new(InMemoryUserStore::new());
        let state = AppState::with_clock(
            test_config(token_ttl_secs, rate_threshold),
            users.clone(),
            clock.clone(),
        );

        Self {
            router: build_router(state.clone()),
            clock,
            users,
            state,
        }
    }

    fn with_defaults() -> Self {
        Self::new(3600, 1000)
    }

    async fn seed_user(&self, username: &str) -> Uuid {
        self.users
            .create_user(NewUser {
                id: Uuid::new_v4(),
                username: username.to_string(),
                password_hash: password_hash().to_string(),
            })
            .await
            .unwrap()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, body)
    }

    async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, _, body) = self.send(request).await;
        (status, body)
    }

    async fn login(&self, username: &str) -> String {
        let (status, body) = self
            .post_json("/login", json!({"username": username, "password": PASSWORD}))
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }

    async fn get_protected(&self, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().uri("/protected");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let (status, _, body) = self.send(builder.body(Body::empty()).unwrap()).await;
        (status, body)
    }

    async fn logout(&self, token: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/logout")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = self.send(request).await;
        (status, body)
    }
}

fn from_peer(uri: &str, peer: &str) -> Request<Body> {
    let mut request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
    request
}

// ==============================================================================
// REGISTRATION
// ==============================================================================

#[tokio::test]
async fn test_register_creates_lowercased_account() {
    let app = TestApp::with_defaults();

    let (status, body) = app
        .post_json("/register", json!({"username": "Alice", "password": PASSWORD}))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["ok"], true);
    assert_eq!(body["username"], "alice");
    assert!(Uuid::parse_str(body["id"].as_str().unwrap()).is_ok());

    // Same account regardless of casing at login
    app.login("ALICE").await;
}

#[tokio::test]
async fn test_register_duplicate_any_casing_conflicts() {
    let app = TestApp::with_defaults();
    app.seed_user("alice").await;

    for variant in ["alice", "Alice", "ALICE"] {
        let (status, body) = app
            .post_json("/register", json!({"username": variant, "password": PASSWORD}))
            .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body, json!({"ok": false, "error": "username already exists"}));
    }
    assert_eq!(app.users.len(), 1);
}

#[tokio::test]
async fn test_register_rejects_bad_input() {
    let app = TestApp::with_defaults();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"ok": false, "error": "invalid input"}));

    let (status, body) = app
        .post_json("/register", json!({"username": "al", "password": PASSWORD}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "username must be 3-32 characters");

    let (status, _) = app.post_json("/register", json!({"username": "alice"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// Store that fails every call like an unreachable database
struct BrokenStore;

#[async_trait]
impl UserStore for BrokenStore {
    async fn find_by_username(&self, _username: &str) -> Result<Option<UserRecord>, StoreError> {
        Err(StoreError::Backend("connection reset by 10.1.2.3:5432".to_string()))
    }

    async fn create_user(&self, _user: NewUser) -> Result<Uuid, StoreError> {
        Err(StoreError::Backend("connection reset by 10.1.2.3:5432".to_string()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection reset by 10.1.2.3:5432".to_string()))
    }
}

#[tokio::test]
async fn test_storage_fault_is_internal_error_not_free_username() {
    let state = AppState::new(test_config(3600, 1000), Arc::new(BrokenStore));
    let router = build_router(state);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"username": "alice", "password": PASSWORD}).to_string()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({"ok": false, "error": "internal server error"}));

    let ready = router
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(ready.status(), StatusCode::SERVICE_UNAVAILABLE);
    let bytes = ready.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
        body,
        json!({"ok": false, "user_store": false, "error": "user store unavailable"})
    );
}

/// Store whose lookups panic, standing in for a bug deep inside a handler
struct PanicStore;

#[async_trait]
impl UserStore for PanicStore {
    async fn find_by_username(&self, _username: &str) -> Result<Option<UserRecord>, StoreError> {
        panic!("users table schema mismatch at postgres://admin:hunter2@db")
    }

    async fn create_user(&self, _user: NewUser) -> Result<Uuid, StoreError> {
        panic!("users table schema mismatch at postgres://admin:hunter2@db")
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_handler_panic_becomes_opaque_500() {
    let router = build_router(AppState::new(test_config(3600, 1000), Arc::new(PanicStore)));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"username": "alice", "password": PASSWORD}).to_string()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({"ok": false, "error": "internal server error"}));

    // The service keeps answering after the panic
    let health = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}

// ==============================================================================
// LOGIN / AUTH
// ==============================================================================

#[tokio::test]
async fn test_login_then_protected_route() {
    let app = TestApp::with_defaults();
    let id = app.seed_user("alice").await;

    let (status, body) = app
        .post_json("/login", json!({"username": "alice", "password": PASSWORD}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert!(body["expires_at"].is_string());

    let token = body["token"].as_str().unwrap();
    let (status, body) = app.get_protected(Some(token)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["subject"], id.to_string());
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = TestApp::with_defaults();
    app.seed_user("alice").await;

    let (wrong_status, wrong_body) = app
        .post_json("/login", json!({"username": "alice", "password": "not the password"}))
        .await;
    let (unknown_status, unknown_body) = app
        .post_json("/login", json!({"username": "bob", "password": PASSWORD}))
        .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);
    assert_eq!(
        wrong_body,
        json!({"ok": false, "error": "invalid username or password"})
    );
}

#[tokio::test]
async fn test_protected_requires_credential() {
    let app = TestApp::with_defaults();

    let (status, body) = app.get_protected(None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"ok": false, "error": "missing authorization header"}));

    let (status, body) = app.get_protected(Some("garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"ok": false, "error": "invalid token"}));
}

#[tokio::test]
async fn test_expired_credential_rejected() {
    let app = TestApp::new(1, 1000);
    app.seed_user("alice").await;
    let token = app.login("alice").await;

    app.clock.advance(TimeDelta::seconds(2));

    let (status, body) = app.get_protected(Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token expired");
}

// ==============================================================================
// LOGOUT
// ==============================================================================

#[tokio::test]
async fn test_logout_revokes_and_is_idempotent() {
    let app = TestApp::with_defaults();
    app.seed_user("alice").await;
    let token = app.login("alice").await;
    let other = app.login("alice").await;

    let (status, body) = app.logout(&token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (status, first) = app.get_protected(Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(first["error"], "token revoked");

    let (status, _) = app.logout(&token).await;
    assert_eq!(status, StatusCode::OK);

    let (_, second) = app.get_protected(Some(&token)).await;
    assert_eq!(first, second);

    // Other sessions of the same user are unaffected
    let (status, _) = app.get_protected(Some(&other)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_logout_expired_credential_succeeds() {
    let app = TestApp::new(1, 1000);
    app.seed_user("alice").await;
    let token = app.login("alice").await;
    app.clock.advance(TimeDelta::seconds(5));

    let (status, _) = app.logout(&token).await;

    assert_eq!(status, StatusCode::OK);
    assert!(app.state.tokens().revocations().is_empty());
}

#[tokio::test]
async fn test_logout_requires_signed_credential() {
    let app = TestApp::with_defaults();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/logout")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "missing authorization header");

    let (status, body) = app.logout("forged.token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid token");
}

// ==============================================================================
// RATE LIMITING
// ==============================================================================

#[tokio::test]
async fn test_rate_limit_rejects_then_recovers() {
    let app = TestApp::new(3600, 3);

    for _ in 0..3 {
        let (status, _, _) = app.send(from_peer("/health", "198.51.100.4:1000")).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, headers, body) = app.send(from_peer("/health", "198.51.100.4:1000")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body, json!({"ok": false, "error": "rate limit exceeded"}));
    assert_eq!(headers.get(header::RETRY_AFTER).unwrap(), "60");

    app.clock.advance(TimeDelta::seconds(60));

    let (status, _, _) = app.send(from_peer("/health", "198.51.100.4:1000")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_isolated_per_client() {
    let app = TestApp::new(3600, 2);

    for _ in 0..5 {
        app.send(from_peer("/health", "198.51.100.4:1000")).await;
    }

    let (status, _, _) = app.send(from_peer("/health", "198.51.100.5:1000")).await;
    assert_eq!(status, StatusCode::OK);

    // Port does not split a client's budget
    let (status, _, _) = app.send(from_peer("/health", "198.51.100.4:2000")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_rate_limit_applies_before_auth() {
    let app = TestApp::new(3600, 1);

    let (status, _) = app.get_protected(None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Budget spent; rejection now comes from the limiter, not auth
    let (status, body) = app.get_protected(None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "rate limit exceeded");
}

// ==============================================================================
// NORMALIZATION
// ==============================================================================

#[tokio::test]
async fn test_unknown_route_normalized() {
    let app = TestApp::with_defaults();

    let (status, _, body) = app
        .send(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"ok": false, "error": "not found"}));
}

#[tokio::test]
async fn test_wrong_method_normalized() {
    let app = TestApp::with_defaults();

    let (status, _, body) = app
        .send(Request::builder().uri("/login").body(Body::empty()).unwrap())
        .await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "method not allowed");
}

#[tokio::test]
async fn test_health_and_ready() {
    let app = TestApp::with_defaults();

    let (status, _, body) = app
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["status"], "ok");

    let (status, _, body) = app
        .send(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true, "user_store": true}));
}

#[tokio::test]
async fn test_login_page_mode_redirects_root() {
    let mut config = (*test_config(3600, 1000)).clone();
    config.server.login_page = true;
    let router = build_router(AppState::new(Arc::new(config), Arc::new(InMemoryUserStore::new())));

    let response = router
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/auth/login");
}

#[tokio::test]
async fn test_root_lists_service_info() {
    let app = TestApp::with_defaults();

    let (status, _, body) = app
        .send(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["service"], "Auth Gateway");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["endpoints"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e.as_str().unwrap().starts_with("POST /login")));
}
