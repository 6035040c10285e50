//! Integration tests for the authorization flow using wiremock.
//!
//! Covers the full pipeline: discovery, the pairing state machine,
//! challenge-response login, and signed calls.
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::ExposeSecret;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use fbx_api::{
    AUTH_HEADER, AppIdentity, AuthorizationStatus, ClientConfig, CredentialStore, Error,
    FbxClient, HttpClient, MemoryStore, PollPolicy, SessionManager, StatusEvent,
    StoredCredentials, TransportConfig, session_password,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn identity() -> AppIdentity {
    AppIdentity {
        app_id: "org.fbxctl".into(),
        app_name: "fbxctl".into(),
        app_version: "0.1.0".into(),
        device_name: "workstation".into(),
    }
}

/// Fast poll policy so pending loops finish in milliseconds.
fn fast_poll() -> PollPolicy {
    PollPolicy {
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(10),
        max_attempts: 10,
    }
}

fn client_config(server: &MockServer) -> ClientConfig {
    ClientConfig {
        root_url: server.uri().parse().unwrap(),
        identity: identity(),
        transport: TransportConfig::default(),
        poll: fast_poll(),
    }
}

/// Mount the public version endpoint (bare JSON, no envelope).
async fn mount_discovery(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api_version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uid": "abc",
            "device_name": "Freebox Server",
            "device_type": "FreeboxServer1,2",
            "api_base_url": "/api/",
            "api_version": "8.0",
        })))
        .mount(server)
        .await;
}

fn envelope(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "success": true, "result": result }))
}

fn track_status(status: &str) -> ResponseTemplate {
    envelope(json!({ "status": status }))
}

/// Drain every buffered event from a broadcast receiver.
fn drain(
    rx: &mut tokio::sync::broadcast::Receiver<StatusEvent>,
) -> Vec<StatusEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Matcher: the request must NOT carry the session auth header.
struct NoAuthHeader;

impl wiremock::Match for NoAuthHeader {
    fn matches(&self, request: &Request) -> bool {
        !request.headers.contains_key(AUTH_HEADER)
    }
}

// ── Discovery ───────────────────────────────────────────────────────

#[tokio::test]
async fn discovery_derives_versioned_base_url() {
    let root = Url::parse("http://192.168.1.254:80").unwrap();
    let base = fbx_api::derive_api_base(&root, "/api/", "8.0").unwrap();
    assert_eq!(base, "http://192.168.1.254:80/api/v8");
}

#[tokio::test]
async fn discovery_failure_emits_error_and_requests_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api_version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            // uid missing -- not the appliance we expect
            "api_base_url": "/api/",
            "api_version": "8.0",
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v8/login/authorize"))
        .respond_with(envelope(json!({ "app_token": "t", "track_id": 1 })))
        .expect(0)
        .mount(&server)
        .await;

    let client = FbxClient::new(client_config(&server), Arc::new(MemoryStore::new()));
    let mut rx = client.events();

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, Error::Discovery { .. }), "got: {err:?}");
    assert_eq!(drain(&mut rx), vec![StatusEvent::ApplicationError]);
}

// ── Registration ────────────────────────────────────────────────────

#[tokio::test]
async fn granted_flow_emits_one_event_and_persists_credentials() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/v8/login/authorize"))
        .and(NoAuthHeader)
        .and(body_json(json!({
            "app_id": "org.fbxctl",
            "app_name": "fbxctl",
            "app_version": "0.1.0",
            "device_name": "workstation",
        })))
        .respond_with(envelope(json!({ "app_token": "secret-token", "track_id": 99 })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v8/login/authorize/99"))
        .respond_with(track_status("granted"))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let client = FbxClient::new(client_config(&server), store.clone());
    let mut rx = client.events();

    client.connect().await.unwrap();

    let granted: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter(|e| *e == StatusEvent::ApplicationGranted)
        .collect();
    assert_eq!(granted.len(), 1, "exactly one granted event");

    let stored = store.load().unwrap().unwrap();
    assert_eq!(stored.app_token.expose_secret(), "secret-token");
    assert_eq!(stored.track_id, "99");
    assert_eq!(stored.status, AuthorizationStatus::Granted);
}

#[tokio::test]
async fn granted_credentials_are_reused_across_restart() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;

    // The authorize endpoint may be hit exactly once across both runs.
    Mock::given(method("POST"))
        .and(path("/api/v8/login/authorize"))
        .respond_with(envelope(json!({ "app_token": "tok", "track_id": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v8/login/authorize/1"))
        .respond_with(track_status("granted"))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());

    let first = FbxClient::new(client_config(&server), store.clone());
    first.connect().await.unwrap();

    // Simulated restart: fresh client, same credential store.
    let second = FbxClient::new(client_config(&server), store.clone());
    second.connect().await.unwrap();

    let stored = store.load().unwrap().unwrap();
    assert_eq!(stored.track_id, "1");
    assert_eq!(stored.status, AuthorizationStatus::Granted);
}

#[tokio::test]
async fn pending_polls_again_without_touching_credentials() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/v8/login/authorize"))
        .respond_with(envelope(json!({ "app_token": "tok", "track_id": 5 })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v8/login/authorize/5"))
        .respond_with(track_status("pending"))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v8/login/authorize/5"))
        .respond_with(track_status("granted"))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let client = FbxClient::new(client_config(&server), store.clone());
    let mut rx = client.events();

    client.connect().await.unwrap();

    let events = drain(&mut rx);
    let pending = events
        .iter()
        .filter(|e| **e == StatusEvent::ApplicationPending)
        .count();
    assert_eq!(pending, 2, "one pending event per pending poll");

    let stored = store.load().unwrap().unwrap();
    assert_eq!(stored.app_token.expose_secret(), "tok");
    assert_eq!(stored.track_id, "5");
}

#[tokio::test]
async fn cancel_pending_stops_an_in_flight_connect() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/v8/login/authorize"))
        .respond_with(envelope(json!({ "app_token": "tok", "track_id": 3 })))
        .mount(&server)
        .await;

    // The user never confirms: every poll answers pending.
    Mock::given(method("GET"))
        .and(path("/api/v8/login/authorize/3"))
        .respond_with(track_status("pending"))
        .mount(&server)
        .await;

    let mut config = client_config(&server);
    // Long enough that the loop is parked in its backoff sleep when the
    // cancel arrives; the test only passes if cancellation interrupts it.
    config.poll = PollPolicy {
        initial_delay: Duration::from_secs(30),
        max_delay: Duration::from_secs(30),
        max_attempts: 10,
    };

    let store = Arc::new(MemoryStore::new());
    let client = FbxClient::new(config, store.clone());

    let canceller = client.clone();
    let (result, ()) = tokio::join!(client.connect(), async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel_pending().await;
    });

    let err = result.unwrap_err();
    assert!(matches!(err, Error::Cancelled), "got: {err:?}");

    // Pending credentials survive so a later registration resumes this
    // track instead of requesting another token.
    let stored = store.load().unwrap().unwrap();
    assert_eq!(stored.track_id, "3");
    assert_eq!(stored.status, AuthorizationStatus::Pending);
}

#[tokio::test]
async fn timeout_discards_credentials_and_requests_a_fresh_token() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;

    // First authorize hands out track 1, the retry hands out track 2.
    Mock::given(method("POST"))
        .and(path("/api/v8/login/authorize"))
        .respond_with(envelope(json!({ "app_token": "stale", "track_id": 1 })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v8/login/authorize"))
        .respond_with(envelope(json!({ "app_token": "fresh", "track_id": 2 })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v8/login/authorize/1"))
        .respond_with(track_status("timeout"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v8/login/authorize/2"))
        .respond_with(track_status("granted"))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let client = FbxClient::new(client_config(&server), store.clone());
    let mut rx = client.events();

    client.connect().await.unwrap();

    let events = drain(&mut rx);
    assert!(events.contains(&StatusEvent::ApplicationTimeout));
    assert!(events.contains(&StatusEvent::ApplicationGranted));

    let stored = store.load().unwrap().unwrap();
    assert_eq!(stored.track_id, "2", "track id changed after re-registration");
    assert_eq!(stored.app_token.expose_secret(), "fresh");
}

#[tokio::test]
async fn denial_is_terminal_and_clears_the_store() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/v8/login/authorize"))
        .respond_with(envelope(json!({ "app_token": "tok", "track_id": 3 })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v8/login/authorize/3"))
        .respond_with(track_status("denied"))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let client = FbxClient::new(client_config(&server), store.clone());
    let mut rx = client.events();

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, Error::AuthorizationDenied), "got: {err:?}");
    assert!(drain(&mut rx).contains(&StatusEvent::ApplicationDenied));
    assert!(store.load().unwrap().is_none());
}

#[tokio::test]
async fn unrecognized_status_is_distinguished_from_denial() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/v8/login/authorize"))
        .respond_with(envelope(json!({ "app_token": "tok", "track_id": 4 })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v8/login/authorize/4"))
        .respond_with(track_status("quarantined"))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let client = FbxClient::new(client_config(&server), store.clone());
    let mut rx = client.events();

    let err = client.connect().await.unwrap_err();
    assert!(
        matches!(err, Error::AuthorizationUnknown { ref status } if status == "quarantined"),
        "got: {err:?}"
    );
    assert!(drain(&mut rx).contains(&StatusEvent::ApplicationUnknown));
    assert!(store.load().unwrap().is_none());
}

// ── Session management ──────────────────────────────────────────────

fn session_manager(server: &MockServer, app_token: &str) -> SessionManager {
    let base: Url = format!("{}/api/v8", server.uri()).parse().unwrap();
    let http = Arc::new(HttpClient::new(reqwest::Client::new(), base));
    let (events, _) = tokio::sync::broadcast::channel(16);
    SessionManager::new(
        http,
        identity(),
        secrecy::SecretString::from(app_token.to_owned()),
        events,
    )
}

#[tokio::test]
async fn login_status_refusal_is_a_session_error() {
    let server = MockServer::start().await;

    // Both legs of the session check report as session failures, not
    // bare API refusals.
    Mock::given(method("GET"))
        .and(path("/api/v8/login"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "success": false,
            "msg": "internal error",
            "error_code": "internal_error",
        })))
        .mount(&server)
        .await;

    let manager = session_manager(&server, "app-token");
    let err = manager.ensure_session().await.unwrap_err();
    assert!(matches!(err, Error::Session { .. }), "got: {err:?}");
}

#[tokio::test]
async fn open_session_signs_the_challenge() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v8/login"))
        .respond_with(envelope(json!({ "logged_in": false, "challenge": "nonce-123" })))
        .mount(&server)
        .await;

    let expected_password = session_password(
        &secrecy::SecretString::from("app-token".to_owned()),
        "nonce-123",
    );

    Mock::given(method("POST"))
        .and(path("/api/v8/login/session"))
        .and(body_json(json!({
            "app_id": "org.fbxctl",
            "app_version": "0.1.0",
            "password": expected_password,
        })))
        .respond_with(envelope(json!({
            "session_token": "sess-1",
            "permissions": { "settings": true, "downloader": false },
        })))
        .expect(1)
        .mount(&server)
        .await;

    let manager = session_manager(&server, "app-token");
    let token = manager.ensure_session().await.unwrap();

    assert_eq!(token.expose_secret(), "sess-1");
    let permissions = manager.permissions().await.unwrap();
    assert_eq!(permissions.get("settings"), Some(&true));
    assert_eq!(permissions.get("downloader"), Some(&false));
}

#[tokio::test]
async fn logged_in_true_skips_open_session_and_keeps_the_token() {
    let server = MockServer::start().await;

    // Anonymous status check: not logged in, here is a challenge.
    Mock::given(method("GET"))
        .and(path("/api/v8/login"))
        .and(NoAuthHeader)
        .respond_with(envelope(json!({ "logged_in": false, "challenge": "c1" })))
        .mount(&server)
        .await;

    // Status check with the held token riding along: still valid.
    Mock::given(method("GET"))
        .and(path("/api/v8/login"))
        .and(header(AUTH_HEADER, "sess-1"))
        .respond_with(envelope(json!({ "logged_in": true })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v8/login/session"))
        .respond_with(envelope(json!({ "session_token": "sess-1", "permissions": {} })))
        .expect(1)
        .mount(&server)
        .await;

    let manager = session_manager(&server, "app-token");
    let first = manager.ensure_session().await.unwrap();
    let second = manager.ensure_session().await.unwrap();

    assert_eq!(first.expose_secret(), "sess-1");
    assert_eq!(second.expose_secret(), "sess-1", "token left unchanged");
}

#[tokio::test]
async fn session_state_is_not_committed_on_open_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v8/login"))
        .respond_with(envelope(json!({ "logged_in": false, "challenge": "c1" })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v8/login/session"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "success": false,
            "msg": "Invalid password",
            "error_code": "invalid_token",
        })))
        .mount(&server)
        .await;

    let manager = session_manager(&server, "wrong-token");
    let err = manager.ensure_session().await.unwrap_err();
    assert!(matches!(err, Error::Session { .. }), "got: {err:?}");
    assert!(manager.permissions().await.is_none(), "no partial session state");
}

// ── Signed calls ────────────────────────────────────────────────────

/// Connect a client against a server where registration is already granted.
async fn connected_client(server: &MockServer) -> FbxClient {
    mount_discovery(server).await;

    Mock::given(method("POST"))
        .and(path("/api/v8/login/authorize"))
        .respond_with(envelope(json!({ "app_token": "app-tok", "track_id": 7 })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v8/login/authorize/7"))
        .respond_with(track_status("granted"))
        .mount(server)
        .await;

    // Token still valid when it rides along, challenge otherwise.
    Mock::given(method("GET"))
        .and(path("/api/v8/login"))
        .and(header(AUTH_HEADER, "sess-tok"))
        .respond_with(envelope(json!({ "logged_in": true })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v8/login"))
        .respond_with(envelope(json!({ "logged_in": false, "challenge": "ch" })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v8/login/session"))
        .respond_with(envelope(json!({ "session_token": "sess-tok", "permissions": {} })))
        .mount(server)
        .await;

    let client = FbxClient::new(client_config(server), Arc::new(MemoryStore::new()));
    client.connect().await.unwrap();
    client
}

#[tokio::test]
async fn call_without_body_issues_a_signed_get() {
    let server = MockServer::start().await;
    let client = connected_client(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v8/connection"))
        .and(header(AUTH_HEADER, "sess-tok"))
        .respond_with(envelope(json!({ "state": "up", "type": "ethernet" })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client.call("connection", None).await.unwrap();
    assert_eq!(result["state"], "up");
}

#[tokio::test]
async fn call_with_body_issues_a_signed_post() {
    let server = MockServer::start().await;
    let client = connected_client(&server).await;

    let body = json!({ "enabled": true });

    Mock::given(method("POST"))
        .and(path("/api/v8/wifi/config"))
        .and(header(AUTH_HEADER, "sess-tok"))
        .and(body_json(&body))
        .respond_with(envelope(json!({ "enabled": true })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client.call("wifi/config", Some(&body)).await.unwrap();
    assert_eq!(result["enabled"], true);
}

#[tokio::test]
async fn call_before_connect_is_rejected() {
    let server = MockServer::start().await;
    let client = FbxClient::new(client_config(&server), Arc::new(MemoryStore::new()));

    let err = client.call("connection", None).await.unwrap_err();
    assert!(matches!(err, Error::NotAuthorized), "got: {err:?}");
}

#[tokio::test]
async fn concurrent_calls_open_exactly_one_session() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/v8/login/authorize"))
        .respond_with(envelope(json!({ "app_token": "app-tok", "track_id": 8 })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v8/login/authorize/8"))
        .respond_with(track_status("granted"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v8/login"))
        .and(header(AUTH_HEADER, "sess-tok"))
        .respond_with(envelope(json!({ "logged_in": true })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v8/login"))
        .respond_with(envelope(json!({ "logged_in": false, "challenge": "ch" })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v8/login/session"))
        .respond_with(envelope(json!({ "session_token": "sess-tok", "permissions": {} })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v8/system"))
        .and(header(AUTH_HEADER, "sess-tok"))
        .respond_with(envelope(json!({ "uptime": 1 })))
        .mount(&server)
        .await;

    let client = FbxClient::new(client_config(&server), Arc::new(MemoryStore::new()));
    client.connect().await.unwrap();

    let (a, b) = tokio::join!(client.call("system", None), client.call("system", None));
    a.unwrap();
    b.unwrap();
    // `.expect(1)` on the open-session mock verifies the single flight.
}

// ── Logout ──────────────────────────────────────────────────────────

#[tokio::test]
async fn logout_is_best_effort_and_clears_state() {
    let server = MockServer::start().await;
    let client = connected_client(&server).await;

    // Open a session first.
    client.call("login_check", None).await.ok();

    Mock::given(method("POST"))
        .and(path("/api/v8/login/logout"))
        .and(header(AUTH_HEADER, "sess-tok"))
        .respond_with(envelope(serde_json::Value::Null))
        .mount(&server)
        .await;

    let mut rx = client.events();
    client.logout().await;
    assert!(drain(&mut rx).contains(&StatusEvent::SessionClosed));
    assert!(client.permissions().await.is_none());
}

#[tokio::test]
async fn logout_failure_is_swallowed() {
    let server = MockServer::start().await;
    let client = connected_client(&server).await;

    client.call("login_check", None).await.ok();

    Mock::given(method("POST"))
        .and(path("/api/v8/login/logout"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    // Must not panic or error; local state is cleared regardless.
    client.logout().await;
    assert!(client.permissions().await.is_none());
}

// ── Stored credential resume ────────────────────────────────────────

#[tokio::test]
async fn stored_pending_credentials_resume_polling_without_reauthorize() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/v8/login/authorize"))
        .respond_with(envelope(json!({ "app_token": "t", "track_id": 11 })))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v8/login/authorize/10"))
        .respond_with(track_status("granted"))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    store
        .save(&StoredCredentials {
            app_token: secrecy::SecretString::from("stored-tok".to_owned()),
            track_id: "10".into(),
            status: AuthorizationStatus::Pending,
        })
        .unwrap();

    let client = FbxClient::new(client_config(&server), store.clone());
    client.connect().await.unwrap();

    let stored = store.load().unwrap().unwrap();
    assert_eq!(stored.track_id, "10");
    assert_eq!(stored.app_token.expose_secret(), "stored-tok");
    assert_eq!(stored.status, AuthorizationStatus::Granted);
}

// ── Call failures leave session state untouched ─────────────────────

#[tokio::test]
async fn call_failure_surfaces_without_retry_or_relogin() {
    let server = MockServer::start().await;
    let client = connected_client(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v8/downloads"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "success": false,
            "msg": "Insufficient rights",
            "error_code": "insufficient_rights",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.call("downloads", None).await.unwrap_err();
    assert!(
        matches!(err, Error::Api { ref code, .. } if code.as_deref() == Some("insufficient_rights")),
        "got: {err:?}"
    );
    // Session survives the refused call: the next signed call reuses it.
    assert!(client.permissions().await.is_some());
}
