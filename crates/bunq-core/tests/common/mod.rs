/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for bunq-core tests

#![allow(dead_code)]

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bunq_core::{
    BackoffConfig, ClientConfig, ClientContext, KeyPair, ServerPublicKey, SessionManager, UserKind,
};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

pub const CLIENT_PRIVATE_PEM: &str = include_str!("../fixtures/client_private.pem");
pub const SERVER_PRIVATE_PEM: &str = include_str!("../fixtures/server_private.pem");
pub const SERVER_PUBLIC_PEM: &str = include_str!("../fixtures/server_public.pem");

pub const INSTALLATION_TOKEN: &str = "installation-token-0123456789";
pub const SESSION_TOKEN: &str = "session-token-abcdefghij";
pub const USER_ID: u64 = 42;
pub const SESSION_ID: u64 = 133;
pub const DEVICE_SERVER_ID: u64 = 77;

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// API base URL served by the mock server
pub fn api_url(server: &MockServer) -> String {
    format!("{}/v1/", server.uri())
}

pub fn client_key() -> KeyPair {
    KeyPair::from_pkcs8_pem(CLIENT_PRIVATE_PEM).expect("client fixture key")
}

pub fn server_key() -> KeyPair {
    KeyPair::from_pkcs8_pem(SERVER_PRIVATE_PEM).expect("server fixture key")
}

/// Short retry budget so exhausted-retry tests finish quickly
pub fn fast_config() -> ClientConfig {
    ClientConfig {
        backoff: BackoffConfig {
            initial_interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(20),
            max_elapsed: Some(Duration::from_millis(150)),
            multiplier: 1.5,
        },
        ..ClientConfig::default()
    }
}

/// Response whose body is signed with the server fixture key
pub fn signed_json(status: u16, body: &Value) -> ResponseTemplate {
    let bytes = serde_json::to_vec(body).expect("serialize body");
    let signature = BASE64.encode(server_key().sign(&bytes));
    ResponseTemplate::new(status)
        .insert_header("X-Bunq-Server-Signature", signature.as_str())
        .set_body_raw(bytes, "application/json")
}

/// Response signed over `signed` but carrying `sent` as its body
pub fn tampered_json(signed: &Value, sent: &[u8]) -> ResponseTemplate {
    let bytes = serde_json::to_vec(signed).expect("serialize body");
    let signature = BASE64.encode(server_key().sign(&bytes));
    ResponseTemplate::new(200)
        .insert_header("X-Bunq-Server-Signature", signature.as_str())
        .set_body_raw(sent.to_vec(), "application/json")
}

/// Matches requests whose client signature verifies against the client fixture key
pub struct ClientSignature {
    key: ServerPublicKey,
}

impl ClientSignature {
    pub fn valid() -> Self {
        let pem = client_key().public_key_pem().expect("client public key");
        Self {
            key: ServerPublicKey::from_pem(&pem).expect("client public key parses"),
        }
    }
}

impl Match for ClientSignature {
    fn matches(&self, request: &Request) -> bool {
        request
            .headers
            .get("x-bunq-client-signature")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| BASE64.decode(value).ok())
            .is_some_and(|signature| self.key.verify(&request.body, &signature))
    }
}

pub fn installation_body() -> Value {
    json!({
        "Response": [
            {"Id": {"id": 9}},
            {"Token": {
                "id": 12,
                "created": "2015-06-13 23:19:16.215235",
                "updated": "2015-06-30 09:12:31.981573",
                "token": INSTALLATION_TOKEN
            }},
            {"ServerPublicKey": {"server_public_key": SERVER_PUBLIC_PEM}}
        ]
    })
}

pub fn device_server_body() -> Value {
    json!({"Response": [{"Id": {"id": DEVICE_SERVER_ID}}]})
}

pub fn session_server_body(business: bool) -> Value {
    let user = if business {
        json!({"UserCompany": {"id": USER_ID, "name": "bunq", "display_name": "bunq"}})
    } else {
        json!({"UserPerson": {"id": USER_ID, "display_name": "Ada", "public_nick_name": "Ada"}})
    };
    json!({
        "Response": [
            {"Id": {"id": SESSION_ID}},
            {"Token": {"id": 1, "token": SESSION_TOKEN}},
            user
        ]
    })
}

pub fn accounts_body(ids: &[u64]) -> Value {
    let accounts: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({"MonetaryAccountBank": {
                "id": id,
                "description": format!("account {id}"),
                "currency": "EUR",
                "balance": {"value": "12.50", "currency": "EUR"},
                "status": "ACTIVE"
            }})
        })
        .collect();
    json!({"Response": accounts, "Pagination": {
        "future_url": null,
        "newer_url": null,
        "older_url": null
    }})
}

/// Mount signed installation, device-server and session-server responses
pub async fn mount_handshake(server: &MockServer, business: bool) {
    Mock::given(method("POST"))
        .and(path("/v1/installation"))
        .respond_with(signed_json(200, &installation_body()))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/device-server"))
        .respond_with(signed_json(200, &device_server_body()))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/session-server"))
        .respond_with(signed_json(200, &session_server_body(business)))
        .mount(server)
        .await;
}

/// Snapshot of a fully established client pointing at `server`
pub fn established_context(server: &MockServer) -> ClientContext {
    ClientContext {
        api_url: api_url(server),
        private_key: CLIENT_PRIVATE_PEM.to_string(),
        installation_token: INSTALLATION_TOKEN.to_string(),
        server_public_key: SERVER_PUBLIC_PEM.to_string(),
        device_description: "test device".to_string(),
        api_key: "api-key".to_string(),
        permitted_ips: vec!["*".to_string()],
        device_server_id: Some(DEVICE_SERVER_ID),
        session_id: Some(SESSION_ID),
        session_token: Some(SESSION_TOKEN.to_string()),
        session_user_id: Some(USER_ID),
        session_user_kind: Some(UserKind::Person),
        session_created_at: None,
        business_user: false,
    }
}

/// Manager restored from [`established_context`] without any network traffic
pub fn established_manager(server: &MockServer, config: ClientConfig) -> SessionManager {
    SessionManager::from_context(&established_context(server), config).expect("restore context")
}
