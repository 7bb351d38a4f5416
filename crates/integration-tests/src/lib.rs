//! Integration tests for Grocery Squad.
//!
//! The full router is built over `MemoryRepository` and the tower-sessions
//! `MemoryStore`, and requests are driven through it with
//! `tower::ServiceExt::oneshot`. No database or listening socket is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p grocery-squad-integration-tests
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let app = TestApp::new();
//! let (mut alice, _) = app.signed_in("alice").await;
//! let resp = alice.get("/users/me").await;
//! assert_eq!(resp.status, StatusCode::OK);
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc, clippy::must_use_candidate)]

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;
use tower_sessions::MemoryStore;
use url::Url;

use grocery_squad_server::config::{AppConfig, DEFAULT_MAIL_FROM, SentryConfig, TokenConfig};
use grocery_squad_server::db::MemoryRepository;
use grocery_squad_server::state::AppState;

/// Password used for every account created through [`TestApp::signed_in`].
pub const PASSWORD: &str = "longenough";

/// Name of the session cookie set by the server.
const SESSION_COOKIE: &str = "gs_session";

/// Configuration for tests: no SMTP (mail is logged), no rate limits.
pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: SecretString::from("postgres://localhost/grocery_squad_test"),
        host: IpAddr::from([127, 0, 0, 1]),
        port: 0,
        base_url: Url::parse("http://localhost:5000").expect("valid base url"),
        secret_key: SecretString::from("k8Jm2vQx9Lp4Wn7Rt1Yz6Bc3Fh5Gd0Sa"),
        token: TokenConfig {
            salt: "email-confirm".to_owned(),
            max_age: Duration::from_secs(3600),
        },
        remember_days: 30,
        auth_rate_limit: false,
        smtp: None,
        mail_from: DEFAULT_MAIL_FROM.to_owned(),
        sentry: SentryConfig::default(),
    }
}

/// One application instance with its own in-memory storage.
pub struct TestApp {
    router: Router,
    state: AppState,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let repo = Arc::new(MemoryRepository::new());
        let state = AppState::new(config, repo).expect("test state builds");
        let router = grocery_squad_server::app(state.clone(), MemoryStore::default());
        Self { router, state }
    }

    /// Shared state, for issuing tokens the way the server does.
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    /// A client without a session.
    pub fn client(&self) -> TestClient {
        TestClient {
            router: self.router.clone(),
            cookie: None,
        }
    }

    /// Register `username` (email `{username}@example.com`, password
    /// [`PASSWORD`]) and log in.
    ///
    /// Returns the logged-in client and the new account id.
    pub async fn signed_in(&self, username: &str) -> (TestClient, i64) {
        let mut client = self.client();
        let id = client.register(username).await;

        let resp = client.login(username, PASSWORD).await;
        assert_eq!(resp.status, StatusCode::OK, "login failed: {}", resp.body);
        (client, id)
    }

    /// A signed-in user who created household `name` (join password [`PASSWORD`]).
    ///
    /// Returns the client, the user id and the household id.
    pub async fn household_admin(&self, username: &str, name: &str) -> (TestClient, i64, i64) {
        let (mut client, user_id) = self.signed_in(username).await;
        let resp = client
            .post(
                "/households",
                &json!({ "name": name, "password": PASSWORD }),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "create failed: {}", resp.body);

        let household_id = resp.body["id"].as_i64().expect("household id");
        (client, user_id, household_id)
    }

    /// A signed-in user who joined household `household_id`.
    pub async fn household_member(&self, username: &str, household_id: i64) -> (TestClient, i64) {
        let (mut client, user_id) = self.signed_in(username).await;
        let resp = client
            .post(
                "/households/join",
                &json!({ "id": household_id, "password": PASSWORD }),
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK, "join failed: {}", resp.body);
        (client, user_id)
    }
}

/// A browser-like client: carries the session cookie between requests.
pub struct TestClient {
    router: Router,
    cookie: Option<String>,
}

impl TestClient {
    /// Whether the client currently holds a session cookie.
    pub const fn has_session(&self) -> bool {
        self.cookie.is_some()
    }

    pub async fn get(&mut self, path: &str) -> TestResponse {
        self.send(Method::GET, path, None, &[]).await
    }

    /// GET with extra request headers.
    pub async fn get_with_headers(&mut self, path: &str, headers: &[(&str, &str)]) -> TestResponse {
        self.send(Method::GET, path, None, headers).await
    }

    pub async fn post(&mut self, path: &str, body: &Value) -> TestResponse {
        self.send(Method::POST, path, Some(body.to_string()), &[]).await
    }

    pub async fn patch(&mut self, path: &str, body: &Value) -> TestResponse {
        self.send(Method::PATCH, path, Some(body.to_string()), &[]).await
    }

    pub async fn delete(&mut self, path: &str) -> TestResponse {
        self.send(Method::DELETE, path, None, &[]).await
    }

    /// POST a raw body, for malformed-input tests.
    pub async fn post_raw(&mut self, path: &str, body: &str) -> TestResponse {
        self.send(Method::POST, path, Some(body.to_owned()), &[]).await
    }

    /// Register `username` with `{username}@example.com` and [`PASSWORD`].
    pub async fn register(&mut self, username: &str) -> i64 {
        let resp = self
            .post(
                "/users",
                &json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": PASSWORD,
                }),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "register failed: {}", resp.body);
        resp.body["id"].as_i64().expect("user id")
    }

    pub async fn login(&mut self, username: &str, password: &str) -> TestResponse {
        self.post(
            "/login",
            &json!({ "username": username, "password": password }),
        )
        .await
    }

    async fn send(
        &mut self,
        method: Method,
        path: &str,
        body: Option<String>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body)),
            None => builder.body(Body::empty()),
        }
        .expect("valid request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        self.store_cookie(&headers);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    fn store_cookie(&mut self, headers: &HeaderMap) {
        for value in headers.get_all(header::SET_COOKIE) {
            let Ok(value) = value.to_str() else { continue };
            let pair = value.split(';').next().unwrap_or_default().trim();
            let Some((name, session_id)) = pair.split_once('=') else {
                continue;
            };
            if name != SESSION_COOKIE {
                continue;
            }

            let removed = session_id.is_empty() || value.contains("Max-Age=0");
            self.cookie = (!removed).then(|| pair.to_owned());
        }
    }
}

/// Response with the body already read and parsed.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// JSON body; a plain-text body becomes a JSON string, an empty one `null`.
    pub body: Value,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The `error` field of an error response.
    pub fn error(&self) -> &str {
        self.body["error"].as_str().unwrap_or_default()
    }

    /// The `message` field of a success response.
    pub fn message(&self) -> &str {
        self.body["message"].as_str().unwrap_or_default()
    }
}
