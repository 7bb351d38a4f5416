//! Health checks, fallbacks and the middleware stack.

use axum::http::StatusCode;
use grocery_squad_integration_tests::{TestApp, test_config};

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();

    let resp = app.client().get("/health").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, "ok");

    let resp = app.client().get("/health/ready").await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = TestApp::new();
    let resp = app.client().get("/households/garden").await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error(), "Not found");
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let app = TestApp::new();

    for path in ["/health", "/users/me", "/nowhere"] {
        let resp = app.client().get(path).await;
        assert_eq!(resp.header("x-content-type-options"), Some("nosniff"), "{path}");
        assert_eq!(resp.header("x-frame-options"), Some("DENY"), "{path}");
        assert_eq!(resp.header("referrer-policy"), Some("no-referrer"), "{path}");
        assert_eq!(resp.header("cache-control"), Some("no-store"), "{path}");
    }
}

#[tokio::test]
async fn test_request_id_is_generated_or_propagated() {
    let app = TestApp::new();

    let resp = app.client().get("/health").await;
    let generated = resp.header("x-request-id").unwrap_or_default();
    assert_eq!(generated.len(), 36);

    let resp = app
        .client()
        .get_with_headers("/health", &[("x-request-id", "upstream-42")])
        .await;
    assert_eq!(resp.header("x-request-id"), Some("upstream-42"));

    let resp = app
        .client()
        .get_with_headers("/health", &[("x-request-id", "bad id with spaces")])
        .await;
    assert_ne!(resp.header("x-request-id"), Some("bad id with spaces"));
}

#[tokio::test]
async fn test_login_is_rate_limited_per_ip() {
    let mut config = test_config();
    config.auth_rate_limit = true;
    let app = TestApp::with_config(config);

    let from = [("x-forwarded-for", "203.0.113.7")];
    for _ in 0..5 {
        let resp = app.client().get_with_headers("/login", &from).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    }

    let resp = app.client().get_with_headers("/login", &from).await;
    assert_eq!(resp.status, StatusCode::TOO_MANY_REQUESTS);

    // Other clients are unaffected, as are routes without credentials
    let resp = app
        .client()
        .get_with_headers("/login", &[("x-forwarded-for", "198.51.100.9")])
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app.client().get_with_headers("/health", &from).await;
    assert_eq!(resp.status, StatusCode::OK);
}
