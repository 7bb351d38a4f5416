//! Login, logout and session handling.

use axum::http::StatusCode;
use grocery_squad_integration_tests::{PASSWORD, TestApp};
use serde_json::json;

#[tokio::test]
async fn test_login_page_rejects_get() {
    let app = TestApp::new();
    let resp = app.client().get("/login").await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.message(), "Use POST request for login endpoint");
}

#[tokio::test]
async fn test_login_sets_session_cookie() {
    let app = TestApp::new();
    let mut client = app.client();
    client.register("alice").await;
    assert!(!client.has_session());

    let resp = client.login("alice", PASSWORD).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.message(), "Logged in successfully");
    assert!(client.has_session());

    let cookie = resp.header("set-cookie").unwrap_or_default();
    assert!(cookie.starts_with("gs_session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    // Without remember_me the session ends with the browser
    assert!(!cookie.contains("Max-Age"));
    assert!(!cookie.contains("Expires"));
}

#[tokio::test]
async fn test_login_with_remember_me_sets_persistent_cookie() {
    let app = TestApp::new();
    let mut client = app.client();
    client.register("alice").await;

    let resp = client
        .post(
            "/login?remember_me=1",
            &json!({ "username": "alice", "password": PASSWORD }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let cookie = resp.header("set-cookie").unwrap_or_default();
    assert!(cookie.contains("Max-Age=") || cookie.contains("Expires="));
}

#[tokio::test]
async fn test_login_bad_credentials() {
    let app = TestApp::new();
    let mut client = app.client();
    client.register("alice").await;

    let resp = client.login("alice", "wrongpassword").await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error(), "Incorrect username or password");
    assert!(!client.has_session());

    // Unknown users get the same answer
    let resp = client.login("nobody", PASSWORD).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error(), "Incorrect username or password");
}

#[tokio::test]
async fn test_login_missing_fields() {
    let app = TestApp::new();
    let mut client = app.client();

    let resp = client.post_raw("/login", "").await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error(), "No user data provided");

    let resp = client.post("/login", &json!({ "username": "alice" })).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error(), "Password is required");
}

#[tokio::test]
async fn test_login_when_already_logged_in_short_circuits() {
    let app = TestApp::new();
    let (mut alice, _) = app.signed_in("alice").await;

    // Even a body that would otherwise fail is not looked at
    let resp = alice.post_raw("/login", "").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.message(), "Already logged in.");
}

#[tokio::test]
async fn test_login_follows_local_next() {
    let app = TestApp::new();
    let mut client = app.client();
    client.register("alice").await;

    let resp = client
        .post(
            "/login?next=/users/me",
            &json!({ "username": "alice", "password": PASSWORD }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.header("location"), Some("/users/me"));

    // The session is established all the same
    assert_eq!(client.get("/users/me").await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_login_ignores_off_site_next() {
    let app = TestApp::new();
    let mut client = app.client();
    client.register("alice").await;

    for next in ["https://evil.example.com/", "//evil.example.com/phish"] {
        let mut fresh = app.client();
        let resp = fresh
            .post(
                &format!("/login?next={next}"),
                &json!({ "username": "alice", "password": PASSWORD }),
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK, "next={next}");
        assert_eq!(resp.message(), "Logged in successfully");
        assert!(resp.header("location").is_none());
    }
}

#[tokio::test]
async fn test_login_ignores_absolute_next_on_own_origin() {
    let app = TestApp::new();
    let mut client = app.client();
    client.register("alice").await;

    let resp = client
        .post(
            "/login?next=http://localhost:5000/households/profile",
            &json!({ "username": "alice", "password": PASSWORD }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.message(), "Logged in successfully");
    assert!(resp.header("location").is_none());
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = TestApp::new();
    let (mut alice, _) = app.signed_in("alice").await;

    let resp = alice.get("/logout").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.message(), "Logged out successfully");
    assert!(!alice.has_session());

    let resp = alice.get("/users/me").await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_requires_session() {
    let app = TestApp::new();
    let resp = app.client().get("/logout").await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error(), "Please login before accessing this resource.");
}

#[tokio::test]
async fn test_login_again_after_logout() {
    let app = TestApp::new();
    let (mut alice, _) = app.signed_in("alice").await;
    let resp = alice.get("/logout").await;
    assert_eq!(resp.status, StatusCode::OK);

    // Same client, fresh session
    let resp = alice.login("alice", PASSWORD).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.message(), "Logged in successfully");
}
