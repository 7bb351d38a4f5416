//! Household creation, membership and administration.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use grocery_squad_integration_tests::{PASSWORD, TestApp};
use serde_json::json;

// ============================================================================
// Creation and profile
// ============================================================================

#[tokio::test]
async fn test_create_household_makes_creator_sole_admin() {
    let app = TestApp::new();
    let (mut alice, _, household_id) = app.household_admin("alice", "Maple House").await;

    let resp = alice.get("/households/profile").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["id"], household_id);
    assert_eq!(resp.body["name"], "Maple House");
    assert_eq!(resp.body["admins"], json!(["alice"]));
    assert_eq!(resp.body["members"], json!(["alice"]));
    assert!(resp.body["created_at"].is_string());
}

#[tokio::test]
async fn test_create_household_requires_login() {
    let app = TestApp::new();
    let resp = app
        .client()
        .post("/households", &json!({ "name": "Maple House", "password": PASSWORD }))
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_household_validation() {
    let app = TestApp::new();
    app.household_admin("alice", "Maple House").await;
    let (mut bob, _) = app.signed_in("bob").await;

    let resp = bob
        .post("/households", &json!({ "name": "Maple House", "password": PASSWORD }))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error(), "The household name is already taken");

    let resp = bob
        .post("/households", &json!({ "name": "Oak House", "password": "short" }))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.error().starts_with("Password must be at least 8 characters"));

    let resp = bob.post_raw("/households", "{}").await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error(), "No household data provided");

    // Bob is still free to create or join one
    let resp = bob.get("/users/me").await;
    assert!(resp.body["household_id"].is_null());
}

#[tokio::test]
async fn test_create_second_household_is_rejected() {
    let app = TestApp::new();
    let (mut alice, _, _) = app.household_admin("alice", "Maple House").await;

    let resp = alice
        .post("/households", &json!({ "name": "Oak House", "password": PASSWORD }))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error(), "User already belongs to a household");
}

#[tokio::test]
async fn test_profile_requires_membership() {
    let app = TestApp::new();
    let (mut bob, _) = app.signed_in("bob").await;

    let resp = bob.get("/households/profile").await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error(), "User is not part of a household");
}

// ============================================================================
// Rename
// ============================================================================

#[tokio::test]
async fn test_rename_by_admin() {
    let app = TestApp::new();
    let (mut alice, _, _) = app.household_admin("alice", "Maple House").await;

    let resp = alice
        .patch("/households/profile/name", &json!({ "name": "Birch House" }))
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.message(), "Household name updated successfully");

    let resp = alice.get("/households/profile").await;
    assert_eq!(resp.body["name"], "Birch House");
}

#[tokio::test]
async fn test_rename_rules() {
    let app = TestApp::new();
    let (mut alice, _, household_id) = app.household_admin("alice", "Maple House").await;
    app.household_admin("carol", "Oak House").await;
    let (mut bob, _) = app.household_member("bob", household_id).await;

    // Members who are not admins may not rename
    let resp = bob
        .patch("/households/profile/name", &json!({ "name": "Bob's House" }))
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.error(),
        "Only household admins are allowed to change their household"
    );

    let resp = alice
        .patch("/households/profile/name", &json!({ "name": "Oak House" }))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error(), "The household name is already taken");

    let resp = alice.get("/households/profile").await;
    assert_eq!(resp.body["name"], "Maple House");
}

// ============================================================================
// Join
// ============================================================================

#[tokio::test]
async fn test_join_with_password() {
    let app = TestApp::new();
    let (mut alice, _, household_id) = app.household_admin("alice", "Maple House").await;
    let (mut bob, _) = app.signed_in("bob").await;

    let resp = bob
        .post(
            "/households/join",
            &json!({ "id": household_id, "password": PASSWORD }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.message(), "Successfully joined the Maple House Household");

    let resp = bob.get("/users/me").await;
    assert_eq!(resp.body["household_id"], household_id);

    let resp = alice.get("/households/profile").await;
    assert_eq!(resp.body["members"], json!(["alice", "bob"]));
    assert_eq!(resp.body["admins"], json!(["alice"]));
}

#[tokio::test]
async fn test_join_with_wrong_password_does_not_add_member() {
    let app = TestApp::new();
    let (mut alice, _, household_id) = app.household_admin("alice", "Maple House").await;
    let (mut bob, _) = app.signed_in("bob").await;

    let resp = bob
        .post(
            "/households/join",
            &json!({ "id": household_id, "password": "not-the-password" }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error(), "Incorrect household password");

    let resp = alice.get("/households/profile").await;
    assert_eq!(resp.body["members"], json!(["alice"]));

    let resp = bob.get("/users/me").await;
    assert!(resp.body["household_id"].is_null());
}

#[tokio::test]
async fn test_join_unknown_household() {
    let app = TestApp::new();
    let (mut bob, _) = app.signed_in("bob").await;

    let resp = bob
        .post("/households/join", &json!({ "id": 999, "password": PASSWORD }))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error(), "Household not found");
}

#[tokio::test]
async fn test_join_twice_or_elsewhere_is_rejected() {
    let app = TestApp::new();
    let (_, _, maple) = app.household_admin("alice", "Maple House").await;
    let (_, _, oak) = app.household_admin("carol", "Oak House").await;
    let (mut bob, _) = app.household_member("bob", maple).await;

    let resp = bob
        .post("/households/join", &json!({ "id": maple, "password": PASSWORD }))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error(), "User is already a member of this household");

    let resp = bob
        .post("/households/join", &json!({ "id": oak, "password": PASSWORD }))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error(), "User already belongs to a household");
}

#[tokio::test]
async fn test_join_missing_fields() {
    let app = TestApp::new();
    let (mut bob, _) = app.signed_in("bob").await;

    let resp = bob
        .post("/households/join", &json!({ "password": PASSWORD }))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error(), "Household id is required");

    let resp = bob.post("/households/join", &json!({ "id": 1 })).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error(), "Password is required");
}

// ============================================================================
// Promote
// ============================================================================

#[tokio::test]
async fn test_promote_member_to_admin() {
    let app = TestApp::new();
    let (mut alice, _, household_id) = app.household_admin("alice", "Maple House").await;
    let (mut bob, bob_id) = app.household_member("bob", household_id).await;

    let resp = alice.patch(&format!("/households/admins/{bob_id}"), &json!({})).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.message(), "User promoted to household admin");

    let resp = alice.get("/households/profile").await;
    assert_eq!(resp.body["admins"], json!(["alice", "bob"]));

    // Bob now has admin rights
    let resp = bob
        .patch("/households/profile/name", &json!({ "name": "Bob's House" }))
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_promote_rules() {
    let app = TestApp::new();
    let (mut alice, alice_id, household_id) = app.household_admin("alice", "Maple House").await;
    let (mut bob, bob_id) = app.household_member("bob", household_id).await;
    let (_, carol_id) = app.signed_in("carol").await;

    // Non-member target
    let resp = alice
        .patch(&format!("/households/admins/{carol_id}"), &json!({}))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error(), "The user is not a member of this household");

    // Already an admin
    let resp = alice
        .patch(&format!("/households/admins/{alice_id}"), &json!({}))
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error(), "The user is already a household admin");

    // Requester is not an admin
    let resp = bob.patch(&format!("/households/admins/{bob_id}"), &json!({})).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.error(),
        "Only household admins are allowed to change their household"
    );

    // Garbage id
    let resp = alice.patch("/households/admins/not-a-number", &json!({})).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error(), "Invalid user id: not-a-number");

    // admins ⊆ members still holds
    let resp = alice.get("/households/profile").await;
    assert_eq!(resp.body["admins"], json!(["alice"]));
    assert_eq!(resp.body["members"], json!(["alice", "bob"]));
}

// ============================================================================
// Remove
// ============================================================================

#[tokio::test]
async fn test_remove_member() {
    let app = TestApp::new();
    let (mut alice, _, household_id) = app.household_admin("alice", "Maple House").await;
    let (mut bob, bob_id) = app.household_member("bob", household_id).await;

    let resp = alice.delete(&format!("/households/members/{bob_id}")).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    assert!(resp.body.is_null());

    let resp = alice.get("/households/profile").await;
    assert_eq!(resp.body["members"], json!(["alice"]));

    // Bob's account no longer points at the household
    let resp = bob.get("/users/me").await;
    assert!(resp.body["household_id"].is_null());
    let resp = bob.get("/households/profile").await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    // Rejoining is allowed
    let resp = bob
        .post(
            "/households/join",
            &json!({ "id": household_id, "password": PASSWORD }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn test_remove_rules() {
    let app = TestApp::new();
    let (mut alice, alice_id, household_id) = app.household_admin("alice", "Maple House").await;
    let (mut bob, bob_id) = app.household_member("bob", household_id).await;
    let (_, carol_id) = app.signed_in("carol").await;

    // Admins cannot be removed, not even by themselves
    let resp = alice.delete(&format!("/households/members/{alice_id}")).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.error(),
        "Household admins cannot be removed from the household"
    );

    let resp = alice.delete(&format!("/households/members/{carol_id}")).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error(), "The user is not a member of this household");

    // Non-admins cannot remove anyone
    let resp = bob.delete(&format!("/households/members/{bob_id}")).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = alice.get("/households/profile").await;
    assert_eq!(resp.body["admins"], json!(["alice"]));
    assert_eq!(resp.body["members"], json!(["alice", "bob"]));
}

#[tokio::test]
async fn test_promoted_admin_cannot_be_removed() {
    let app = TestApp::new();
    let (mut alice, _, household_id) = app.household_admin("alice", "Maple House").await;
    let (mut bob, bob_id) = app.household_member("bob", household_id).await;
    let resp = alice.patch(&format!("/households/admins/{bob_id}"), &json!({})).await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = alice.delete(&format!("/households/members/{bob_id}")).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = bob.get("/households/profile").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["admins"], json!(["alice", "bob"]));
}

#[tokio::test]
async fn test_admin_routes_require_membership_first() {
    let app = TestApp::new();
    app.household_admin("alice", "Maple House").await;
    let (mut bob, bob_id) = app.signed_in("bob").await;

    // Bob is in no household: the member check answers before the admin check
    let resp = bob.delete(&format!("/households/members/{bob_id}")).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error(), "User is not part of a household");
}
