//! Household shopping list endpoints.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use grocery_squad_integration_tests::{PASSWORD, TestApp};
use serde_json::json;

const ITEMS: &str = "/households/shopping_list/items";

#[tokio::test]
async fn test_round_trip_single_item() {
    let app = TestApp::new();
    let mut client = app.client();
    let user_id = client.register("abacus").await;
    assert_eq!(client.login("abacus", PASSWORD).await.status, StatusCode::OK);

    let resp = client
        .post("/households", &json!({ "name": "Maple House", "password": PASSWORD }))
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    let resp = client.post(ITEMS, &json!({ "item_name": "Oat milk" })).await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.message(), "Item added to shopping list successfully");

    let resp = client.get(ITEMS).await;
    assert_eq!(resp.status, StatusCode::OK);

    let items = resp.body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item["item_name"], "Oat milk");
    assert_eq!(item["added_by_user"], user_id);
    assert_eq!(item["is_bought"], false);
    assert!(item["id"].is_i64());
    assert!(item["added_date"].is_string());
    assert!(item.get("bought_date").is_none());
    assert!(item.get("bought_by_user").is_none());
}

#[tokio::test]
async fn test_items_are_shared_and_attributed() {
    let app = TestApp::new();
    let (mut alice, alice_id, household_id) = app.household_admin("alice", "Maple House").await;
    let (mut bob, bob_id) = app.household_member("bob", household_id).await;

    assert_eq!(
        alice.post(ITEMS, &json!({ "item_name": "Bread" })).await.status,
        StatusCode::CREATED
    );
    assert_eq!(
        bob.post(ITEMS, &json!({ "item_name": "Eggs" })).await.status,
        StatusCode::CREATED
    );

    let resp = bob.get(ITEMS).await;
    let items = resp.body.as_array().unwrap();
    let names: Vec<_> = items.iter().map(|i| i["item_name"].clone()).collect();
    assert_eq!(names, vec![json!("Bread"), json!("Eggs")]);
    assert_eq!(items[0]["added_by_user"], alice_id);
    assert_eq!(items[1]["added_by_user"], bob_id);

    // Alice sees the same list
    let resp = alice.get(ITEMS).await;
    assert_eq!(resp.body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_duplicate_item_names_are_allowed() {
    let app = TestApp::new();
    let (mut alice, _, _) = app.household_admin("alice", "Maple House").await;

    for _ in 0..2 {
        let resp = alice.post(ITEMS, &json!({ "item_name": "Coffee" })).await;
        assert_eq!(resp.status, StatusCode::CREATED);
    }

    let resp = alice.get(ITEMS).await;
    let items = resp.body.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_ne!(items[0]["id"], items[1]["id"]);
}

#[tokio::test]
async fn test_lists_are_per_household() {
    let app = TestApp::new();
    let (mut alice, _, _) = app.household_admin("alice", "Maple House").await;
    let (mut carol, _, _) = app.household_admin("carol", "Oak House").await;

    alice.post(ITEMS, &json!({ "item_name": "Bread" })).await;

    let resp = carol.get(ITEMS).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, json!([]));
}

#[tokio::test]
async fn test_add_item_validation() {
    let app = TestApp::new();
    let (mut alice, _, _) = app.household_admin("alice", "Maple House").await;

    let resp = alice.post_raw(ITEMS, "").await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error(), "No item data provided");

    let resp = alice.post(ITEMS, &json!({ "item_name": "  " })).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error(), "The `item_name` is required");

    let resp = alice
        .post(ITEMS, &json!({ "item_name": "x".repeat(201) }))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = alice
        .post(ITEMS, &json!({ "item_name": "x".repeat(200) }))
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    let resp = alice.get(ITEMS).await;
    assert_eq!(resp.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_shopping_list_requires_membership() {
    let app = TestApp::new();

    let resp = app.client().get(ITEMS).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let (mut bob, _) = app.signed_in("bob").await;
    let resp = bob.get(ITEMS).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error(), "User is not part of a household");

    let resp = bob.post(ITEMS, &json!({ "item_name": "Bread" })).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_removed_member_loses_access() {
    let app = TestApp::new();
    let (mut alice, _, household_id) = app.household_admin("alice", "Maple House").await;
    let (mut bob, bob_id) = app.household_member("bob", household_id).await;
    bob.post(ITEMS, &json!({ "item_name": "Eggs" })).await;

    let resp = alice.delete(&format!("/households/members/{bob_id}")).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = bob.get(ITEMS).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    // The item stays on the list with its attribution
    let resp = alice.get(ITEMS).await;
    let items = resp.body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["added_by_user"], bob_id);
}
