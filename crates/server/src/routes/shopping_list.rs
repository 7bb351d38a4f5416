//! Household shopping list route handlers.

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use grocery_squad_core::{ItemId, ShoppingListItem, UserId};

use super::message;
use crate::error::Result;
use crate::extract::{ApiJson, JsonBody};
use crate::middleware::RequireMember;
use crate::services::ShoppingListService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub item_name: Option<String>,
}

impl JsonBody for AddItemRequest {
    const EMPTY: &'static str = "No item data provided";
}

/// One shopping list entry as sent to clients.
///
/// The bought fields are present only once the item is bought, and then
/// always together.
#[derive(Debug, Serialize)]
pub struct ItemView {
    pub id: ItemId,
    pub item_name: String,
    pub added_date: DateTime<Utc>,
    pub added_by_user: Option<UserId>,
    pub is_bought: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bought_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bought_by_user: Option<UserId>,
}

impl From<ShoppingListItem> for ItemView {
    fn from(item: ShoppingListItem) -> Self {
        Self {
            id: item.id,
            is_bought: item.is_bought(),
            bought_date: item.purchase.map(|p| p.at),
            bought_by_user: item.purchase.map(|p| p.by),
            item_name: item.item_name.into_inner(),
            added_date: item.added_at,
            added_by_user: item.added_by,
        }
    }
}

/// Add an item to the household list.
///
/// POST /households/shopping_list/items
///
/// Duplicate names are allowed.
///
/// # Errors
///
/// 400 without an `item_name`.
pub async fn add_item(
    State(state): State<AppState>,
    RequireMember(member): RequireMember,
    ApiJson(req): ApiJson<AddItemRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    ShoppingListService::new(state.repo())
        .add_item(&member.household, member.user.id, req.item_name.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        message("Item added to shopping list successfully"),
    ))
}

/// List the household's items, oldest first.
///
/// GET /households/shopping_list/items
///
/// # Errors
///
/// 500 on storage failure.
pub async fn list_items(
    State(state): State<AppState>,
    RequireMember(member): RequireMember,
) -> Result<Json<Vec<ItemView>>> {
    let items = ShoppingListService::new(state.repo())
        .list_items(&member.household)
        .await?;

    Ok(Json(items.into_iter().map(ItemView::from).collect()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use grocery_squad_core::ItemName;

    use super::*;

    fn item() -> ShoppingListItem {
        ShoppingListItem::new(
            ItemId::new(1),
            ItemName::parse("Tennis balls").unwrap(),
            UserId::new(7),
            Utc::now(),
        )
    }

    #[test]
    fn test_unbought_item_omits_purchase_fields() {
        let json = serde_json::to_value(ItemView::from(item())).unwrap();
        assert_eq!(json["is_bought"], false);
        assert_eq!(json["added_by_user"], 7);
        assert!(json.get("bought_date").is_none());
        assert!(json.get("bought_by_user").is_none());
    }

    #[test]
    fn test_bought_item_carries_both_fields() {
        let mut item = item();
        item.mark_bought(UserId::new(9), Utc::now()).unwrap();

        let json = serde_json::to_value(ItemView::from(item)).unwrap();
        assert_eq!(json["is_bought"], true);
        assert_eq!(json["bought_by_user"], 9);
        assert!(json["bought_date"].is_string());
    }
}
