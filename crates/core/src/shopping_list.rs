//! Shopping list items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ItemId, ItemName, UserId};

/// Errors raised by shopping list operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShoppingListError {
    /// The item has already been marked as bought.
    #[error("Item has already been bought")]
    AlreadyBought,
}

/// Who bought an item, and when.
///
/// The two are recorded together or not at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    /// Account that bought the item.
    pub by: UserId,
    /// When the item was bought.
    pub at: DateTime<Utc>,
}

/// A single entry on a household's shopping list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoppingListItem {
    /// Unique item ID.
    pub id: ItemId,
    /// What to buy.
    pub item_name: ItemName,
    /// When the item was added.
    pub added_at: DateTime<Utc>,
    /// Account that added the item. `None` once that account is deleted.
    pub added_by: Option<UserId>,
    /// Set once the item is bought.
    pub purchase: Option<Purchase>,
}

impl ShoppingListItem {
    /// Create a fresh, unbought item.
    #[must_use]
    pub const fn new(
        id: ItemId,
        item_name: ItemName,
        added_by: UserId,
        added_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            item_name,
            added_at,
            added_by: Some(added_by),
            purchase: None,
        }
    }

    /// Returns true once the item is bought.
    #[must_use]
    pub const fn is_bought(&self) -> bool {
        self.purchase.is_some()
    }

    /// Record the purchase.
    ///
    /// # Errors
    ///
    /// Returns `ShoppingListError::AlreadyBought` if a purchase is already
    /// recorded; the original purchase is kept.
    pub fn mark_bought(&mut self, by: UserId, at: DateTime<Utc>) -> Result<(), ShoppingListError> {
        if self.is_bought() {
            return Err(ShoppingListError::AlreadyBought);
        }
        self.purchase = Some(Purchase { by, at });
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item() -> ShoppingListItem {
        ShoppingListItem::new(
            ItemId::new(1),
            ItemName::parse("milk").unwrap(),
            UserId::new(1),
            Utc::now(),
        )
    }

    #[test]
    fn test_new_item_is_unbought() {
        let item = item();
        assert!(!item.is_bought());
        assert_eq!(item.added_by, Some(UserId::new(1)));
    }

    #[test]
    fn test_mark_bought_once() {
        let mut item = item();
        let at = Utc::now();
        item.mark_bought(UserId::new(2), at).unwrap();

        let purchase = item.purchase.unwrap();
        assert_eq!(purchase.by, UserId::new(2));
        assert_eq!(purchase.at, at);

        assert_eq!(
            item.mark_bought(UserId::new(3), Utc::now()),
            Err(ShoppingListError::AlreadyBought)
        );
        assert_eq!(item.purchase.unwrap().by, UserId::new(2));
    }
}
