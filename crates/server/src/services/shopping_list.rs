//! Shopping list service.

use thiserror::Error;

use grocery_squad_core::{Household, ItemName, NameError, ShoppingListItem, UserId};

use crate::db::{Repository, RepositoryError};

/// Errors that can occur during shopping list operations.
#[derive(Debug, Error)]
pub enum ShoppingListError {
    #[error("The `item_name` is required")]
    MissingItemName,

    #[error(transparent)]
    InvalidName(#[from] NameError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Shopping list service, scoped to one household.
pub struct ShoppingListService<'a> {
    repo: &'a dyn Repository,
}

impl<'a> ShoppingListService<'a> {
    #[must_use]
    pub const fn new(repo: &'a dyn Repository) -> Self {
        Self { repo }
    }

    /// Add an unbought item to the household's list.
    ///
    /// # Errors
    ///
    /// Returns `MissingItemName` when the name is absent or blank.
    pub async fn add_item(
        &self,
        household: &Household,
        added_by: UserId,
        item_name: Option<&str>,
    ) -> Result<ShoppingListItem, ShoppingListError> {
        let item_name = super::present(item_name).ok_or(ShoppingListError::MissingItemName)?;
        let item_name = ItemName::parse(item_name)?;

        let item = self.repo.add_item(household.id, &item_name, added_by).await?;
        tracing::info!(
            household_id = %household.id,
            item_id = %item.id,
            user_id = %added_by,
            "Item added to shopping list"
        );
        Ok(item)
    }

    /// All items on the household's list, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `Repository` on storage failure.
    pub async fn list_items(
        &self,
        household: &Household,
    ) -> Result<Vec<ShoppingListItem>, ShoppingListError> {
        Ok(self.repo.items(household.id).await?)
    }
}
