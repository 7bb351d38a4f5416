//! `PostgreSQL` repository.
//!
//! Multi-row writes run in one transaction. Membership changes rely on the
//! `household_member` constraints and on conditional updates, so concurrent
//! requests cannot add an account twice, promote twice, or remove an admin.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use grocery_squad_core::{
    Email, Household, HouseholdId, HouseholdName, ItemId, ItemName, Member, Purchase,
    ShoppingListItem, UserId, Username,
};

use super::{ConflictKind, Repository, RepositoryError};
use crate::models::{Account, NewAccount};

const ACCOUNT_COLUMNS: &str =
    "id, username, email, household_id, confirmed_email, created_at, updated_at";

/// Repository backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    /// Create a new repository over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_account(
        &self,
        filter: &str,
        bind: AccountKey<'_>,
    ) -> Result<Option<Account>, RepositoryError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM grocery.account WHERE {filter} = $1");
        let query = sqlx::query_as::<_, AccountRow>(&sql);
        let row = match bind {
            AccountKey::Id(id) => query.bind(id),
            AccountKey::Text(value) => query.bind(value),
        }
        .fetch_optional(&self.pool)
        .await?;

        row.map(Account::try_from).transpose()
    }

    async fn fetch_credentials(
        &self,
        filter: &str,
        bind: AccountKey<'_>,
    ) -> Result<Option<(Account, String)>, RepositoryError> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS}, password_hash FROM grocery.account WHERE {filter} = $1"
        );
        let query = sqlx::query_as::<_, CredentialsRow>(&sql);
        let row = match bind {
            AccountKey::Id(id) => query.bind(id),
            AccountKey::Text(value) => query.bind(value),
        }
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some((Account::try_from(r.account)?, r.password_hash))),
            None => Ok(None),
        }
    }
}

/// Lookup key for the account queries above.
enum AccountKey<'a> {
    Id(UserId),
    Text(&'a str),
}

// =============================================================================
// Row types
// =============================================================================

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: UserId,
    username: String,
    email: String,
    household_id: Option<HouseholdId>,
    confirmed_email: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = RepositoryError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let username = Username::parse(&row.username).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid username in database: {e}"))
        })?;
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            username,
            email,
            household_id: row.household_id,
            confirmed_email: row.confirmed_email,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CredentialsRow {
    #[sqlx(flatten)]
    account: AccountRow,
    password_hash: String,
}

#[derive(sqlx::FromRow)]
struct HouseholdRow {
    id: HouseholdId,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct MemberRow {
    account_id: UserId,
    username: String,
    is_admin: bool,
    joined_at: DateTime<Utc>,
}

impl TryFrom<MemberRow> for Member {
    type Error = RepositoryError;

    fn try_from(row: MemberRow) -> Result<Self, Self::Error> {
        let username = Username::parse(&row.username).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid username in database: {e}"))
        })?;

        Ok(Self {
            user_id: row.account_id,
            username,
            is_admin: row.is_admin,
            joined_at: row.joined_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: ItemId,
    item_name: String,
    added_at: DateTime<Utc>,
    added_by: Option<UserId>,
    bought_at: Option<DateTime<Utc>>,
    bought_by: Option<UserId>,
}

impl TryFrom<ItemRow> for ShoppingListItem {
    type Error = RepositoryError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let item_name = ItemName::parse(&row.item_name).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid item name in database: {e}"))
        })?;

        let purchase = match (row.bought_at, row.bought_by) {
            (Some(at), Some(by)) => Some(Purchase { by, at }),
            (None, None) => None,
            _ => {
                return Err(RepositoryError::DataCorruption(format!(
                    "item {} has a partial purchase record",
                    row.id
                )));
            }
        };

        Ok(Self {
            id: row.id,
            item_name,
            added_at: row.added_at,
            added_by: row.added_by,
            purchase,
        })
    }
}

/// Translate constraint violations into repository errors.
fn map_write_error(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            let kind = match db_err.constraint() {
                Some("account_username_key") => Some(ConflictKind::Username),
                Some("account_email_key") => Some(ConflictKind::Email),
                Some("household_name_key") => Some(ConflictKind::HouseholdName),
                Some("household_member_pkey" | "household_member_account_key") => {
                    Some(ConflictKind::Membership)
                }
                _ => None,
            };
            if let Some(kind) = kind {
                return RepositoryError::Conflict(kind);
            }
        }
        if db_err.is_foreign_key_violation() {
            return RepositoryError::NotFound;
        }
    }
    RepositoryError::Database(e)
}

// =============================================================================
// Repository implementation
// =============================================================================

#[async_trait]
impl Repository for PgRepository {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_account(&self, account: NewAccount) -> Result<Account, RepositoryError> {
        let sql = format!(
            "INSERT INTO grocery.account (username, email, password_hash) \
             VALUES ($1, $2, $3) RETURNING {ACCOUNT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(account.username.as_str())
            .bind(account.email.as_str())
            .bind(&account.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)?;

        row.try_into()
    }

    async fn account(&self, id: UserId) -> Result<Option<Account>, RepositoryError> {
        self.fetch_account("id", AccountKey::Id(id)).await
    }

    async fn account_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<Account>, RepositoryError> {
        self.fetch_account("username", AccountKey::Text(username.as_str()))
            .await
    }

    async fn account_by_email(&self, email: &Email) -> Result<Option<Account>, RepositoryError> {
        self.fetch_account("email", AccountKey::Text(email.as_str()))
            .await
    }

    async fn credentials_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<(Account, String)>, RepositoryError> {
        self.fetch_credentials("username", AccountKey::Text(username.as_str()))
            .await
    }

    async fn credentials(&self, id: UserId) -> Result<Option<(Account, String)>, RepositoryError> {
        self.fetch_credentials("id", AccountKey::Id(id)).await
    }

    async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE grocery.account SET password_hash = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(hash)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn rename_account(
        &self,
        id: UserId,
        username: &Username,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE grocery.account SET username = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(username.as_str())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn confirm_email(&self, email: &Email) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE grocery.account SET confirmed_email = TRUE, updated_at = NOW() \
             WHERE email = $1",
        )
        .bind(email.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_household(
        &self,
        creator: UserId,
        name: &HouseholdName,
        password_hash: &str,
    ) -> Result<Household, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(Option<HouseholdId>,)> =
            sqlx::query_as("SELECT household_id FROM grocery.account WHERE id = $1 FOR UPDATE")
                .bind(creator)
                .fetch_optional(&mut *tx)
                .await?;
        match current {
            None => return Err(RepositoryError::NotFound),
            Some((Some(_),)) => return Err(RepositoryError::Conflict(ConflictKind::Membership)),
            Some((None,)) => {}
        }

        let (household_id,): (HouseholdId,) = sqlx::query_as(
            "INSERT INTO grocery.household (name, password_hash) VALUES ($1, $2) RETURNING id",
        )
        .bind(name.as_str())
        .bind(password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_error)?;

        sqlx::query(
            "INSERT INTO grocery.household_member (household_id, account_id, is_admin) \
             VALUES ($1, $2, TRUE)",
        )
        .bind(household_id)
        .bind(creator)
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;

        sqlx::query(
            "UPDATE grocery.account SET household_id = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(household_id)
        .bind(creator)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.household(household_id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn household(&self, id: HouseholdId) -> Result<Option<Household>, RepositoryError> {
        let Some(row) = sqlx::query_as::<_, HouseholdRow>(
            "SELECT id, name, created_at, updated_at FROM grocery.household WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let members = sqlx::query_as::<_, MemberRow>(
            r"
            SELECT m.account_id, a.username, m.is_admin, m.joined_at
            FROM grocery.household_member m
            JOIN grocery.account a ON a.id = m.account_id
            WHERE m.household_id = $1
            ORDER BY m.joined_at, m.account_id
            ",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Member::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        let name = HouseholdName::parse(&row.name).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid household name in database: {e}"))
        })?;

        Ok(Some(Household {
            id: row.id,
            name,
            members,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }

    async fn household_password_hash(
        &self,
        id: HouseholdId,
    ) -> Result<Option<String>, RepositoryError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT password_hash FROM grocery.household WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(hash,)| hash))
    }

    async fn rename_household(
        &self,
        id: HouseholdId,
        name: &HouseholdName,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE grocery.household SET name = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(name.as_str())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn add_member(
        &self,
        household: HouseholdId,
        user: UserId,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(Option<HouseholdId>,)> =
            sqlx::query_as("SELECT household_id FROM grocery.account WHERE id = $1 FOR UPDATE")
                .bind(user)
                .fetch_optional(&mut *tx)
                .await?;
        match current {
            None => return Err(RepositoryError::NotFound),
            Some((Some(_),)) => return Err(RepositoryError::Conflict(ConflictKind::Membership)),
            Some((None,)) => {}
        }

        sqlx::query(
            "INSERT INTO grocery.household_member (household_id, account_id) VALUES ($1, $2)",
        )
        .bind(household)
        .bind(user)
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;

        sqlx::query(
            "UPDATE grocery.account SET household_id = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(household)
        .bind(user)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE grocery.household SET updated_at = NOW() WHERE id = $1")
            .bind(household)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn promote_admin(
        &self,
        household: HouseholdId,
        user: UserId,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE grocery.household_member SET is_admin = TRUE \
             WHERE household_id = $1 AND account_id = $2 AND NOT is_admin",
        )
        .bind(household)
        .bind(user)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query("UPDATE grocery.household SET updated_at = NOW() WHERE id = $1")
            .bind(household)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn remove_member(
        &self,
        household: HouseholdId,
        user: UserId,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "DELETE FROM grocery.household_member \
             WHERE household_id = $1 AND account_id = $2 AND NOT is_admin",
        )
        .bind(household)
        .bind(user)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query(
            "UPDATE grocery.account SET household_id = NULL, updated_at = NOW() \
             WHERE id = $1 AND household_id = $2",
        )
        .bind(user)
        .bind(household)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE grocery.household SET updated_at = NOW() WHERE id = $1")
            .bind(household)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn add_item(
        &self,
        household: HouseholdId,
        item_name: &ItemName,
        added_by: UserId,
    ) -> Result<ShoppingListItem, RepositoryError> {
        let row = sqlx::query_as::<_, ItemRow>(
            r"
            INSERT INTO grocery.shopping_list_item (household_id, item_name, added_by)
            VALUES ($1, $2, $3)
            RETURNING id, item_name, added_at, added_by, bought_at, bought_by
            ",
        )
        .bind(household)
        .bind(item_name.as_str())
        .bind(added_by)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;

        row.try_into()
    }

    async fn items(
        &self,
        household: HouseholdId,
    ) -> Result<Vec<ShoppingListItem>, RepositoryError> {
        sqlx::query_as::<_, ItemRow>(
            r"
            SELECT id, item_name, added_at, added_by, bought_at, bought_by
            FROM grocery.shopping_list_item
            WHERE household_id = $1
            ORDER BY id
            ",
        )
        .bind(household)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(ShoppingListItem::try_from)
        .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row(bought_at: Option<DateTime<Utc>>, bought_by: Option<UserId>) -> ItemRow {
        ItemRow {
            id: ItemId::new(4),
            item_name: "Coffee".to_owned(),
            added_at: Utc::now(),
            added_by: Some(UserId::new(1)),
            bought_at,
            bought_by,
        }
    }

    #[test]
    fn test_item_row_purchase_needs_both_fields() {
        let item = ShoppingListItem::try_from(row(None, None)).unwrap();
        assert!(!item.is_bought());

        let at = Utc::now();
        let item = ShoppingListItem::try_from(row(Some(at), Some(UserId::new(2)))).unwrap();
        assert_eq!(
            item.purchase,
            Some(Purchase {
                by: UserId::new(2),
                at
            })
        );

        for partial in [row(Some(at), None), row(None, Some(UserId::new(2)))] {
            assert!(matches!(
                ShoppingListItem::try_from(partial),
                Err(RepositoryError::DataCorruption(_))
            ));
        }
    }
}
