//! Persistence for accounts, households and shopping lists.
//!
//! # Database
//!
//! ## Tables (schema `grocery`)
//!
//! - `account` - Registered accounts, with an optional household reference
//! - `household` - Households and their join-password hash
//! - `household_member` - One row per membership; `is_admin` marks admins
//! - `shopping_list_item` - Items on a household (or personal) list
//!
//! Sessions are stored by `tower-sessions-sqlx-store` in its own schema.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p grocery-squad-cli -- migrate
//! ```
//!
//! # Implementations
//!
//! Handlers only see the [`Repository`] trait. [`PgRepository`] is used in
//! production; [`MemoryRepository`] keeps everything in process and backs the
//! test suites.

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use grocery_squad_core::{
    Email, Household, HouseholdId, HouseholdName, ItemName, ShoppingListItem, UserId, Username,
};

use crate::models::{Account, NewAccount};

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

/// Which uniqueness rule a write violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    Username,
    Email,
    HouseholdName,
    /// The account already belongs to a household.
    Membership,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Username => "username",
            Self::Email => "email",
            Self::HouseholdName => "household name",
            Self::Membership => "household membership",
        })
    }
}

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found, or a conditional update matched nothing.
    #[error("not found")]
    NotFound,

    /// Unique constraint violation.
    #[error("constraint violation: {0} already exists")]
    Conflict(ConflictKind),
}

/// Storage operations used by the services.
///
/// Every method is a single atomic unit: implementations must not leave
/// partial writes behind when they return an error.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Check that the backing store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;

    // -------------------------------------------------------------------------
    // Accounts
    // -------------------------------------------------------------------------

    /// Insert an account.
    ///
    /// Fails with `Conflict(Username)` or `Conflict(Email)`.
    async fn create_account(&self, account: NewAccount) -> Result<Account, RepositoryError>;

    async fn account(&self, id: UserId) -> Result<Option<Account>, RepositoryError>;

    async fn account_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<Account>, RepositoryError>;

    async fn account_by_email(&self, email: &Email) -> Result<Option<Account>, RepositoryError>;

    /// Account and password hash, for login.
    async fn credentials_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<(Account, String)>, RepositoryError>;

    /// Account and password hash, for password changes.
    async fn credentials(&self, id: UserId) -> Result<Option<(Account, String)>, RepositoryError>;

    async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), RepositoryError>;

    /// Fails with `Conflict(Username)` if another account uses the name.
    async fn rename_account(&self, id: UserId, username: &Username)
    -> Result<(), RepositoryError>;

    /// Mark the account owning `email` as confirmed.
    ///
    /// Returns `false` if no account has that address.
    async fn confirm_email(&self, email: &Email) -> Result<bool, RepositoryError>;

    // -------------------------------------------------------------------------
    // Households
    // -------------------------------------------------------------------------

    /// Create a household with `creator` as its only member and admin, and
    /// point the creator's account at it.
    ///
    /// Fails with `Conflict(HouseholdName)`, or `Conflict(Membership)` if the
    /// creator already belongs to a household.
    async fn create_household(
        &self,
        creator: UserId,
        name: &HouseholdName,
        password_hash: &str,
    ) -> Result<Household, RepositoryError>;

    async fn household(&self, id: HouseholdId) -> Result<Option<Household>, RepositoryError>;

    async fn household_password_hash(
        &self,
        id: HouseholdId,
    ) -> Result<Option<String>, RepositoryError>;

    /// Fails with `Conflict(HouseholdName)` or `NotFound`.
    async fn rename_household(
        &self,
        id: HouseholdId,
        name: &HouseholdName,
    ) -> Result<(), RepositoryError>;

    /// Add a non-admin member and point their account at the household.
    ///
    /// Fails with `Conflict(Membership)` if the account already belongs to a
    /// household, or `NotFound` if either side is missing.
    async fn add_member(
        &self,
        household: HouseholdId,
        user: UserId,
    ) -> Result<(), RepositoryError>;

    /// Promote a non-admin member. `NotFound` if no such non-admin member.
    async fn promote_admin(
        &self,
        household: HouseholdId,
        user: UserId,
    ) -> Result<(), RepositoryError>;

    /// Remove a non-admin member and clear their household reference.
    /// `NotFound` if no such non-admin member.
    async fn remove_member(
        &self,
        household: HouseholdId,
        user: UserId,
    ) -> Result<(), RepositoryError>;

    // -------------------------------------------------------------------------
    // Shopping list
    // -------------------------------------------------------------------------

    async fn add_item(
        &self,
        household: HouseholdId,
        item_name: &ItemName,
        added_by: UserId,
    ) -> Result<ShoppingListItem, RepositoryError>;

    /// Items in insertion order.
    async fn items(&self, household: HouseholdId)
    -> Result<Vec<ShoppingListItem>, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
