//! Account domain types.
//!
//! These types represent validated domain objects separate from database row types.

use chrono::{DateTime, Utc};

use grocery_squad_core::{Email, HouseholdId, UserId, Username};

/// A registered account.
///
/// The password hash is deliberately not part of this type; it is only read
/// through the repository's credential lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Unique account ID.
    pub id: UserId,
    /// Unique username used to log in.
    pub username: Username,
    /// Unique email address.
    pub email: Email,
    /// Household this account belongs to, if any.
    pub household_id: Option<HouseholdId>,
    /// Whether the email address has been confirmed.
    pub confirmed_email: bool,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Data needed to insert a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: Username,
    pub email: Email,
    /// Argon2 PHC string, never the raw password.
    pub password_hash: String,
}
