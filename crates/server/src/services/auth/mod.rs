//! Account and authentication service.
//!
//! Registration, password login, password changes and username changes.
//! Session handling stays in the route handlers; this service only decides
//! whether credentials are good and keeps the stored account consistent.

mod error;

pub use error::AuthError;

use grocery_squad_core::{Email, UserId, Username};

use super::password::{hash_password, is_strong_enough, verify_password};
use super::present;
use crate::db::{ConflictKind, Repository, RepositoryError};
use crate::models::{Account, NewAccount};

/// Fields of a registration request, as received.
#[derive(Debug, Default, Clone, Copy)]
pub struct Registration<'a> {
    pub username: Option<&'a str>,
    pub email: Option<&'a str>,
    pub password: Option<&'a str>,
}

/// Fields of a password change request, as received.
#[derive(Debug, Default, Clone, Copy)]
pub struct PasswordChange<'a> {
    pub current_password: Option<&'a str>,
    pub new_password: Option<&'a str>,
    pub confirm_password: Option<&'a str>,
}

/// Authentication service.
pub struct AuthService<'a> {
    repo: &'a dyn Repository,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(repo: &'a dyn Repository) -> Self {
        Self { repo }
    }

    /// Register a new account.
    ///
    /// Checks run in a fixed order: username present, email present, both
    /// well formed, username free, email free, password strong enough.
    ///
    /// # Errors
    ///
    /// Returns the first `AuthError` encountered in that order.
    pub async fn register(&self, form: Registration<'_>) -> Result<Account, AuthError> {
        let username = present(form.username).ok_or(AuthError::Missing("Username"))?;
        let email = present(form.email).ok_or(AuthError::Missing("Email"))?;

        let username = Username::parse(username)?;
        let email = Email::parse(email)?;

        if self.repo.account_by_username(&username).await?.is_some() {
            return Err(AuthError::UsernameTaken);
        }
        if self.repo.account_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password = form.password.unwrap_or_default();
        if !is_strong_enough(password) {
            return Err(AuthError::WeakPassword);
        }
        let password_hash = hash_password(password).map_err(|_| AuthError::PasswordHash)?;

        let account = self
            .repo
            .create_account(NewAccount {
                username,
                email,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(ConflictKind::Email) => AuthError::EmailTaken,
                RepositoryError::Conflict(_) => AuthError::UsernameTaken,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %account.id, username = %account.username, "Account registered");
        Ok(account)
    }

    /// Login with username and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Missing` for blank fields and
    /// `AuthError::InvalidCredentials` if the username is unknown or the
    /// password is wrong.
    pub async fn login(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Account, AuthError> {
        let username = present(username).ok_or(AuthError::Missing("Username"))?;
        let password = present(password).ok_or(AuthError::Missing("Password"))?;

        let Ok(username) = Username::parse(username) else {
            return Err(AuthError::InvalidCredentials);
        };

        let Some((account, password_hash)) = self.repo.credentials_by_username(&username).await?
        else {
            tracing::warn!(username = %username, "Login attempt for unknown username");
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &password_hash) {
            tracing::warn!(user_id = %account.id, "Login attempt with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(account)
    }

    /// Change an account's password.
    ///
    /// # Errors
    ///
    /// Returns `IncorrectPassword` if `current_password` does not verify,
    /// `WeakPassword` if the new password fails the policy, and
    /// `PasswordMismatch` if the confirmation differs.
    pub async fn change_password(
        &self,
        user_id: UserId,
        form: PasswordChange<'_>,
    ) -> Result<(), AuthError> {
        let current = present(form.current_password).ok_or(AuthError::Missing("Current password"))?;
        let new = present(form.new_password).ok_or(AuthError::Missing("New password"))?;
        let confirm =
            present(form.confirm_password).ok_or(AuthError::Missing("Password confirmation"))?;

        let (_, password_hash) = self
            .repo
            .credentials(user_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        if !verify_password(current, &password_hash) {
            return Err(AuthError::IncorrectPassword);
        }
        if !is_strong_enough(new) {
            return Err(AuthError::WeakPassword);
        }
        if new != confirm {
            return Err(AuthError::PasswordMismatch);
        }

        let new_hash = hash_password(new).map_err(|_| AuthError::PasswordHash)?;
        self.repo
            .set_password_hash(user_id, &new_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::AccountNotFound,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Change an account's username.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` for a blank or out-of-range username and
    /// `UsernameTaken` if another account uses it.
    pub async fn rename(&self, user_id: UserId, username: Option<&str>) -> Result<Username, AuthError> {
        let username = Username::parse(username.unwrap_or_default())?;

        self.repo
            .rename_account(user_id, &username)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UsernameTaken,
                RepositoryError::NotFound => AuthError::AccountNotFound,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user_id, username = %username, "Username changed");
        Ok(username)
    }

    /// Load an account by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::AccountNotFound` if the account doesn't exist.
    pub async fn account(&self, user_id: UserId) -> Result<Account, AuthError> {
        self.repo
            .account(user_id)
            .await?
            .ok_or(AuthError::AccountNotFound)
    }
}
