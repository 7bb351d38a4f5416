//! Authentication error types.

use thiserror::Error;

use grocery_squad_core::{EmailError, NameError};

use crate::db::RepositoryError;
use crate::services::password::WEAK_PASSWORD_MESSAGE;

/// Errors that can occur during account and authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A required field was missing or blank.
    #[error("{0} is required")]
    Missing(&'static str),

    /// Username outside the allowed length window.
    #[error(transparent)]
    InvalidName(#[from] NameError),

    /// Invalid email format.
    #[error("Invalid email address: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Another account already uses this username.
    #[error("The username is already taken")]
    UsernameTaken,

    /// Another account already uses this email.
    #[error("The email is already taken")]
    EmailTaken,

    /// Password too weak.
    #[error("{}", WEAK_PASSWORD_MESSAGE)]
    WeakPassword,

    /// Invalid credentials (wrong password or unknown username).
    #[error("Incorrect username or password")]
    InvalidCredentials,

    /// The current password given for a password change is wrong.
    #[error("The current password is incorrect")]
    IncorrectPassword,

    /// New password and its confirmation differ.
    #[error("The new password and its confirmation do not match")]
    PasswordMismatch,

    /// The session refers to an account that no longer exists.
    #[error("account not found")]
    AccountNotFound,

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
