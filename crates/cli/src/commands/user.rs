//! Account management commands.
//!
//! # Usage
//!
//! ```bash
//! gs-cli user create -u alice -e alice@example.com -p 'correct horse'
//! gs-cli user confirm -e alice@example.com
//! ```
//!
//! # Environment Variables
//!
//! - `GROCERY_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string

use thiserror::Error;

use grocery_squad_core::{Email, EmailError};
use grocery_squad_server::db::{PgRepository, Repository, RepositoryError};
use grocery_squad_server::services::{AuthError, AuthService, Registration};

use super::migrate::{MigrationError, connect};

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Connect(#[from] MigrationError),

    #[error("{0}")]
    Registration(#[from] AuthError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("No account with email: {0}")]
    NotFound(Email),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Register an account with the same checks as `POST /users`.
///
/// # Returns
///
/// The id of the new account.
///
/// # Errors
///
/// Fails with the first validation or uniqueness error.
pub async fn create(username: &str, email: &str, password: &str) -> Result<i32, UserError> {
    let repo = PgRepository::new(connect().await?);

    let account = AuthService::new(&repo)
        .register(Registration {
            username: Some(username),
            email: Some(email),
            password: Some(password),
        })
        .await?;

    tracing::info!(user_id = %account.id, username = %account.username, "Account created");
    Ok(account.id.as_i32())
}

/// Mark an address as confirmed without a token.
///
/// # Errors
///
/// Fails if the address is invalid or belongs to no account.
pub async fn confirm(email: &str) -> Result<(), UserError> {
    let email = Email::parse(email)?;
    let repo = PgRepository::new(connect().await?);

    if !repo.confirm_email(&email).await? {
        return Err(UserError::NotFound(email));
    }

    tracing::info!(email = %email, "Email confirmed");
    Ok(())
}
