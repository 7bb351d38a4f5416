//! Email confirmation flow.
//!
//! Requesting a confirmation signs a token for the account's address and
//! mails a link carrying it. Following the link verifies the token and marks
//! the owning account confirmed.

use thiserror::Error;

use grocery_squad_core::Email;

use super::email::{EmailError, EmailService};
use super::token::{TokenError, TokenSigner};
use crate::db::{Repository, RepositoryError};
use crate::models::Account;

#[derive(Debug, Error)]
pub enum ConfirmationError {
    #[error("User email is already confirmed")]
    AlreadyConfirmed,

    #[error("Unable to send the confirmation email")]
    Send(#[source] EmailError),

    #[error("The confirmation link is invalid or has expired")]
    Token(#[from] TokenError),

    /// A valid token names an address no account owns anymore.
    #[error("no account for confirmed email")]
    AccountGone(Email),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

pub struct ConfirmationService<'a> {
    repo: &'a dyn Repository,
    tokens: &'a TokenSigner,
    email: &'a EmailService,
}

impl<'a> ConfirmationService<'a> {
    #[must_use]
    pub const fn new(
        repo: &'a dyn Repository,
        tokens: &'a TokenSigner,
        email: &'a EmailService,
    ) -> Self {
        Self {
            repo,
            tokens,
            email,
        }
    }

    /// Mail a fresh confirmation link to the account's address.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyConfirmed` for confirmed accounts and `Send` when the
    /// mail cannot be delivered.
    pub async fn request(&self, account: &Account) -> Result<(), ConfirmationError> {
        if account.confirmed_email {
            return Err(ConfirmationError::AlreadyConfirmed);
        }

        let token = self.tokens.issue(&account.email);
        let valid_minutes = self.tokens.max_age().as_secs().div_ceil(60);

        self.email
            .send_confirmation(
                &account.email,
                Some(account.username.as_str()),
                &token,
                valid_minutes,
            )
            .await
            .map_err(|e| {
                tracing::error!(user_id = %account.id, error = %e, "Failed to send confirmation email");
                ConfirmationError::Send(e)
            })?;

        tracing::info!(user_id = %account.id, "Confirmation email sent");
        Ok(())
    }

    /// Confirm the address a token was issued for.
    ///
    /// Confirming an already confirmed address succeeds.
    ///
    /// # Errors
    ///
    /// Returns `Token` for bad or expired tokens and `AccountGone` when no
    /// account owns the address.
    pub async fn confirm(&self, token: &str) -> Result<Email, ConfirmationError> {
        let email = self.tokens.verify(token).inspect_err(|e| {
            tracing::warn!(error = %e, "Rejected confirmation token");
        })?;

        if !self.repo.confirm_email(&email).await? {
            return Err(ConfirmationError::AccountGone(email));
        }

        tracing::info!(email = %email, "Email confirmed");
        Ok(email)
    }
}
