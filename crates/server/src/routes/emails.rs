//! Email confirmation route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde_json::Value;

use super::message;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::services::{AuthService, ConfirmationService};
use crate::state::AppState;

/// Send (again) the confirmation link for the logged-in account.
///
/// GET /resend_email_confirmation
///
/// # Errors
///
/// 400 if the address is already confirmed or the mail cannot be sent.
pub async fn resend_confirmation(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Value>> {
    let account = AuthService::new(state.repo()).account(user.id).await?;

    ConfirmationService::new(state.repo(), state.tokens(), state.email())
        .request(&account)
        .await?;

    Ok(message("Confirmation email sent"))
}

/// Follow a confirmation link.
///
/// GET /confirm_email/{token}
///
/// # Errors
///
/// 400 for an invalid or expired token, 500 if its account is gone.
pub async fn confirm(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<Value>> {
    ConfirmationService::new(state.repo(), state.tokens(), state.email())
        .confirm(&token)
        .await?;

    Ok(message("Email confirmed successfully"))
}
