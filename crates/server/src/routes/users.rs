//! Account route handlers.

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use grocery_squad_core::{HouseholdId, UserId};

use super::message;
use crate::error::{Result, add_breadcrumb};
use crate::extract::{ApiJson, JsonBody};
use crate::middleware::RequireAuth;
use crate::services::{AuthService, PasswordChange, Registration};
use crate::state::AppState;

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl JsonBody for CreateUserRequest {
    const EMPTY: &'static str = "No user data provided";
}

/// Only the username may be changed here.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
}

impl JsonBody for UpdateUserRequest {
    const EMPTY: &'static str = "No user data provided";
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
    pub confirm_password: Option<String>,
}

impl JsonBody for ChangePasswordRequest {
    const EMPTY: &'static str = "No password data provided";
}

// =============================================================================
// Response Types
// =============================================================================

/// The logged-in account's own profile.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub confirmed_email: bool,
    /// Always a bare id, never an embedded household.
    pub household_id: Option<HouseholdId>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Register a new account.
///
/// POST /users
///
/// # Errors
///
/// 400 for missing fields, taken names and weak passwords.
pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let account = AuthService::new(state.repo())
        .register(Registration {
            username: req.username.as_deref(),
            email: req.email.as_deref(),
            password: req.password.as_deref(),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "id": account.id,
        })),
    ))
}

/// Show the logged-in account.
///
/// GET /users/me
///
/// # Errors
///
/// 401 without a session.
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<ProfileResponse>> {
    let account = AuthService::new(state.repo()).account(user.id).await?;

    Ok(Json(ProfileResponse {
        id: account.id,
        username: account.username.into_inner(),
        email: account.email.into_inner(),
        confirmed_email: account.confirmed_email,
        household_id: account.household_id,
        created_at: account.created_at,
    }))
}

/// Change the logged-in account's username.
///
/// PATCH /users/me
///
/// The session keeps the old username until the next login; handlers always
/// reload the account by id.
///
/// # Errors
///
/// 400 for extra fields or a taken username.
pub async fn update_me(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let username = AuthService::new(state.repo())
        .rename(user.id, req.username.as_deref())
        .await?;

    add_breadcrumb("account", "Changed username", Some(&[("username", username.as_str())]));
    Ok((StatusCode::CREATED, message("User updated successfully")))
}

/// Change the logged-in account's password.
///
/// PATCH /users/me/change-password
///
/// # Errors
///
/// 400 when the current password is wrong, the new one is weak, or the
/// confirmation differs.
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    AuthService::new(state.repo())
        .change_password(
            user.id,
            PasswordChange {
                current_password: req.current_password.as_deref(),
                new_password: req.new_password.as_deref(),
                confirm_password: req.confirm_password.as_deref(),
            },
        )
        .await?;

    Ok((StatusCode::CREATED, message("Password changed successfully")))
}
