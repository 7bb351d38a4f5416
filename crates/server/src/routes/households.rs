//! Household route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use grocery_squad_core::{Household, HouseholdId, UserId};

use super::message;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::extract::{ApiJson, JsonBody};
use crate::middleware::{RequireAdmin, RequireAuth, RequireMember};
use crate::services::HouseholdService;
use crate::state::AppState;

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateHouseholdRequest {
    pub name: Option<String>,
    pub password: Option<String>,
}

impl JsonBody for CreateHouseholdRequest {
    const EMPTY: &'static str = "No household data provided";
}

#[derive(Debug, Deserialize)]
pub struct RenameHouseholdRequest {
    pub name: Option<String>,
}

impl JsonBody for RenameHouseholdRequest {
    const EMPTY: &'static str = "No household data provided";
}

#[derive(Debug, Deserialize)]
pub struct JoinHouseholdRequest {
    pub id: Option<HouseholdId>,
    pub password: Option<String>,
}

impl JsonBody for JoinHouseholdRequest {
    const EMPTY: &'static str = "No household data provided";
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct HouseholdProfile {
    pub id: HouseholdId,
    pub name: String,
    /// Admin usernames, in join order.
    pub admins: Vec<String>,
    /// Member usernames, in join order.
    pub members: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Household> for HouseholdProfile {
    fn from(household: &Household) -> Self {
        Self {
            id: household.id,
            name: household.name.as_str().to_owned(),
            admins: household
                .admins()
                .map(|m| m.username.as_str().to_owned())
                .collect(),
            members: household
                .members
                .iter()
                .map(|m| m.username.as_str().to_owned())
                .collect(),
            created_at: household.created_at,
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Create a household with the requester as its admin.
///
/// POST /households
///
/// # Errors
///
/// 400 for a taken name, a weak password, or a requester already in a household.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(req): ApiJson<CreateHouseholdRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let household = HouseholdService::new(state.repo())
        .create(user.id, req.name.as_deref(), req.password.as_deref())
        .await?;

    add_breadcrumb(
        "household",
        "Created household",
        Some(&[("household_id", &household.id.to_string())]),
    );
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Household created successfully",
            "id": household.id,
        })),
    ))
}

/// GET /households/profile
pub async fn profile(RequireMember(member): RequireMember) -> Json<HouseholdProfile> {
    Json(HouseholdProfile::from(&member.household))
}

/// Rename the household.
///
/// PATCH /households/profile/name
///
/// # Errors
///
/// 400 for a taken or out-of-range name.
pub async fn rename(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(req): ApiJson<RenameHouseholdRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    HouseholdService::new(state.repo())
        .rename(&admin.household, req.name.as_deref())
        .await?;

    Ok((StatusCode::CREATED, message("Household name updated successfully")))
}

/// Join a household with its password.
///
/// POST /households/join
///
/// # Errors
///
/// 400 when the household does not exist or the requester is already in one,
/// 401 for a wrong password.
pub async fn join(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(req): ApiJson<JoinHouseholdRequest>,
) -> Result<Json<Value>> {
    let household = HouseholdService::new(state.repo())
        .join(user.id, req.id, req.password.as_deref())
        .await?;

    add_breadcrumb(
        "household",
        "Joined household",
        Some(&[("household_id", &household.id.to_string())]),
    );
    Ok(message(&format!(
        "Successfully joined the {} Household",
        household.name
    )))
}

/// Remove a non-admin member.
///
/// DELETE /households/members/{user_id}
///
/// # Errors
///
/// 400 if the target is not a member, 401 if the target is an admin.
pub async fn remove_member(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(user_id): Path<String>,
) -> Result<StatusCode> {
    let target = parse_user_id(&user_id)?;
    HouseholdService::new(state.repo())
        .remove(&admin.household, target)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Promote a member to admin.
///
/// PATCH /households/admins/{user_id}
///
/// # Errors
///
/// 400 if the target is not a member, 401 if the target is already an admin.
pub async fn promote_admin(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(user_id): Path<String>,
) -> Result<Json<Value>> {
    let target = parse_user_id(&user_id)?;
    HouseholdService::new(state.repo())
        .promote(&admin.household, target)
        .await?;

    Ok(message("User promoted to household admin"))
}

fn parse_user_id(raw: &str) -> Result<UserId> {
    raw.parse()
        .map_err(|_| AppError::Validation(format!("Invalid user id: {raw}")))
}
