//! Authentication and household authorization extractors.
//!
//! The guards are layered: [`RequireAuth`] needs a logged-in session,
//! [`RequireMember`] additionally loads the account and its household and
//! checks membership, and [`RequireAdmin`] runs the member check before the
//! admin check. Handlers receive the loaded values instead of looking them up
//! again.

use std::ops::Deref;

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use grocery_squad_core::{Household, MembershipError};

use crate::error::{AppError, set_sentry_user};
use crate::models::{Account, CurrentUser, session_keys};
use crate::state::AppState;

/// Extractor that requires a logged-in session.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.username)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(AppError::Unauthenticated)?;

        let user = current_user(session)
            .await
            .ok_or(AppError::Unauthenticated)?;

        set_sentry_user(&user.id, Some(user.username.as_str()));
        Ok(Self(user))
    }
}

/// A logged-in household member, with their account and household loaded.
#[derive(Debug, Clone)]
pub struct MemberContext {
    pub user: CurrentUser,
    pub account: Account,
    pub household: Household,
}

/// A household admin. Derefs to the [`MemberContext`] it was checked from.
#[derive(Debug, Clone)]
pub struct AdminContext(MemberContext);

impl Deref for AdminContext {
    type Target = MemberContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Extractor that requires membership of a household.
///
/// Rejects, in order: no session or vanished account (401), no household
/// reference, a dangling household reference, a household that does not
/// list the account (all 400).
pub struct RequireMember(pub MemberContext);

impl FromRequestParts<AppState> for RequireMember {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;

        let account = state
            .repo()
            .account(user.id)
            .await?
            .ok_or(AppError::Unauthenticated)?;
        let household_id = account.household_id.ok_or(MembershipError::NoHousehold)?;
        let household = state
            .repo()
            .household(household_id)
            .await?
            .ok_or(MembershipError::HouseholdMissing)?;
        household.ensure_member(user.id)?;

        Ok(Self(MemberContext {
            user,
            account,
            household,
        }))
    }
}

/// Extractor that requires admin rights in the requester's household.
pub struct RequireAdmin(pub AdminContext);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireMember(member) = RequireMember::from_request_parts(parts, state).await?;
        member.household.ensure_admin(member.user.id)?;
        Ok(Self(AdminContext(member)))
    }
}

/// The logged-in user, if any.
pub async fn current_user(session: &Session) -> Option<CurrentUser> {
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

/// Helper to set the current user in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CURRENT_USER, user).await
}
