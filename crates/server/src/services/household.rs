//! Household service.
//!
//! Every operation that needs an authenticated member or admin receives the
//! already-authorized [`Household`] from the request extractors; the checks
//! here cover the target of the operation.

use thiserror::Error;

use grocery_squad_core::{
    Household, HouseholdId, HouseholdName, MembershipError, NameError, UserId,
};

use super::password::{WEAK_PASSWORD_MESSAGE, hash_password, is_strong_enough, verify_password};
use super::present;
use crate::db::{ConflictKind, Repository, RepositoryError};

/// Errors that can occur during household operations.
#[derive(Debug, Error)]
pub enum HouseholdError {
    /// A required field was missing or blank.
    #[error("{0} is required")]
    Missing(&'static str),

    /// Household name outside the allowed length window.
    #[error(transparent)]
    InvalidName(#[from] NameError),

    /// Another household already uses this name.
    #[error("The household name is already taken")]
    NameTaken,

    /// Join-password too weak.
    #[error("{}", WEAK_PASSWORD_MESSAGE)]
    WeakPassword,

    /// No household with the requested id.
    #[error("Household not found")]
    NotFound,

    /// Wrong join-password.
    #[error("Incorrect household password")]
    IncorrectPassword,

    /// A membership rule refused the operation.
    #[error(transparent)]
    Membership(#[from] MembershipError),

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

/// Household service.
pub struct HouseholdService<'a> {
    repo: &'a dyn Repository,
}

impl<'a> HouseholdService<'a> {
    /// Create a new household service.
    #[must_use]
    pub const fn new(repo: &'a dyn Repository) -> Self {
        Self { repo }
    }

    /// Create a household with the requester as sole member and admin.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName`, `WeakPassword`, `NameTaken`, or
    /// `Membership(InAnotherHousehold)` if the requester already has one.
    pub async fn create(
        &self,
        creator: UserId,
        name: Option<&str>,
        password: Option<&str>,
    ) -> Result<Household, HouseholdError> {
        let name = HouseholdName::parse(name.unwrap_or_default())?;
        let password = present(password).ok_or(HouseholdError::Missing("Password"))?;
        if !is_strong_enough(password) {
            return Err(HouseholdError::WeakPassword);
        }

        let account = self
            .repo
            .account(creator)
            .await?
            .ok_or(HouseholdError::AccountNotFound)?;
        if account.household_id.is_some() {
            return Err(MembershipError::InAnotherHousehold.into());
        }

        let password_hash = hash_password(password).map_err(|_| HouseholdError::PasswordHash)?;
        let household = self
            .repo
            .create_household(creator, &name, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(ConflictKind::HouseholdName) => HouseholdError::NameTaken,
                RepositoryError::Conflict(_) => MembershipError::InAnotherHousehold.into(),
                RepositoryError::NotFound => HouseholdError::AccountNotFound,
                other => HouseholdError::Repository(other),
            })?;

        tracing::info!(
            household_id = %household.id,
            user_id = %creator,
            name = %household.name,
            "Household created"
        );
        Ok(household)
    }

    /// Rename a household. The caller must already be an admin.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` or `NameTaken`.
    pub async fn rename(
        &self,
        household: &Household,
        name: Option<&str>,
    ) -> Result<HouseholdName, HouseholdError> {
        let name = HouseholdName::parse(name.unwrap_or_default())?;

        self.repo
            .rename_household(household.id, &name)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => HouseholdError::NameTaken,
                RepositoryError::NotFound => HouseholdError::NotFound,
                other => HouseholdError::Repository(other),
            })?;

        tracing::info!(household_id = %household.id, name = %name, "Household renamed");
        Ok(name)
    }

    /// Join a household with its shared password.
    ///
    /// Checks run in order: household exists, password matches, requester is
    /// free to join.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `IncorrectPassword`, or a `Membership` error.
    pub async fn join(
        &self,
        user_id: UserId,
        household_id: Option<HouseholdId>,
        password: Option<&str>,
    ) -> Result<Household, HouseholdError> {
        let household_id = household_id.ok_or(HouseholdError::Missing("Household id"))?;
        let password = present(password).ok_or(HouseholdError::Missing("Password"))?;

        let household = self
            .repo
            .household(household_id)
            .await?
            .ok_or(HouseholdError::NotFound)?;
        let password_hash = self
            .repo
            .household_password_hash(household_id)
            .await?
            .ok_or(HouseholdError::NotFound)?;

        if !verify_password(password, &password_hash) {
            tracing::warn!(
                household_id = %household_id,
                user_id = %user_id,
                "Household join attempt with wrong password"
            );
            return Err(HouseholdError::IncorrectPassword);
        }

        let account = self
            .repo
            .account(user_id)
            .await?
            .ok_or(HouseholdError::AccountNotFound)?;
        household.ensure_can_join(user_id, account.household_id)?;

        self.repo
            .add_member(household_id, user_id)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => MembershipError::AlreadyMember.into(),
                RepositoryError::NotFound => HouseholdError::NotFound,
                other => HouseholdError::Repository(other),
            })?;

        tracing::info!(household_id = %household_id, user_id = %user_id, "Member joined household");
        self.repo
            .household(household_id)
            .await?
            .ok_or(HouseholdError::NotFound)
    }

    /// Promote a member to admin. The caller must already be an admin.
    ///
    /// # Errors
    ///
    /// Returns `Membership(TargetNotMember)` or `Membership(TargetAlreadyAdmin)`.
    pub async fn promote(&self, household: &Household, target: UserId) -> Result<(), HouseholdError> {
        household.ensure_can_promote(target)?;

        match self.repo.promote_admin(household.id, target).await {
            Ok(()) => {}
            // lost a race with another promotion or a removal
            Err(RepositoryError::NotFound) => {
                return Err(self
                    .refusal(household.id, |current| current.ensure_can_promote(target))
                    .await);
            }
            Err(other) => return Err(HouseholdError::Repository(other)),
        }

        tracing::info!(household_id = %household.id, user_id = %target, "Member promoted to admin");
        Ok(())
    }

    /// Remove a non-admin member. The caller must already be an admin.
    ///
    /// # Errors
    ///
    /// Returns `Membership(TargetNotMember)` or `Membership(TargetIsAdmin)`.
    pub async fn remove(&self, household: &Household, target: UserId) -> Result<(), HouseholdError> {
        household.ensure_can_remove(target)?;

        match self.repo.remove_member(household.id, target).await {
            Ok(()) => {}
            Err(RepositoryError::NotFound) => {
                return Err(self
                    .refusal(household.id, |current| current.ensure_can_remove(target))
                    .await);
            }
            Err(other) => return Err(HouseholdError::Repository(other)),
        }

        tracing::info!(household_id = %household.id, user_id = %target, "Member removed from household");
        Ok(())
    }

    /// Why a conditional membership write matched no row, judged against the
    /// household as it is now.
    async fn refusal(
        &self,
        id: HouseholdId,
        check: impl Fn(&Household) -> Result<(), MembershipError>,
    ) -> HouseholdError {
        match self.repo.household(id).await {
            Ok(Some(current)) => check(&current)
                .err()
                .unwrap_or(MembershipError::TargetNotMember)
                .into(),
            Ok(None) => HouseholdError::NotFound,
            Err(e) => HouseholdError::Repository(e),
        }
    }
}
