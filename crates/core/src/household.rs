//! Household membership model.
//!
//! A household is a group of accounts sharing one shopping list. Admin status
//! is a flag on each membership rather than a second list, so every admin is
//! necessarily a member.
//!
//! The `ensure_*` methods are the authorization predicates used by request
//! handlers. They only inspect state; persistence is the caller's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{HouseholdId, HouseholdName, UserId, Username};

/// Reasons a membership check or change is refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MembershipError {
    /// The requester does not belong to any household.
    #[error("User is not part of a household")]
    NoHousehold,

    /// The requester's household reference points at nothing.
    #[error("User's Household does not exist")]
    HouseholdMissing,

    /// The requester references a household that does not list them.
    #[error("User is not a member of the {household} Household.")]
    NotAMember {
        /// Name of the household that was checked.
        household: String,
    },

    /// The requester is a member but not an admin.
    #[error("Only household admins are allowed to change their household")]
    NotAnAdmin,

    /// The requester already belongs to the household they tried to join.
    #[error("User is already a member of this household")]
    AlreadyMember,

    /// The requester already belongs to a different household.
    #[error("User already belongs to a household")]
    InAnotherHousehold,

    /// The target account is not a member of the requester's household.
    #[error("The user is not a member of this household")]
    TargetNotMember,

    /// The target account is already an admin.
    #[error("The user is already a household admin")]
    TargetAlreadyAdmin,

    /// Admins cannot be removed from their household.
    #[error("Household admins cannot be removed from the household")]
    TargetIsAdmin,
}

/// One account's membership in a household.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// The member's account.
    pub user_id: UserId,
    /// The member's current username.
    pub username: Username,
    /// Whether this member can manage the household.
    pub is_admin: bool,
    /// When the account joined.
    pub joined_at: DateTime<Utc>,
}

/// A household and its members, ordered by join time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Household {
    /// Unique household ID.
    pub id: HouseholdId,
    /// Unique household name.
    pub name: HouseholdName,
    /// Current members.
    pub members: Vec<Member>,
    /// When the household was created.
    pub created_at: DateTime<Utc>,
    /// When the household was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Household {
    /// Create a household whose creator is its only member and only admin.
    #[must_use]
    pub fn new(
        id: HouseholdId,
        name: HouseholdName,
        creator: UserId,
        creator_name: Username,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            members: vec![Member {
                user_id: creator,
                username: creator_name,
                is_admin: true,
                joined_at: now,
            }],
            created_at: now,
            updated_at: now,
        }
    }

    /// Look up a member by account.
    #[must_use]
    pub fn member(&self, user_id: UserId) -> Option<&Member> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    /// Returns true if the account is a member.
    #[must_use]
    pub fn is_member(&self, user_id: UserId) -> bool {
        self.member(user_id).is_some()
    }

    /// Returns true if the account is an admin.
    #[must_use]
    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.member(user_id).is_some_and(|m| m.is_admin)
    }

    /// Iterate over the admins.
    pub fn admins(&self) -> impl Iterator<Item = &Member> {
        self.members.iter().filter(|m| m.is_admin)
    }

    /// Require the account to be a member.
    ///
    /// # Errors
    ///
    /// Returns `MembershipError::NotAMember` if the account is not listed.
    pub fn ensure_member(&self, user_id: UserId) -> Result<&Member, MembershipError> {
        self.member(user_id)
            .ok_or_else(|| MembershipError::NotAMember {
                household: self.name.to_string(),
            })
    }

    /// Require the account to be a member and an admin, checked in that order.
    ///
    /// # Errors
    ///
    /// Returns `NotAMember` or `NotAnAdmin`.
    pub fn ensure_admin(&self, user_id: UserId) -> Result<&Member, MembershipError> {
        let member = self.ensure_member(user_id)?;
        if !member.is_admin {
            return Err(MembershipError::NotAnAdmin);
        }
        Ok(member)
    }

    /// Check that an account may join this household.
    ///
    /// `current` is the household the account already references, if any.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyMember` if the account is listed here, or
    /// `InAnotherHousehold` if it references a different household.
    pub fn ensure_can_join(
        &self,
        user_id: UserId,
        current: Option<HouseholdId>,
    ) -> Result<(), MembershipError> {
        if self.is_member(user_id) || current == Some(self.id) {
            return Err(MembershipError::AlreadyMember);
        }
        if current.is_some() {
            return Err(MembershipError::InAnotherHousehold);
        }
        Ok(())
    }

    /// Check that `target` can be promoted to admin.
    ///
    /// # Errors
    ///
    /// Returns `TargetNotMember` or `TargetAlreadyAdmin`.
    pub fn ensure_can_promote(&self, target: UserId) -> Result<(), MembershipError> {
        let member = self
            .member(target)
            .ok_or(MembershipError::TargetNotMember)?;
        if member.is_admin {
            return Err(MembershipError::TargetAlreadyAdmin);
        }
        Ok(())
    }

    /// Check that `target` can be removed from the household.
    ///
    /// Admins are never removable, which also guarantees the household keeps
    /// at least one admin.
    ///
    /// # Errors
    ///
    /// Returns `TargetNotMember` or `TargetIsAdmin`.
    pub fn ensure_can_remove(&self, target: UserId) -> Result<(), MembershipError> {
        let member = self
            .member(target)
            .ok_or(MembershipError::TargetNotMember)?;
        if member.is_admin {
            return Err(MembershipError::TargetIsAdmin);
        }
        Ok(())
    }

    /// Add a non-admin member.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyMember` if the account is already listed.
    pub fn add_member(
        &mut self,
        user_id: UserId,
        username: Username,
        now: DateTime<Utc>,
    ) -> Result<(), MembershipError> {
        if self.is_member(user_id) {
            return Err(MembershipError::AlreadyMember);
        }
        self.members.push(Member {
            user_id,
            username,
            is_admin: false,
            joined_at: now,
        });
        self.updated_at = now;
        Ok(())
    }

    /// Promote a member to admin.
    ///
    /// # Errors
    ///
    /// See [`Household::ensure_can_promote`].
    pub fn promote(&mut self, target: UserId, now: DateTime<Utc>) -> Result<(), MembershipError> {
        self.ensure_can_promote(target)?;
        if let Some(member) = self.members.iter_mut().find(|m| m.user_id == target) {
            member.is_admin = true;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Remove a non-admin member.
    ///
    /// # Errors
    ///
    /// See [`Household::ensure_can_remove`].
    pub fn remove(&mut self, target: UserId, now: DateTime<Utc>) -> Result<(), MembershipError> {
        self.ensure_can_remove(target)?;
        self.members.retain(|m| m.user_id != target);
        self.updated_at = now;
        Ok(())
    }
}
