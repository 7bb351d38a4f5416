//! In-process repository.
//!
//! All state sits behind one async mutex, so every trait method is atomic with
//! respect to every other. Membership changes go through the
//! [`Household`] model, which enforces the same rules as the SQL constraints.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use grocery_squad_core::{
    Email, Household, HouseholdId, HouseholdName, ItemId, ItemName, ShoppingListItem, UserId,
    Username,
};

use super::{ConflictKind, Repository, RepositoryError};
use crate::models::{Account, NewAccount};

/// Repository that keeps everything in memory.
#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    accounts: BTreeMap<UserId, StoredAccount>,
    households: BTreeMap<HouseholdId, StoredHousehold>,
    items: Vec<(HouseholdId, ShoppingListItem)>,
    last_account_id: i32,
    last_household_id: i32,
    last_item_id: i32,
}

struct StoredAccount {
    account: Account,
    password_hash: String,
}

struct StoredHousehold {
    household: Household,
    password_hash: String,
}

impl MemoryRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl State {
    fn account_mut(&mut self, id: UserId) -> Result<&mut StoredAccount, RepositoryError> {
        self.accounts.get_mut(&id).ok_or(RepositoryError::NotFound)
    }

    fn household_mut(&mut self, id: HouseholdId) -> Result<&mut StoredHousehold, RepositoryError> {
        self.households.get_mut(&id).ok_or(RepositoryError::NotFound)
    }

    fn find_account(&self, pred: impl Fn(&Account) -> bool) -> Option<&StoredAccount> {
        self.accounts.values().find(|stored| pred(&stored.account))
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn create_account(&self, new: NewAccount) -> Result<Account, RepositoryError> {
        let mut state = self.state.lock().await;

        if state.find_account(|a| a.username == new.username).is_some() {
            return Err(RepositoryError::Conflict(ConflictKind::Username));
        }
        if state.find_account(|a| a.email == new.email).is_some() {
            return Err(RepositoryError::Conflict(ConflictKind::Email));
        }

        state.last_account_id += 1;
        let now = Utc::now();
        let account = Account {
            id: UserId::new(state.last_account_id),
            username: new.username,
            email: new.email,
            household_id: None,
            confirmed_email: false,
            created_at: now,
            updated_at: now,
        };
        state.accounts.insert(
            account.id,
            StoredAccount {
                account: account.clone(),
                password_hash: new.password_hash,
            },
        );
        Ok(account)
    }

    async fn account(&self, id: UserId) -> Result<Option<Account>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.accounts.get(&id).map(|s| s.account.clone()))
    }

    async fn account_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<Account>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .find_account(|a| &a.username == username)
            .map(|s| s.account.clone()))
    }

    async fn account_by_email(&self, email: &Email) -> Result<Option<Account>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .find_account(|a| &a.email == email)
            .map(|s| s.account.clone()))
    }

    async fn credentials_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<(Account, String)>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .find_account(|a| &a.username == username)
            .map(|s| (s.account.clone(), s.password_hash.clone())))
    }

    async fn credentials(&self, id: UserId) -> Result<Option<(Account, String)>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .accounts
            .get(&id)
            .map(|s| (s.account.clone(), s.password_hash.clone())))
    }

    async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let stored = state.account_mut(id)?;
        stored.password_hash = hash.to_owned();
        stored.account.updated_at = Utc::now();
        Ok(())
    }

    async fn rename_account(
        &self,
        id: UserId,
        username: &Username,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;

        if state
            .find_account(|a| &a.username == username && a.id != id)
            .is_some()
        {
            return Err(RepositoryError::Conflict(ConflictKind::Username));
        }

        let stored = state.account_mut(id)?;
        stored.account.username = username.clone();
        stored.account.updated_at = Utc::now();

        if let Some(household_id) = stored.account.household_id
            && let Some(stored) = state.households.get_mut(&household_id)
        {
            for member in &mut stored.household.members {
                if member.user_id == id {
                    member.username = username.clone();
                }
            }
        }
        Ok(())
    }

    async fn confirm_email(&self, email: &Email) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        let Some(stored) = state
            .accounts
            .values_mut()
            .find(|s| &s.account.email == email)
        else {
            return Ok(false);
        };
        stored.account.confirmed_email = true;
        stored.account.updated_at = Utc::now();
        Ok(true)
    }

    async fn create_household(
        &self,
        creator: UserId,
        name: &HouseholdName,
        password_hash: &str,
    ) -> Result<Household, RepositoryError> {
        let mut state = self.state.lock().await;

        let account = &state
            .accounts
            .get(&creator)
            .ok_or(RepositoryError::NotFound)?
            .account;
        if account.household_id.is_some() {
            return Err(RepositoryError::Conflict(ConflictKind::Membership));
        }
        let creator_name = account.username.clone();

        if state
            .households
            .values()
            .any(|s| &s.household.name == name)
        {
            return Err(RepositoryError::Conflict(ConflictKind::HouseholdName));
        }

        state.last_household_id += 1;
        let household = Household::new(
            HouseholdId::new(state.last_household_id),
            name.clone(),
            creator,
            creator_name,
            Utc::now(),
        );
        state.households.insert(
            household.id,
            StoredHousehold {
                household: household.clone(),
                password_hash: password_hash.to_owned(),
            },
        );

        let stored = state.account_mut(creator)?;
        stored.account.household_id = Some(household.id);
        stored.account.updated_at = household.created_at;

        Ok(household)
    }

    async fn household(&self, id: HouseholdId) -> Result<Option<Household>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.households.get(&id).map(|s| s.household.clone()))
    }

    async fn household_password_hash(
        &self,
        id: HouseholdId,
    ) -> Result<Option<String>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.households.get(&id).map(|s| s.password_hash.clone()))
    }

    async fn rename_household(
        &self,
        id: HouseholdId,
        name: &HouseholdName,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;

        if state
            .households
            .values()
            .any(|s| &s.household.name == name && s.household.id != id)
        {
            return Err(RepositoryError::Conflict(ConflictKind::HouseholdName));
        }

        let stored = state.household_mut(id)?;
        stored.household.name = name.clone();
        stored.household.updated_at = Utc::now();
        Ok(())
    }

    async fn add_member(
        &self,
        household: HouseholdId,
        user: UserId,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;

        if !state.households.contains_key(&household) {
            return Err(RepositoryError::NotFound);
        }
        let account = &state.account_mut(user)?.account;
        if account.household_id.is_some() {
            return Err(RepositoryError::Conflict(ConflictKind::Membership));
        }
        let username = account.username.clone();

        let now = Utc::now();
        state
            .household_mut(household)?
            .household
            .add_member(user, username, now)
            .map_err(|_| RepositoryError::Conflict(ConflictKind::Membership))?;

        let stored = state.account_mut(user)?;
        stored.account.household_id = Some(household);
        stored.account.updated_at = now;
        Ok(())
    }

    async fn promote_admin(
        &self,
        household: HouseholdId,
        user: UserId,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        state
            .household_mut(household)?
            .household
            .promote(user, Utc::now())
            .map_err(|_| RepositoryError::NotFound)
    }

    async fn remove_member(
        &self,
        household: HouseholdId,
        user: UserId,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        state
            .household_mut(household)?
            .household
            .remove(user, now)
            .map_err(|_| RepositoryError::NotFound)?;

        if let Ok(stored) = state.account_mut(user)
            && stored.account.household_id == Some(household)
        {
            stored.account.household_id = None;
            stored.account.updated_at = now;
        }
        Ok(())
    }

    async fn add_item(
        &self,
        household: HouseholdId,
        item_name: &ItemName,
        added_by: UserId,
    ) -> Result<ShoppingListItem, RepositoryError> {
        let mut state = self.state.lock().await;

        if !state.households.contains_key(&household) {
            return Err(RepositoryError::NotFound);
        }

        state.last_item_id += 1;
        let item = ShoppingListItem::new(
            ItemId::new(state.last_item_id),
            item_name.clone(),
            added_by,
            Utc::now(),
        );
        state.items.push((household, item.clone()));
        Ok(item)
    }

    async fn items(
        &self,
        household: HouseholdId,
    ) -> Result<Vec<ShoppingListItem>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .items
            .iter()
            .filter(|(owner, _)| *owner == household)
            .map(|(_, item)| item.clone())
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn new_account(username: &str, email: &str) -> NewAccount {
        NewAccount {
            username: Username::parse(username).unwrap(),
            email: Email::parse(email).unwrap(),
            password_hash: "not-a-real-hash".to_owned(),
        }
    }

    async fn repo_with_household() -> (MemoryRepository, UserId, HouseholdId) {
        let repo = MemoryRepository::new();
        let admin = repo
            .create_account(new_account("tezuka", "tezuka@seigaku.test"))
            .await
            .unwrap();
        let household = repo
            .create_household(
                admin.id,
                &HouseholdName::parse("Seigaku").unwrap(),
                "hash",
            )
            .await
            .unwrap();
        (repo, admin.id, household.id)
    }

    #[tokio::test]
    async fn test_create_account_rejects_duplicates() {
        let repo = MemoryRepository::new();
        repo.create_account(new_account("abacus", "a@x.com"))
            .await
            .unwrap();

        let err = repo
            .create_account(new_account("abacus", "other@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::Conflict(ConflictKind::Username)
        ));

        let err = repo
            .create_account(new_account("other", "A@X.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(ConflictKind::Email)));
    }

    #[tokio::test]
    async fn test_create_household_links_creator() {
        let (repo, admin, household) = repo_with_household().await;

        let account = repo.account(admin).await.unwrap().unwrap();
        assert_eq!(account.household_id, Some(household));

        let household = repo.household(household).await.unwrap().unwrap();
        assert!(household.is_admin(admin));
        assert_eq!(household.members.len(), 1);
    }

    #[tokio::test]
    async fn test_create_household_requires_free_account() {
        let (repo, admin, _) = repo_with_household().await;
        let err = repo
            .create_household(admin, &HouseholdName::parse("Rikkai").unwrap(), "hash")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::Conflict(ConflictKind::Membership)
        ));
    }

    #[tokio::test]
    async fn test_add_member_is_exclusive() {
        let (repo, _, household) = repo_with_household().await;
        let member = repo
            .create_account(new_account("fuji", "fuji@seigaku.test"))
            .await
            .unwrap();

        repo.add_member(household, member.id).await.unwrap();
        let err = repo.add_member(household, member.id).await.unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::Conflict(ConflictKind::Membership)
        ));
        assert_eq!(
            repo.household(household).await.unwrap().unwrap().members.len(),
            2
        );
    }

    #[tokio::test]
    async fn test_remove_member_clears_reference_but_never_admins() {
        let (repo, admin, household) = repo_with_household().await;
        let member = repo
            .create_account(new_account("fuji", "fuji@seigaku.test"))
            .await
            .unwrap();
        repo.add_member(household, member.id).await.unwrap();

        assert!(matches!(
            repo.remove_member(household, admin).await,
            Err(RepositoryError::NotFound)
        ));

        repo.remove_member(household, member.id).await.unwrap();
        let account = repo.account(member.id).await.unwrap().unwrap();
        assert_eq!(account.household_id, None);
    }

    #[tokio::test]
    async fn test_rename_account_updates_member_name() {
        let (repo, admin, household) = repo_with_household().await;
        let new_name = Username::parse("buchou").unwrap();
        repo.rename_account(admin, &new_name).await.unwrap();

        let household = repo.household(household).await.unwrap().unwrap();
        assert_eq!(household.members[0].username, new_name);
    }

    #[tokio::test]
    async fn test_items_are_scoped_to_household() {
        let (repo, admin, household) = repo_with_household().await;
        let milk = ItemName::parse("milk").unwrap();
        repo.add_item(household, &milk, admin).await.unwrap();
        repo.add_item(household, &milk, admin).await.unwrap();

        let items = repo.items(household).await.unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| !i.is_bought()));
        assert!(repo.items(HouseholdId::new(999)).await.unwrap().is_empty());
    }
}
