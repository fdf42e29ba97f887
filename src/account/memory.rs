//! In-process account store used by tests and local runs.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{normalize_email, Account, AccountStore, SecurityState, StoreError};

#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
}

impl MemoryAccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace an account wholesale, bypassing the version check.
    /// Handy for arranging state in tests (deactivation, pre-existing locks).
    pub async fn put(&self, account: Account) {
        self.accounts.write().await.insert(account.id, account);
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let email = normalize_email(email);
        let accounts = self.accounts.read().await;
        Ok(accounts.values().find(|a| a.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn create(&self, account: Account) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.write().await;
        if accounts
            .values()
            .any(|a| a.email == account.email || a.employee_id == account.employee_id)
        {
            return Err(StoreError::Duplicate);
        }
        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn update_security(
        &self,
        id: Uuid,
        expected_version: i64,
        state: &SecurityState,
    ) -> Result<i64, StoreError> {
        let mut accounts = self.accounts.write().await;
        let Some(account) = accounts.get_mut(&id) else {
            return Err(StoreError::Conflict(id));
        };
        if account.version != expected_version {
            return Err(StoreError::Conflict(id));
        }
        account.security = state.clone();
        account.version += 1;
        Ok(account.version)
    }

    async fn list_active(&self) -> Result<Vec<Account>, StoreError> {
        let accounts = self.accounts.read().await;
        let mut active: Vec<Account> = accounts.values().filter(|a| a.active).cloned().collect();
        active.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(active)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
