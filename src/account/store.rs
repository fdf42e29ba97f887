//! Credential store contract.

use async_trait::async_trait;
use uuid::Uuid;

use super::{Account, SecurityState};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The account changed since it was read; reload and decide again.
    #[error("account {0} was modified concurrently")]
    Conflict(Uuid),
    #[error("an account with this email or employee id already exists")]
    Duplicate,
    /// The store did not answer within the configured bound.
    #[error("account store timed out")]
    Timeout,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Read/write contract the auth core needs from account storage.
///
/// `update_security` is a conditional write: it only succeeds when the stored
/// version still equals `expected_version`, and bumps the version by one.
/// That is what serializes concurrent login attempts against one account.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    async fn create(&self, account: Account) -> Result<Account, StoreError>;

    /// Returns the new version on success.
    async fn update_security(
        &self,
        id: Uuid,
        expected_version: i64,
        state: &SecurityState,
    ) -> Result<i64, StoreError>;

    async fn list_active(&self) -> Result<Vec<Account>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
