//! Operator bootstrap of the first administrator account.
//!
//! Registration lives outside this service, so a fresh deployment has nobody
//! who can sign in. The server binary can be given an administrator email and
//! password; the account is created once and left alone on later starts.

use anyhow::Context;
use secrecy::{ExposeSecret, SecretString};
use tracing::info;
use uuid::Uuid;

use super::{validate_credentials, ServiceError};
use crate::account::{
    normalize_email, password::hash_password, AccountStore, NewAccount, Role, StoreError,
};

pub const BOOTSTRAP_EMPLOYEE_ID: &str = "ADMIN-0001";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bootstrap {
    Created(Uuid),
    /// The email or the bootstrap employee id is already taken.
    AlreadyPresent,
}

/// Create the administrator account unless it already exists.
///
/// # Errors
/// `Validation` when the email or password would never pass login, or the
/// store failure otherwise.
pub async fn bootstrap_administrator(
    store: &dyn AccountStore,
    email: &str,
    password: SecretString,
) -> Result<Bootstrap, ServiceError> {
    let email = normalize_email(email);
    let errors = validate_credentials(&email, password.expose_secret());
    if !errors.is_empty() {
        return Err(ServiceError::Validation {
            message: "Validation failed",
            errors,
        });
    }

    let hash = tokio::task::spawn_blocking(move || hash_password(password.expose_secret()))
        .await
        .context("password hashing task failed")??;

    let account = NewAccount {
        email,
        employee_id: BOOTSTRAP_EMPLOYEE_ID.to_string(),
        password_hash: SecretString::from(hash),
        first_name: "System".to_string(),
        last_name: "Administrator".to_string(),
        role: Role::Administrator,
        department: "Administration".to_string(),
    }
    .into_account();

    match store.create(account).await {
        Ok(created) => {
            info!(account_id = %created.id, "bootstrap administrator created");
            Ok(Bootstrap::Created(created.id))
        }
        Err(StoreError::Duplicate) => {
            info!("bootstrap administrator already present");
            Ok(Bootstrap::AlreadyPresent)
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{password::verify_password, MemoryAccountStore};
    use anyhow::{Context as _, Result};

    #[tokio::test]
    async fn creates_administrator_once() -> Result<()> {
        let store = MemoryAccountStore::new();

        let first = bootstrap_administrator(
            &store,
            " Root@LMS.dev ",
            SecretString::from("password123"),
        )
        .await?;
        let Bootstrap::Created(id) = first else {
            anyhow::bail!("expected a new account, got {first:?}");
        };

        let account = store
            .find_by_email("root@lms.dev")
            .await?
            .context("bootstrap account stored under the normalized email")?;
        assert_eq!(account.id, id);
        assert_eq!(account.role, Role::Administrator);
        assert!(account.active);
        assert!(verify_password("password123", account.password_hash.expose_secret())?);

        let again =
            bootstrap_administrator(&store, "root@lms.dev", SecretString::from("different1"))
                .await?;
        assert_eq!(again, Bootstrap::AlreadyPresent);

        let account = store
            .find_by_email("root@lms.dev")
            .await?
            .context("account still present")?;
        assert!(verify_password("password123", account.password_hash.expose_secret())?);
        Ok(())
    }

    #[tokio::test]
    async fn rejects_credentials_that_could_never_log_in() {
        let store = MemoryAccountStore::new();

        let result = bootstrap_administrator(&store, "root@lms.dev", SecretString::from("123")).await;
        assert!(matches!(
            result,
            Err(ServiceError::Validation { ref errors, .. }) if errors.len() == 1 && errors[0].field == "password"
        ));

        let result =
            bootstrap_administrator(&store, "root", SecretString::from("password123")).await;
        assert!(matches!(result, Err(ServiceError::Validation { .. })));
    }
}
