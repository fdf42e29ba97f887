//! Postgres-backed account store.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sqlx::{postgres::PgRow, types::Json, Connection, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::{normalize_email, Account, AccountStore, Preferences, SecurityState, StoreError};

const ACCOUNT_COLUMNS: &str = r"
    id, email, employee_id, password_hash, first_name, last_name, role, department,
    avatar, preferences, active, failed_attempts, last_failed_at, locked,
    lock_expires_at, last_login_at, version
";

#[derive(Clone, Debug)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_span(operation: &'static str, statement: &str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn account_from_row(row: &PgRow) -> Result<Account, StoreError> {
    let role: String = row.try_get("role").context("missing role column")?;
    let failed_attempts: i32 = row
        .try_get("failed_attempts")
        .context("missing failed_attempts column")?;
    let password_hash: String = row
        .try_get("password_hash")
        .context("missing password_hash column")?;
    let Json(preferences): Json<Preferences> = row
        .try_get("preferences")
        .context("invalid preferences column")?;

    Ok(Account {
        id: row.try_get("id").context("missing id column")?,
        email: row.try_get("email").context("missing email column")?,
        employee_id: row
            .try_get("employee_id")
            .context("missing employee_id column")?,
        password_hash: SecretString::from(password_hash),
        first_name: row.try_get("first_name").context("missing first_name column")?,
        last_name: row.try_get("last_name").context("missing last_name column")?,
        role: role.parse().map_err(|err: String| anyhow!(err))?,
        department: row.try_get("department").context("missing department column")?,
        avatar: row.try_get("avatar").context("missing avatar column")?,
        preferences,
        active: row.try_get("active").context("missing active column")?,
        security: SecurityState {
            failed_attempts: u32::try_from(failed_attempts).unwrap_or(0),
            last_failed_at: row
                .try_get("last_failed_at")
                .context("missing last_failed_at column")?,
            locked: row.try_get("locked").context("missing locked column")?,
            lock_expires_at: row
                .try_get("lock_expires_at")
                .context("missing lock_expires_at column")?,
            last_login_at: row
                .try_get("last_login_at")
                .context("missing last_login_at column")?,
        },
        version: row.try_get("version").context("missing version column")?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1");
        let row = sqlx::query(&query)
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await
            .context("failed to lookup account by email")?;

        row.as_ref().map(account_from_row).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await
            .context("failed to lookup account by id")?;

        row.as_ref().map(account_from_row).transpose()
    }

    async fn create(&self, account: Account) -> Result<Account, StoreError> {
        let query = r"
            INSERT INTO accounts
                (id, email, employee_id, password_hash, first_name, last_name, role,
                 department, avatar, preferences, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ";
        let result = sqlx::query(query)
            .bind(account.id)
            .bind(&account.email)
            .bind(&account.employee_id)
            .bind(account.password_hash.expose_secret())
            .bind(&account.first_name)
            .bind(&account.last_name)
            .bind(account.role.as_str())
            .bind(&account.department)
            .bind(&account.avatar)
            .bind(Json(&account.preferences))
            .bind(account.active)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await;

        match result {
            Ok(_) => Ok(account),
            Err(err) if is_unique_violation(&err) => Err(StoreError::Duplicate),
            Err(err) => Err(anyhow::Error::new(err)
                .context("failed to insert account")
                .into()),
        }
    }

    async fn update_security(
        &self,
        id: Uuid,
        expected_version: i64,
        state: &SecurityState,
    ) -> Result<i64, StoreError> {
        // Conditional on the version read by the caller; zero rows means another
        // attempt got there first.
        let query = r"
            UPDATE accounts SET
                failed_attempts = $3,
                last_failed_at = $4,
                locked = $5,
                lock_expires_at = $6,
                last_login_at = $7,
                version = version + 1,
                updated_at = NOW()
            WHERE id = $1 AND version = $2
            RETURNING version
        ";
        let row = sqlx::query(query)
            .bind(id)
            .bind(expected_version)
            .bind(i32::try_from(state.failed_attempts).unwrap_or(i32::MAX))
            .bind(state.last_failed_at)
            .bind(state.locked)
            .bind(state.lock_expires_at)
            .bind(state.last_login_at)
            .fetch_optional(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await
            .context("failed to update account security state")?;

        match row {
            Some(row) => Ok(row.try_get("version").context("missing version column")?),
            None => Err(StoreError::Conflict(id)),
        }
    }

    async fn list_active(&self) -> Result<Vec<Account>, StoreError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE active ORDER BY email");
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await
            .context("failed to list active accounts")?;

        rows.iter().map(account_from_row).collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let acquire_span = tracing::info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self
            .pool
            .acquire()
            .instrument(acquire_span)
            .await
            .context("failed to acquire database connection")?;
        let ping_span =
            tracing::info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .context("failed to ping database")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn unique_violation_matches_sqlstate() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&err));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("40001"),
        }));
        assert!(!is_unique_violation(&err));

        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[tokio::test]
    async fn ping_fails_without_database() -> anyhow::Result<()> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(200))
            .connect_lazy("postgres://postgres@127.0.0.1:1/lms")?;
        let store = PgAccountStore::new(pool);
        assert!(matches!(store.ping().await, Err(StoreError::Backend(_))));
        Ok(())
    }
}
