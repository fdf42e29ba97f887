//! Account identity, security state, and the storage contract.
//!
//! An [`Account`] carries the fields the login flow needs plus the profile
//! fields returned to the dashboard after a successful login. The password hash
//! is held as a [`SecretString`] so it never shows up in `Debug` output, and
//! [`UserView`] is the only outward representation of an account.

pub mod password;
mod memory;
mod postgres;
mod store;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;
use uuid::Uuid;

pub use memory::MemoryAccountStore;
pub use postgres::PgAccountStore;
pub use store::{AccountStore, StoreError};

#[derive(ToSchema, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(rename = "admin")]
    Administrator,
    Instructor,
    Learner,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Administrator => "admin",
            Self::Instructor => "instructor",
            Self::Learner => "learner",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Self::Administrator),
            "instructor" => Ok(Self::Instructor),
            "learner" => Ok(Self::Learner),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LearningStyle {
    #[default]
    Visual,
    Auditory,
    Kinesthetic,
}

#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct NotificationPreferences {
    pub email: bool,
    pub push: bool,
    pub sms: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email: true,
            push: true,
            sms: false,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub learning_style: LearningStyle,
    pub language: String,
    pub timezone: String,
    pub notifications: NotificationPreferences,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            learning_style: LearningStyle::default(),
            language: "en".to_string(),
            timezone: "Asia/Kolkata".to_string(),
            notifications: NotificationPreferences::default(),
        }
    }
}

/// The mutable subset of an account that the lockout policy owns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SecurityState {
    pub failed_attempts: u32,
    pub last_failed_at: Option<DateTime<Utc>>,
    pub locked: bool,
    pub lock_expires_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl SecurityState {
    /// A lock only counts while its expiry is in the future, regardless of
    /// whether the flag has been cleared by a write yet.
    #[must_use]
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.locked && self.lock_expires_at.is_some_and(|expires| expires > now)
    }
}

#[derive(Clone, Debug)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub employee_id: String,
    pub password_hash: SecretString,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub department: String,
    pub avatar: Option<String>,
    pub preferences: Preferences,
    pub active: bool,
    pub security: SecurityState,
    /// Revision of the security state, bumped on every conditional write.
    pub version: i64,
}

impl Account {
    #[must_use]
    pub fn view(&self) -> UserView {
        UserView::from(self)
    }
}

/// Fields required to create an account.
#[derive(Debug)]
pub struct NewAccount {
    pub email: String,
    pub employee_id: String,
    pub password_hash: SecretString,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub department: String,
}

impl NewAccount {
    /// Build a fresh, active account with an empty security state.
    #[must_use]
    pub fn into_account(self) -> Account {
        Account {
            id: Uuid::now_v7(),
            email: normalize_email(&self.email),
            employee_id: self.employee_id.trim().to_string(),
            password_hash: self.password_hash,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            role: self.role,
            department: self.department,
            avatar: None,
            preferences: Preferences::default(),
            active: true,
            security: SecurityState::default(),
            version: 0,
        }
    }
}

/// Outward representation of an account. Never carries the password hash.
#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub department: String,
    pub employee_id: String,
    pub avatar: Option<String>,
    pub preferences: Preferences,
}

impl From<&Account> for UserView {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            role: account.role,
            department: account.department.clone(),
            employee_id: account.employee_id.clone(),
            avatar: account.avatar.clone(),
            preferences: account.preferences.clone(),
        }
    }
}

/// Emails are unique case-insensitively; every lookup goes through this.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}


#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};
    use chrono::Duration;

    #[test]
    fn role_serializes_with_wire_names() -> Result<()> {
        assert_eq!(serde_json::to_value(Role::Administrator)?, "admin");
        assert_eq!(serde_json::to_value(Role::Learner)?, "learner");
        let decoded: Role = serde_json::from_str("\"instructor\"")?;
        assert_eq!(decoded, Role::Instructor);
        Ok(())
    }

    #[test]
    fn role_from_str_matches_as_str() {
        for role in [Role::Administrator, Role::Instructor, Role::Learner] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn expired_lock_is_not_locked() {
        let now = Utc::now();
        let state = SecurityState {
            failed_attempts: 5,
            locked: true,
            lock_expires_at: Some(now - Duration::seconds(1)),
            ..SecurityState::default()
        };
        assert!(!state.is_locked_at(now));

        let state = SecurityState {
            lock_expires_at: Some(now + Duration::minutes(30)),
            ..state
        };
        assert!(state.is_locked_at(now));
    }

    #[test]
    fn lock_flag_without_expiry_is_not_locked() {
        let state = SecurityState {
            locked: true,
            ..SecurityState::default()
        };
        assert!(!state.is_locked_at(Utc::now()));
    }

    #[test]
    fn view_omits_password_hash() -> Result<()> {
        let account = NewAccount {
            email: " Alice@Example.COM ".to_string(),
            employee_id: "EMP001".to_string(),
            password_hash: SecretString::from("$argon2id$secret-hash"),
            first_name: "Alice".to_string(),
            last_name: "Doe".to_string(),
            role: Role::Learner,
            department: "Operations".to_string(),
        }
        .into_account();

        let value = serde_json::to_value(account.view())?;
        let object = value.as_object().context("view is not an object")?;
        assert_eq!(
            object.get("email").and_then(serde_json::Value::as_str),
            Some("alice@example.com")
        );
        assert_eq!(
            object.get("employeeId").and_then(serde_json::Value::as_str),
            Some("EMP001")
        );
        assert!(!object.keys().any(|key| key.to_lowercase().contains("password")));
        assert!(!value.to_string().contains("secret-hash"));
        assert!(!format!("{account:?}").contains("secret-hash"));
        Ok(())
    }

    #[test]
    fn new_account_starts_clean() {
        let account = test_support::account("new@example.com", "password123", Role::Learner);
        assert!(account.active);
        assert_eq!(account.security, SecurityState::default());
        assert_eq!(account.version, 0);
    }
}
