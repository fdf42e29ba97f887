//! Account lockout policy.
//!
//! Flow Overview:
//! 1) [`LockoutPolicy::screen`] rejects attempts that never reach the password
//!    check: unknown email, deactivated account, or a lock that has not expired.
//! 2) [`LockoutPolicy::resolve`] takes the result of the password check and
//!    computes the next security state.
//!
//! Both steps are pure: the caller supplies the clock reading and performs all
//! I/O (store reads and writes, hashing, audit).

use chrono::{DateTime, Duration, Utc};

use crate::account::{Account, SecurityState};

pub const DEFAULT_LOCKOUT_THRESHOLD: u32 = 5;
pub const DEFAULT_LOCKOUT_DURATION_SECONDS: i64 = 30 * 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    NoSuchAccount,
    Inactive,
    Locked,
    BadCredential,
    Success,
}

impl Outcome {
    /// Reason recorded in the audit trail. Never sent to the client.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::NoSuchAccount => "User not found",
            Self::Inactive => "Account deactivated",
            Self::Locked => "Account locked",
            Self::BadCredential => "Invalid password",
            Self::Success => "Login successful",
        }
    }
}

/// Result of evaluating an attempt that passed screening.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    pub outcome: Outcome,
    /// Security state to persist for this attempt.
    pub next: SecurityState,
    /// True when this attempt is the one that tripped the lock.
    pub locked_now: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockoutPolicy {
    threshold: u32,
    duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_LOCKOUT_THRESHOLD,
            duration: Duration::seconds(DEFAULT_LOCKOUT_DURATION_SECONDS),
        }
    }
}

impl LockoutPolicy {
    /// A threshold of zero would lock on the first attempt's evaluation; it is
    /// clamped to one.
    #[must_use]
    pub fn new(threshold: u32, duration: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            duration,
        }
    }

    #[must_use]
    pub const fn threshold(&self) -> u32 {
        self.threshold
    }

    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    /// Reject without touching the account, or `None` to go on and check the
    /// password.
    #[must_use]
    pub fn screen(&self, account: Option<&Account>, now: DateTime<Utc>) -> Option<Outcome> {
        match account {
            None => Some(Outcome::NoSuchAccount),
            Some(account) if !account.active => Some(Outcome::Inactive),
            Some(account) if account.security.is_locked_at(now) => Some(Outcome::Locked),
            Some(_) => None,
        }
    }

    /// Compute the next security state from the password check.
    ///
    /// Only called after [`screen`](Self::screen) let the attempt through, so any
    /// lock still flagged on `current` has expired. The failure counter continues
    /// from its stored value either way.
    #[must_use]
    pub fn resolve(
        &self,
        current: &SecurityState,
        credential_matches: bool,
        now: DateTime<Utc>,
    ) -> Decision {
        if credential_matches {
            return Decision {
                outcome: Outcome::Success,
                next: SecurityState {
                    failed_attempts: 0,
                    last_failed_at: None,
                    locked: false,
                    lock_expires_at: None,
                    last_login_at: Some(now),
                },
                locked_now: false,
            };
        }

        let failed_attempts = current.failed_attempts.saturating_add(1);
        let locked_now = failed_attempts >= self.threshold;
        let (locked, lock_expires_at) = if locked_now {
            let expires = now
                .checked_add_signed(self.duration)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            (true, Some(expires))
        } else {
            (false, None)
        };

        Decision {
            outcome: Outcome::BadCredential,
            next: SecurityState {
                failed_attempts,
                last_failed_at: Some(now),
                locked,
                lock_expires_at,
                last_login_at: current.last_login_at,
            },
            locked_now,
        }
    }
}
