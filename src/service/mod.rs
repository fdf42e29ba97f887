//! Authentication orchestration.
//!
//! Flow Overview (login):
//! 1) Validate input shape and apply the per-address rate limit.
//! 2) Read the account and let [`LockoutPolicy::screen`] reject unknown,
//!    deactivated, or locked accounts. Unknown emails still pay for a dummy
//!    argon2 verification.
//! 3) Verify the password, resolve the next security state, and persist it with
//!    a write conditional on the version read in step 2. A lost race re-runs
//!    the whole cycle against fresh state.
//! 4) Audit the outcome and, on success, mint a token.
//!
//! Every store call is bounded by the configured timeout; audit failures are
//! logged and never change the outcome.

mod bootstrap;
mod clock;
mod config;
mod error;
mod rate_limit;

use anyhow::anyhow;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::{future::Future, sync::Arc, time::Duration as StdDuration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use bootstrap::{bootstrap_administrator, Bootstrap, BOOTSTRAP_EMPLOYEE_ID};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthConfig, MAX_WINDOW_SECONDS};
pub use error::{FieldError, ServiceError};
pub use rate_limit::{
    NoopRateLimiter, RateLimitAction, RateLimitDecision, RateLimiter, WindowRateLimiter,
};

use crate::{
    account::{
        normalize_email,
        password::{verify_dummy, verify_password_blocking},
        Account, AccountStore, Role, StoreError, UserView,
    },
    audit::{record_quietly, AuditAction, AuditEvent, AuditSink},
    policy::{LockoutPolicy, Outcome},
    token::{Claims, TokenIssuer},
};

/// Read-decide-write cycles attempted before a contended login gives up.
const MAX_LOGIN_ATTEMPTS: usize = 3;
const MIN_PASSWORD_LENGTH: usize = 6;

pub(crate) const INVALID_EMAIL_MESSAGE: &str = "Please provide a valid email address";
const SHORT_PASSWORD_MESSAGE: &str = "Password must be at least 6 characters long";

/// Basic email format check on already-normalized input.
fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

fn validate_credentials(email: &str, password: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if !valid_email(email) {
        errors.push(FieldError::new("email", INVALID_EMAIL_MESSAGE));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push(FieldError::new("password", SHORT_PASSWORD_MESSAGE));
    }
    errors
}

#[derive(Clone, Debug)]
pub struct LoginSuccess {
    pub user: UserView,
    pub token: String,
}

pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    audit: Arc<dyn AuditSink>,
    tokens: TokenIssuer,
    policy: LockoutPolicy,
    limiter: Arc<dyn RateLimiter>,
    clock: Arc<dyn Clock>,
    store_timeout: StdDuration,
}

impl AuthService {
    #[must_use]
    pub fn new(
        config: &AuthConfig,
        accounts: Arc<dyn AccountStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let limiter: Arc<dyn RateLimiter> = match config.login_rate_limit() {
            0 => Arc::new(NoopRateLimiter),
            limit => Arc::new(WindowRateLimiter::per_minute(limit)),
        };

        Self {
            accounts,
            audit,
            tokens: TokenIssuer::new(config.jwt_secret(), config.token_ttl())
                .with_refresh_grace(config.refresh_grace()),
            policy: LockoutPolicy::new(config.lockout_threshold(), config.lockout_duration()),
            limiter,
            clock: Arc::new(SystemClock),
            store_timeout: config.store_timeout(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    #[must_use]
    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    /// Run a store call under the configured timeout.
    async fn store<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .unwrap_or(Err(StoreError::Timeout))
    }

    /// Authenticate an email/password pair.
    ///
    /// # Errors
    /// Returns the rejection (`Validation`, `RateLimited`, `InvalidCredentials`,
    /// `Deactivated`, `Locked`) or an infrastructure fault.
    pub async fn login(
        &self,
        email: &str,
        password: SecretString,
        source: Option<&str>,
    ) -> Result<LoginSuccess, ServiceError> {
        let email = normalize_email(email);
        let errors = validate_credentials(&email, password.expose_secret());
        if !errors.is_empty() {
            return Err(ServiceError::Validation {
                message: "Validation failed",
                errors,
            });
        }

        if self
            .limiter
            .check_ip(source, RateLimitAction::Login, self.clock.now())
            == RateLimitDecision::Limited
        {
            debug!("Login rate limited for {}", source.unwrap_or("unknown"));
            return Err(ServiceError::RateLimited);
        }

        for round in 1..=MAX_LOGIN_ATTEMPTS {
            let account = self.store(self.accounts.find_by_email(&email)).await?;
            let now = self.clock.now();

            let account = match (self.policy.screen(account.as_ref(), now), account) {
                (None, Some(account)) => account,
                (Some(outcome), account) => {
                    if outcome == Outcome::NoSuchAccount {
                        verify_dummy(password.clone()).await;
                    }
                    self.audit_rejection(&email, account.as_ref(), outcome, source, now)
                        .await;
                    return Err(match outcome {
                        Outcome::Inactive => ServiceError::Deactivated,
                        Outcome::Locked => ServiceError::Locked,
                        _ => ServiceError::InvalidCredentials,
                    });
                }
                (None, None) => return Err(ServiceError::InvalidCredentials),
            };

            let matches =
                verify_password_blocking(password.clone(), account.password_hash.clone())
                    .await
                    .map_err(|err| {
                        error!("Password verification failed for account {}: {err:#}", account.id);
                        ServiceError::Internal(err)
                    })?;
            let decision = self.policy.resolve(&account.security, matches, now);

            match self
                .store(
                    self.accounts
                        .update_security(account.id, account.version, &decision.next),
                )
                .await
            {
                Ok(_) => {}
                Err(StoreError::Conflict(id)) => {
                    debug!("Security state for {id} changed concurrently (round {round})");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }

            if decision.outcome != Outcome::Success {
                if decision.locked_now {
                    warn!(
                        "Account {} locked after {} failed attempts",
                        account.id, decision.next.failed_attempts
                    );
                }
                let event = AuditEvent::new(AuditAction::LoginFailed, now)
                    .account(account.id)
                    .details(json!({
                        "email": email,
                        "reason": decision.outcome.reason(),
                        "attempts": decision.next.failed_attempts,
                    }))
                    .source(source);
                record_quietly(self.audit.as_ref(), event).await;
                return Err(ServiceError::InvalidCredentials);
            }

            let token = self
                .tokens
                .issue(&account, now)
                .map_err(|err| ServiceError::Internal(anyhow!(err)))?;

            let event = AuditEvent::new(AuditAction::LoginSuccess, now)
                .account(account.id)
                .details(json!({"email": email, "role": account.role}))
                .source(source);
            record_quietly(self.audit.as_ref(), event).await;

            info!("User {} logged in successfully", account.email);
            return Ok(LoginSuccess {
                user: account.view(),
                token,
            });
        }

        warn!("Giving up on contended login after {MAX_LOGIN_ATTEMPTS} rounds");
        Err(ServiceError::Unavailable)
    }

    async fn audit_rejection(
        &self,
        email: &str,
        account: Option<&Account>,
        outcome: Outcome,
        source: Option<&str>,
        now: chrono::DateTime<chrono::Utc>,
    ) {
        debug!("Login rejected before password check: {}", outcome.reason());
        let mut event = AuditEvent::new(AuditAction::LoginFailed, now)
            .details(json!({"email": email, "reason": outcome.reason()}))
            .source(source);
        if let Some(account) = account {
            event = event.account(account.id);
        }
        record_quietly(self.audit.as_ref(), event).await;
    }

    /// Verify a bearer token for an authenticated route.
    ///
    /// # Errors
    /// `InvalidToken` when the token is missing, malformed, badly signed, or expired.
    pub fn authenticate(&self, bearer: Option<&str>) -> Result<Claims, ServiceError> {
        let token = bearer
            .filter(|token| !token.trim().is_empty())
            .ok_or(ServiceError::InvalidToken)?;
        self.tokens
            .verify(token, self.clock.now())
            .map_err(|err| {
                debug!("Rejected bearer token: {err}");
                ServiceError::InvalidToken
            })
    }

    /// Record a logout. Tokens are stateless, so this never fails and revokes nothing.
    pub async fn logout(&self, bearer: Option<&str>, source: Option<&str>) {
        let Ok(claims) = self.authenticate(bearer) else {
            return;
        };
        let event = AuditEvent::new(AuditAction::Logout, self.clock.now())
            .account(claims.user_id)
            .details(json!({"email": claims.email}))
            .source(source);
        record_quietly(self.audit.as_ref(), event).await;
        info!("User {} logged out", claims.email);
    }

    /// Exchange a token for a fresh one, reloading the account first.
    ///
    /// # Errors
    /// `InvalidToken` if the token fails verification (outside any refresh grace)
    /// or its account is gone or deactivated.
    pub async fn refresh(&self, token: &str) -> Result<String, ServiceError> {
        let now = self.clock.now();
        let claims = self.tokens.verify_for_refresh(token, now).map_err(|err| {
            debug!("Rejected refresh token: {err}");
            ServiceError::InvalidToken
        })?;

        let account = self.store(self.accounts.find_by_id(claims.user_id)).await?;
        let Some(account) = account.filter(|account| account.active) else {
            debug!("Refresh for missing or inactive account {}", claims.user_id);
            return Err(ServiceError::InvalidToken);
        };

        self.tokens
            .issue(&account, now)
            .map_err(|err| ServiceError::Internal(anyhow!(err)))
    }

    /// Note a password-reset request. The outward result never depends on
    /// whether the account exists.
    ///
    /// # Errors
    /// `Validation` for a malformed email, or an infrastructure fault.
    pub async fn forgot_password(
        &self,
        email: &str,
        source: Option<&str>,
    ) -> Result<(), ServiceError> {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(ServiceError::Validation {
                message: INVALID_EMAIL_MESSAGE,
                errors: Vec::new(),
            });
        }

        if let Some(account) = self.store(self.accounts.find_by_email(&email)).await? {
            let event = AuditEvent::new(AuditAction::PasswordResetRequested, self.clock.now())
                .account(account.id)
                .details(json!({"email": email}))
                .source(source);
            record_quietly(self.audit.as_ref(), event).await;
        }
        Ok(())
    }

    /// # Errors
    /// `InvalidToken` if the account behind `claims` is gone or deactivated.
    pub async fn current_user(&self, claims: &Claims) -> Result<UserView, ServiceError> {
        self.active_account(claims.user_id)
            .await?
            .map(|account| account.view())
            .ok_or(ServiceError::InvalidToken)
    }

    /// # Errors
    /// `Forbidden` unless the caller is an administrator.
    pub async fn list_users(&self, claims: &Claims) -> Result<Vec<UserView>, ServiceError> {
        if claims.role != Role::Administrator {
            return Err(ServiceError::Forbidden);
        }
        let accounts = self.store(self.accounts.list_active()).await?;
        Ok(accounts.iter().map(Account::view).collect())
    }

    async fn active_account(&self, id: Uuid) -> Result<Option<Account>, ServiceError> {
        let account = self.store(self.accounts.find_by_id(id)).await?;
        Ok(account.filter(|account| account.active))
    }

    /// # Errors
    /// Returns an error if the account store cannot be reached.
    pub async fn ping(&self) -> Result<(), ServiceError> {
        Ok(self.store(self.accounts.ping()).await?)
    }
}
