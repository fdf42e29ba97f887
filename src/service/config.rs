//! Explicit runtime configuration for the auth core.

use chrono::Duration;
use secrecy::SecretString;

use crate::{
    policy::{DEFAULT_LOCKOUT_DURATION_SECONDS, DEFAULT_LOCKOUT_THRESHOLD},
    token::DEFAULT_TOKEN_TTL_SECONDS,
};

const DEFAULT_STORE_TIMEOUT_SECONDS: u64 = 5;

/// Upper bound for token lifetime, refresh grace and lockout duration.
pub const MAX_WINDOW_SECONDS: i64 = 365 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    jwt_secret: SecretString,
    token_ttl_seconds: i64,
    refresh_grace_seconds: i64,
    lockout_threshold: u32,
    lockout_duration_seconds: i64,
    store_timeout_seconds: u64,
    login_rate_limit: u32,
}

impl AuthConfig {
    #[must_use]
    pub fn new(jwt_secret: SecretString) -> Self {
        Self {
            jwt_secret,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            refresh_grace_seconds: 0,
            lockout_threshold: DEFAULT_LOCKOUT_THRESHOLD,
            lockout_duration_seconds: DEFAULT_LOCKOUT_DURATION_SECONDS,
            store_timeout_seconds: DEFAULT_STORE_TIMEOUT_SECONDS,
            login_rate_limit: 0,
        }
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_grace_seconds(mut self, seconds: i64) -> Self {
        self.refresh_grace_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_lockout_threshold(mut self, threshold: u32) -> Self {
        self.lockout_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_lockout_duration_seconds(mut self, seconds: i64) -> Self {
        self.lockout_duration_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_store_timeout_seconds(mut self, seconds: u64) -> Self {
        self.store_timeout_seconds = seconds;
        self
    }

    /// Login attempts allowed per client address per minute; zero disables the limit.
    #[must_use]
    pub fn with_login_rate_limit(mut self, per_minute: u32) -> Self {
        self.login_rate_limit = per_minute;
        self
    }

    #[must_use]
    pub fn jwt_secret(&self) -> &SecretString {
        &self.jwt_secret
    }

    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        Duration::seconds(self.token_ttl_seconds.clamp(1, MAX_WINDOW_SECONDS))
    }

    #[must_use]
    pub fn refresh_grace(&self) -> Duration {
        Duration::seconds(self.refresh_grace_seconds.clamp(0, MAX_WINDOW_SECONDS))
    }

    #[must_use]
    pub fn lockout_threshold(&self) -> u32 {
        self.lockout_threshold
    }

    #[must_use]
    pub fn lockout_duration(&self) -> Duration {
        Duration::seconds(self.lockout_duration_seconds.clamp(1, MAX_WINDOW_SECONDS))
    }

    #[must_use]
    pub fn store_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.store_timeout_seconds)
    }

    #[must_use]
    pub fn login_rate_limit(&self) -> u32 {
        self.login_rate_limit
    }
}
