//! Signed session tokens (HS256 JWT).
//!
//! Tokens are stateless: the server keeps no session table, so possession of a
//! validly signed, unexpired token is the whole proof of authentication and
//! logout cannot revoke one.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt};
use uuid::Uuid;

use crate::account::{Account, Role};

pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("failed to sign token")]
    Signing,
}

/// Exactly the claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    /// Valid strictly before the expiry instant.
    fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() < self.exp.saturating_mul(1000)
    }
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    refresh_grace: Duration,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl", &self.ttl)
            .field("refresh_grace", &self.refresh_grace)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    #[must_use]
    pub fn new(secret: &SecretString, ttl: Duration) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            ttl,
            refresh_grace: Duration::zero(),
        }
    }

    /// How long past expiry a token may still be exchanged on refresh.
    /// Zero (the default) means expired tokens are never refreshable.
    #[must_use]
    pub fn with_refresh_grace(mut self, grace: Duration) -> Self {
        self.refresh_grace = grace;
        self
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a token for `account` expiring `ttl` after `now`.
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if the claims cannot be encoded.
    pub fn issue(&self, account: &Account, now: DateTime<Utc>) -> Result<String, TokenError> {
        self.issue_claims(account.id, &account.email, account.role, now)
    }

    /// # Errors
    /// Returns `TokenError::Signing` if the claims cannot be encoded.
    pub fn issue_claims(
        &self,
        user_id: Uuid,
        email: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let expires_at = now.checked_add_signed(self.ttl).ok_or(TokenError::Signing)?;
        let claims = Claims {
            user_id,
            email: email.to_string(),
            role,
            exp: expires_at.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|_| TokenError::Signing)
    }

    /// Check signature and shape, without looking at expiry.
    fn decode_signed(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the caller's clock below.
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::from(["exp".to_string()]);

        decode::<Claims>(token.trim(), &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            })
    }

    /// Verify a bearer token at `now`.
    ///
    /// # Errors
    /// Fails when the token is malformed, badly signed, or expired.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let claims = self.decode_signed(token)?;
        if claims.is_live_at(now) {
            Ok(claims)
        } else {
            Err(TokenError::Expired)
        }
    }

    /// Verify a token presented for refresh, honouring the refresh grace window.
    ///
    /// # Errors
    /// Fails when the token is malformed, badly signed, or expired beyond the grace.
    pub fn verify_for_refresh(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Claims, TokenError> {
        let claims = self.decode_signed(token)?;
        let cutoff = now
            .checked_sub_signed(self.refresh_grace)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        if claims.is_live_at(cutoff) {
            Ok(claims)
        } else {
            Err(TokenError::Expired)
        }
    }
}
