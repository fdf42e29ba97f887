//! Argon2id password hashing.

use anyhow::{anyhow, Context, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{Error, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use once_cell::sync::Lazy;
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

/// Hash verified when no account matches, so unknown emails take as long as
/// wrong passwords. Built once from a random value nobody knows.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password(&Uuid::new_v4().to_string()).ok());

/// Hash a plaintext password with a fresh salt.
///
/// # Errors
/// Returns an error if the argon2 parameters are rejected.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("failed to hash password: {err}"))
}

/// Check a plaintext password against a stored PHC hash.
///
/// # Errors
/// Returns an error when the stored hash cannot be parsed; a mismatch is `Ok(false)`.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|err| anyhow!("invalid password hash: {err}"))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(Error::Password) => Ok(false),
        Err(err) => Err(anyhow!("failed to verify password: {err}")),
    }
}

/// Verify on the blocking pool; argon2 is deliberately slow.
///
/// # Errors
/// Returns an error if the hash is unparsable or the blocking task panicked.
pub async fn verify_password_blocking(password: SecretString, hash: SecretString) -> Result<bool> {
    tokio::task::spawn_blocking(move || {
        verify_password(password.expose_secret(), hash.expose_secret())
    })
    .await
    .context("password verification task failed")?
}

/// Burn the same amount of work as a real verification and discard the result.
pub async fn verify_dummy(password: SecretString) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password_blocking(password, SecretString::from(hash)).await;
    }
}
