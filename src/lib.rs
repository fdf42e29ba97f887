//! # LMS Auth
//!
//! Account authentication for the learning management system: password login
//! with lockout, stateless HS256 access tokens, and an audit trail.
//!
//! ## Lockout
//!
//! Every wrong password increments the account's failed-attempt counter. When the
//! counter reaches the threshold (5 by default) the account is locked for the
//! lockout duration (30 minutes by default). A successful login resets both the
//! counter and the lock. Locked and deactivated accounts are rejected before the
//! password is checked, and unknown emails get the same response as a wrong
//! password so accounts cannot be enumerated.
//!
//! ## Tokens
//!
//! Access tokens carry exactly `userId`, `email`, `role` and `exp`. Logout is
//! stateless; a token stays valid until it expires.
//!
//! ## Audit
//!
//! Login success and failure, logout and password reset requests are recorded
//! through an [`audit::AuditSink`]. A failing sink never changes the outcome of
//! the request that produced the event.

pub mod account;
pub mod api;
pub mod audit;
pub mod cli;
pub mod policy;
pub mod service;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
