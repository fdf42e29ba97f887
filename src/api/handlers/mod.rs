//! API handlers for the LMS auth service.

pub mod auth;
pub mod health;
pub mod users;
