//! Authenticated principal extraction for bearer-protected routes.

use axum::http::HeaderMap;

use super::utils::extract_bearer_token;
use crate::{api::error::ApiError, service::AuthService, token::Claims};

/// Resolve the bearer token into its claims, or a generic 401.
///
/// Missing, malformed, badly signed and expired tokens are indistinguishable
/// to the client.
pub fn require_auth(headers: &HeaderMap, service: &AuthService) -> Result<Claims, ApiError> {
    let token = extract_bearer_token(headers);
    service
        .authenticate(token.as_deref())
        .map_err(ApiError::from)
}
