//! Auth endpoints: login, logout, token refresh and password-reset requests.
//!
//! Handlers only translate HTTP to [`AuthService`](crate::service::AuthService)
//! calls and back; policy, token and audit decisions all live in the service.

pub mod forgot_password;
pub mod login;
pub mod logout;
pub mod principal;
pub mod refresh;
pub mod types;
pub(crate) mod utils;

use utoipa_axum::{router::OpenApiRouter, routes};

/// Auth routes, relative to wherever they are mounted.
pub(crate) fn routes() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(login::login))
        .routes(routes!(logout::logout))
        .routes(routes!(refresh::refresh))
        .routes(routes!(forgot_password::forgot_password))
}
