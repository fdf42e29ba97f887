//! Bearer-authenticated user endpoints.
//!
//! Flow Overview:
//! 1) Verify the bearer token.
//! 2) Enforce the role check for /users.
//! 3) Return outward user views; password hashes never leave the account module.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::auth::{principal::require_auth, types::ErrorResponse};
use crate::{account::UserView, api::error::ApiError, service::AuthService};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserData {
    pub user: UserView,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserResponse {
    pub success: bool,
    pub data: UserData,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserListData {
    pub users: Vec<UserView>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserListResponse {
    pub success: bool,
    pub data: UserListData,
}

#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "The authenticated user.", body = UserResponse),
        (status = 401, description = "Missing, invalid or expired bearer token.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn me(headers: HeaderMap, service: Extension<Arc<AuthService>>) -> Response {
    let claims = match require_auth(&headers, &service) {
        Ok(claims) => claims,
        Err(err) => return err.into_response(),
    };

    match service.current_user(&claims).await {
        Ok(user) => (
            StatusCode::OK,
            Json(UserResponse {
                success: true,
                data: UserData { user },
            }),
        )
            .into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "Active users.", body = UserListResponse),
        (status = 401, description = "Missing, invalid or expired bearer token.", body = ErrorResponse),
        (status = 403, description = "Caller is not an administrator.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn list_users(headers: HeaderMap, service: Extension<Arc<AuthService>>) -> Response {
    let claims = match require_auth(&headers, &service) {
        Ok(claims) => claims,
        Err(err) => return err.into_response(),
    };

    match service.list_users(&claims).await {
        Ok(users) => (
            StatusCode::OK,
            Json(UserListResponse {
                success: true,
                data: UserListData { users },
            }),
        )
            .into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}
