use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::types::{ErrorResponse, RefreshRequest, RefreshResponse, TokenData};
use crate::{
    api::error::ApiError,
    service::{AuthService, ServiceError},
};

#[utoipa::path(
    post,
    path = "/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token with a fresh expiry.", body = RefreshResponse),
        (status = 401, description = "Missing or invalid refresh token.", body = ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn refresh(
    service: Extension<Arc<AuthService>>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Response {
    let token = payload
        .ok()
        .and_then(|Json(request)| request.token)
        .filter(|token| !token.trim().is_empty());
    let Some(token) = token else {
        return ApiError::unauthorized("Refresh token is required").into_response();
    };

    match service.refresh(&token).await {
        Ok(token) => (
            StatusCode::OK,
            Json(RefreshResponse {
                success: true,
                data: TokenData { token },
            }),
        )
            .into_response(),
        Err(ServiceError::InvalidToken) => {
            ApiError::unauthorized("Invalid refresh token").into_response()
        }
        Err(err) => ApiError::from(err).into_response(),
    }
}
