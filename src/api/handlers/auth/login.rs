use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{Extensions, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use secrecy::SecretString;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::{
    types::{ErrorResponse, LoginData, LoginRequest, LoginResponse},
    utils::client_source,
};
use crate::{api::error::ApiError, service::AuthService};

#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials accepted; returns the user and a bearer token.", body = LoginResponse),
        (status = 400, description = "Validation failed.", body = ErrorResponse),
        (status = 401, description = "Invalid credentials or deactivated account.", body = ErrorResponse),
        (status = 423, description = "Account temporarily locked.", body = ErrorResponse),
        (status = 429, description = "Too many login attempts from this address.", body = ErrorResponse),
        (status = 503, description = "Account store unavailable; retry later.", body = ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    extensions: Extensions,
    service: Extension<Arc<AuthService>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(err) => {
            debug!("Rejected login body: {err}");
            return ApiError::new(StatusCode::BAD_REQUEST, "Invalid request body").into_response();
        }
    };
    let request = LoginRequest::from_body(&body);

    let source = client_source(&headers, &extensions);
    match service
        .login(
            &request.email,
            SecretString::from(request.password),
            source.as_deref(),
        )
        .await
    {
        Ok(success) => (
            StatusCode::OK,
            Json(LoginResponse {
                success: true,
                message: "Login successful".to_string(),
                data: LoginData {
                    user: success.user,
                    token: success.token,
                },
            }),
        )
            .into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}
