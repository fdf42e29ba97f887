use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{Extensions, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::{
    types::{ErrorResponse, ForgotPasswordRequest, MessageResponse},
    utils::client_source,
};
use crate::{api::error::ApiError, service::AuthService};

const RESET_ACKNOWLEDGED: &str =
    "If an account with that email exists, a password reset link has been sent.";

#[utoipa::path(
    post,
    path = "/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Same response whether or not the account exists.", body = MessageResponse),
        (status = 400, description = "Malformed email.", body = ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    headers: HeaderMap,
    extensions: Extensions,
    service: Extension<Arc<AuthService>>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Response {
    let email = payload
        .map(|Json(request)| request.email)
        .unwrap_or_default();
    let source = client_source(&headers, &extensions);

    match service.forgot_password(&email, source.as_deref()).await {
        Ok(()) => (StatusCode::OK, Json(MessageResponse::ok(RESET_ACKNOWLEDGED))).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}
