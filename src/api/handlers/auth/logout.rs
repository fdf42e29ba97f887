use axum::{
    extract::Extension,
    http::{Extensions, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::{
    types::MessageResponse,
    utils::{client_source, extract_bearer_token},
};
use crate::service::AuthService;

#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 200, description = "Always succeeds; a valid bearer token is recorded in the audit trail.", body = MessageResponse),
    ),
    security((), ("bearer" = [])),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    extensions: Extensions,
    service: Extension<Arc<AuthService>>,
) -> impl IntoResponse {
    let token = extract_bearer_token(&headers);
    let source = client_source(&headers, &extensions);
    service.logout(token.as_deref(), source.as_deref()).await;

    (StatusCode::OK, Json(MessageResponse::ok("Logout successful")))
}
