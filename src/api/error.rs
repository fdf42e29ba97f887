//! JSON error envelope shared by every endpoint.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::borrow::Cow;
use tracing::error;

use super::handlers::auth::types::ErrorResponse;
use crate::service::{FieldError, ServiceError};

pub(crate) const INVALID_CREDENTIALS: &str = "Invalid credentials";
pub(crate) const ACCOUNT_DEACTIVATED: &str =
    "Account is deactivated. Please contact administrator.";
pub(crate) const ACCOUNT_LOCKED: &str =
    "Account is temporarily locked due to multiple failed login attempts.";
pub(crate) const UNAUTHENTICATED: &str = "Access token is missing or invalid";
pub(crate) const ACCESS_DENIED: &str = "Access denied";
pub(crate) const RATE_LIMITED: &str = "Too many login attempts. Please try again later.";
pub(crate) const UNAVAILABLE: &str = "Service temporarily unavailable";
pub(crate) const INTERNAL: &str = "Internal server error";

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: Cow<'static, str>,
    errors: Option<Vec<FieldError>>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status,
            message: message.into(),
            errors: None,
        }
    }

    pub fn unauthorized(message: &'static str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation { message, errors } => Self {
                status: StatusCode::BAD_REQUEST,
                message: Cow::Borrowed(message),
                errors: (!errors.is_empty()).then_some(errors),
            },
            ServiceError::InvalidCredentials => Self::unauthorized(INVALID_CREDENTIALS),
            ServiceError::Deactivated => Self::unauthorized(ACCOUNT_DEACTIVATED),
            ServiceError::Locked => Self::new(StatusCode::LOCKED, ACCOUNT_LOCKED),
            ServiceError::InvalidToken => Self::unauthorized(UNAUTHENTICATED),
            ServiceError::Forbidden => Self::new(StatusCode::FORBIDDEN, ACCESS_DENIED),
            ServiceError::RateLimited => Self::new(StatusCode::TOO_MANY_REQUESTS, RATE_LIMITED),
            ServiceError::Unavailable => Self::new(StatusCode::SERVICE_UNAVAILABLE, UNAVAILABLE),
            ServiceError::Internal(err) => {
                error!("Request failed: {err:#}");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            message: self.message.into_owned(),
            errors: self.errors,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use axum::body::to_bytes;

    async fn body(err: ApiError) -> Result<(StatusCode, serde_json::Value)> {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, serde_json::from_slice(&bytes)?))
    }

    #[tokio::test]
    async fn rejection_statuses() -> Result<()> {
        let cases = [
            (ServiceError::InvalidCredentials, StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS),
            (ServiceError::Deactivated, StatusCode::UNAUTHORIZED, ACCOUNT_DEACTIVATED),
            (ServiceError::Locked, StatusCode::LOCKED, ACCOUNT_LOCKED),
            (ServiceError::InvalidToken, StatusCode::UNAUTHORIZED, UNAUTHENTICATED),
            (ServiceError::Forbidden, StatusCode::FORBIDDEN, ACCESS_DENIED),
            (ServiceError::RateLimited, StatusCode::TOO_MANY_REQUESTS, RATE_LIMITED),
            (ServiceError::Unavailable, StatusCode::SERVICE_UNAVAILABLE, UNAVAILABLE),
        ];
        for (err, status, message) in cases {
            let (got_status, value) = body(err.into()).await?;
            assert_eq!(got_status, status);
            assert_eq!(value["success"], false);
            assert_eq!(value["message"], message);
            assert!(value.get("errors").is_none());
        }
        Ok(())
    }

    #[tokio::test]
    async fn internal_errors_hide_details() -> Result<()> {
        let err = ServiceError::Internal(anyhow::anyhow!("connection refused on 10.1.2.3"));
        let (status, value) = body(err.into()).await?;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(value["message"], INTERNAL);
        assert!(!value.to_string().contains("10.1.2.3"));
        Ok(())
    }

    #[tokio::test]
    async fn validation_lists_fields() -> Result<()> {
        let err = ServiceError::Validation {
            message: "Validation failed",
            errors: vec![FieldError::new("email", "Please provide a valid email address")],
        };
        let (status, value) = body(err.into()).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["message"], "Validation failed");
        assert_eq!(value["errors"][0]["field"], "email");
        assert_eq!(value["errors"][0]["msg"], "Please provide a valid email address");
        Ok(())
    }
}
