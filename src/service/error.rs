use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::account::StoreError;

#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub msg: String,
}

impl FieldError {
    pub(crate) fn new(field: &str, msg: &str) -> Self {
        Self {
            field: field.to_string(),
            msg: msg.to_string(),
        }
    }
}

/// Every way an auth operation can end other than success.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{message}")]
    Validation {
        message: &'static str,
        errors: Vec<FieldError>,
    },
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account deactivated")]
    Deactivated,
    #[error("account temporarily locked")]
    Locked,
    #[error("invalid token")]
    InvalidToken,
    #[error("access denied")]
    Forbidden,
    #[error("too many requests")]
    RateLimited,
    /// Transient; the caller may retry.
    #[error("account store unavailable")]
    Unavailable,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout | StoreError::Conflict(_) => Self::Unavailable,
            StoreError::Duplicate => Self::Internal(anyhow::anyhow!(err)),
            StoreError::Backend(err) => Self::Internal(err),
        }
    }
}
