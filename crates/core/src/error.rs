//! Service error model.

use serde::Serialize;
use thiserror::Error;

/// Result type used across the service layer.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Stable, machine-checkable failure category.
///
/// The transport maps each kind to a status code; clients may match on the
/// serialized (snake_case) name.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    InvalidCredentials,
    Unauthenticated,
    InvalidToken,
    ExpiredToken,
    Forbidden,
    NotFound,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::InvalidCredentials => "invalid_credentials",
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::InvalidToken => "invalid_token",
            ErrorKind::ExpiredToken => "expired_token",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-terminal failure of an identity operation.
///
/// Every variant carries a human-readable message; `kind()` is the stable
/// category. Nothing here is retried in-process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Malformed input (e.g. a permission outside the vocabulary).
    #[error("{0}")]
    Validation(String),

    /// Login failed. Unknown email and wrong password are indistinguishable.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// No bearer credential was presented for a protected operation.
    #[error("authentication required")]
    Unauthenticated,

    #[error("invalid token")]
    InvalidToken,

    #[error("token has expired")]
    ExpiredToken,

    /// Authorization denial.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A referenced record is absent at the store.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was violated (email, role name).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Store backend or crypto failure; the detail is for logs only.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Validation(_) => ErrorKind::Validation,
            ServiceError::InvalidCredentials => ErrorKind::InvalidCredentials,
            ServiceError::Unauthenticated => ErrorKind::Unauthenticated,
            ServiceError::InvalidToken => ErrorKind::InvalidToken,
            ServiceError::ExpiredToken => ErrorKind::ExpiredToken,
            ServiceError::Forbidden(_) => ErrorKind::Forbidden,
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::Conflict(_) => ErrorKind::Conflict,
            ServiceError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Message safe to hand back to a client.
    ///
    /// Internal details are replaced with a generic text.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}
