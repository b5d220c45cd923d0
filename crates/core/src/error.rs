//! Domain error model.

use thiserror::Error;

/// Result type used across the authorization core.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every failure carries a human-readable reason. The four kinds map one to one
/// onto the HTTP statuses used by the API layer (400/404/403/500).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed input or a structural violation (cycle, depth, duplicate name).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A role, group, menu item or principal does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Authenticated but disallowed, including disabled accounts and unknown
    /// permission codes under strict governance.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The process is misconfigured (for example an empty permission registry).
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation_error",
            DomainError::NotFound(_) => "not_found",
            DomainError::Forbidden(_) => "forbidden",
            DomainError::Internal(_) => "internal_error",
        }
    }

    /// The reason without the kind prefix.
    pub fn reason(&self) -> &str {
        match self {
            DomainError::Validation(m)
            | DomainError::NotFound(m)
            | DomainError::Forbidden(m)
            | DomainError::Internal(m) => m,
        }
    }
}
