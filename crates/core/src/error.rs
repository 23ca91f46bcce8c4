//! Domain error model.

use thiserror::Error;

/// Result type used across the directory and credential services.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every public operation of the identity core returns one of these. Failures that
/// originate in a collaborator (store, codec) are collapsed into [`DomainError::Backend`]
/// with a fixed message; the collaborator's own text is only ever logged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or missing required input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A user, email, or organizational reference is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate email on create/update.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The authorization decision denied the operation. The payload is the internal
    /// reason code; it is not meant to be shown to the caller.
    #[error("unauthorized")]
    Unauthorized(String),

    /// Generic failure of the backing store or codec.
    #[error("{0}")]
    Backend(&'static str),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized(reason.into())
    }

    /// Wrap a collaborator failure. The source is logged here and dropped.
    pub fn backend(context: &'static str, source: &dyn std::fmt::Display) -> Self {
        tracing::error!(error = %source, "{context}");
        Self::Backend(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_keeps_only_the_context() {
        let err = DomainError::backend("user lookup failed", &"connection refused to 10.0.0.3");
        assert_eq!(err, DomainError::Backend("user lookup failed"));
        assert_eq!(err.to_string(), "user lookup failed");
    }

    #[test]
    fn unauthorized_display_hides_reason_code() {
        let err = DomainError::unauthorized("employee_forbidden");
        assert_eq!(err.to_string(), "unauthorized");
    }
}
