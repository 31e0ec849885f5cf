//! Unified error handling for the data-access core.
//!
//! Every failure the core surfaces is one of these kinds. The transport
//! layer maps `code()` to its own status outcome.

use domain::DomainError;
use thiserror::Error;

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    /// Bad parameter or constructor input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A referenced entity does not exist for an operation that requires it
    #[error("{0} not found")]
    NotFound(String),

    /// A transaction is already open when another is requested
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A uniqueness constraint rejected the write
    #[error("{0} already exists")]
    Duplicate(String),

    /// A single-result query matched more than one row
    #[error("Expected at most one {0}, found several")]
    MultipleResults(String),

    // Store I/O
    #[cfg(feature = "database")]
    #[error("Persistence error: {0}")]
    Persistence(#[from] sea_orm::DbErr),

    // Internal
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get error code for the transport layer
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidArgument(_) => "INVALID_ARGUMENT",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Duplicate(_) => "DUPLICATE",
            AppError::MultipleResults(_) => "MULTIPLE_RESULTS",
            #[cfg(feature = "database")]
            AppError::Persistence(_) => "PERSISTENCE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get user-facing message (hides internal details)
    pub fn user_message(&self) -> String {
        match self {
            #[cfg(feature = "database")]
            AppError::Persistence(e) => {
                tracing::error!("Persistence error: {:?}", e);
                "A database error occurred".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Whether the caller, not the store, is at fault
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::InvalidArgument(_)
                | AppError::NotFound(_)
                | AppError::Conflict(_)
                | AppError::Duplicate(_)
                | AppError::MultipleResults(_)
        )
    }
}

// =============================================================================
// Domain Error Conversion
// =============================================================================

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => AppError::InvalidArgument(msg),
            DomainError::UnknownRoleName(name) => {
                AppError::InvalidArgument(format!("unknown role `{}`", name))
            }
            // A stored rank we cannot read back is corrupt data, not bad input
            DomainError::UnknownRole(rank) => {
                AppError::Internal(format!("unknown role rank {} in store", rank))
            }
        }
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

/// Extension trait for Option -> AppError conversion
pub trait OptionExt<T> {
    fn ok_or_not_found(self, entity: impl Into<String>) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, entity: impl Into<String>) -> AppResult<T> {
        self.ok_or_else(|| AppError::NotFound(entity.into()))
    }
}

/// Convenience constructors
impl AppError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        AppError::InvalidArgument(msg.into())
    }

    pub fn not_found(entity: impl Into<String>) -> Self {
        AppError::NotFound(entity.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn duplicate(entity: impl Into<String>) -> Self {
        AppError::Duplicate(entity.into())
    }

    pub fn multiple_results(entity: impl Into<String>) -> Self {
        AppError::MultipleResults(entity.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_map_to_kinds() {
        let err: AppError = DomainError::validation("bad email").into();
        assert_eq!(err.code(), "INVALID_ARGUMENT");

        let err: AppError = DomainError::UnknownRole(9).into();
        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::internal("pool exhausted at 10.0.0.3");
        assert_eq!(err.user_message(), "An internal error occurred");

        let err = AppError::duplicate("role assignment");
        assert_eq!(err.user_message(), "role assignment already exists");
    }

    #[test]
    fn test_ok_or_not_found() {
        let missing: Option<i64> = None;
        let err = missing.ok_or_not_found("user 7").unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref what) if what == "user 7"));
    }
}
