//! Shared error types
//!
//! Six error kinds, one `AppError` enum. Categorized by `ErrorCode` so
//! pipelines can decide retry-vs-skip-vs-abort without matching on variants
//! directly.

use thiserror::Error;

/// Coarse-grained error category, numbered in ranges so a caller can bucket
/// on `code() / 1000` without enumerating every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // 1xxx - transient, retryable
    ProviderTransient = 1001,
    // 2xxx - permanent external failure, not retryable
    ProviderPermanent = 2001,
    // 3xxx - store conflict, never fatal to a batch
    Database = 3001,
    Conflict = 3002,
    // 4xxx - encoder failure, retried a bounded number of times
    EmbeddingFailed = 4001,
    // 5xxx - caller error, surfaced as an empty result, not an error
    Validation = 5001,
    // 9xxx - programmer error / invariant violation
    Internal = 9001,
}

impl ErrorCode {
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("provider request failed (transient, status={status}): {message}")]
    ProviderTransient {
        /// HTTP status, or 0 when the failure never reached an HTTP response
        /// (connection error, cancellation).
        status: u16,
        message: String,
    },

    #[error("provider request failed (permanent, status={status}): {message}")]
    ProviderPermanent {
        status: u16,
        message: String,
    },

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("conflict: {message}")]
    Conflict { message: String },

    #[error("embedding failed: {message}")]
    EmbeddingFailed { message: String },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::ProviderTransient { .. } => ErrorCode::ProviderTransient,
            AppError::ProviderPermanent { .. } => ErrorCode::ProviderPermanent,
            AppError::Database(_) => ErrorCode::Database,
            AppError::Conflict { .. } => ErrorCode::Conflict,
            AppError::EmbeddingFailed { .. } => ErrorCode::EmbeddingFailed,
            AppError::Validation { .. } => ErrorCode::Validation,
            AppError::Internal { .. } => ErrorCode::Internal,
        }
    }

    /// Transient external failures and database hiccups are worth retrying.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::ProviderTransient | ErrorCode::Database
        )
    }

    /// Errors caused by the caller (bad input) or a permanently-rejected
    /// request — retrying will not help.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::ProviderPermanent | ErrorCode::Validation | ErrorCode::Conflict
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Internal {
            message: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let e = AppError::ProviderTransient {
            status: 503,
            message: "unavailable".into(),
        };
        assert_eq!(e.code(), ErrorCode::ProviderTransient);
        assert!(e.is_server_error());
        assert!(!e.is_client_error());
    }

    #[test]
    fn test_validation_error_is_client_error() {
        let e = AppError::validation("empty query");
        assert_eq!(e.code(), ErrorCode::Validation);
        assert!(e.is_client_error());
        assert!(!e.is_server_error());
    }

    #[test]
    fn test_provider_permanent_not_retried() {
        let e = AppError::ProviderPermanent {
            status: 404,
            message: "not found".into(),
        };
        assert!(e.is_client_error());
        assert!(!e.is_server_error());
    }

    #[test]
    fn test_conflict_is_never_server_error() {
        let e = AppError::conflict("duplicate doi");
        assert!(e.is_client_error());
        assert!(!e.is_server_error());
    }
}
