use crate::database::DatabaseError;
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error;

/// Error codes callers can distinguish, one per taxonomy entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    Forbidden,
    Unauthenticated,
    Conflict,
    CapacityExceeded,
    InvalidState,
    Validation,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::Unauthenticated => "UNAUTHENTICATED",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::CapacityExceeded => "CAPACITY_EXCEEDED",
            ErrorCode::InvalidState => "INVALID_STATE",
            ErrorCode::Validation => "VALIDATION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Application-level error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Referenced entity is absent
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Ownership or role violation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// No usable principal on the request
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Duplicate registration
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Event is full
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// Event not open, past, in progress, or registration already cancelled
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Malformed input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Opaque failure returned to callers once the detail has been logged
    #[error("Internal error: {0}")]
    Internal(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Repository errors that are not business-rule rejections
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Public error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::Forbidden(_) => ErrorCode::Forbidden,
            AppError::Unauthenticated(_) => ErrorCode::Unauthenticated,
            AppError::Conflict(_) => ErrorCode::Conflict,
            AppError::CapacityExceeded(_) => ErrorCode::CapacityExceeded,
            AppError::InvalidState(_) => ErrorCode::InvalidState,
            AppError::Validation(_) => ErrorCode::Validation,
            AppError::Internal(_)
            | AppError::Config(_)
            | AppError::Database(_)
            | AppError::Repository(_) => ErrorCode::Internal,
        }
    }

    /// Check if error must be hidden from callers
    pub fn is_internal(&self) -> bool {
        self.code() == ErrorCode::Internal
    }

    /// Check if the whole transaction may be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Repository(RepositoryError::Contention(_)))
    }

    /// Check if error is a database connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            AppError::Database(DatabaseError::PoolCreation(_))
                | AppError::Database(DatabaseError::ConnectionTimeout)
        )
    }

    /// Message safe to hand to callers
    pub fn public_message(&self) -> String {
        match self {
            AppError::NotFound(msg)
            | AppError::Forbidden(msg)
            | AppError::Unauthenticated(msg)
            | AppError::Conflict(msg)
            | AppError::CapacityExceeded(msg)
            | AppError::InvalidState(msg)
            | AppError::Validation(msg) => msg.clone(),
            _ => "An internal error occurred".to_string(),
        }
    }

    /// Get HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self.code() {
            ErrorCode::NotFound => 404,
            ErrorCode::Forbidden => 403,
            ErrorCode::Unauthenticated => 401,
            ErrorCode::Conflict | ErrorCode::CapacityExceeded => 409,
            ErrorCode::InvalidState => 422,
            ErrorCode::Validation => 400,
            ErrorCode::Internal => 500,
        }
    }
}

/// Repository-specific error types
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database query error
    #[error("Query error: {0}")]
    Query(SqlxError),

    /// Duplicate record
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Serialization failure, deadlock or lock timeout; the transaction can be replayed
    #[error("Transaction contention: {0}")]
    Contention(String),

    /// Stored value that does not decode into a domain type
    #[error("Corrupt row: {0}")]
    Decode(String),
}

impl From<SqlxError> for RepositoryError {
    fn from(err: SqlxError) -> Self {
        match &err {
            SqlxError::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                match code.as_deref() {
                    // Unique violation
                    Some("23505") => RepositoryError::Duplicate(db_err.message().to_string()),
                    // Foreign key / check violation
                    Some("23503") | Some("23514") => {
                        RepositoryError::ConstraintViolation(db_err.message().to_string())
                    }
                    // serialization_failure, deadlock_detected, lock_not_available
                    Some("40001") | Some("40P01") | Some("55P03") => {
                        RepositoryError::Contention(db_err.message().to_string())
                    }
                    _ => RepositoryError::Query(err),
                }
            }
            _ => RepositoryError::Query(err),
        }
    }
}

impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        match err {
            // No connection could be acquired; the query never ran
            SqlxError::PoolTimedOut => AppError::Database(DatabaseError::ConnectionTimeout),
            other => AppError::Repository(other.into()),
        }
    }
}

/// Convenience function to convert Option<T> to Result<T, AppError>
pub fn option_to_result<T>(opt: Option<T>, error_msg: &str) -> AppResult<T> {
    opt.ok_or_else(|| AppError::NotFound(error_msg.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_errors_keep_their_message() {
        let err = AppError::CapacityExceeded("This event is full".into());
        assert_eq!(err.code(), ErrorCode::CapacityExceeded);
        assert_eq!(err.public_message(), "This event is full");
        assert_eq!(err.status_code(), 409);
        assert!(!err.is_internal());
    }

    #[test]
    fn test_internal_errors_are_opaque() {
        let err = AppError::Repository(RepositoryError::Decode("status 'bogus'".into()));
        assert!(err.is_internal());
        assert_eq!(err.status_code(), 500);
        assert!(!err.public_message().contains("bogus"));
    }

    #[test]
    fn test_only_contention_is_retryable() {
        assert!(AppError::Repository(RepositoryError::Contention("40001".into())).is_retryable());
        assert!(!AppError::CapacityExceeded("full".into()).is_retryable());
        assert!(!AppError::Conflict("dup".into()).is_retryable());
    }

    #[test]
    fn test_pool_timeout_is_a_connection_error() {
        let err = AppError::from(SqlxError::PoolTimedOut);
        assert!(err.is_connection_error());
        assert!(err.is_internal());
        assert!(!err.is_retryable());
        assert_eq!(err.public_message(), "An internal error occurred");

        let err = AppError::from(SqlxError::RowNotFound);
        assert!(!err.is_connection_error());
        assert!(matches!(err, AppError::Repository(RepositoryError::Query(_))));
    }

    #[test]
    fn test_error_code_strings() {
        assert_eq!(ErrorCode::InvalidState.as_str(), "INVALID_STATE");
        assert_eq!(
            serde_json::to_value(ErrorCode::CapacityExceeded).unwrap(),
            serde_json::json!("CAPACITY_EXCEEDED")
        );
    }
}
