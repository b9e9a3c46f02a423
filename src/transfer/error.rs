//! Transfer Error Types
//!
//! One error enum for the whole ledger path. Every variant belongs to exactly
//! one [`ErrorKind`], which decides retry behaviour and what the caller sees.

use std::fmt;

use thiserror::Error;

/// Error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad amount, ids or request shape
    InvalidInput,
    /// Account/transaction absent or not owned by the caller
    NotFound,
    /// Insufficient funds, inactive account, currency mismatch
    PolicyViolation,
    /// Version mismatch, lock contention, reference collision
    Conflict,
    /// Storage or commit failure
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::PolicyViolation => "POLICY_VIOLATION",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Internal => "INTERNAL",
        };
        f.write_str(s)
    }
}

/// Transfer error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransferError {
    // === Validation Errors ===
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Amount precision exceeds limit (provided {provided}, max {max})")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Source and destination account cannot be the same")]
    SameAccount,

    #[error("Invalid account number: {0}")]
    InvalidAccountNumber(String),

    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),

    #[error("Invalid idempotency key: {0}")]
    InvalidIdempotencyKey(String),

    #[error("User not authenticated")]
    Unauthorized,

    // === Lookup Errors ===
    #[error("Source account not found")]
    SourceNotFound,

    #[error("Destination account not found")]
    DestinationNotFound,

    #[error("Account not found")]
    AccountNotFound,

    #[error("Transaction not found")]
    TransactionNotFound,

    // === Policy Errors ===
    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("Source account is inactive")]
    SourceInactive,

    #[error("Destination account cannot receive funds")]
    DestinationInactive,

    #[error("Currency mismatch between accounts")]
    CurrencyMismatch,

    #[error("Cannot retire account with positive balance")]
    AccountHasBalance,

    // === Conflict Errors ===
    #[error("Account was modified concurrently")]
    ConcurrentModification,

    #[error("Timed out waiting for account lock")]
    LockTimeout,

    #[error("Transaction reference already exists")]
    ReferenceCollision,

    #[error("Idempotency key was already used for a different request")]
    IdempotencyKeyReused,

    #[error("Invalid status transition: {0}")]
    InvalidStateTransition(String),

    // === System Errors ===
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal system error: {0}")]
    Internal(String),
}

impl TransferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::InvalidAmount
            | TransferError::PrecisionOverflow { .. }
            | TransferError::SameAccount
            | TransferError::InvalidAccountNumber(_)
            | TransferError::InvalidCurrency(_)
            | TransferError::InvalidIdempotencyKey(_)
            | TransferError::Unauthorized => ErrorKind::InvalidInput,
            TransferError::SourceNotFound
            | TransferError::DestinationNotFound
            | TransferError::AccountNotFound
            | TransferError::TransactionNotFound => ErrorKind::NotFound,
            TransferError::InsufficientFunds
            | TransferError::SourceInactive
            | TransferError::DestinationInactive
            | TransferError::CurrencyMismatch
            | TransferError::AccountHasBalance => ErrorKind::PolicyViolation,
            TransferError::ConcurrentModification
            | TransferError::LockTimeout
            | TransferError::ReferenceCollision
            | TransferError::IdempotencyKeyReused => ErrorKind::Conflict,
            TransferError::InvalidStateTransition(_)
            | TransferError::DatabaseError(_)
            | TransferError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the executor may re-run the unit of work with fresh state.
    ///
    /// A reused idempotency key is a conflict with a settled record; running
    /// again can never change the outcome.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            TransferError::ConcurrentModification | TransferError::LockTimeout
        )
    }

    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::InvalidAmount => "INVALID_AMOUNT",
            TransferError::PrecisionOverflow { .. } => "PRECISION_OVERFLOW",
            TransferError::SameAccount => "SAME_ACCOUNT",
            TransferError::InvalidAccountNumber(_) => "INVALID_ACCOUNT_NUMBER",
            TransferError::InvalidCurrency(_) => "INVALID_CURRENCY",
            TransferError::InvalidIdempotencyKey(_) => "INVALID_IDEMPOTENCY_KEY",
            TransferError::Unauthorized => "UNAUTHORIZED",
            TransferError::SourceNotFound => "SOURCE_NOT_FOUND",
            TransferError::DestinationNotFound => "DESTINATION_NOT_FOUND",
            TransferError::AccountNotFound => "ACCOUNT_NOT_FOUND",
            TransferError::TransactionNotFound => "TRANSACTION_NOT_FOUND",
            TransferError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            TransferError::SourceInactive => "SOURCE_INACTIVE",
            TransferError::DestinationInactive => "DESTINATION_INACTIVE",
            TransferError::CurrencyMismatch => "CURRENCY_MISMATCH",
            TransferError::AccountHasBalance => "ACCOUNT_HAS_BALANCE",
            TransferError::ConcurrentModification => "CONCURRENT_MODIFICATION",
            TransferError::LockTimeout => "LOCK_TIMEOUT",
            TransferError::ReferenceCollision => "REFERENCE_COLLISION",
            TransferError::IdempotencyKeyReused => "IDEMPOTENCY_KEY_REUSED",
            TransferError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            TransferError::DatabaseError(_) => "DATABASE_ERROR",
            TransferError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::Unauthorized => 401,
            _ => match self.kind() {
                ErrorKind::InvalidInput => 400,
                ErrorKind::NotFound => 404,
                ErrorKind::PolicyViolation => 422,
                ErrorKind::Conflict => 409,
                ErrorKind::Internal => 500,
            },
        }
    }

    /// Message safe to hand to a caller. Internal errors never carry
    /// storage-layer detail past the service boundary.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "Internal error, retry with the same idempotency key".to_string(),
            _ => self.to_string(),
        }
    }
}

/// PostgreSQL SQLSTATE codes the ledger reacts to
pub mod sqlstate {
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const LOCK_NOT_AVAILABLE: &str = "55P03";
    pub const DEADLOCK_DETECTED: &str = "40P01";
    pub const SERIALIZATION_FAILURE: &str = "40001";
}

impl From<sqlx::Error> for TransferError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::PoolTimedOut = e {
            return TransferError::DatabaseError("connection pool timed out".to_string());
        }
        let code = e
            .as_database_error()
            .and_then(|db| db.code())
            .map(|c| c.into_owned());
        match code.as_deref() {
            Some(sqlstate::LOCK_NOT_AVAILABLE) => TransferError::LockTimeout,
            Some(sqlstate::DEADLOCK_DETECTED) | Some(sqlstate::SERIALIZATION_FAILURE) => {
                TransferError::ConcurrentModification
            }
            _ => TransferError::DatabaseError(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(TransferError::SameAccount.code(), "SAME_ACCOUNT");
        assert_eq!(TransferError::InsufficientFunds.code(), "INSUFFICIENT_FUNDS");
        assert_eq!(TransferError::LockTimeout.code(), "LOCK_TIMEOUT");
    }

    #[test]
    fn test_taxonomy() {
        assert_eq!(TransferError::InvalidAmount.kind(), ErrorKind::InvalidInput);
        assert_eq!(TransferError::DestinationNotFound.kind(), ErrorKind::NotFound);
        assert_eq!(TransferError::CurrencyMismatch.kind(), ErrorKind::PolicyViolation);
        assert_eq!(TransferError::DestinationInactive.kind(), ErrorKind::PolicyViolation);
        assert_eq!(TransferError::ReferenceCollision.kind(), ErrorKind::Conflict);
        assert_eq!(TransferError::Internal("x".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_only_contention_is_retriable() {
        assert!(TransferError::ConcurrentModification.is_retriable());
        assert!(TransferError::LockTimeout.is_retriable());
        assert!(!TransferError::IdempotencyKeyReused.is_retriable());
        assert!(!TransferError::InsufficientFunds.is_retriable());
        assert!(!TransferError::DatabaseError("boom".into()).is_retriable());
    }

    #[test]
    fn test_http_status() {
        assert_eq!(TransferError::Unauthorized.http_status(), 401);
        assert_eq!(TransferError::InvalidAmount.http_status(), 400);
        assert_eq!(TransferError::TransactionNotFound.http_status(), 404);
        assert_eq!(TransferError::ConcurrentModification.http_status(), 409);
        assert_eq!(TransferError::InsufficientFunds.http_status(), 422);
        assert_eq!(TransferError::Internal("test".into()).http_status(), 500);
    }

    #[test]
    fn test_public_message_hides_storage_detail() {
        let err = TransferError::DatabaseError("relation accounts_tb does not exist".into());
        assert!(!err.public_message().contains("accounts_tb"));
        assert_eq!(
            TransferError::InsufficientFunds.public_message(),
            "Insufficient funds"
        );
    }
}
