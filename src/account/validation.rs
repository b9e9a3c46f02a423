//! Input validation for currency codes and account numbers
//!
//! Validated newtypes with private fields; construction goes through `new()`.

use std::fmt;

use rand::Rng;
use rand::rngs::OsRng;

use crate::transfer::TransferError;

// ============================================================================
// Validation Errors
// ============================================================================

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Currency code must be uppercase: got '{got}', expected '{expected}'")]
    CurrencyNotUppercase { got: String, expected: String },

    #[error("Invalid length for {field}: expected {expected}, got {actual}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid format for {field}: '{value}' (expected: {expected})")]
    InvalidFormat {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
}

// ============================================================================
// CurrencyCode
// ============================================================================

/// Three-letter uppercase currency code (`USD`, `EUR`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub const LEN: usize = 3;

    /// # Validation Rules
    /// - Exactly 3 ASCII letters
    /// - Uppercase (lowercase is rejected, not normalised)
    pub fn new(code: &str) -> Result<Self, ValidationError> {
        let code = code.trim();

        if code.len() != Self::LEN {
            return Err(ValidationError::InvalidLength {
                field: "currency",
                expected: Self::LEN,
                actual: code.len(),
            });
        }

        if !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidFormat {
                field: "currency",
                value: code.to_string(),
                expected: "^[A-Z]{3}$",
            });
        }

        let upper = code.to_ascii_uppercase();
        if upper != code {
            return Err(ValidationError::CurrencyNotUppercase {
                got: code.to_string(),
                expected: upper,
            });
        }

        Ok(Self(upper))
    }

    pub fn usd() -> Self {
        Self("USD".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// AccountNumber
// ============================================================================

/// Ten-digit public account number (unique index in `accounts_tb`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountNumber(String);

impl AccountNumber {
    pub const LEN: usize = 10;

    pub fn new(number: &str) -> Result<Self, ValidationError> {
        let number = number.trim();

        if number.len() != Self::LEN {
            return Err(ValidationError::InvalidLength {
                field: "account_number",
                expected: Self::LEN,
                actual: number.len(),
            });
        }

        if !number.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::InvalidFormat {
                field: "account_number",
                value: number.to_string(),
                expected: "^[0-9]{10}$",
            });
        }

        Ok(Self(number.to_string()))
    }

    /// Draw a fresh number from the OS CSPRNG.
    ///
    /// Uniqueness is enforced by the store; callers retry on collision.
    pub fn generate() -> Self {
        let n: u64 = OsRng.gen_range(0..10_000_000_000);
        Self(format!("{:010}", n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ValidationError> for TransferError {
    fn from(e: ValidationError) -> Self {
        let field = match &e {
            ValidationError::CurrencyNotUppercase { .. } => "currency",
            ValidationError::InvalidLength { field, .. }
            | ValidationError::InvalidFormat { field, .. } => *field,
        };
        if field == "currency" {
            TransferError::InvalidCurrency(e.to_string())
        } else {
            TransferError::InvalidAccountNumber(e.to_string())
        }
    }
}
