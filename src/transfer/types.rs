//! Ledger Core Types
//!
//! Type definitions shared by the executor, the stores and the API layer.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::error::TransferError;
use super::state::TransactionStatus;
use crate::core_types::{AccountId, TransactionId};

/// Maximum fractional digits of a ledger amount (`NUMERIC(28, 8)`)
pub const MAX_AMOUNT_SCALE: u32 = 8;

/// Maximum length of a client idempotency key
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 64;

/// Transaction reference - globally unique per ledger entry
///
/// Produced by a [`super::reference::ReferenceGenerator`]; backed by a unique
/// index in storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TransactionReference(String);

impl TransactionReference {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ledger entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum TransactionType {
    /// Single-account withdrawal (no destination)
    Debit = 1,
    /// Single-account deposit (no destination)
    Credit = 2,
    /// Account-to-account movement
    Transfer = 3,
}

impl TransactionType {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(TransactionType::Debit),
            2 => Some(TransactionType::Credit),
            3 => Some(TransactionType::Transfer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Debit => "debit",
            TransactionType::Credit => "credit",
            TransactionType::Transfer => "transfer",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate a ledger amount: strictly positive, at most [`MAX_AMOUNT_SCALE`]
/// fractional digits (trailing zeros ignored).
pub fn validate_amount(amount: Decimal) -> Result<(), TransferError> {
    if amount <= Decimal::ZERO {
        return Err(TransferError::InvalidAmount);
    }
    let scale = amount.normalize().scale();
    if scale > MAX_AMOUNT_SCALE {
        return Err(TransferError::PrecisionOverflow {
            provided: scale,
            max: MAX_AMOUNT_SCALE,
        });
    }
    Ok(())
}

pub fn validate_idempotency_key(key: &str) -> Result<(), TransferError> {
    if key.trim().is_empty() {
        return Err(TransferError::InvalidIdempotencyKey(
            "must not be empty".to_string(),
        ));
    }
    if key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(TransferError::InvalidIdempotencyKey(format!(
            "longer than {} bytes",
            MAX_IDEMPOTENCY_KEY_LEN
        )));
    }
    Ok(())
}

/// Transfer request as seen by the executor
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub from_account_id: AccountId,
    pub to_account_number: String,
    pub amount: Decimal,
    pub description: String,
    /// Client-provided idempotency key (optional)
    pub idempotency_key: Option<String>,
}

impl TransferRequest {
    pub fn new(
        from_account_id: AccountId,
        to_account_number: impl Into<String>,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Self {
        Self {
            from_account_id,
            to_account_number: to_account_number.into(),
            amount,
            description: description.into(),
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Single-account debit or credit
#[derive(Debug, Clone)]
pub struct LedgerEntryRequest {
    pub account_id: AccountId,
    pub amount: Decimal,
    pub description: String,
    pub idempotency_key: Option<String>,
}

impl LedgerEntryRequest {
    pub fn new(account_id: AccountId, amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            account_id,
            amount,
            description: description.into(),
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Ledger entry to be written by a unit of work
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub from_account_id: AccountId,
    pub to_account_id: Option<AccountId>,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub description: String,
    pub reference: TransactionReference,
    pub idempotency_key: Option<String>,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
}

/// Ledger entry stored in the transaction log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub from_account_id: AccountId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_account_id: Option<AccountId>,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    #[serde(serialize_with = "serialize_status")]
    pub status: TransactionStatus,
    pub description: String,
    pub reference: TransactionReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// Source balance at the instant of mutation
    #[serde(with = "rust_decimal::serde::str")]
    pub balance_before: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub balance_after: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn serialize_status<S: serde::Serializer>(
    status: &TransactionStatus,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(status.as_str())
}

impl TransactionRecord {
    /// Materialise a stored record from a new entry
    pub fn from_new(id: TransactionId, entry: NewTransaction, now: DateTime<Utc>) -> Self {
        Self {
            id,
            from_account_id: entry.from_account_id,
            to_account_id: entry.to_account_id,
            amount: entry.amount,
            transaction_type: entry.transaction_type,
            status: entry.status,
            description: entry.description,
            reference: entry.reference,
            idempotency_key: entry.idempotency_key,
            balance_before: entry.balance_before,
            balance_after: entry.balance_after,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }

    /// Whether `account_id` is the source or the destination of this entry
    pub fn involves(&self, account_id: AccountId) -> bool {
        self.from_account_id == account_id || self.to_account_id == Some(account_id)
    }
}

impl fmt::Display for TransactionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transaction[{}] {} {} -> {:?} amount={} status={}",
            self.reference,
            self.transaction_type,
            self.from_account_id,
            self.to_account_id,
            self.amount,
            self.status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_transaction_type_roundtrip() {
        for t in [
            TransactionType::Debit,
            TransactionType::Credit,
            TransactionType::Transfer,
        ] {
            assert_eq!(TransactionType::from_id(t.id()), Some(t));
        }
        assert_eq!(TransactionType::from_id(0), None);
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(Decimal::from(40)).is_ok());
        assert!(validate_amount(Decimal::from_str("0.00000001").unwrap()).is_ok());
        // trailing zeros do not count towards precision
        assert!(validate_amount(Decimal::from_str("1.500000000000").unwrap()).is_ok());

        assert_eq!(
            validate_amount(Decimal::ZERO),
            Err(TransferError::InvalidAmount)
        );
        assert_eq!(
            validate_amount(Decimal::from(-5)),
            Err(TransferError::InvalidAmount)
        );
        assert_eq!(
            validate_amount(Decimal::from_str("0.000000001").unwrap()),
            Err(TransferError::PrecisionOverflow {
                provided: 9,
                max: MAX_AMOUNT_SCALE
            })
        );
    }

    #[test]
    fn test_validate_idempotency_key() {
        assert!(validate_idempotency_key("client-123").is_ok());
        assert!(validate_idempotency_key("   ").is_err());
        assert!(validate_idempotency_key(&"k".repeat(MAX_IDEMPOTENCY_KEY_LEN + 1)).is_err());
    }

    #[test]
    fn test_transfer_request_builder() {
        let req = TransferRequest::new(1, "0000000002", Decimal::from(40), "rent");
        assert!(req.idempotency_key.is_none());

        let req = req.with_idempotency_key("client-123");
        assert_eq!(req.idempotency_key.as_deref(), Some("client-123"));
    }

    #[test]
    fn test_record_involves() {
        let entry = NewTransaction {
            from_account_id: 1,
            to_account_id: Some(2),
            amount: Decimal::from(10),
            transaction_type: TransactionType::Transfer,
            status: TransactionStatus::Pending,
            description: String::new(),
            reference: TransactionReference::new("TXN1"),
            idempotency_key: None,
            balance_before: Decimal::from(10),
            balance_after: Decimal::ZERO,
        };
        let record = TransactionRecord::from_new(9, entry, Utc::now());
        assert!(record.involves(1));
        assert!(record.involves(2));
        assert!(!record.involves(3));
        assert!(!record.is_completed());
    }
}
