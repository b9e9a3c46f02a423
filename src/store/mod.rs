//! Ledger Store
//!
//! Storage seam for the transfer executor. Two implementations:
//! - [`postgres::PgLedgerStore`]: `accounts_tb` / `transactions_tb` in PostgreSQL
//! - [`memory::MemoryLedgerStore`]: in-process, same locking and visibility rules
//!
//! # Unit of Work
//!
//! Every balance mutation happens inside a [`UnitOfWork`]:
//!
//! ```text
//! begin → lock_for_update(a) → lock_for_update(b) → insert_transaction(PENDING)
//!       → apply_balance_delta(a) → apply_balance_delta(b) → complete_transaction
//!       → commit
//! ```
//!
//! Nothing written inside a unit of work is visible to any other reader before
//! `commit` returns `Ok`. Dropping a unit of work without committing rolls it
//! back and releases its locks.

pub mod memory;
pub mod postgres;
pub mod schema;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::account::{Account, NewAccount};
use crate::core_types::{AccountId, TransactionId, UserId};
use crate::transfer::error::TransferError;
use crate::transfer::types::{NewTransaction, TransactionRecord};

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

/// Maximum page size for transaction history
pub const MAX_PAGE_SIZE: i64 = 200;

/// Default page size for transaction history
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Account Ledger Store + Transaction Log Store
///
/// Reads outside a unit of work only ever observe committed state.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a unit of work. Lock waits inside it are bounded by the store's
    /// configured lock timeout.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, TransferError>;

    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, TransferError>;

    /// Lookup by public account number. Retired accounts are not returned.
    async fn find_by_number(&self, account_number: &str)
    -> Result<Option<Account>, TransferError>;

    async fn find_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<TransactionRecord>, TransferError>;

    /// Entries where the account is source or destination, newest first
    async fn list_account_transactions(
        &self,
        account_id: AccountId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TransactionRecord>, TransferError>;

    // === Account administration (no balance effect) ===

    /// Create an active account with zero balance.
    ///
    /// Fails with `InvalidAccountNumber` if the number is already taken.
    async fn create_account(&self, account: NewAccount) -> Result<Account, TransferError>;

    async fn set_account_active(
        &self,
        id: AccountId,
        active: bool,
    ) -> Result<Account, TransferError>;

    /// Soft-delete. Refused with `AccountHasBalance` while balance > 0; the
    /// record and its ledger entries are retained.
    async fn retire_account(&self, id: AccountId) -> Result<(), TransferError>;

    async fn list_accounts_for_owner(&self, owner_id: UserId)
    -> Result<Vec<Account>, TransferError>;

    async fn health_check(&self) -> Result<(), TransferError>;
}

/// A single atomic unit of work over accounts and ledger entries
#[async_trait]
pub trait UnitOfWork: Send {
    /// Acquire the exclusive account lock for the rest of this unit of work
    /// and return the current committed state.
    ///
    /// Fails with `AccountNotFound` if the account does not exist (or is
    /// retired) and with `LockTimeout` if the lock is not granted in time.
    async fn lock_for_update(&mut self, id: AccountId) -> Result<Account, TransferError>;

    /// Add `delta` to a locked account's balance if its version still equals
    /// `expected_version`. Returns the new version.
    ///
    /// Fails with `ConcurrentModification` on a stale version and with
    /// `InsufficientFunds` if the result would be negative.
    async fn apply_balance_delta(
        &mut self,
        id: AccountId,
        delta: Decimal,
        expected_version: i64,
    ) -> Result<i64, TransferError>;

    /// Completed entry for `(from_account_id, idempotency_key)`, as seen
    /// inside this unit of work.
    async fn find_by_idempotency_key(
        &mut self,
        from_account_id: AccountId,
        key: &str,
    ) -> Result<Option<TransactionRecord>, TransferError>;

    /// Write a ledger entry.
    ///
    /// Fails with `ReferenceCollision` if the reference already exists; the
    /// unit of work stays usable so the caller may retry with a new one.
    async fn insert_transaction(
        &mut self,
        entry: NewTransaction,
    ) -> Result<TransactionRecord, TransferError>;

    /// PENDING → COMPLETED with the source balance snapshot after mutation.
    ///
    /// Fails with `InvalidStateTransition` if the entry is not PENDING.
    async fn complete_transaction(
        &mut self,
        id: TransactionId,
        balance_after: Decimal,
    ) -> Result<TransactionRecord, TransferError>;

    async fn commit(self: Box<Self>) -> Result<(), TransferError>;

    async fn rollback(self: Box<Self>) -> Result<(), TransferError>;
}

/// Clamp a caller-supplied page size into `1..=MAX_PAGE_SIZE`
pub fn clamp_page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_page() {
        assert_eq!(clamp_page(None, None), (DEFAULT_PAGE_SIZE, 0));
        assert_eq!(clamp_page(Some(0), Some(-5)), (1, 0));
        assert_eq!(clamp_page(Some(10_000), Some(20)), (MAX_PAGE_SIZE, 20));
    }
}
