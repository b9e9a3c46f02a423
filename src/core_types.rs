//! Core types used throughout the ledger
//!
//! Identity aliases shared by the account store, the transaction log and the
//! transfer executor. They map 1:1 onto PostgreSQL `BIGINT` / `BIGSERIAL`.

/// Account ID - storage identity of an account.
///
/// # Constraints:
/// - **Immutable**: Once assigned, NEVER changes
/// - **Totally ordered**: Used as the lock-acquisition order for transfers
///   (ascending), which rules out circular waits between two transfers
///   touching the same pair of accounts in opposite directions.
pub type AccountId = i64;

/// User ID - owner reference of an account, as issued by the auth service.
pub type UserId = i64;

/// Transaction ID - storage identity of a ledger entry.
pub type TransactionId = i64;
