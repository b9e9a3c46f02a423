//! bank_ledger - Transfer Execution Engine
//!
//! Moves money between accounts so that balances and the transaction ledger
//! never diverge, under concurrent requests and partial failures.
//!
//! # Modules
//!
//! - [`core_types`] - Identity aliases (AccountId, UserId, TransactionId)
//! - [`account`] - Account model, account policy, validated codes and numbers
//! - [`transfer`] - Executor, status lifecycle, references, errors, service, API
//! - [`store`] - Ledger store seam with in-memory and PostgreSQL backends
//! - [`gateway`] - axum HTTP surface with bearer authentication
//! - [`config`] / [`logging`] / [`db`] - process plumbing

// Core types - must be first!
pub mod core_types;

pub mod account;
pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;
pub mod store;
pub mod transfer;

// Convenient re-exports at crate root
pub use account::{Account, AccountType, CurrencyCode, NewAccount};
pub use core_types::{AccountId, TransactionId, UserId};
pub use store::{LedgerStore, MemoryLedgerStore, PgLedgerStore, UnitOfWork};
pub use transfer::{
    ErrorKind, ExecutorConfig, LedgerEntryRequest, LedgerService, TransactionRecord,
    TransactionStatus, TransactionType, TransferError, TransferExecutor, TransferRequest,
};
