//! Transfer Execution Engine
//!
//! Moves money between accounts and records every movement in the ledger.
//!
//! # State Machine
//!
//! ```text
//! (none) → PENDING → COMPLETED
//!    │
//!    ├──→ CANCELLED   policy rejection, nothing mutated
//!    └──→ FAILED      internal failure, unit of work rolled back
//! ```
//!
//! Balance mutations and the PENDING → COMPLETED transition commit together or
//! not at all; no observer ever sees a PENDING entry or a half-applied
//! transfer.
//!
//! # Safety Invariants
//!
//! 1. **Lock Order**: accounts are locked in ascending id order, never request order
//! 2. **Version Check**: every balance write carries the version read under lock
//! 3. **Idempotency**: a completed `(source account, key)` pair is returned, never re-applied
//! 4. **No Partial Effects**: a held lock always ends in commit or rollback

pub mod api;
pub mod error;
pub mod executor;
pub mod reference;
pub mod service;
pub mod state;
pub mod types;


pub use error::{ErrorKind, TransferError};
pub use executor::{ExecutorConfig, TransferExecutor};
pub use reference::{ReferenceGenerator, UlidReferenceGenerator};
pub use service::LedgerService;
pub use state::TransactionStatus;
pub use types::{
    LedgerEntryRequest, TransactionRecord, TransactionReference, TransactionType, TransferRequest,
};
