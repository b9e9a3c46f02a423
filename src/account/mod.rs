//! Account model and policy
//!
//! Accounts are owned by the ledger store. Balances change only through a
//! ledger unit of work driven by [`crate::transfer::TransferExecutor`];
//! everything here is data and pure checks.

pub mod models;
pub mod policy;
pub mod validation;

pub use models::{Account, AccountType, NewAccount};
pub use validation::{AccountNumber, CurrencyCode, ValidationError};
