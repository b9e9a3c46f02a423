//! Ledger Service
//!
//! Caller-facing operations. The caller's identity comes from the transport
//! (see `gateway::auth`); this layer only authorizes by account ownership.
//! Accounts the caller does not own are reported as not found.

use std::sync::Arc;

use super::error::TransferError;
use super::executor::TransferExecutor;
use super::types::{TransactionRecord, TransferRequest};
use crate::account::{Account, AccountType, CurrencyCode, NewAccount};
use crate::core_types::{AccountId, TransactionId, UserId};
use crate::store::{LedgerStore, clamp_page};

/// Attempts at drawing an unused account number
const MAX_ACCOUNT_NUMBER_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct LedgerService {
    executor: TransferExecutor,
}

impl LedgerService {
    pub fn new(executor: TransferExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &TransferExecutor {
        &self.executor
    }

    fn store(&self) -> &Arc<dyn LedgerStore> {
        self.executor.store()
    }

    async fn owned_account(
        &self,
        caller: UserId,
        account_id: AccountId,
    ) -> Result<Option<Account>, TransferError> {
        Ok(self
            .store()
            .find_account(account_id)
            .await?
            .filter(|a| a.is_owned_by(caller)))
    }

    /// Transfer from one of the caller's accounts
    pub async fn transfer(
        &self,
        caller: UserId,
        req: TransferRequest,
    ) -> Result<TransactionRecord, TransferError> {
        if self
            .owned_account(caller, req.from_account_id)
            .await?
            .is_none()
        {
            tracing::warn!(
                user_id = caller,
                from_account = req.from_account_id,
                "Transfer from account not owned by caller"
            );
            return Err(TransferError::SourceNotFound);
        }
        self.executor.execute(req).await
    }

    /// Visible only to the owner of the entry's source account
    pub async fn get_transaction(
        &self,
        caller: UserId,
        transaction_id: TransactionId,
    ) -> Result<TransactionRecord, TransferError> {
        let record = self
            .store()
            .find_transaction(transaction_id)
            .await?
            .ok_or(TransferError::TransactionNotFound)?;
        match self.owned_account(caller, record.from_account_id).await? {
            Some(_) => Ok(record),
            None => Err(TransferError::TransactionNotFound),
        }
    }

    /// Entries where the account is source or destination, newest first
    pub async fn list_account_transactions(
        &self,
        caller: UserId,
        account_id: AccountId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<TransactionRecord>, TransferError> {
        self.owned_account(caller, account_id)
            .await?
            .ok_or(TransferError::AccountNotFound)?;
        let (limit, offset) = clamp_page(limit, offset);
        self.store()
            .list_account_transactions(account_id, limit, offset)
            .await
    }

    /// Open a zero-balance account with a fresh account number
    pub async fn open_account(
        &self,
        owner_id: UserId,
        account_type: AccountType,
        currency: CurrencyCode,
    ) -> Result<Account, TransferError> {
        let mut new = NewAccount::new(owner_id, account_type, currency);
        for attempt in 1..=MAX_ACCOUNT_NUMBER_ATTEMPTS {
            match self.store().create_account(new.clone()).await {
                Err(TransferError::InvalidAccountNumber(_)) if attempt < MAX_ACCOUNT_NUMBER_ATTEMPTS => {
                    tracing::warn!(attempt, "Account number taken, drawing another");
                    new.regenerate_number();
                }
                result => return result,
            }
        }
        Err(TransferError::Internal(
            "no free account number found".to_string(),
        ))
    }
}
