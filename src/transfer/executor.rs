//! Transfer Executor
//!
//! Runs one ledger movement as a single unit of work:
//!
//! ```text
//! validate → resolve → ┌ spawned ───────────────────────────────────────────┐
//!                      │ lock (ascending id) → idempotency → policy          │
//!                      │ → PENDING entry → balance deltas → COMPLETED        │
//!                      │ → commit | rollback                                 │
//!                      └─────────────────────────────────────────────────────┘
//! ```
//!
//! A failed debit check is reported as `SourceInactive` when the source is
//! inactive and as `InsufficientFunds` otherwise, so callers can tell the two
//! apart. Both are policy violations.
//!
//! Conflicts (stale version, lock timeout) re-run the whole unit of work on
//! fresh state up to `max_conflict_retries` times. The locked part runs on its
//! own task: once it starts, dropping the caller's future cannot interrupt it.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use super::error::{ErrorKind, TransferError};
use super::reference::ReferenceGenerator;
use super::state::TransactionStatus;
use super::types::{
    LedgerEntryRequest, NewTransaction, TransactionRecord, TransactionType, TransferRequest,
    validate_amount, validate_idempotency_key,
};
use crate::account::policy::{can_credit, can_debit, currencies_match};
use crate::config::TransferConfig;
use crate::core_types::AccountId;
use crate::store::{LedgerStore, UnitOfWork};

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub max_conflict_retries: u32,
    pub max_reference_attempts: u32,
    pub audit_rejections: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::from(&TransferConfig::default())
    }
}

impl From<&TransferConfig> for ExecutorConfig {
    fn from(c: &TransferConfig) -> Self {
        Self {
            max_conflict_retries: c.max_conflict_retries,
            max_reference_attempts: c.max_reference_attempts.max(1),
            audit_rejections: c.audit_rejections,
        }
    }
}

/// A resolved movement, ready for the locked phase
#[derive(Debug, Clone)]
struct Movement {
    kind: TransactionType,
    from: AccountId,
    to: Option<AccountId>,
    amount: Decimal,
    description: String,
    idempotency_key: Option<String>,
}

impl Movement {
    fn debit_account(&self) -> Option<AccountId> {
        match self.kind {
            TransactionType::Transfer | TransactionType::Debit => Some(self.from),
            TransactionType::Credit => None,
        }
    }

    fn credit_account(&self) -> Option<AccountId> {
        match self.kind {
            TransactionType::Transfer => self.to,
            TransactionType::Credit => Some(self.from),
            TransactionType::Debit => None,
        }
    }

    fn not_found(&self, id: AccountId) -> TransferError {
        match self.kind {
            TransactionType::Transfer if id == self.from => TransferError::SourceNotFound,
            TransactionType::Transfer => TransferError::DestinationNotFound,
            _ => TransferError::AccountNotFound,
        }
    }

    /// Source balance after this movement is applied
    fn source_balance_after(&self, before: Decimal) -> Decimal {
        match self.kind {
            TransactionType::Credit => before + self.amount,
            _ => before - self.amount,
        }
    }

    fn matches(&self, existing: &TransactionRecord) -> bool {
        existing.is_completed()
            && existing.transaction_type == self.kind
            && existing.to_account_id == self.to
            && existing.amount == self.amount
    }
}

/// Every account touched by a movement, in lock order
pub fn lock_order(from: AccountId, to: Option<AccountId>) -> Vec<AccountId> {
    let mut ids: Vec<AccountId> = std::iter::once(from).chain(to).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

enum Step {
    Commit(TransactionRecord),
    Replay(TransactionRecord),
}

/// Transfer Executor
///
/// Cheap to clone; the store and reference generator are shared.
#[derive(Clone)]
pub struct TransferExecutor {
    store: Arc<dyn LedgerStore>,
    references: Arc<dyn ReferenceGenerator>,
    config: ExecutorConfig,
}

impl TransferExecutor {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        references: Arc<dyn ReferenceGenerator>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            store,
            references,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Move `amount` from `from_account_id` to the account numbered
    /// `to_account_number`.
    pub async fn execute(&self, req: TransferRequest) -> Result<TransactionRecord, TransferError> {
        validate_amount(req.amount)?;
        if let Some(key) = &req.idempotency_key {
            validate_idempotency_key(key)?;
        }

        let source = self
            .store
            .find_account(req.from_account_id)
            .await?
            .ok_or(TransferError::SourceNotFound)?;
        let destination = self
            .store
            .find_by_number(&req.to_account_number)
            .await?
            .ok_or(TransferError::DestinationNotFound)?;
        if source.id == destination.id {
            return Err(TransferError::SameAccount);
        }

        self.spawn_locked(Movement {
            kind: TransactionType::Transfer,
            from: source.id,
            to: Some(destination.id),
            amount: req.amount,
            description: req.description,
            idempotency_key: req.idempotency_key,
        })
        .await
    }

    /// Credit a single account (no destination)
    pub async fn deposit(&self, req: LedgerEntryRequest) -> Result<TransactionRecord, TransferError> {
        self.single_entry(TransactionType::Credit, req).await
    }

    /// Debit a single account (no destination)
    pub async fn withdraw(
        &self,
        req: LedgerEntryRequest,
    ) -> Result<TransactionRecord, TransferError> {
        self.single_entry(TransactionType::Debit, req).await
    }

    async fn single_entry(
        &self,
        kind: TransactionType,
        req: LedgerEntryRequest,
    ) -> Result<TransactionRecord, TransferError> {
        validate_amount(req.amount)?;
        if let Some(key) = &req.idempotency_key {
            validate_idempotency_key(key)?;
        }
        let account = self
            .store
            .find_account(req.account_id)
            .await?
            .ok_or(TransferError::AccountNotFound)?;

        self.spawn_locked(Movement {
            kind,
            from: account.id,
            to: None,
            amount: req.amount,
            description: req.description,
            idempotency_key: req.idempotency_key,
        })
        .await
    }

    async fn spawn_locked(&self, movement: Movement) -> Result<TransactionRecord, TransferError> {
        let executor = self.clone();
        tokio::spawn(async move { executor.run(movement).await })
            .await
            .map_err(|e| TransferError::Internal(format!("executor task failed: {}", e)))?
    }

    async fn run(&self, movement: Movement) -> Result<TransactionRecord, TransferError> {
        let mut attempt: u32 = 0;
        loop {
            match self.run_once(&movement).await {
                Ok(record) => return Ok(record),
                Err(e) if e.is_retriable() && attempt < self.config.max_conflict_retries => {
                    attempt += 1;
                    warn!(
                        from_account = movement.from,
                        to_account = ?movement.to,
                        attempt,
                        error = %e,
                        "Ledger conflict, retrying on fresh state"
                    );
                }
                Err(e) => {
                    self.audit_rejection(&movement, &e).await;
                    return Err(e);
                }
            }
        }
    }

    async fn run_once(&self, movement: &Movement) -> Result<TransactionRecord, TransferError> {
        let mut uow = self.store.begin().await?;

        match self.apply(uow.as_mut(), movement).await {
            Ok(Step::Commit(record)) => {
                if let Err(e) = uow.commit().await {
                    error!(
                        reference = %record.reference,
                        from_account = movement.from,
                        error = %e,
                        "Ledger commit failed, unit of work rolled back"
                    );
                    return Err(e);
                }
                info!(
                    transaction_id = record.id,
                    reference = %record.reference,
                    transaction_type = %record.transaction_type,
                    from_account = movement.from,
                    to_account = ?movement.to,
                    amount = %movement.amount,
                    "Ledger entry committed"
                );
                Ok(record)
            }
            Ok(Step::Replay(record)) => {
                uow.rollback().await?;
                info!(
                    transaction_id = record.id,
                    reference = %record.reference,
                    "Idempotent replay, returning existing entry"
                );
                Ok(record)
            }
            Err(e) => {
                if let Err(rb) = uow.rollback().await {
                    warn!(error = %rb, "Rollback failed; storage discards the unit of work");
                }
                Err(e)
            }
        }
    }

    /// Steps inside the unit of work. Nothing here is visible to other
    /// readers until the caller commits.
    async fn apply(
        &self,
        uow: &mut dyn UnitOfWork,
        movement: &Movement,
    ) -> Result<Step, TransferError> {
        let mut source = None;
        let mut destination = None;
        for id in lock_order(movement.from, movement.to) {
            let account = uow.lock_for_update(id).await.map_err(|e| match e {
                TransferError::AccountNotFound => movement.not_found(id),
                other => other,
            })?;
            debug!(account_id = id, version = account.version, "Locked");
            if id == movement.from {
                source = Some(account);
            } else {
                destination = Some(account);
            }
        }
        let source = source.ok_or_else(|| movement.not_found(movement.from))?;

        // Checked under the source lock: a concurrent first use of the same
        // key has either committed already or not started
        if let Some(key) = &movement.idempotency_key
            && let Some(existing) = uow.find_by_idempotency_key(movement.from, key).await?
        {
            return if movement.matches(&existing) {
                Ok(Step::Replay(existing))
            } else {
                Err(TransferError::IdempotencyKeyReused)
            };
        }

        if movement.debit_account().is_some() {
            if !source.is_active {
                return Err(TransferError::SourceInactive);
            }
            if !can_debit(&source, movement.amount) {
                return Err(TransferError::InsufficientFunds);
            }
        }
        match &destination {
            Some(dest) => {
                if !can_credit(dest) {
                    return Err(TransferError::DestinationInactive);
                }
                if !currencies_match(&source, dest) {
                    return Err(TransferError::CurrencyMismatch);
                }
            }
            None if movement.credit_account().is_some() && !can_credit(&source) => {
                return Err(TransferError::SourceInactive);
            }
            None => {}
        }

        let balance_after = movement.source_balance_after(source.balance);
        let pending = self
            .insert_with_fresh_reference(
                uow,
                NewTransaction {
                    from_account_id: movement.from,
                    to_account_id: movement.to,
                    amount: movement.amount,
                    transaction_type: movement.kind,
                    status: TransactionStatus::Pending,
                    description: movement.description.clone(),
                    reference: self.references.next_reference(),
                    idempotency_key: movement.idempotency_key.clone(),
                    balance_before: source.balance,
                    balance_after: source.balance,
                },
            )
            .await?;
        debug!(transaction_id = pending.id, reference = %pending.reference, "Pending entry written");

        if let Some(id) = movement.debit_account() {
            uow.apply_balance_delta(id, -movement.amount, source.version)
                .await?;
        }
        if let Some(id) = movement.credit_account() {
            let version = match &destination {
                Some(dest) if dest.id == id => dest.version,
                _ => source.version,
            };
            uow.apply_balance_delta(id, movement.amount, version).await?;
        }

        let completed = uow.complete_transaction(pending.id, balance_after).await?;
        Ok(Step::Commit(completed))
    }

    /// Insert `entry`, drawing a new reference on every collision
    async fn insert_with_fresh_reference(
        &self,
        uow: &mut dyn UnitOfWork,
        mut entry: NewTransaction,
    ) -> Result<TransactionRecord, TransferError> {
        let max = self.config.max_reference_attempts;
        for attempt in 1..=max {
            match uow.insert_transaction(entry.clone()).await {
                Ok(record) => return Ok(record),
                Err(TransferError::ReferenceCollision) => {
                    warn!(reference = %entry.reference, attempt, "Reference collision");
                    entry.reference = self.references.next_reference();
                }
                Err(e) => return Err(e),
            }
        }
        error!(attempts = max, "Reference collisions exhausted all attempts");
        Err(TransferError::Internal(format!(
            "reference collision after {} attempts",
            max
        )))
    }

    /// Write a terminal record for a rejected movement.
    ///
    /// Policy rejections become CANCELLED, internal failures FAILED. The
    /// record carries no idempotency key and mutates no balance.
    async fn audit_rejection(&self, movement: &Movement, cause: &TransferError) {
        let status = match cause.kind() {
            ErrorKind::PolicyViolation => TransactionStatus::Cancelled,
            ErrorKind::Internal => TransactionStatus::Failed,
            _ => {
                debug!(error = %cause, "Rejected without audit record");
                return;
            }
        };
        if status == TransactionStatus::Cancelled {
            warn!(
                from_account = movement.from,
                to_account = ?movement.to,
                amount = %movement.amount,
                error = %cause,
                "Ledger movement rejected"
            );
        }
        if !self.config.audit_rejections {
            return;
        }

        let result = async {
            let snapshot = self
                .store
                .find_account(movement.from)
                .await?
                .map(|a| a.balance)
                .unwrap_or_default();
            let mut uow = self.store.begin().await?;
            let record = self
                .insert_with_fresh_reference(
                    uow.as_mut(),
                    NewTransaction {
                        from_account_id: movement.from,
                        to_account_id: movement.to,
                        amount: movement.amount,
                        transaction_type: movement.kind,
                        status,
                        description: movement.description.clone(),
                        reference: self.references.next_reference(),
                        idempotency_key: None,
                        balance_before: snapshot,
                        balance_after: snapshot,
                    },
                )
                .await?;
            uow.commit().await?;
            Ok::<_, TransferError>(record)
        }
        .await;

        match result {
            Ok(record) => debug!(
                transaction_id = record.id,
                reference = %record.reference,
                status = %record.status,
                "Audit record written"
            ),
            Err(e) => error!(error = %e, cause = %cause, "Failed to write audit record"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_order_is_ascending() {
        assert_eq!(lock_order(9, Some(3)), vec![3, 9]);
        assert_eq!(lock_order(3, Some(9)), vec![3, 9]);
        assert_eq!(lock_order(5, None), vec![5]);
        assert_eq!(lock_order(5, Some(5)), vec![5]);
    }

    #[test]
    fn test_movement_sides() {
        let transfer = Movement {
            kind: TransactionType::Transfer,
            from: 1,
            to: Some(2),
            amount: Decimal::from(40),
            description: String::new(),
            idempotency_key: None,
        };
        assert_eq!(transfer.debit_account(), Some(1));
        assert_eq!(transfer.credit_account(), Some(2));
        assert_eq!(transfer.source_balance_after(Decimal::from(100)), Decimal::from(60));
        assert_eq!(transfer.not_found(1), TransferError::SourceNotFound);
        assert_eq!(transfer.not_found(2), TransferError::DestinationNotFound);

        let deposit = Movement {
            kind: TransactionType::Credit,
            to: None,
            ..transfer.clone()
        };
        assert_eq!(deposit.debit_account(), None);
        assert_eq!(deposit.credit_account(), Some(1));
        assert_eq!(deposit.source_balance_after(Decimal::from(100)), Decimal::from(140));
        assert_eq!(deposit.not_found(1), TransferError::AccountNotFound);
    }

    #[test]
    fn test_executor_config_from_transfer_config() {
        let c = ExecutorConfig::from(&TransferConfig {
            max_reference_attempts: 0,
            ..TransferConfig::default()
        });
        assert_eq!(c.max_reference_attempts, 1);
        assert_eq!(c.max_conflict_retries, 3);
        assert!(c.audit_rejections);
    }
}
