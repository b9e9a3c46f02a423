//! In-Memory Ledger Store
//!
//! Process-local implementation of [`LedgerStore`] with the same guarantees as
//! the PostgreSQL store:
//! - one async mutex per account, held by a unit of work until commit/rollback
//! - bounded lock wait (`LockTimeout`)
//! - staged writes, published to readers in a single critical section on commit
//! - unique references (in-flight references are reserved, like a unique index
//!   blocking on an uncommitted row)

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};

use super::{LedgerStore, UnitOfWork};
use crate::account::{Account, NewAccount};
use crate::core_types::{AccountId, TransactionId, UserId};
use crate::transfer::error::TransferError;
use crate::transfer::state::TransactionStatus;
use crate::transfer::types::{NewTransaction, TransactionRecord};

#[derive(Debug, Clone)]
struct StoredAccount {
    account: Account,
    retired: bool,
}

#[derive(Debug, Default)]
struct LedgerState {
    accounts: FxHashMap<AccountId, StoredAccount>,
    numbers: FxHashMap<String, AccountId>,
    transactions: BTreeMap<TransactionId, TransactionRecord>,
    references: FxHashMap<String, TransactionId>,
    /// References written by a unit of work that has not finished yet
    reserved_references: FxHashSet<String>,
    idempotency: FxHashMap<(AccountId, String), TransactionId>,
    next_account_id: AccountId,
    next_transaction_id: TransactionId,
}

impl LedgerState {
    fn live_account(&self, id: AccountId) -> Option<&Account> {
        self.accounts
            .get(&id)
            .filter(|s| !s.retired)
            .map(|s| &s.account)
    }
}

struct Inner {
    state: RwLock<LedgerState>,
    locks: Mutex<FxHashMap<AccountId, Arc<AsyncMutex<()>>>>,
    lock_timeout: Duration,
    #[cfg(test)]
    commit_failures: std::sync::atomic::AtomicUsize,
}

impl Inner {
    fn read(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn account_lock(&self, id: AccountId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(id).or_default().clone()
    }

    async fn acquire(&self, id: AccountId) -> Result<OwnedMutexGuard<()>, TransferError> {
        let lock = self.account_lock(id);
        match tokio::time::timeout(self.lock_timeout, lock.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                warn!(account_id = id, timeout_ms = self.lock_timeout.as_millis() as u64, "Account lock wait timed out");
                Err(TransferError::LockTimeout)
            }
        }
    }
}

/// In-memory ledger store
#[derive(Clone)]
pub struct MemoryLedgerStore {
    inner: Arc<Inner>,
}

impl MemoryLedgerStore {
    pub fn new(lock_timeout: Duration) -> Self {
        let state = LedgerState {
            next_account_id: 1,
            next_transaction_id: 1,
            ..Default::default()
        };
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(state),
                locks: Mutex::new(FxHashMap::default()),
                lock_timeout,
                #[cfg(test)]
                commit_failures: std::sync::atomic::AtomicUsize::new(0),
            }),
        }
    }

    /// Make the next `n` commits fail after all writes were staged
    #[cfg(test)]
    pub fn fail_next_commits(&self, n: usize) {
        self.inner
            .commit_failures
            .store(n, std::sync::atomic::Ordering::SeqCst);
    }

    /// Hold an account lock from outside any unit of work
    #[cfg(test)]
    pub async fn hold_lock(&self, id: AccountId) -> OwnedMutexGuard<()> {
        self.inner.account_lock(id).lock_owned().await
    }

    /// Bump an account's version without taking its lock, simulating a
    /// writer that bypassed the locking protocol.
    #[cfg(test)]
    pub fn bump_version_unlocked(&self, id: AccountId) {
        if let Some(s) = self.inner.write().accounts.get_mut(&id) {
            s.account.version += 1;
        }
    }

    /// Total of all committed balances in the given currency
    pub fn total_balance(&self, currency: &str) -> Decimal {
        self.inner
            .read()
            .accounts
            .values()
            .filter(|s| s.account.currency == currency)
            .map(|s| s.account.balance)
            .sum()
    }

    pub fn transaction_count(&self) -> usize {
        self.inner.read().transactions.len()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, TransferError> {
        Ok(Box::new(MemoryUnitOfWork {
            inner: self.inner.clone(),
            guards: FxHashMap::default(),
            locked_versions: FxHashMap::default(),
            staged_accounts: FxHashMap::default(),
            staged_transactions: Vec::new(),
            reserved: Vec::new(),
            finished: false,
        }))
    }

    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, TransferError> {
        Ok(self.inner.read().live_account(id).cloned())
    }

    async fn find_by_number(
        &self,
        account_number: &str,
    ) -> Result<Option<Account>, TransferError> {
        let state = self.inner.read();
        Ok(state
            .numbers
            .get(account_number)
            .and_then(|id| state.live_account(*id))
            .cloned())
    }

    async fn find_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<TransactionRecord>, TransferError> {
        Ok(self.inner.read().transactions.get(&id).cloned())
    }

    async fn list_account_transactions(
        &self,
        account_id: AccountId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TransactionRecord>, TransferError> {
        let state = self.inner.read();
        Ok(state
            .transactions
            .values()
            .rev()
            .filter(|t| t.involves(account_id))
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn create_account(&self, new: NewAccount) -> Result<Account, TransferError> {
        let mut state = self.inner.write();
        if state.numbers.contains_key(new.account_number.as_str()) {
            return Err(TransferError::InvalidAccountNumber(format!(
                "{} already in use",
                new.account_number
            )));
        }

        let id = state.next_account_id;
        state.next_account_id += 1;

        let now = Utc::now();
        let account = Account {
            id,
            owner_id: new.owner_id,
            account_number: new.account_number.as_str().to_string(),
            account_type: new.account_type,
            currency: new.currency.as_str().to_string(),
            balance: Decimal::ZERO,
            is_active: true,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        state.numbers.insert(account.account_number.clone(), id);
        state.accounts.insert(
            id,
            StoredAccount {
                account: account.clone(),
                retired: false,
            },
        );
        debug!(account_id = id, account_number = %account.account_number, "Account created");
        Ok(account)
    }

    async fn set_account_active(
        &self,
        id: AccountId,
        active: bool,
    ) -> Result<Account, TransferError> {
        let _guard = self.inner.acquire(id).await?;
        let mut state = self.inner.write();
        let stored = state
            .accounts
            .get_mut(&id)
            .filter(|s| !s.retired)
            .ok_or(TransferError::AccountNotFound)?;
        stored.account.is_active = active;
        stored.account.version += 1;
        stored.account.updated_at = Utc::now();
        Ok(stored.account.clone())
    }

    async fn retire_account(&self, id: AccountId) -> Result<(), TransferError> {
        let _guard = self.inner.acquire(id).await?;
        let mut state = self.inner.write();
        let stored = state
            .accounts
            .get_mut(&id)
            .filter(|s| !s.retired)
            .ok_or(TransferError::AccountNotFound)?;
        if stored.account.balance > Decimal::ZERO {
            return Err(TransferError::AccountHasBalance);
        }
        stored.retired = true;
        stored.account.is_active = false;
        stored.account.version += 1;
        stored.account.updated_at = Utc::now();
        Ok(())
    }

    async fn list_accounts_for_owner(
        &self,
        owner_id: UserId,
    ) -> Result<Vec<Account>, TransferError> {
        let state = self.inner.read();
        let mut accounts: Vec<Account> = state
            .accounts
            .values()
            .filter(|s| !s.retired && s.account.owner_id == owner_id)
            .map(|s| s.account.clone())
            .collect();
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    async fn health_check(&self) -> Result<(), TransferError> {
        Ok(())
    }
}

struct MemoryUnitOfWork {
    inner: Arc<Inner>,
    guards: FxHashMap<AccountId, OwnedMutexGuard<()>>,
    /// Committed version observed when the lock was granted
    locked_versions: FxHashMap<AccountId, i64>,
    staged_accounts: FxHashMap<AccountId, Account>,
    staged_transactions: Vec<TransactionRecord>,
    reserved: Vec<String>,
    finished: bool,
}

impl MemoryUnitOfWork {
    fn release_reservations(&mut self) {
        if self.reserved.is_empty() {
            return;
        }
        let mut state = self.inner.write();
        for r in self.reserved.drain(..) {
            state.reserved_references.remove(&r);
        }
    }

    #[cfg(test)]
    fn take_injected_failure(&self) -> bool {
        use std::sync::atomic::Ordering;
        self.inner
            .commit_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    #[cfg(not(test))]
    fn take_injected_failure(&self) -> bool {
        false
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn lock_for_update(&mut self, id: AccountId) -> Result<Account, TransferError> {
        if let Some(account) = self.staged_accounts.get(&id) {
            return Ok(account.clone());
        }
        if self.inner.read().live_account(id).is_none() {
            return Err(TransferError::AccountNotFound);
        }

        let guard = self.inner.acquire(id).await?;

        // Re-read under the lock: the previous holder may have changed it
        let account = self
            .inner
            .read()
            .live_account(id)
            .cloned()
            .ok_or(TransferError::AccountNotFound)?;

        debug!(account_id = id, version = account.version, "Account locked");
        self.guards.insert(id, guard);
        self.locked_versions.insert(id, account.version);
        self.staged_accounts.insert(id, account.clone());
        Ok(account)
    }

    async fn apply_balance_delta(
        &mut self,
        id: AccountId,
        delta: Decimal,
        expected_version: i64,
    ) -> Result<i64, TransferError> {
        let account = self
            .staged_accounts
            .get_mut(&id)
            .ok_or_else(|| TransferError::Internal(format!("account {} not locked", id)))?;

        if account.version != expected_version {
            return Err(TransferError::ConcurrentModification);
        }
        let new_balance = account.balance + delta;
        if new_balance < Decimal::ZERO {
            return Err(TransferError::InsufficientFunds);
        }

        account.balance = new_balance;
        account.version += 1;
        account.updated_at = Utc::now();
        Ok(account.version)
    }

    async fn find_by_idempotency_key(
        &mut self,
        from_account_id: AccountId,
        key: &str,
    ) -> Result<Option<TransactionRecord>, TransferError> {
        if let Some(staged) = self.staged_transactions.iter().find(|t| {
            t.from_account_id == from_account_id && t.idempotency_key.as_deref() == Some(key)
        }) {
            return Ok(Some(staged.clone()));
        }
        let state = self.inner.read();
        Ok(state
            .idempotency
            .get(&(from_account_id, key.to_string()))
            .and_then(|id| state.transactions.get(id))
            .cloned())
    }

    async fn insert_transaction(
        &mut self,
        entry: NewTransaction,
    ) -> Result<TransactionRecord, TransferError> {
        let reference = entry.reference.as_str().to_string();
        let id = {
            let mut state = self.inner.write();
            if state.references.contains_key(&reference)
                || state.reserved_references.contains(&reference)
            {
                return Err(TransferError::ReferenceCollision);
            }
            if let Some(key) = &entry.idempotency_key
                && state
                    .idempotency
                    .contains_key(&(entry.from_account_id, key.clone()))
            {
                return Err(TransferError::IdempotencyKeyReused);
            }
            state.reserved_references.insert(reference.clone());
            let id = state.next_transaction_id;
            state.next_transaction_id += 1;
            id
        };
        self.reserved.push(reference);

        let record = TransactionRecord::from_new(id, entry, Utc::now());
        self.staged_transactions.push(record.clone());
        Ok(record)
    }

    async fn complete_transaction(
        &mut self,
        id: TransactionId,
        balance_after: Decimal,
    ) -> Result<TransactionRecord, TransferError> {
        let Some(record) = self.staged_transactions.iter_mut().find(|t| t.id == id) else {
            // Committed entries are terminal
            return match self.inner.read().transactions.get(&id) {
                Some(t) => Err(TransferError::InvalidStateTransition(format!(
                    "{} -> {}",
                    t.status,
                    TransactionStatus::Completed
                ))),
                None => Err(TransferError::TransactionNotFound),
            };
        };

        if !record.status.can_transition_to(TransactionStatus::Completed) {
            return Err(TransferError::InvalidStateTransition(format!(
                "{} -> {}",
                record.status,
                TransactionStatus::Completed
            )));
        }
        record.status = TransactionStatus::Completed;
        record.balance_after = balance_after;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), TransferError> {
        if self.take_injected_failure() {
            // Drop releases locks and reservations; nothing was published
            return Err(TransferError::DatabaseError(
                "injected commit failure".to_string(),
            ));
        }

        if let Some(pending) = self.staged_transactions.iter().find(|t| !t.status.is_terminal()) {
            return Err(TransferError::InvalidStateTransition(format!(
                "refusing to commit {} entry {}",
                pending.status, pending.reference
            )));
        }

        {
            let mut state = self.inner.write();

            // Optimistic check against anything that bypassed the locks
            for (id, locked_version) in &self.locked_versions {
                match state.live_account(*id) {
                    Some(a) if a.version == *locked_version => {}
                    _ => return Err(TransferError::ConcurrentModification),
                }
            }

            for (id, staged) in self.staged_accounts.drain() {
                if let Some(stored) = state.accounts.get_mut(&id) {
                    stored.account.balance = staged.balance;
                    stored.account.version = staged.version;
                    stored.account.updated_at = staged.updated_at;
                }
            }

            for record in self.staged_transactions.drain(..) {
                state.reserved_references.remove(record.reference.as_str());
                state
                    .references
                    .insert(record.reference.as_str().to_string(), record.id);
                if let Some(key) = &record.idempotency_key {
                    state
                        .idempotency
                        .insert((record.from_account_id, key.clone()), record.id);
                }
                state.transactions.insert(record.id, record);
            }
        }

        self.reserved.clear();
        self.finished = true;
        self.guards.clear();
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), TransferError> {
        self.release_reservations();
        self.finished = true;
        Ok(())
    }
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        if !self.finished {
            self.release_reservations();
        }
    }
}
