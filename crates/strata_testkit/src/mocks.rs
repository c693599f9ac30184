//! Scriptable platform transaction manager, transactions and XA resources.

use crate::calls::CallLog;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use strata_tx::{
    PlatformError, PlatformResult, PlatformTransaction, PlatformTransactionManager,
    TransactionStatus, XaResource,
};

/// Platform transaction answering a scripted status sequence.
///
/// Each `status()` call consumes the next scripted value; the last one is
/// repeated forever. Completion and `set_rollback_only` replace the script
/// with the resulting status.
#[derive(Debug)]
pub struct MockPlatformTransaction {
    log: CallLog,
    statuses: Mutex<VecDeque<TransactionStatus>>,
    commit_failure: Mutex<Option<PlatformError>>,
    rollback_failure: Mutex<Option<PlatformError>>,
}

impl MockPlatformTransaction {
    /// Creates an active transaction.
    #[must_use]
    pub fn new(log: CallLog) -> Self {
        Self::with_statuses(log, [TransactionStatus::Active])
    }

    /// Creates a transaction answering `statuses` in order.
    #[must_use]
    pub fn with_statuses(log: CallLog, statuses: impl IntoIterator<Item = TransactionStatus>) -> Self {
        let mut statuses: VecDeque<_> = statuses.into_iter().collect();
        if statuses.is_empty() {
            statuses.push_back(TransactionStatus::Active);
        }
        Self {
            log,
            statuses: Mutex::new(statuses),
            commit_failure: Mutex::new(None),
            rollback_failure: Mutex::new(None),
        }
    }

    /// Makes the next commit fail with `error`.
    pub fn fail_commit(&self, error: PlatformError) {
        *self.commit_failure.lock() = Some(error);
    }

    /// Makes the next rollback fail with `error`.
    pub fn fail_rollback(&self, error: PlatformError) {
        *self.rollback_failure.lock() = Some(error);
    }

    fn settle(&self, status: TransactionStatus) {
        let mut statuses = self.statuses.lock();
        statuses.clear();
        statuses.push_back(status);
    }
}

impl PlatformTransaction for MockPlatformTransaction {
    fn status(&self) -> PlatformResult<TransactionStatus> {
        let mut statuses = self.statuses.lock();
        let status = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().copied()
        };
        Ok(status.unwrap_or(TransactionStatus::Unknown))
    }

    fn commit(&self) -> PlatformResult<()> {
        self.log.record("tx.commit");
        if let Some(error) = self.commit_failure.lock().take() {
            return Err(error);
        }
        self.settle(TransactionStatus::Committed);
        Ok(())
    }

    fn rollback(&self) -> PlatformResult<()> {
        self.log.record("tx.rollback");
        if let Some(error) = self.rollback_failure.lock().take() {
            return Err(error);
        }
        self.settle(TransactionStatus::RolledBack);
        Ok(())
    }

    fn set_rollback_only(&self) -> PlatformResult<()> {
        self.log.record("tx.set_rollback_only");
        self.settle(TransactionStatus::MarkedRollback);
        Ok(())
    }

    fn enlist_resource(&self, _resource: Arc<dyn XaResource>) -> PlatformResult<bool> {
        self.log.record("tx.enlist_resource");
        Ok(true)
    }

    fn delist_resource(&self, _resource: Arc<dyn XaResource>, flag: i32) -> PlatformResult<bool> {
        self.log.record(format!("tx.delist_resource({flag:#x})"));
        Ok(true)
    }
}

/// Platform transaction manager handing out [`MockPlatformTransaction`]s.
///
/// Transactions queued with [`MockTransactionManager::enqueue`] are handed
/// out by `begin` first; after that a fresh active transaction is created.
#[derive(Default)]
pub struct MockTransactionManager {
    log: CallLog,
    current: Mutex<Option<Arc<dyn PlatformTransaction>>>,
    queued: Mutex<VecDeque<Arc<MockPlatformTransaction>>>,
    begun: Mutex<Vec<Arc<MockPlatformTransaction>>>,
    begin_failure: Mutex<Option<PlatformError>>,
    begin_without_transaction: Mutex<bool>,
}

impl MockTransactionManager {
    /// Creates a manager recording into `log`.
    #[must_use]
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    /// Returns the shared call log.
    #[must_use]
    pub fn log(&self) -> &CallLog {
        &self.log
    }

    /// Queues the transaction returned by the next `begin`.
    pub fn enqueue(&self, transaction: Arc<MockPlatformTransaction>) {
        self.queued.lock().push_back(transaction);
    }

    /// Associates `transaction` with the manager as if begun elsewhere.
    pub fn set_current(&self, transaction: Arc<MockPlatformTransaction>) {
        *self.current.lock() = Some(transaction);
    }

    /// Makes the next `begin` fail with `error`.
    pub fn fail_begin(&self, error: PlatformError) {
        *self.begin_failure.lock() = Some(error);
    }

    /// Makes `begin` succeed without associating a transaction.
    pub fn begin_without_transaction(&self) {
        *self.begin_without_transaction.lock() = true;
    }

    /// Returns the transaction handed out by the most recent `begin`.
    #[must_use]
    pub fn last_begun(&self) -> Option<Arc<MockPlatformTransaction>> {
        self.begun.lock().last().cloned()
    }

    /// Returns how many transactions were begun.
    #[must_use]
    pub fn begun_count(&self) -> usize {
        self.begun.lock().len()
    }
}

impl PlatformTransactionManager for MockTransactionManager {
    fn set_transaction_timeout(&self, seconds: u32) -> PlatformResult<()> {
        self.log.record(format!("tm.set_transaction_timeout({seconds})"));
        Ok(())
    }

    fn begin(&self) -> PlatformResult<()> {
        self.log.record("tm.begin");
        if let Some(error) = self.begin_failure.lock().take() {
            return Err(error);
        }
        if *self.begin_without_transaction.lock() {
            return Ok(());
        }
        let transaction = self
            .queued
            .lock()
            .pop_front()
            .unwrap_or_else(|| Arc::new(MockPlatformTransaction::new(self.log.clone())));
        self.begun.lock().push(Arc::clone(&transaction));
        *self.current.lock() = Some(transaction);
        Ok(())
    }

    fn transaction(&self) -> PlatformResult<Option<Arc<dyn PlatformTransaction>>> {
        Ok(self.current.lock().clone())
    }

    fn suspend(&self) -> PlatformResult<Option<Arc<dyn PlatformTransaction>>> {
        self.log.record("tm.suspend");
        Ok(self.current.lock().take())
    }

    fn resume(&self, transaction: Arc<dyn PlatformTransaction>) -> PlatformResult<()> {
        self.log.record("tm.resume");
        let mut current = self.current.lock();
        let associated = match current.as_ref() {
            Some(existing) => !existing.status()?.is_completed(),
            None => false,
        };
        if associated {
            return Err(PlatformError::illegal_state(
                "a transaction is already associated with the thread",
            ));
        }
        *current = Some(transaction);
        Ok(())
    }
}

impl std::fmt::Debug for MockTransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransactionManager")
            .field("log", &self.log)
            .field("has_current", &self.current.lock().is_some())
            .field("begun", &self.begun.lock().len())
            .finish_non_exhaustive()
    }
}

/// XA resource recording the timeouts it receives.
#[derive(Debug)]
pub struct MockXaResource {
    log: CallLog,
    timeouts: Mutex<Vec<u32>>,
}

impl MockXaResource {
    /// Creates a resource recording into `log`.
    #[must_use]
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            timeouts: Mutex::new(Vec::new()),
        }
    }

    /// Returns every timeout received, in seconds.
    #[must_use]
    pub fn timeouts(&self) -> Vec<u32> {
        self.timeouts.lock().clone()
    }
}

impl XaResource for MockXaResource {
    fn set_transaction_timeout(&self, seconds: u32) -> PlatformResult<bool> {
        self.log.record(format!("xa.set_transaction_timeout({seconds})"));
        self.timeouts.lock().push(seconds);
        Ok(true)
    }
}
