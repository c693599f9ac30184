//! Recording lifecycle objects, transactions and resources.

use parking_lot::Mutex;
use std::any::Any;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strata_lifecycle::PhaseError;
use strata_tx::{
    new_transaction_id, Resource, ResourceBindings, Transaction, TransactionCoordinator,
    TransactionError, TransactionFactory, TransactionStatus, TxResult,
};

/// How a [`RecordingObject`] fails a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseFailure {
    /// Report a lost connection.
    ConnectionLost,
    /// Report an ordinary failure.
    Failed,
}

/// Lifecycle-managed object recording the phases applied to it.
#[derive(Debug, Default)]
pub struct RecordingObject {
    name: String,
    phases: Mutex<Vec<String>>,
    failure: Mutex<Option<(String, PhaseFailure)>>,
}

impl RecordingObject {
    /// Creates an object called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the object name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Makes every later attempt of `phase` fail.
    pub fn fail_on(&self, phase: impl Into<String>, failure: PhaseFailure) {
        *self.failure.lock() = Some((phase.into(), failure));
    }

    /// Lets every phase succeed again.
    pub fn heal(&self) {
        *self.failure.lock() = None;
    }

    /// Returns the phases applied so far.
    #[must_use]
    pub fn phases(&self) -> Vec<String> {
        self.phases.lock().clone()
    }

    /// Phase callback: records `phase` on `object` or fails as configured.
    pub fn record(phase: &str, object: &Self) -> Result<(), PhaseError> {
        if let Some((failing, failure)) = &*object.failure.lock() {
            if failing == phase {
                return Err(match failure {
                    PhaseFailure::ConnectionLost => {
                        PhaseError::connection_lost(format!("{} lost its connection", object.name))
                    }
                    PhaseFailure::Failed => {
                        PhaseError::failed(format!("{} failed to {phase}", object.name))
                    }
                });
            }
        }
        object.phases.lock().push(phase.to_string());
        Ok(())
    }
}

/// Transaction recording the completion calls made on it.
///
/// Commit and rollback unbind it from the coordinator like a real
/// transaction. Suspend and resume are only supported when it was created
/// with [`RecordingTransaction::xa`].
#[derive(Debug)]
pub struct RecordingTransaction {
    id: String,
    xa: bool,
    timeout: Mutex<Option<Duration>>,
    rollback_only: Mutex<bool>,
    status: Mutex<TransactionStatus>,
    calls: Mutex<Vec<&'static str>>,
    resources: Mutex<ResourceBindings>,
}

impl RecordingTransaction {
    /// Creates a local transaction.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(false))
    }

    /// Creates an XA transaction.
    #[must_use]
    pub fn xa() -> Arc<Self> {
        Arc::new(Self::build(true))
    }

    fn build(xa: bool) -> Self {
        Self {
            id: new_transaction_id(),
            xa,
            timeout: Mutex::new(None),
            rollback_only: Mutex::new(false),
            status: Mutex::new(TransactionStatus::Active),
            calls: Mutex::new(Vec::new()),
            resources: Mutex::new(ResourceBindings::new()),
        }
    }

    /// Returns every call in order.
    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    /// Returns how many times `call` was made.
    #[must_use]
    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| **c == call).count()
    }

    /// Binds this transaction to the calling thread.
    pub fn bind(self: &Arc<Self>) -> TxResult<()> {
        TransactionCoordinator::bind_transaction(Arc::clone(self) as Arc<dyn Transaction>)
    }

    fn finish(&self, call: &'static str, status: TransactionStatus) {
        self.calls.lock().push(call);
        *self.status.lock() = status;
        TransactionCoordinator::unbind_transaction(self);
    }
}

impl Transaction for RecordingTransaction {
    fn id(&self) -> &str {
        &self.id
    }

    fn begin(&self) -> TxResult<()> {
        self.calls.lock().push("begin");
        Ok(())
    }

    fn commit(&self) -> TxResult<()> {
        if *self.rollback_only.lock() {
            self.finish("rollback", TransactionStatus::RolledBack);
            return Err(TransactionError::MarkedRollbackOnly {
                id: self.id.clone(),
            });
        }
        self.finish("commit", TransactionStatus::Committed);
        Ok(())
    }

    fn rollback(&self) -> TxResult<()> {
        *self.rollback_only.lock() = true;
        self.finish("rollback", TransactionStatus::RolledBack);
        Ok(())
    }

    fn status(&self) -> TxResult<TransactionStatus> {
        let status = *self.status.lock();
        if status == TransactionStatus::Active && *self.rollback_only.lock() {
            return Ok(TransactionStatus::MarkedRollback);
        }
        Ok(status)
    }

    fn set_rollback_only(&self) -> TxResult<()> {
        self.calls.lock().push("set_rollback_only");
        *self.rollback_only.lock() = true;
        Ok(())
    }

    fn is_xa(&self) -> bool {
        self.xa
    }

    fn suspend(&self) -> TxResult<()> {
        if !self.xa {
            return Err(TransactionError::NotSupported {
                operation: "suspend",
            });
        }
        self.calls.lock().push("suspend");
        Ok(())
    }

    fn resume(&self) -> TxResult<()> {
        if !self.xa {
            return Err(TransactionError::NotSupported { operation: "resume" });
        }
        self.calls.lock().push("resume");
        Ok(())
    }

    fn bind_resource(&self, key: &Arc<dyn Resource>, resource: Arc<dyn Resource>) -> TxResult<()> {
        self.resources.lock().bind(key, resource)
    }

    fn has_resource(&self, key: &Arc<dyn Resource>) -> bool {
        self.resources.lock().contains(key)
    }

    fn get_resource(&self, key: &Arc<dyn Resource>) -> Option<Arc<dyn Resource>> {
        self.resources.lock().get(key)
    }

    fn timeout(&self) -> Option<Duration> {
        *self.timeout.lock()
    }
}

/// Factory handing out prepared [`RecordingTransaction`]s.
#[derive(Debug, Default)]
pub struct TestTransactionFactory {
    next: Mutex<Option<Arc<RecordingTransaction>>>,
    external: Mutex<Option<Arc<RecordingTransaction>>>,
    begun: AtomicUsize,
}

impl TestTransactionFactory {
    /// Creates a factory that begins `transaction`.
    #[must_use]
    pub fn new(transaction: Arc<RecordingTransaction>) -> Self {
        Self {
            next: Mutex::new(Some(transaction)),
            ..Self::default()
        }
    }

    /// Creates a factory that only joins `transaction` as an external one.
    #[must_use]
    pub fn external(transaction: Arc<RecordingTransaction>) -> Self {
        Self {
            external: Mutex::new(Some(transaction)),
            ..Self::default()
        }
    }

    /// Returns how many transactions were begun.
    #[must_use]
    pub fn begun(&self) -> usize {
        self.begun.load(Ordering::SeqCst)
    }
}

impl TransactionFactory for TestTransactionFactory {
    fn begin_transaction(&self, timeout: Option<Duration>) -> TxResult<Arc<dyn Transaction>> {
        let transaction = self
            .next
            .lock()
            .take()
            .ok_or_else(|| TransactionError::illegal_state("no transaction prepared"))?;
        *transaction.timeout.lock() = timeout;
        transaction.begin()?;
        transaction.bind()?;
        self.begun.fetch_add(1, Ordering::SeqCst);
        Ok(transaction)
    }

    fn is_transacted(&self) -> bool {
        true
    }

    fn join_external_transaction(&self) -> TxResult<Option<Arc<dyn Transaction>>> {
        let Some(transaction) = self.external.lock().take() else {
            return Ok(None);
        };
        transaction.bind()?;
        Ok(Some(transaction))
    }
}

/// Connection whose `Hash` changes on every call.
#[derive(Debug, Default)]
pub struct Connection {
    hashes: AtomicU64,
}

impl Hash for Connection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hashes.fetch_add(1, Ordering::Relaxed).hash(state);
    }
}

impl Resource for Connection {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Holder wrapping another resource.
pub struct ConnectionHolder {
    held: Arc<dyn Resource>,
}

impl ConnectionHolder {
    /// Wraps `held`.
    #[must_use]
    pub fn wrap(held: &Arc<dyn Resource>) -> Arc<dyn Resource> {
        Arc::new(Self {
            held: Arc::clone(held),
        })
    }
}

impl Resource for ConnectionHolder {
    fn held_object(&self) -> Option<Arc<dyn Resource>> {
        Some(Arc::clone(&self.held))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Session bound to a transaction, counting its releases.
#[derive(Debug, Default)]
pub struct Session {
    name: String,
    releases: AtomicUsize,
}

impl Session {
    /// Creates a session called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            releases: AtomicUsize::new(0),
        })
    }

    /// Returns the session name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns how many times the session was released.
    #[must_use]
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl Resource for Session {
    fn release(&self) -> strata_tx::PlatformResult<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
