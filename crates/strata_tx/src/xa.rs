//! Transactions driven by an XA-capable platform transaction manager.

use crate::coordination::TransactionCoordinator;
use crate::error::{TransactionError, TxResult};
use crate::platform::{PlatformTransaction, PlatformTransactionManager, XaResource};
use crate::resource::{Resource, ResourceBindings};
use crate::status::TransactionStatus;
use crate::transaction::{new_transaction_id, Transaction};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Converts a timeout to the whole seconds understood by transaction
/// managers, truncating any fraction.
#[must_use]
pub fn timeout_seconds(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_secs()).unwrap_or(u32::MAX)
}

#[derive(Default)]
struct XaState {
    /// Platform transaction, present between begin and completion.
    transaction: Option<Arc<dyn PlatformTransaction>>,
    resources: ResourceBindings,
    suspended: bool,
}

/// Transaction wrapping a platform XA transaction.
///
/// The configured timeout is pushed to the transaction manager before the
/// platform transaction is begun, and to every XA resource before it is
/// enlisted. Rollback-only state is never cached: every query goes to the
/// platform transaction.
///
/// Resources bound with [`Transaction::bind_resource`] are released once
/// the transaction commits or rolls back.
pub struct XaTransaction {
    id: String,
    manager: Arc<dyn PlatformTransactionManager>,
    timeout: Mutex<Option<Duration>>,
    state: Mutex<XaState>,
}

impl XaTransaction {
    /// Creates a transaction that has not begun yet.
    pub fn new(manager: Arc<dyn PlatformTransactionManager>) -> Self {
        Self {
            id: new_transaction_id(),
            manager,
            timeout: Mutex::new(None),
            state: Mutex::new(XaState::default()),
        }
    }

    /// Wraps a platform transaction that was begun outside this layer.
    pub fn join(
        manager: Arc<dyn PlatformTransactionManager>,
        transaction: Arc<dyn PlatformTransaction>,
    ) -> Self {
        let joined = Self::new(manager);
        joined.state.lock().transaction = Some(transaction);
        joined
    }

    /// Sets the timeout. It only applies to the transaction manager if set
    /// before [`Transaction::begin`]; resources enlisted later always get it.
    pub fn set_timeout(&self, timeout: Duration) {
        *self.timeout.lock() = Some(timeout);
    }

    /// Returns true between begin and completion.
    #[must_use]
    pub fn is_begun(&self) -> bool {
        self.state.lock().transaction.is_some()
    }

    /// Returns the wrapped platform transaction.
    #[must_use]
    pub fn platform_transaction(&self) -> Option<Arc<dyn PlatformTransaction>> {
        self.state.lock().transaction.clone()
    }

    /// Enlists `resource` in the platform transaction.
    ///
    /// A configured timeout is set on the resource first.
    pub fn enlist_resource(&self, resource: Arc<dyn XaResource>) -> TxResult<bool> {
        let transaction = self.require_begun("enlist a resource")?;
        if let Some(seconds) = self.timeout_secs() {
            let applied = resource
                .set_transaction_timeout(seconds)
                .map_err(TransactionError::platform("enlist resource in"))?;
            trace!(tx = %self.id, seconds, applied, "resource timeout set");
        }
        let enlisted = transaction
            .enlist_resource(resource)
            .map_err(TransactionError::platform("enlist resource in"))?;
        debug!(tx = %self.id, enlisted, "XA resource enlisted");
        Ok(enlisted)
    }

    /// Delists `resource` with one of the `XA_TM*` flags.
    pub fn delist_resource(&self, resource: Arc<dyn XaResource>, flag: i32) -> TxResult<bool> {
        let transaction = self.require_begun("delist a resource")?;
        let delisted = transaction
            .delist_resource(resource, flag)
            .map_err(TransactionError::platform("delist resource from"))?;
        debug!(tx = %self.id, flag, delisted, "XA resource delisted");
        Ok(delisted)
    }

    fn timeout_secs(&self) -> Option<u32> {
        self.timeout.lock().map(timeout_seconds)
    }

    fn require_begun(&self, action: &str) -> TxResult<Arc<dyn PlatformTransaction>> {
        self.platform_transaction().ok_or_else(|| {
            TransactionError::illegal_state(format!(
                "cannot {action}: transaction {} has not begun",
                self.id
            ))
        })
    }

    fn do_commit(&self, transaction: &Arc<dyn PlatformTransaction>) -> TxResult<()> {
        let status = transaction
            .status()
            .map_err(TransactionError::platform("commit"))?;
        if status.is_rollback_only() {
            warn!(tx = %self.id, %status, "commit requested for rollback-only transaction, rolling back");
            if status == TransactionStatus::MarkedRollback {
                transaction
                    .rollback()
                    .map_err(TransactionError::platform("roll back"))?;
            }
            return Err(TransactionError::MarkedRollbackOnly {
                id: self.id.clone(),
            });
        }
        transaction
            .commit()
            .map_err(TransactionError::platform("commit"))?;
        debug!(tx = %self.id, "transaction committed");
        Ok(())
    }

    fn do_rollback(&self, transaction: &Arc<dyn PlatformTransaction>) -> TxResult<()> {
        if let Err(error) = transaction.set_rollback_only() {
            trace!(tx = %self.id, %error, "could not mark transaction rollback-only");
        }
        transaction
            .rollback()
            .map_err(TransactionError::platform("roll back"))?;
        debug!(tx = %self.id, "transaction rolled back");
        Ok(())
    }

    /// Unbinds, forgets the platform transaction and releases resources.
    fn complete(&self) {
        TransactionCoordinator::unbind_transaction(self);
        let resources = {
            let mut state = self.state.lock();
            state.transaction = None;
            state.suspended = false;
            state.resources.drain()
        };
        for resource in resources {
            if let Err(error) = resource.release() {
                warn!(tx = %self.id, %error, "failed to release transaction resource");
            }
        }
    }
}

impl Transaction for XaTransaction {
    fn id(&self) -> &str {
        &self.id
    }

    fn begin(&self) -> TxResult<()> {
        let mut state = self.state.lock();
        if state.transaction.is_some() {
            return Err(TransactionError::illegal_state(format!(
                "transaction {} has already begun",
                self.id
            )));
        }

        if let Some(seconds) = self.timeout_secs() {
            self.manager
                .set_transaction_timeout(seconds)
                .map_err(TransactionError::platform("begin"))?;
            trace!(tx = %self.id, seconds, "transaction manager timeout set");
        }
        self.manager
            .begin()
            .map_err(TransactionError::platform("begin"))?;
        let transaction = self
            .manager
            .transaction()
            .map_err(TransactionError::platform("begin"))?
            .ok_or_else(|| {
                TransactionError::illegal_state(
                    "transaction manager has no transaction after begin",
                )
            })?;

        state.transaction = Some(transaction);
        debug!(tx = %self.id, "XA transaction begun");
        Ok(())
    }

    fn commit(&self) -> TxResult<()> {
        let result = match self.platform_transaction() {
            Some(transaction) => self.do_commit(&transaction),
            None => Err(TransactionError::illegal_state(format!(
                "cannot commit: transaction {} has not begun",
                self.id
            ))),
        };
        self.complete();
        result
    }

    fn rollback(&self) -> TxResult<()> {
        let result = match self.platform_transaction() {
            Some(transaction) => self.do_rollback(&transaction),
            None => Err(TransactionError::illegal_state(format!(
                "cannot roll back: transaction {} has not begun",
                self.id
            ))),
        };
        self.complete();
        result
    }

    fn status(&self) -> TxResult<TransactionStatus> {
        match self.platform_transaction() {
            Some(transaction) => transaction
                .status()
                .map_err(TransactionError::platform("query status of")),
            None => Ok(TransactionStatus::NoTransaction),
        }
    }

    fn set_rollback_only(&self) -> TxResult<()> {
        self.require_begun("mark rollback-only")?
            .set_rollback_only()
            .map_err(TransactionError::platform("mark rollback-only"))?;
        debug!(tx = %self.id, "transaction marked rollback-only");
        Ok(())
    }

    fn is_xa(&self) -> bool {
        true
    }

    fn suspend(&self) -> TxResult<()> {
        self.require_begun("suspend")?;
        let mut state = self.state.lock();
        if state.suspended {
            return Err(TransactionError::illegal_state(format!(
                "transaction {} is already suspended",
                self.id
            )));
        }
        self.manager
            .suspend()
            .map_err(TransactionError::platform("suspend"))?;
        state.suspended = true;
        debug!(tx = %self.id, "XA transaction suspended");
        Ok(())
    }

    fn resume(&self) -> TxResult<()> {
        let transaction = self.require_begun("resume")?;
        let mut state = self.state.lock();
        if !state.suspended {
            return Err(TransactionError::illegal_state(format!(
                "transaction {} is not suspended",
                self.id
            )));
        }
        self.manager
            .resume(transaction)
            .map_err(TransactionError::platform("resume"))?;
        state.suspended = false;
        debug!(tx = %self.id, "XA transaction resumed");
        Ok(())
    }

    fn bind_resource(&self, key: &Arc<dyn Resource>, resource: Arc<dyn Resource>) -> TxResult<()> {
        self.state.lock().resources.bind(key, resource)?;
        trace!(tx = %self.id, "resource bound");
        Ok(())
    }

    fn has_resource(&self, key: &Arc<dyn Resource>) -> bool {
        self.state.lock().resources.contains(key)
    }

    fn get_resource(&self, key: &Arc<dyn Resource>) -> Option<Arc<dyn Resource>> {
        self.state.lock().resources.get(key)
    }

    fn timeout(&self) -> Option<Duration> {
        *self.timeout.lock()
    }
}

impl std::fmt::Debug for XaTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("XaTransaction")
            .field("id", &self.id)
            .field("timeout", &*self.timeout.lock())
            .field("begun", &state.transaction.is_some())
            .field("suspended", &state.suspended)
            .field("resources", &state.resources.len())
            .finish()
    }
}
