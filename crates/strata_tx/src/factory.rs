//! Creation of thread-bound transactions.

use crate::coordination::TransactionCoordinator;
use crate::error::{TransactionError, TxResult};
use crate::platform::PlatformTransactionManager;
use crate::status::TransactionStatus;
use crate::transaction::Transaction;
use crate::xa::XaTransaction;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Creates transactions and binds them to the calling thread.
pub trait TransactionFactory: Send + Sync {
    /// Creates, begins and binds a transaction.
    ///
    /// `timeout` overrides the factory's own default.
    fn begin_transaction(&self, timeout: Option<Duration>) -> TxResult<Arc<dyn Transaction>>;

    /// Returns true if the transactions created are real transactions.
    fn is_transacted(&self) -> bool;

    /// Binds a transaction begun outside this layer, if there is one.
    fn join_external_transaction(&self) -> TxResult<Option<Arc<dyn Transaction>>> {
        Ok(None)
    }
}

/// Factory for [`XaTransaction`]s over one platform transaction manager.
pub struct XaTransactionFactory {
    manager: Arc<dyn PlatformTransactionManager>,
    timeout: Option<Duration>,
}

impl XaTransactionFactory {
    /// Creates a factory with no default timeout.
    pub fn new(manager: Arc<dyn PlatformTransactionManager>) -> Self {
        Self {
            manager,
            timeout: None,
        }
    }

    /// Sets the timeout applied when none is given to `begin_transaction`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the default timeout.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn bind(transaction: Arc<XaTransaction>) -> TxResult<Arc<dyn Transaction>> {
        let transaction: Arc<dyn Transaction> = transaction;
        TransactionCoordinator::bind_transaction(Arc::clone(&transaction))?;
        Ok(transaction)
    }
}

impl TransactionFactory for XaTransactionFactory {
    fn begin_transaction(&self, timeout: Option<Duration>) -> TxResult<Arc<dyn Transaction>> {
        if let Some(bound) = TransactionCoordinator::transaction() {
            return Err(TransactionError::illegal_state(format!(
                "cannot begin a transaction while {} is bound to this thread",
                bound.id()
            )));
        }

        let transaction = Arc::new(XaTransaction::new(Arc::clone(&self.manager)));
        if let Some(timeout) = timeout.or(self.timeout) {
            transaction.set_timeout(timeout);
        }
        transaction.begin()?;
        debug!(tx = %transaction.id(), "XA transaction created");
        Self::bind(transaction)
    }

    fn is_transacted(&self) -> bool {
        true
    }

    fn join_external_transaction(&self) -> TxResult<Option<Arc<dyn Transaction>>> {
        let Some(platform) = self
            .manager
            .transaction()
            .map_err(TransactionError::platform("join"))?
        else {
            return Ok(None);
        };
        let status = platform
            .status()
            .map_err(TransactionError::platform("join"))?;
        if status != TransactionStatus::Active {
            warn!(%status, "external transaction is not active, not joining");
            return Ok(None);
        }

        let transaction = Arc::new(XaTransaction::join(Arc::clone(&self.manager), platform));
        debug!(tx = %transaction.id(), "joined external XA transaction");
        Self::bind(transaction).map(Some)
    }
}

impl std::fmt::Debug for XaTransactionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XaTransactionFactory")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
