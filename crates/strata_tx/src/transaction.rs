//! The coordinated unit of work.

use crate::error::{TransactionError, TxResult};
use crate::resource::Resource;
use crate::status::TransactionStatus;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Generates a new transaction id.
#[must_use]
pub fn new_transaction_id() -> String {
    Uuid::new_v4().to_string()
}

/// A unit of work that can be bound to a thread by the
/// [`TransactionCoordinator`](crate::TransactionCoordinator).
///
/// `commit` and `rollback` always unbind the transaction from the calling
/// thread, whatever their outcome. `commit` fails with
/// [`TransactionError::MarkedRollbackOnly`] when the transaction can only be
/// rolled back; `rollback` marks the transaction rollback-only before it
/// rolls back.
pub trait Transaction: Send + Sync {
    /// Returns the unique transaction id.
    fn id(&self) -> &str;

    /// Begins the transaction.
    fn begin(&self) -> TxResult<()>;

    /// Commits the transaction.
    fn commit(&self) -> TxResult<()>;

    /// Rolls the transaction back.
    fn rollback(&self) -> TxResult<()>;

    /// Returns the current status.
    fn status(&self) -> TxResult<TransactionStatus>;

    /// Returns true if the transaction can only be rolled back.
    ///
    /// The status is queried on every call.
    fn is_rollback_only(&self) -> TxResult<bool> {
        Ok(self.status()?.is_rollback_only())
    }

    /// Marks the transaction so that it can only be rolled back.
    fn set_rollback_only(&self) -> TxResult<()>;

    /// Returns true for transactions driven by an XA transaction manager.
    fn is_xa(&self) -> bool {
        false
    }

    /// Dissociates the transaction from the calling thread's resources.
    fn suspend(&self) -> TxResult<()> {
        Err(TransactionError::NotSupported {
            operation: "suspend",
        })
    }

    /// Reassociates a suspended transaction.
    fn resume(&self) -> TxResult<()> {
        Err(TransactionError::NotSupported { operation: "resume" })
    }

    /// Binds `resource` under the identity of `key`.
    fn bind_resource(&self, key: &Arc<dyn Resource>, resource: Arc<dyn Resource>) -> TxResult<()>;

    /// Returns true if a resource is bound under the identity of `key`.
    fn has_resource(&self, key: &Arc<dyn Resource>) -> bool;

    /// Returns the resource bound under the identity of `key`.
    fn get_resource(&self, key: &Arc<dyn Resource>) -> Option<Arc<dyn Resource>>;

    /// Returns the configured timeout.
    fn timeout(&self) -> Option<Duration>;
}

impl std::fmt::Debug for dyn Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id())
            .field("xa", &self.is_xa())
            .finish_non_exhaustive()
    }
}
