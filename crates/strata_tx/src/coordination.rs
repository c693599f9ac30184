//! Thread-scoped binding of the current transaction.

use crate::error::{TransactionError, TxResult};
use crate::transaction::Transaction;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, trace, warn};

type SharedTransaction = Arc<dyn Transaction>;

#[derive(Default)]
struct ThreadBinding {
    current: Option<SharedTransaction>,
    suspended: Vec<SharedTransaction>,
}

thread_local! {
    static BINDING: RefCell<ThreadBinding> = RefCell::new(ThreadBinding::default());
}

/// Coordinates the transaction bound to the calling thread.
///
/// Each thread has at most one current transaction and a stack of
/// suspended ones. No transaction method is called while the thread slot
/// is borrowed, so a transaction may unbind itself from inside `commit`
/// or `rollback`.
///
/// Bindings never cross threads implicitly; use [`TransactionContext`] to
/// carry one explicitly.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionCoordinator;

impl TransactionCoordinator {
    /// Binds `transaction` to the calling thread.
    ///
    /// Fails with [`TransactionError::AlreadyBound`] if a transaction is
    /// already bound.
    pub fn bind_transaction(transaction: SharedTransaction) -> TxResult<()> {
        BINDING.with(|binding| {
            let mut binding = binding.borrow_mut();
            if let Some(bound) = &binding.current {
                return Err(TransactionError::AlreadyBound {
                    bound: bound.id().to_string(),
                    requested: transaction.id().to_string(),
                });
            }
            debug!(tx = %transaction.id(), "binding transaction to thread");
            binding.current = Some(transaction);
            Ok(())
        })
    }

    /// Returns the transaction bound to the calling thread.
    #[must_use]
    pub fn transaction() -> Option<SharedTransaction> {
        BINDING.with(|binding| binding.borrow().current.clone())
    }

    /// Unbinds `transaction` if it is the one bound to the calling thread.
    ///
    /// Returns false, and leaves the binding alone, for any other transaction.
    pub fn unbind_transaction(transaction: &dyn Transaction) -> bool {
        BINDING.with(|binding| {
            let mut binding = binding.borrow_mut();
            match &binding.current {
                Some(bound) if bound.id() == transaction.id() => {
                    debug!(tx = %transaction.id(), "unbinding transaction from thread");
                    binding.current = None;
                    true
                }
                Some(bound) => {
                    trace!(
                        tx = %transaction.id(),
                        bound = %bound.id(),
                        "ignoring unbind of a transaction that is not bound"
                    );
                    false
                }
                None => false,
            }
        })
    }

    /// Suspends the current transaction and moves it to the suspended stack.
    ///
    /// Returns `None` when nothing is bound. The binding is kept if the
    /// transaction refuses to suspend.
    pub fn suspend_current_transaction() -> TxResult<Option<SharedTransaction>> {
        let Some(transaction) = Self::transaction() else {
            return Ok(None);
        };
        transaction.suspend()?;

        BINDING.with(|binding| {
            let mut binding = binding.borrow_mut();
            binding.current = None;
            binding.suspended.push(Arc::clone(&transaction));
        });
        debug!(tx = %transaction.id(), "transaction suspended");
        Ok(Some(transaction))
    }

    /// Resumes the most recently suspended transaction and binds it again.
    ///
    /// Returns `None` when no transaction is suspended.
    pub fn resume_suspended_transaction() -> TxResult<Option<SharedTransaction>> {
        let Some(transaction) = BINDING.with(|binding| binding.borrow().suspended.last().cloned())
        else {
            return Ok(None);
        };
        Self::resume_xa_transaction(Arc::clone(&transaction))?;
        Ok(Some(transaction))
    }

    /// Resumes `transaction` and binds it to the calling thread.
    ///
    /// The transaction is removed from the suspended stack if it is there.
    pub fn resume_xa_transaction(transaction: SharedTransaction) -> TxResult<()> {
        if let Some(bound) = Self::transaction() {
            return Err(TransactionError::AlreadyBound {
                bound: bound.id().to_string(),
                requested: transaction.id().to_string(),
            });
        }
        transaction.resume()?;

        BINDING.with(|binding| {
            let mut binding = binding.borrow_mut();
            if let Some(index) = binding
                .suspended
                .iter()
                .rposition(|suspended| suspended.id() == transaction.id())
            {
                binding.suspended.remove(index);
            }
        });
        debug!(tx = %transaction.id(), "transaction resumed");
        Self::bind_transaction(transaction)
    }

    /// Commits the current transaction, if any.
    pub fn commit_current_transaction() -> TxResult<()> {
        match Self::transaction() {
            Some(transaction) => transaction.commit(),
            None => {
                trace!("no transaction bound, nothing to commit");
                Ok(())
            }
        }
    }

    /// Rolls back the current transaction, if any.
    pub fn rollback_current_transaction() -> TxResult<()> {
        match Self::transaction() {
            Some(transaction) => transaction.rollback(),
            None => {
                trace!("no transaction bound, nothing to roll back");
                Ok(())
            }
        }
    }

    /// Rolls back the current transaction if it is rollback-only, commits it otherwise.
    pub fn resolve_transaction() -> TxResult<()> {
        let Some(transaction) = Self::transaction() else {
            return Ok(());
        };
        if transaction.is_rollback_only()? {
            debug!(tx = %transaction.id(), "resolving rollback-only transaction");
            transaction.rollback()
        } else {
            transaction.commit()
        }
    }

    /// Returns the number of transactions suspended on the calling thread.
    #[must_use]
    pub fn suspended_count() -> usize {
        BINDING.with(|binding| binding.borrow().suspended.len())
    }

    /// Drops the current and suspended transactions of the calling thread
    /// without completing them.
    pub fn clear() {
        let dropped = BINDING.with(|binding| std::mem::take(&mut *binding.borrow_mut()));
        if dropped.current.is_some() || !dropped.suspended.is_empty() {
            warn!(
                suspended = dropped.suspended.len(),
                "clearing thread transaction bindings"
            );
        }
    }
}

/// Snapshot of a thread's current transaction, for handing work to another thread.
///
/// ```
/// use strata_tx::{TransactionContext, TransactionCoordinator};
///
/// let context = TransactionContext::capture();
/// std::thread::spawn(move || {
///     let _attached = context.attach().unwrap();
///     // TransactionCoordinator::transaction() now returns the captured transaction
/// })
/// .join()
/// .unwrap();
/// assert!(TransactionCoordinator::transaction().is_none());
/// ```
#[derive(Clone, Default)]
pub struct TransactionContext {
    transaction: Option<SharedTransaction>,
}

impl TransactionContext {
    /// Captures the calling thread's current transaction.
    #[must_use]
    pub fn capture() -> Self {
        Self {
            transaction: TransactionCoordinator::transaction(),
        }
    }

    /// Creates a context carrying `transaction`.
    #[must_use]
    pub fn with_transaction(transaction: SharedTransaction) -> Self {
        Self {
            transaction: Some(transaction),
        }
    }

    /// Returns the captured transaction.
    #[must_use]
    pub fn transaction(&self) -> Option<&SharedTransaction> {
        self.transaction.as_ref()
    }

    /// Binds the captured transaction to the calling thread until the
    /// returned guard is dropped.
    pub fn attach(&self) -> TxResult<AttachedContext> {
        if let Some(transaction) = &self.transaction {
            TransactionCoordinator::bind_transaction(Arc::clone(transaction))?;
        }
        Ok(AttachedContext {
            transaction: self.transaction.clone(),
            _thread: PhantomData,
        })
    }
}

impl std::fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionContext")
            .field("transaction", &self.transaction.as_ref().map(|tx| tx.id()))
            .finish()
    }
}

/// Guard returned by [`TransactionContext::attach`].
///
/// Unbinds the attached transaction on drop if it is still bound.
#[must_use = "the context is detached when the guard is dropped"]
pub struct AttachedContext {
    transaction: Option<SharedTransaction>,
    // Bound to the thread whose slot it unbinds.
    _thread: PhantomData<*const ()>,
}

impl Drop for AttachedContext {
    fn drop(&mut self) {
        if let Some(transaction) = &self.transaction {
            TransactionCoordinator::unbind_transaction(transaction.as_ref());
        }
    }
}
