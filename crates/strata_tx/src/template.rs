//! Transaction demarcation around a unit of work.

use crate::config::{TransactionAction, TransactionConfig};
use crate::coordination::TransactionCoordinator;
use crate::error::TransactionError;
use crate::transaction::Transaction;
use std::sync::Arc;
use tracing::{debug, warn};

/// Runs work under the transaction rules of a [`TransactionConfig`].
///
/// ```
/// use strata_tx::{TransactionConfig, TransactionCoordinator, TransactionError, TransactionTemplate};
/// use strata_tx::TransactionAction;
///
/// let template = TransactionTemplate::new(TransactionConfig::new().action(TransactionAction::Never));
/// let value = template.execute(|| Ok::<_, TransactionError>(42)).unwrap();
/// assert_eq!(value, 42);
/// assert!(TransactionCoordinator::transaction().is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct TransactionTemplate {
    config: Option<TransactionConfig>,
}

impl TransactionTemplate {
    /// Creates a template for `config`.
    #[must_use]
    pub fn new(config: TransactionConfig) -> Self {
        Self {
            config: Some(config),
        }
    }

    /// Creates a template that runs work as is.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self::default()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> Option<&TransactionConfig> {
        self.config.as_ref()
    }

    /// Runs `work` under the configured action.
    ///
    /// A transaction begun here is committed afterwards, or rolled back if it
    /// is rollback-only or `work` fails. A bound XA transaction set aside by
    /// `None` or `AlwaysBegin` is resumed afterwards, also when `work` fails.
    pub fn execute<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: From<TransactionError>,
        F: FnOnce() -> Result<T, E>,
    {
        let Some(config) = &self.config else {
            return work();
        };
        if config.action == TransactionAction::Indifferent {
            return work();
        }

        let mut current = TransactionCoordinator::transaction();
        let mut external = ExternalBinding(None);
        if current.is_none() && config.interact_with_external {
            if let Some(factory) = &config.factory {
                external.0 = factory.join_external_transaction()?;
                current.clone_from(&external.0);
            }
        }

        let mut suspended = None;
        match config.action {
            TransactionAction::Never if current.is_some() => {
                return Err(TransactionError::illegal_state(
                    "a transaction is available but the action is NEVER",
                )
                .into());
            }
            TransactionAction::AlwaysJoin if current.is_none() => {
                return Err(TransactionError::illegal_state(
                    "no transaction is available but the action is ALWAYS_JOIN",
                )
                .into());
            }
            TransactionAction::None | TransactionAction::AlwaysBegin => {
                if let Some(transaction) = current.take() {
                    if transaction.is_xa() {
                        debug!(tx = %transaction.id(), action = %config.action, "suspending XA transaction");
                        suspended = TransactionCoordinator::suspend_current_transaction()?;
                    } else {
                        debug!(tx = %transaction.id(), action = %config.action, "resolving bound transaction");
                        TransactionCoordinator::resolve_transaction()?;
                    }
                }
            }
            _ => {}
        }

        let begin = config.action == TransactionAction::AlwaysBegin
            || (config.action == TransactionAction::BeginOrJoin && current.is_none());
        let outcome = if begin {
            Self::run_in_new_transaction(config, work)
        } else {
            work()
        };

        if let Some(transaction) = suspended {
            if let Err(error) = TransactionCoordinator::resume_xa_transaction(transaction) {
                if outcome.is_ok() {
                    return Err(error.into());
                }
                warn!(%error, "could not resume suspended transaction after failure");
            }
        }
        outcome
    }

    fn run_in_new_transaction<T, E, F>(config: &TransactionConfig, work: F) -> Result<T, E>
    where
        E: From<TransactionError>,
        F: FnOnce() -> Result<T, E>,
    {
        let factory = config.factory.as_ref().ok_or_else(|| {
            TransactionError::illegal_state(format!(
                "action {} needs a transaction factory",
                config.action
            ))
        })?;
        let transaction = factory.begin_transaction(config.timeout)?;

        match work() {
            Ok(value) => {
                if Self::still_bound(&transaction) {
                    TransactionCoordinator::resolve_transaction()?;
                }
                Ok(value)
            }
            Err(error) => {
                if Self::still_bound(&transaction) {
                    if let Err(rollback) = transaction.rollback() {
                        warn!(tx = %transaction.id(), error = %rollback, "rollback after failed work also failed");
                    }
                }
                Err(error)
            }
        }
    }

    fn still_bound(transaction: &Arc<dyn Transaction>) -> bool {
        TransactionCoordinator::transaction().is_some_and(|bound| bound.id() == transaction.id())
    }
}

/// Unbinds a joined external transaction on every exit path of `execute`.
struct ExternalBinding(Option<Arc<dyn Transaction>>);

impl Drop for ExternalBinding {
    fn drop(&mut self) {
        if let Some(transaction) = self.0.take() {
            TransactionCoordinator::unbind_transaction(transaction.as_ref());
        }
    }
}
