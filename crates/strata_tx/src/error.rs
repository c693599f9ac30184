//! Error types for transaction coordination.

use thiserror::Error;

/// Result type for transaction operations.
pub type TxResult<T> = Result<T, TransactionError>;

/// Result type for calls into the platform transaction manager.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Failure reported by the platform transaction manager or an XA resource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// Unexpected failure inside the transaction manager.
    #[error("system error: {message}")]
    System {
        /// Description of the failure.
        message: String,
    },

    /// Operation not valid in the current transaction state.
    #[error("illegal transaction state: {message}")]
    IllegalState {
        /// Description of the state.
        message: String,
    },

    /// The transaction was rolled back instead of committed.
    #[error("transaction rolled back: {message}")]
    RollbackRequired {
        /// Why the transaction was rolled back.
        message: String,
    },

    /// A heuristic decision was taken for some resources.
    #[error("heuristic outcome: {message}")]
    Heuristic {
        /// Description of the outcome.
        message: String,
    },

    /// XA resource failure with an X/Open error code.
    #[error("XA error (code {code})")]
    Xa {
        /// X/Open XA error code.
        code: i32,
    },
}

impl PlatformError {
    /// Creates a system error.
    pub fn system(message: impl Into<String>) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    /// Creates an illegal-state error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }
}

/// Errors raised by the transaction coordination layer.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// A transaction is already bound to the calling thread.
    #[error("transaction {requested} cannot be bound: {bound} is already bound to this thread")]
    AlreadyBound {
        /// Id of the bound transaction.
        bound: String,
        /// Id of the transaction that was refused.
        requested: String,
    },

    /// Operation not valid in the current state.
    #[error("illegal transaction state: {message}")]
    IllegalState {
        /// Description of the state.
        message: String,
    },

    /// Commit was requested for a transaction marked rollback-only.
    #[error("transaction {id} is marked rollback-only")]
    MarkedRollbackOnly {
        /// Transaction id.
        id: String,
    },

    /// The transaction type does not support the operation.
    #[error("{operation} is not supported by this transaction")]
    NotSupported {
        /// Name of the operation.
        operation: &'static str,
    },

    /// A call into the platform transaction manager failed.
    #[error("could not {operation} transaction: {source}")]
    Platform {
        /// Name of the failing operation.
        operation: &'static str,
        /// Platform failure.
        #[source]
        source: PlatformError,
    },
}

impl TransactionError {
    /// Creates an illegal-state error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// Returns a mapper wrapping a platform failure of `operation`.
    pub(crate) fn platform(operation: &'static str) -> impl FnOnce(PlatformError) -> Self {
        move |source| Self::Platform { operation, source }
    }

    /// Returns the platform failure, if this error wraps one.
    #[must_use]
    pub fn platform_error(&self) -> Option<&PlatformError> {
        match self {
            Self::Platform { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn platform_failure_is_chained() {
        let err = TransactionError::platform("begin")(PlatformError::system("tm down"));
        assert_eq!(err.to_string(), "could not begin transaction: system error: tm down");
        assert_eq!(err.platform_error(), Some(&PlatformError::system("tm down")));
        assert!(err.source().is_some());
    }

    #[test]
    fn xa_code_display() {
        assert_eq!(PlatformError::Xa { code: -7 }.to_string(), "XA error (code -7)");
    }

    #[test]
    fn illegal_state_has_no_platform_error() {
        let err = TransactionError::illegal_state("nothing bound");
        assert!(err.platform_error().is_none());
        assert!(err.to_string().contains("nothing bound"));
    }
}
