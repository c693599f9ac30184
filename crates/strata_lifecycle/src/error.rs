//! Error types for the lifecycle manager.

use std::error::Error as StdError;
use thiserror::Error;

/// Boxed error raised by a managed object.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Errors that can occur while driving a lifecycle.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The phase was never declared on the manager.
    #[error("phase does not exist: {phase}")]
    UnknownPhase {
        /// The requested phase.
        phase: String,
    },

    /// The phase is the one currently executing (re-entrant or concurrent fire).
    #[error("phase '{phase}' is already currently being executed")]
    AlreadyExecuting {
        /// The requested phase.
        phase: String,
    },

    /// A different phase is executing.
    #[error("cannot fire phase '{phase}', currently executing lifecycle phase: {executing}")]
    PhaseInProgress {
        /// The requested phase.
        phase: String,
        /// The phase that holds the manager.
        executing: String,
    },

    /// The phase is the one most recently completed.
    #[error("already in lifecycle phase '{phase}', cannot fire the same phase twice")]
    AlreadyInPhase {
        /// The requested phase.
        phase: String,
    },

    /// No direct transition from the current phase to the requested one.
    #[error("lifecycle manager '{manager}' phase '{current}' does not support phase '{phase}'")]
    IllegalTransition {
        /// Identifier of the manager.
        manager: String,
        /// The current phase.
        current: String,
        /// The requested phase.
        phase: String,
    },

    /// Invalid argument passed to a replay operation.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// A phase callback failed.
    #[error("failed to invoke lifecycle phase '{phase}' on '{manager}': {source}")]
    PhaseFailed {
        /// Identifier of the manager.
        manager: String,
        /// The phase that failed.
        phase: String,
        /// The failure raised by the callback.
        #[source]
        source: BoxError,
    },
}

impl LifecycleError {
    /// Creates an unknown phase error.
    pub fn unknown_phase(phase: impl Into<String>) -> Self {
        Self::UnknownPhase {
            phase: phase.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Returns true for errors caused by firing a phase in the wrong state.
    ///
    /// These are programming or configuration errors and are never retried.
    #[must_use]
    pub fn is_illegal_state(&self) -> bool {
        matches!(
            self,
            Self::UnknownPhase { .. }
                | Self::AlreadyExecuting { .. }
                | Self::PhaseInProgress { .. }
                | Self::AlreadyInPhase { .. }
                | Self::IllegalTransition { .. }
        )
    }
}

/// Failure reported by a phase callback.
#[derive(Debug, Error)]
pub enum PhaseError {
    /// The managed object lost its connection; routed to the recovery hook.
    #[error("connection lost: {0}")]
    ConnectionLost(#[source] BoxError),

    /// A nested lifecycle failure, re-raised unchanged.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Any other failure; wrapped into [`LifecycleError::PhaseFailed`].
    #[error(transparent)]
    Failed(BoxError),
}

impl PhaseError {
    /// Creates a connection-lost failure.
    pub fn connection_lost(error: impl Into<BoxError>) -> Self {
        Self::ConnectionLost(error.into())
    }

    /// Creates a generic failure.
    pub fn failed(error: impl Into<BoxError>) -> Self {
        Self::Failed(error.into())
    }

    /// Returns true if this is a connection-lost failure.
    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::ConnectionLost(_))
    }
}
