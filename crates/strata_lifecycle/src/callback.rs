//! Phase callbacks and the connection-recovery hook.

use crate::error::{BoxError, LifecycleResult, PhaseError};
use tracing::warn;

/// Callback invoked when a managed object enters a phase.
///
/// Implemented for any `Fn(&str, &O) -> Result<(), PhaseError>`, so closures
/// can be registered directly.
pub trait LifecycleCallback<O: ?Sized>: Send + Sync {
    /// Applies `phase` to `object`.
    fn on_transition(&self, phase: &str, object: &O) -> Result<(), PhaseError>;
}

impl<O, F> LifecycleCallback<O> for F
where
    O: ?Sized,
    F: Fn(&str, &O) -> Result<(), PhaseError> + Send + Sync,
{
    fn on_transition(&self, phase: &str, object: &O) -> Result<(), PhaseError> {
        self(phase, object)
    }
}

/// Hook receiving connection losses raised by phase callbacks.
///
/// The embedding runtime overrides this to start its reconnection strategy.
/// Returning `Ok` leaves the phase marked failed but the manager usable for
/// a retry of the same phase.
pub trait ConnectionRecovery: Send + Sync {
    /// Handles a connection loss raised while executing `phase`.
    fn on_connection_lost(&self, manager: &str, phase: &str, error: BoxError)
        -> LifecycleResult<()>;
}

/// Default recovery hook: logs the loss and lets the caller retry.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogRecovery;

impl ConnectionRecovery for LogRecovery {
    fn on_connection_lost(
        &self,
        manager: &str,
        phase: &str,
        error: BoxError,
    ) -> LifecycleResult<()> {
        warn!(manager, phase, error = %error, "connection lost during lifecycle phase");
        Ok(())
    }
}
