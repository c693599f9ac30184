//! Lifecycle manager with the canonical initialise/start/stop/dispose graph.

use crate::callback::{ConnectionRecovery, LifecycleCallback};
use crate::error::LifecycleResult;
use crate::manager::{LifecycleManager, LifecycleManagerBuilder};
use crate::phase::{DISPOSE, INITIALISE, START, STOP};
use crate::transition::TransitionTable;
use std::sync::Arc;

/// Lifecycle manager for short-lived, single-object lifecycles.
///
/// Phases are fired with a callback supplied per call, which is how a
/// component drives its own `initialise`/`start`/`stop`/`dispose` methods.
pub struct SimpleLifecycleManager<O: ?Sized> {
    inner: LifecycleManager<O>,
}

impl<O: ?Sized> SimpleLifecycleManager<O> {
    /// Creates a manager over the canonical transition graph.
    pub fn new(id: impl Into<String>, object: Arc<O>) -> Self {
        Self {
            inner: Self::canonical_builder(id).build(object),
        }
    }

    /// Creates a manager with a custom connection-recovery hook.
    pub fn with_recovery(
        id: impl Into<String>,
        object: Arc<O>,
        recovery: impl ConnectionRecovery + 'static,
    ) -> Self {
        Self {
            inner: Self::canonical_builder(id).recovery(recovery).build(object),
        }
    }

    fn canonical_builder(id: impl Into<String>) -> LifecycleManagerBuilder<O> {
        LifecycleManager::builder(id).transitions(&TransitionTable::canonical())
    }

    /// Fires the initialise phase.
    pub fn fire_initialise_phase(&self, callback: &dyn LifecycleCallback<O>) -> LifecycleResult<()> {
        self.inner.fire_lifecycle_with(INITIALISE, callback)
    }

    /// Fires the start phase.
    pub fn fire_start_phase(&self, callback: &dyn LifecycleCallback<O>) -> LifecycleResult<()> {
        self.inner.fire_lifecycle_with(START, callback)
    }

    /// Fires the stop phase.
    pub fn fire_stop_phase(&self, callback: &dyn LifecycleCallback<O>) -> LifecycleResult<()> {
        self.inner.fire_lifecycle_with(STOP, callback)
    }

    /// Fires the dispose phase.
    pub fn fire_dispose_phase(&self, callback: &dyn LifecycleCallback<O>) -> LifecycleResult<()> {
        self.inner.fire_lifecycle_with(DISPOSE, callback)
    }

    /// Returns true once initialise has completed and dispose has not.
    #[must_use]
    pub fn is_initialised(&self) -> bool {
        self.inner.is_phase_complete(INITIALISE)
    }

    /// Returns true if the initialise phase is executing.
    #[must_use]
    pub fn is_initialising(&self) -> bool {
        self.is_executing(INITIALISE)
    }

    /// Returns true if start has completed more recently than stop.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.inner.is_phase_complete(START)
    }

    /// Returns true if the start phase is executing.
    #[must_use]
    pub fn is_starting(&self) -> bool {
        self.is_executing(START)
    }

    /// Returns true if stop has completed more recently than start.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner.is_phase_complete(STOP)
    }

    /// Returns true if the stop phase is executing.
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.is_executing(STOP)
    }

    /// Returns true once dispose has completed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.is_phase_complete(DISPOSE)
    }

    /// Returns true if the dispose phase is executing.
    #[must_use]
    pub fn is_disposing(&self) -> bool {
        self.is_executing(DISPOSE)
    }

    /// Returns true if `phase` can be fired from the current phase.
    #[must_use]
    pub fn is_valid_transition(&self, phase: &str) -> bool {
        self.inner.check_phase(phase).is_ok()
    }

    /// Returns the underlying manager.
    #[must_use]
    pub fn manager(&self) -> &LifecycleManager<O> {
        &self.inner
    }

    fn is_executing(&self, phase: &str) -> bool {
        self.inner.executing_phase().as_deref() == Some(phase)
    }
}

impl<O: ?Sized> std::ops::Deref for SimpleLifecycleManager<O> {
    type Target = LifecycleManager<O>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<O: ?Sized> std::fmt::Debug for SimpleLifecycleManager<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SimpleLifecycleManager")
            .field(&self.inner)
            .finish()
    }
}
