//! Phase lifecycle manager.

use crate::callback::{ConnectionRecovery, LifecycleCallback, LogRecovery};
use crate::error::{LifecycleError, LifecycleResult, PhaseError};
use crate::phase::{opposing_phase, NOT_IN_LIFECYCLE};
use crate::transition::TransitionTable;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

type SharedCallback<O> = Arc<dyn LifecycleCallback<O>>;

/// Mutable phase bookkeeping for one managed object.
#[derive(Debug, Clone)]
struct PhaseState {
    /// Last phase successfully completed.
    current: String,
    /// Phase whose callback is running, if any.
    executing: Option<String>,
    /// Completed phases not yet invalidated by an opposing phase.
    completed: Vec<String>,
    /// Most recent phase attempt.
    last_executed: Option<String>,
    /// Whether the most recent attempt failed.
    last_failed: bool,
}

impl PhaseState {
    fn initial() -> Self {
        Self {
            current: NOT_IN_LIFECYCLE.to_string(),
            executing: None,
            completed: vec![NOT_IN_LIFECYCLE.to_string()],
            last_executed: None,
            last_failed: false,
        }
    }

    fn complete(&mut self, phase: &str) {
        self.current = phase.to_string();
        if !self.completed.iter().any(|p| p == phase) {
            self.completed.push(phase.to_string());
        }
        if let Some(opposing) = opposing_phase(phase) {
            self.completed.retain(|p| p != opposing);
        }
    }
}

/// Clears the executing phase on every exit path, including unwinding.
struct ExecutingGuard<'a> {
    state: &'a Mutex<PhaseState>,
}

impl Drop for ExecutingGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().executing = None;
    }
}

/// Drives a single managed object through a fixed set of named phases.
///
/// The manager validates every requested phase against its
/// [`TransitionTable`], invokes the callback registered for the phase
/// exactly once, and records the outcome:
///
/// - success makes the phase current and marks it complete, dropping the
///   opposing phase (`start`/`stop`, `initialise`/`dispose`) from the
///   completed set
/// - a connection loss is handed to the [`ConnectionRecovery`] hook
/// - any other failure is wrapped in [`LifecycleError::PhaseFailed`]
///
/// The manager is meant for a single writer. The state lock is not held
/// while a callback runs, so a re-entrant or concurrent fire observes the
/// executing phase and is rejected instead of queued.
pub struct LifecycleManager<O: ?Sized> {
    id: String,
    object: Arc<O>,
    table: TransitionTable,
    callbacks: RwLock<HashMap<String, SharedCallback<O>>>,
    recovery: Arc<dyn ConnectionRecovery>,
    state: Mutex<PhaseState>,
}

impl<O: ?Sized> LifecycleManager<O> {
    /// Starts building a manager identified by `id`.
    pub fn builder(id: impl Into<String>) -> LifecycleManagerBuilder<O> {
        LifecycleManagerBuilder::new(id)
    }

    /// Returns the manager identifier used in diagnostics.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the managed object.
    #[must_use]
    pub fn object(&self) -> &Arc<O> {
        &self.object
    }

    /// Returns the transition table.
    #[must_use]
    pub fn transitions(&self) -> &TransitionTable {
        &self.table
    }

    /// Associates a callback with a phase. The last registration wins.
    pub fn register_lifecycle_callback(
        &self,
        phase: impl Into<String>,
        callback: impl LifecycleCallback<O> + 'static,
    ) {
        self.callbacks
            .write()
            .insert(phase.into(), Arc::new(callback));
    }

    /// Validates and fires `phase` on the managed object with its registered callback.
    ///
    /// A phase without a registered callback only updates the bookkeeping.
    pub fn fire_lifecycle(&self, phase: &str) -> LifecycleResult<()> {
        let callback = self.callbacks.read().get(phase).cloned();
        self.fire(phase, callback.as_deref())
    }

    /// Validates and fires `phase` with a one-off callback.
    pub fn fire_lifecycle_with(
        &self,
        phase: &str,
        callback: &dyn LifecycleCallback<O>,
    ) -> LifecycleResult<()> {
        self.fire(phase, Some(callback))
    }

    /// Checks that `phase` may be fired now.
    ///
    /// Fails when the phase is unknown, is already executing, another phase
    /// is executing, the phase is the current one, or it is not a direct
    /// transition from the current phase. When the previous attempt failed
    /// only the first three checks apply, so the attempt can be retried.
    /// The relaxation covers whichever phase is fired next, not only the
    /// one that failed; it ends with the next attempt.
    pub fn check_phase(&self, phase: &str) -> LifecycleResult<()> {
        let state = self.state.lock();
        self.check_locked(&state, phase)
    }

    /// Replays every phase after `from` up to and including `to` on `object`.
    ///
    /// Used to bring an object registered late to the point the rest of the
    /// system has reached. The manager's own state is not touched. A lost
    /// connection during replay is reported as [`LifecycleError::PhaseFailed`]
    /// and the recovery hook is not invoked.
    pub fn apply_phase(&self, object: &O, from: &str, to: &str) -> LifecycleResult<()> {
        let from_index = self.declared_index(from, "from")?;
        let to_index = self.declared_index(to, "to")?;
        if to_index <= from_index {
            trace!(manager = %self.id, from, to, "no phases to apply");
            return Ok(());
        }

        for phase in &self.table.phases()[from_index + 1..=to_index] {
            self.apply_single(object, phase)?;
        }
        Ok(())
    }

    /// Replays the completed phases on `object`.
    ///
    /// Phases are visited in declaration order and only those chained by
    /// direct transitions from the initial phase are applied, so the object
    /// never sees a phase out of causal order.
    pub fn apply_completed_phases(&self, object: &O) -> LifecycleResult<()> {
        let completed = self.state.lock().completed.clone();
        let mut last: &str = NOT_IN_LIFECYCLE;

        for phase in self.table.phases() {
            if completed.contains(phase) && self.table.is_direct(last, phase) {
                self.apply_single(object, phase)?;
                last = phase.as_str();
            }
        }
        Ok(())
    }

    /// Returns true if `to` is a direct transition from the current phase.
    #[must_use]
    pub fn is_direct_transition(&self, to: &str) -> bool {
        let current = self.state.lock().current.clone();
        self.table.is_direct(&current, to)
    }

    /// Returns true if `to` is a direct transition from `from`.
    #[must_use]
    pub fn is_direct_transition_from(&self, from: &str, to: &str) -> bool {
        self.table.is_direct(from, to)
    }

    /// Forgets the completed phases and returns to the initial phase.
    ///
    /// Callbacks already invoked are not undone.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        let executing = state.executing.take();
        *state = PhaseState::initial();
        state.executing = executing;
        debug!(manager = %self.id, "lifecycle reset");
    }

    /// Returns the last successfully completed phase.
    #[must_use]
    pub fn current_phase(&self) -> String {
        self.state.lock().current.clone()
    }

    /// Returns the phase currently executing, if any.
    #[must_use]
    pub fn executing_phase(&self) -> Option<String> {
        self.state.lock().executing.clone()
    }

    /// Returns the most recently attempted phase.
    #[must_use]
    pub fn last_phase_executed(&self) -> Option<String> {
        self.state.lock().last_executed.clone()
    }

    /// Returns true if the most recent phase attempt failed.
    #[must_use]
    pub fn is_last_phase_execution_failed(&self) -> bool {
        self.state.lock().last_failed
    }

    /// Returns true if `phase` is in the completed set.
    #[must_use]
    pub fn is_phase_complete(&self, phase: &str) -> bool {
        self.state.lock().completed.iter().any(|p| p == phase)
    }

    /// Returns the completed phases in completion order.
    #[must_use]
    pub fn completed_phases(&self) -> Vec<String> {
        self.state.lock().completed.clone()
    }

    fn fire(&self, phase: &str, callback: Option<&dyn LifecycleCallback<O>>) -> LifecycleResult<()> {
        {
            let mut state = self.state.lock();
            self.check_locked(&state, phase)?;
            state.executing = Some(phase.to_string());
            state.last_executed = Some(phase.to_string());
            state.last_failed = false;
        }
        let _executing = ExecutingGuard { state: &self.state };

        debug!(manager = %self.id, phase, "firing lifecycle phase");
        let outcome = match callback {
            Some(callback) => callback.on_transition(phase, &self.object),
            None => Ok(()),
        };

        match outcome {
            Ok(()) => {
                self.state.lock().complete(phase);
                debug!(manager = %self.id, phase, "lifecycle phase completed");
                Ok(())
            }
            Err(error) => {
                self.state.lock().last_failed = true;
                self.handle_failure(phase, error)
            }
        }
    }

    fn check_locked(&self, state: &PhaseState, phase: &str) -> LifecycleResult<()> {
        if let Some(executing) = &state.executing {
            if executing == phase {
                return Err(LifecycleError::AlreadyExecuting {
                    phase: phase.to_string(),
                });
            }
            return Err(LifecycleError::PhaseInProgress {
                phase: phase.to_string(),
                executing: executing.clone(),
            });
        }

        if !self.table.contains(phase) {
            return Err(LifecycleError::unknown_phase(phase));
        }

        if state.last_failed {
            trace!(manager = %self.id, phase, "previous attempt failed, skipping transition checks");
            return Ok(());
        }

        if state.current == phase {
            return Err(LifecycleError::AlreadyInPhase {
                phase: phase.to_string(),
            });
        }

        if !self.table.is_direct(&state.current, phase) {
            return Err(LifecycleError::IllegalTransition {
                manager: self.id.clone(),
                current: state.current.clone(),
                phase: phase.to_string(),
            });
        }

        Ok(())
    }

    fn apply_single(&self, object: &O, phase: &str) -> LifecycleResult<()> {
        let Some(callback) = self.callbacks.read().get(phase).cloned() else {
            trace!(manager = %self.id, phase, "no callback registered, skipping");
            return Ok(());
        };

        debug!(manager = %self.id, phase, "applying lifecycle phase");
        callback
            .on_transition(phase, object)
            .or_else(|error| self.handle_replay_failure(phase, error))
    }

    /// Replay stops at the first failure, connection loss included: the
    /// object has not reached the target phase, whatever recovery does.
    fn handle_replay_failure(&self, phase: &str, error: PhaseError) -> LifecycleResult<()> {
        match error {
            PhaseError::ConnectionLost(source) => {
                warn!(manager = %self.id, phase, error = %source, "connection lost while replaying phase");
                Err(LifecycleError::PhaseFailed {
                    manager: self.id.clone(),
                    phase: phase.to_string(),
                    source,
                })
            }
            other => self.handle_failure(phase, other),
        }
    }

    fn handle_failure(&self, phase: &str, error: PhaseError) -> LifecycleResult<()> {
        match error {
            PhaseError::ConnectionLost(source) => {
                warn!(manager = %self.id, phase, "connection lost, invoking recovery");
                self.recovery.on_connection_lost(&self.id, phase, source)
            }
            PhaseError::Lifecycle(error) => {
                warn!(manager = %self.id, phase, error = %error, "lifecycle phase failed");
                Err(error)
            }
            PhaseError::Failed(source) => {
                warn!(manager = %self.id, phase, error = %source, "lifecycle phase failed");
                Err(LifecycleError::PhaseFailed {
                    manager: self.id.clone(),
                    phase: phase.to_string(),
                    source,
                })
            }
        }
    }

    fn declared_index(&self, phase: &str, argument: &str) -> LifecycleResult<usize> {
        if phase.is_empty() {
            return Err(LifecycleError::invalid_argument(format!(
                "{argument} phase must not be empty"
            )));
        }
        self.table.index_of(phase).ok_or_else(|| {
            LifecycleError::invalid_argument(format!("{argument} phase '{phase}' is not registered"))
        })
    }
}

impl<O: ?Sized> std::fmt::Debug for LifecycleManager<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LifecycleManager")
            .field("id", &self.id)
            .field("current", &state.current)
            .field("executing", &state.executing)
            .field("completed", &state.completed)
            .finish_non_exhaustive()
    }
}

/// Builder declaring the phases, transitions and callbacks of a manager.
///
/// The initial phase is always declared first.
pub struct LifecycleManagerBuilder<O: ?Sized> {
    id: String,
    table: TransitionTable,
    callbacks: HashMap<String, SharedCallback<O>>,
    recovery: Arc<dyn ConnectionRecovery>,
}

impl<O: ?Sized> LifecycleManagerBuilder<O> {
    /// Creates a builder for a manager identified by `id`.
    pub fn new(id: impl Into<String>) -> Self {
        let mut table = TransitionTable::new();
        table.add_phase(NOT_IN_LIFECYCLE);
        Self {
            id: id.into(),
            table,
            callbacks: HashMap::new(),
            recovery: Arc::new(LogRecovery),
        }
    }

    /// Declares a phase at the end of the phase order.
    #[must_use]
    pub fn phase(mut self, phase: impl Into<String>) -> Self {
        self.table.add_phase(phase);
        self
    }

    /// Registers a direct transition.
    #[must_use]
    pub fn direct_transition(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.table.add_direct_transition(from, to);
        self
    }

    /// Merges every phase and transition of `table`.
    #[must_use]
    pub fn transitions(mut self, table: &TransitionTable) -> Self {
        for phase in table.phases() {
            self.table.add_phase(phase.as_str());
        }
        for (from, to) in table.transitions() {
            self.table.add_direct_transition(from, to);
        }
        self
    }

    /// Registers the callback for a phase. The last registration wins.
    #[must_use]
    pub fn callback(
        mut self,
        phase: impl Into<String>,
        callback: impl LifecycleCallback<O> + 'static,
    ) -> Self {
        self.callbacks.insert(phase.into(), Arc::new(callback));
        self
    }

    /// Replaces the connection-recovery hook.
    #[must_use]
    pub fn recovery(mut self, recovery: impl ConnectionRecovery + 'static) -> Self {
        self.recovery = Arc::new(recovery);
        self
    }

    /// Builds the manager around `object`, starting in the initial phase.
    pub fn build(self, object: Arc<O>) -> LifecycleManager<O> {
        debug!(
            manager = %self.id,
            phases = self.table.phases().len(),
            transitions = self.table.transition_count(),
            "lifecycle manager created"
        );
        LifecycleManager {
            id: self.id,
            object,
            table: self.table,
            callbacks: RwLock::new(self.callbacks),
            recovery: self.recovery,
            state: Mutex::new(PhaseState::initial()),
        }
    }
}
