//! Explicit registry of lifecycle-managed objects.

use crate::callback::LifecycleCallback;
use crate::error::{LifecycleResult, PhaseError};
use crate::manager::LifecycleManager;
use crate::transition::TransitionTable;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Named objects sharing one lifecycle, in registration order.
pub struct ObjectSet<O: ?Sized> {
    entries: RwLock<Vec<(String, Arc<O>)>>,
}

impl<O: ?Sized> ObjectSet<O> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    fn single(name: &str, object: Arc<O>) -> Self {
        Self {
            entries: RwLock::new(vec![(name.to_string(), object)]),
        }
    }

    /// Returns the registered objects without holding the lock.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, Arc<O>)> {
        self.entries.read().clone()
    }

    /// Returns the number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if no object is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Applies a per-object callback to every member of an [`ObjectSet`].
struct EachObject<C>(C);

impl<O, C> LifecycleCallback<ObjectSet<O>> for EachObject<C>
where
    O: ?Sized,
    C: LifecycleCallback<O>,
{
    fn on_transition(&self, phase: &str, set: &ObjectSet<O>) -> Result<(), PhaseError> {
        for (_, object) in set.snapshot() {
            self.0.on_transition(phase, &object)?;
        }
        Ok(())
    }
}

/// Registry owning a lifecycle and the objects that follow it.
///
/// There is no process-wide instance; the embedding application creates one
/// and passes it to whatever needs it. Objects registered after some phases
/// have completed are brought up to the same point before they join.
pub struct LifecycleRegistry<O: ?Sized> {
    manager: LifecycleManager<ObjectSet<O>>,
}

impl<O: ?Sized + 'static> LifecycleRegistry<O> {
    /// Creates an empty registry over `table`.
    pub fn new(id: impl Into<String>, table: &TransitionTable) -> Self {
        Self {
            manager: LifecycleManager::builder(id)
                .transitions(table)
                .build(Arc::new(ObjectSet::new())),
        }
    }

    /// Sets the callback applied to each registered object for `phase`.
    pub fn on_phase(
        &self,
        phase: impl Into<String>,
        callback: impl LifecycleCallback<O> + 'static,
    ) {
        self.manager
            .register_lifecycle_callback(phase, EachObject(callback));
    }

    /// Registers `object` under `name`, replaying the completed phases on it first.
    ///
    /// Returns the object previously registered under the same name. The
    /// object is not registered if the replay fails.
    pub fn register(&self, name: &str, object: Arc<O>) -> LifecycleResult<Option<Arc<O>>> {
        self.manager
            .apply_completed_phases(&ObjectSet::single(name, Arc::clone(&object)))?;

        let mut entries = self.manager.object().entries.write();
        let previous = match entries.iter().position(|(n, _)| n == name) {
            Some(index) => Some(std::mem::replace(&mut entries[index].1, object)),
            None => {
                entries.push((name.to_string(), object));
                None
            }
        };
        debug!(registry = %self.manager.id(), name, "object registered");
        Ok(previous)
    }

    /// Removes the object registered under `name`.
    pub fn unregister(&self, name: &str) -> Option<Arc<O>> {
        let mut entries = self.manager.object().entries.write();
        let index = entries.iter().position(|(n, _)| n == name)?;
        debug!(registry = %self.manager.id(), name, "object unregistered");
        Some(entries.remove(index).1)
    }

    /// Removes every object. The lifecycle state is kept.
    pub fn clear(&self) {
        self.manager.object().entries.write().clear();
    }

    /// Looks up an object by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<O>> {
        self.manager
            .object()
            .entries
            .read()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, object)| Arc::clone(object))
    }

    /// Returns the number of registered objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.manager.object().len()
    }

    /// Returns true if no object is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.manager.object().is_empty()
    }

    /// Fires `phase` on every registered object, in registration order.
    pub fn fire_lifecycle(&self, phase: &str) -> LifecycleResult<()> {
        self.manager.fire_lifecycle(phase)
    }

    /// Returns the underlying manager.
    #[must_use]
    pub fn manager(&self) -> &LifecycleManager<ObjectSet<O>> {
        &self.manager
    }
}
