//! Phase order and direct-transition table.

use crate::phase::{DISPOSE, INITIALISE, NOT_IN_LIFECYCLE, START, STOP};
use std::collections::{HashMap, HashSet};

/// Ordered phase set plus the directed graph of legal one-step transitions.
///
/// The table is built once and never mutated after the manager that owns it
/// is constructed. Phase order is declaration order: phases named only by a
/// transition are appended when first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionTable {
    phases: Vec<String>,
    direct: HashMap<String, HashSet<String>>,
}

impl TransitionTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the canonical table used for short-lived single-object lifecycles.
    ///
    /// ```text
    /// not in lifecycle -> initialise | dispose
    /// initialise       -> start | stop | dispose
    /// start            -> stop
    /// stop             -> start | dispose
    /// ```
    #[must_use]
    pub fn canonical() -> Self {
        let mut table = Self::new();
        for phase in [NOT_IN_LIFECYCLE, INITIALISE, START, STOP, DISPOSE] {
            table.add_phase(phase);
        }
        table.add_direct_transition(NOT_IN_LIFECYCLE, INITIALISE);
        table.add_direct_transition(NOT_IN_LIFECYCLE, DISPOSE);
        table.add_direct_transition(INITIALISE, START);
        // An object that failed to start stays initialised while the container stops.
        table.add_direct_transition(INITIALISE, STOP);
        table.add_direct_transition(INITIALISE, DISPOSE);
        table.add_direct_transition(START, STOP);
        table.add_direct_transition(STOP, START);
        table.add_direct_transition(STOP, DISPOSE);
        table
    }

    /// Declares a phase; re-declaring keeps the original position.
    pub fn add_phase(&mut self, phase: impl Into<String>) {
        let phase = phase.into();
        if !self.contains(&phase) {
            self.phases.push(phase);
        }
    }

    /// Registers `to` as reachable from `from` in one step.
    pub fn add_direct_transition(&mut self, from: impl Into<String>, to: impl Into<String>) {
        let from = from.into();
        let to = to.into();
        self.add_phase(from.clone());
        self.add_phase(to.clone());
        self.direct.entry(from).or_default().insert(to);
    }

    /// Returns true if the phase has been declared.
    #[must_use]
    pub fn contains(&self, phase: &str) -> bool {
        self.phases.iter().any(|p| p == phase)
    }

    /// Returns the position of a phase in declaration order.
    #[must_use]
    pub fn index_of(&self, phase: &str) -> Option<usize> {
        self.phases.iter().position(|p| p == phase)
    }

    /// Returns the phases in declaration order.
    #[must_use]
    pub fn phases(&self) -> &[String] {
        &self.phases
    }

    /// Returns true if `to` is a direct transition from `from`.
    #[must_use]
    pub fn is_direct(&self, from: &str, to: &str) -> bool {
        self.direct
            .get(from)
            .is_some_and(|targets| targets.contains(to))
    }

    /// Returns the direct targets of `from`, in phase declaration order.
    #[must_use]
    pub fn targets_of(&self, from: &str) -> Vec<&str> {
        self.phases
            .iter()
            .filter(|to| self.is_direct(from, to))
            .map(String::as_str)
            .collect()
    }

    /// Returns every direct transition, grouped by source in phase order.
    pub fn transitions(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.phases.iter().flat_map(move |from| {
            self.targets_of(from)
                .into_iter()
                .map(move |to| (from.as_str(), to))
        })
    }

    /// Returns the number of registered direct transitions.
    #[must_use]
    pub fn transition_count(&self) -> usize {
        self.direct.values().map(HashSet::len).sum()
    }
}
