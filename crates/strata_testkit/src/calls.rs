//! Shared, ordered record of calls made on test doubles.

use parking_lot::Mutex;
use std::sync::Arc;

/// Ordered log of calls, shared by every double created from it.
///
/// Cloning a log yields a handle to the same entries, so the call order
/// across a transaction manager, its transactions and XA resources can be
/// asserted in one place.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a call.
    pub fn record(&self, call: impl Into<String>) {
        self.entries.lock().push(call.into());
    }

    /// Returns every call in order.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Returns the index of the first occurrence of `call`.
    #[must_use]
    pub fn position(&self, call: &str) -> Option<usize> {
        self.entries.lock().iter().position(|entry| entry == call)
    }

    /// Returns how many times `call` was recorded.
    #[must_use]
    pub fn count(&self, call: &str) -> usize {
        self.entries.lock().iter().filter(|entry| *entry == call).count()
    }

    /// Returns true if `first` was recorded before `second`.
    #[must_use]
    pub fn called_before(&self, first: &str, second: &str) -> bool {
        match (self.position(first), self.position(second)) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        }
    }

    /// Forgets every call.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_entries() {
        let log = CallLog::new();
        let other = log.clone();
        log.record("a");
        other.record("b");
        log.record("a");

        assert_eq!(log.entries(), vec!["a", "b", "a"]);
        assert_eq!(other.count("a"), 2);
        assert!(log.called_before("a", "b"));
        assert!(!log.called_before("b", "a"));
        assert!(!log.called_before("a", "missing"));

        other.clear();
        assert!(log.entries().is_empty());
    }
}
