//! Property-based test generators using proptest.

use proptest::prelude::*;
use std::time::Duration;
use strata_lifecycle::phase::{DISPOSE, INITIALISE, START, STOP};
use strata_tx::TransactionStatus;

/// Every status a platform transaction can report.
pub const ALL_STATUSES: [TransactionStatus; 10] = [
    TransactionStatus::Active,
    TransactionStatus::MarkedRollback,
    TransactionStatus::Prepared,
    TransactionStatus::Committed,
    TransactionStatus::RolledBack,
    TransactionStatus::Unknown,
    TransactionStatus::NoTransaction,
    TransactionStatus::Preparing,
    TransactionStatus::Committing,
    TransactionStatus::RollingBack,
];

/// Strategy for one of the canonical phases.
pub fn canonical_phase_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![INITIALISE, START, STOP, DISPOSE])
}

/// Strategy for sequences of canonical phases.
pub fn phase_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<&'static str>> {
    prop::collection::vec(canonical_phase_strategy(), 0..=max_len)
}

/// Strategy for a platform transaction status.
pub fn status_strategy() -> impl Strategy<Value = TransactionStatus> {
    prop::sample::select(ALL_STATUSES.to_vec())
}

/// Strategy for scripted status sequences.
pub fn status_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<TransactionStatus>> {
    prop::collection::vec(status_strategy(), 1..=max_len.max(1))
}

/// Strategy for timeouts with millisecond precision, up to about three hours.
pub fn timeout_strategy() -> impl Strategy<Value = Duration> {
    (0u64..10_000_000).prop_map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn sequences_respect_length(seq in phase_sequence_strategy(8)) {
            prop_assert!(seq.len() <= 8);
        }

        #[test]
        fn status_sequences_are_never_empty(seq in status_sequence_strategy(5)) {
            prop_assert!(!seq.is_empty() && seq.len() <= 5);
        }
    }
}
