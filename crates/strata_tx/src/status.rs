//! Transaction status values.

use std::fmt;

/// Status of a platform transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
    /// Transaction is active and accepting work.
    Active,
    /// Transaction can only be rolled back.
    MarkedRollback,
    /// Every resource voted to commit.
    Prepared,
    /// Transaction has committed.
    Committed,
    /// Transaction has rolled back.
    RolledBack,
    /// Status cannot be determined.
    Unknown,
    /// No transaction is associated.
    NoTransaction,
    /// Prepare is in progress.
    Preparing,
    /// Commit is in progress.
    Committing,
    /// Rollback is in progress.
    RollingBack,
}

impl TransactionStatus {
    /// Returns true for the statuses that can only end in a rollback.
    #[must_use]
    pub const fn is_rollback_only(self) -> bool {
        matches!(self, Self::MarkedRollback | Self::RolledBack | Self::RollingBack)
    }

    /// Returns true once the transaction has committed or rolled back.
    #[must_use]
    pub const fn is_completed(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }

    /// Returns the status name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::MarkedRollback => "marked rollback",
            Self::Prepared => "prepared",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
            Self::Unknown => "unknown",
            Self::NoTransaction => "no transaction",
            Self::Preparing => "preparing",
            Self::Committing => "committing",
            Self::RollingBack => "rolling back",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
