//! Transaction demarcation configuration.

use crate::factory::TransactionFactory;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// What a [`TransactionTemplate`](crate::TransactionTemplate) does with
/// transactions around the work it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransactionAction {
    /// Run the work as is, whatever is bound.
    #[default]
    Indifferent,
    /// Fail if a transaction is bound.
    Never,
    /// Run the work outside any transaction.
    None,
    /// Always run the work in a new transaction.
    AlwaysBegin,
    /// Join the bound transaction, or begin a new one.
    BeginOrJoin,
    /// Join the bound transaction; fail if there is none.
    AlwaysJoin,
    /// Join the bound transaction if there is one.
    JoinIfPossible,
}

impl TransactionAction {
    /// Returns the action name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Indifferent => "INDIFFERENT",
            Self::Never => "NEVER",
            Self::None => "NONE",
            Self::AlwaysBegin => "ALWAYS_BEGIN",
            Self::BeginOrJoin => "BEGIN_OR_JOIN",
            Self::AlwaysJoin => "ALWAYS_JOIN",
            Self::JoinIfPossible => "JOIN_IF_POSSIBLE",
        }
    }
}

impl fmt::Display for TransactionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a [`TransactionTemplate`](crate::TransactionTemplate).
#[derive(Clone, Default)]
pub struct TransactionConfig {
    /// Action taken around the work.
    pub action: TransactionAction,

    /// Timeout of transactions begun by the template.
    pub timeout: Option<Duration>,

    /// Whether to join a transaction begun outside this layer when
    /// nothing is bound.
    pub interact_with_external: bool,

    /// Factory used to begin and join transactions.
    pub factory: Option<Arc<dyn TransactionFactory>>,
}

impl TransactionConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the action.
    #[must_use]
    pub fn action(mut self, action: TransactionAction) -> Self {
        self.action = action;
        self
    }

    /// Sets the timeout of transactions begun by the template.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets whether to join external transactions.
    #[must_use]
    pub fn interact_with_external(mut self, value: bool) -> Self {
        self.interact_with_external = value;
        self
    }

    /// Sets the transaction factory.
    #[must_use]
    pub fn factory(mut self, factory: Arc<dyn TransactionFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Returns true if the action may begin a transaction.
    #[must_use]
    pub const fn may_begin(&self) -> bool {
        matches!(
            self.action,
            TransactionAction::AlwaysBegin | TransactionAction::BeginOrJoin
        )
    }

    /// Returns true if the factory creates real transactions.
    #[must_use]
    pub fn is_transacted(&self) -> bool {
        self.action != TransactionAction::None
            && self
                .factory
                .as_ref()
                .is_some_and(|factory| factory.is_transacted())
    }
}

impl fmt::Debug for TransactionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionConfig")
            .field("action", &self.action)
            .field("timeout", &self.timeout)
            .field("interact_with_external", &self.interact_with_external)
            .field("factory", &self.factory.is_some())
            .finish()
    }
}
