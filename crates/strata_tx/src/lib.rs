//! # Strata Transactions
//!
//! Thread-scoped transaction coordination over an XA-capable platform
//! transaction manager.
//!
//! This crate provides:
//! - A per-thread registry of the current transaction with bind, unbind,
//!   suspend and resume
//! - Explicit capture and attach of a binding for cross-thread hand-off
//! - An XA transaction adapter that pushes timeouts to the transaction
//!   manager and to enlisted resources
//! - Identity-keyed resource binding that sees through resource holders
//! - A template that runs work under a transaction action
//!
//! The platform transaction manager is supplied by the embedding runtime
//! through the traits in [`platform`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod coordination;
mod error;
mod factory;
pub mod platform;
mod resource;
mod status;
mod template;
mod transaction;
mod xa;

pub use config::{TransactionAction, TransactionConfig};
pub use coordination::{AttachedContext, TransactionContext, TransactionCoordinator};
pub use error::{PlatformError, PlatformResult, TransactionError, TxResult};
pub use factory::{TransactionFactory, XaTransactionFactory};
pub use platform::{PlatformTransaction, PlatformTransactionManager, XaResource};
pub use resource::{Resource, ResourceBindings};
pub use status::TransactionStatus;
pub use template::TransactionTemplate;
pub use transaction::{new_transaction_id, Transaction};
pub use xa::{timeout_seconds, XaTransaction};
