//! # Strata Testkit
//!
//! Test utilities for Strata.
//!
//! This crate provides:
//! - A scriptable platform transaction manager, transaction and XA
//!   resource sharing one ordered call log
//! - Recording lifecycle objects and transactions
//! - Resources with identity-only equality for binding tests
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use strata_testkit::prelude::*;
//! use strata_tx::{Transaction, XaTransaction};
//!
//! let log = CallLog::new();
//! let tm = Arc::new(MockTransactionManager::new(log.clone()));
//! let tx = XaTransaction::new(tm);
//! tx.set_timeout(Duration::from_millis(5000));
//! tx.begin().unwrap();
//! assert!(log.called_before("tm.set_transaction_timeout(5)", "tm.begin"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod calls;
pub mod fixtures;
pub mod generators;
pub mod mocks;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::calls::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::mocks::*;
}

pub use calls::*;
pub use fixtures::*;
pub use generators::*;
pub use mocks::*;
