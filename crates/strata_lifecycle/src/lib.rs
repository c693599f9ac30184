//! # Strata Lifecycle
//!
//! Phase lifecycle state machine for managed components.
//!
//! This crate provides:
//! - An ordered phase set with a table of direct (one-step) transitions
//! - A manager that fires phases through registered callbacks, rejecting
//!   unknown, duplicate, re-entrant and non-direct transitions
//! - Failure bookkeeping that lets a failed phase be retried
//! - Replay of completed phases onto objects that join late
//! - The canonical initialise/start/stop/dispose manager
//! - An explicit registry of objects sharing one lifecycle
//!
//! ## Canonical graph
//!
//! ```text
//! not in lifecycle -> initialise | dispose
//! initialise       -> start | stop | dispose
//! start            -> stop
//! stop             -> start | dispose
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use strata_lifecycle::{phase, PhaseError, SimpleLifecycleManager};
//!
//! struct Connector;
//!
//! let lifecycle = SimpleLifecycleManager::new("connector", Arc::new(Connector));
//! let noop = |_: &str, _: &Connector| -> Result<(), PhaseError> { Ok(()) };
//!
//! lifecycle.fire_initialise_phase(&noop).unwrap();
//! lifecycle.fire_start_phase(&noop).unwrap();
//! assert!(lifecycle.is_started());
//! assert!(lifecycle.fire_start_phase(&noop).is_err());
//! assert_eq!(lifecycle.current_phase(), phase::START);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod callback;
mod error;
mod manager;
pub mod phase;
mod registry;
mod simple;
mod transition;

pub use callback::{ConnectionRecovery, LifecycleCallback, LogRecovery};
pub use error::{BoxError, LifecycleError, LifecycleResult, PhaseError};
pub use manager::{LifecycleManager, LifecycleManagerBuilder};
pub use registry::{LifecycleRegistry, ObjectSet};
pub use simple::SimpleLifecycleManager;
pub use transition::TransitionTable;
