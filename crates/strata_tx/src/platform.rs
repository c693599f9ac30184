//! Contracts of the platform transaction manager.
//!
//! The coordination layer never talks to a resource manager directly. It
//! drives a [`PlatformTransactionManager`], the [`PlatformTransaction`]s it
//! hands out, and the [`XaResource`]s enlisted in them.

use crate::error::PlatformResult;
use crate::status::TransactionStatus;
use std::sync::Arc;

// ============================================================================
// XA Flags (from X/Open XA specification)
// ============================================================================

/// No flags set.
pub const XA_TMNOFLAGS: i32 = 0x0000_0000;

/// Dissociate caller from transaction branch - successful.
pub const XA_TMSUCCESS: i32 = 0x0400_0000;

/// Dissociate caller from transaction branch - failed.
pub const XA_TMFAIL: i32 = 0x2000_0000;

/// Caller is suspending (not ending) its association with transaction branch.
pub const XA_TMSUSPEND: i32 = 0x0200_0000;

// ============================================================================
// XA Error Codes
// ============================================================================

/// A resource manager error occurred in the transaction branch.
pub const XAER_RMERR: i32 = -3;

/// The XID is not valid.
pub const XAER_NOTA: i32 = -4;

/// Invalid arguments were given.
pub const XAER_INVAL: i32 = -5;

/// Routine invoked in an improper context.
pub const XAER_PROTO: i32 = -6;

/// Resource manager unavailable.
pub const XAER_RMFAIL: i32 = -7;

/// Platform transaction manager.
///
/// Transactions are associated with the calling thread by the manager
/// itself; `transaction()` returns the one begun last on this thread.
pub trait PlatformTransactionManager: Send + Sync {
    /// Sets the timeout, in seconds, of transactions begun after this call.
    fn set_transaction_timeout(&self, seconds: u32) -> PlatformResult<()>;

    /// Begins a transaction on the calling thread.
    fn begin(&self) -> PlatformResult<()>;

    /// Returns the transaction associated with the calling thread.
    fn transaction(&self) -> PlatformResult<Option<Arc<dyn PlatformTransaction>>>;

    /// Dissociates the current transaction from the calling thread.
    fn suspend(&self) -> PlatformResult<Option<Arc<dyn PlatformTransaction>>>;

    /// Associates a previously suspended transaction with the calling thread.
    fn resume(&self, transaction: Arc<dyn PlatformTransaction>) -> PlatformResult<()>;
}

/// Transaction handed out by a [`PlatformTransactionManager`].
pub trait PlatformTransaction: Send + Sync {
    /// Returns the current status.
    fn status(&self) -> PlatformResult<TransactionStatus>;

    /// Commits the transaction.
    fn commit(&self) -> PlatformResult<()>;

    /// Rolls the transaction back.
    fn rollback(&self) -> PlatformResult<()>;

    /// Marks the transaction so that it can only be rolled back.
    fn set_rollback_only(&self) -> PlatformResult<()>;

    /// Enlists an XA resource. Returns false if the resource was not enlisted.
    fn enlist_resource(&self, resource: Arc<dyn XaResource>) -> PlatformResult<bool>;

    /// Delists an XA resource with one of the `XA_TM*` flags.
    fn delist_resource(&self, resource: Arc<dyn XaResource>, flag: i32) -> PlatformResult<bool>;
}

/// Resource participating in two-phase commit.
pub trait XaResource: Send + Sync {
    /// Sets the branch timeout in seconds. Returns false if the resource
    /// does not support it.
    fn set_transaction_timeout(&self, seconds: u32) -> PlatformResult<bool>;
}
