//! Resources bound to a transaction.

use crate::error::{PlatformResult, TransactionError, TxResult};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Object that can be bound to a transaction, or used as a binding key.
///
/// Keys are compared by identity, never by `Hash`/`Eq`. A key that wraps
/// another resource exposes it through [`Resource::held_object`]; the
/// innermost held object is the identity used for the binding, so every
/// wrapper around the same underlying resource resolves to one entry.
pub trait Resource: Send + Sync + 'static {
    /// Returns the wrapped resource, if this is a holder.
    fn held_object(&self) -> Option<Arc<dyn Resource>> {
        None
    }

    /// Releases the resource once the owning transaction has completed.
    fn release(&self) -> PlatformResult<()> {
        Ok(())
    }

    /// Returns the resource as [`Any`] for downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl dyn Resource {
    /// Downcasts to a concrete resource type.
    #[must_use]
    pub fn downcast_ref<T: Resource>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Resolves the binding identity of `key` by unwrapping held objects.
///
/// Holders that form a cycle have no innermost object; the member with the
/// lowest address stands in, so every entry point into the cycle resolves
/// to the same identity.
pub(crate) fn identity_of(key: &Arc<dyn Resource>) -> Arc<dyn Resource> {
    let mut chain = vec![Arc::clone(key)];
    let mut current = Arc::clone(key);
    while let Some(held) = current.held_object() {
        if let Some(start) = chain.iter().position(|seen| same_object(seen, &held)) {
            return chain.drain(start..).min_by_key(address).unwrap_or(current);
        }
        chain.push(Arc::clone(&held));
        current = held;
    }
    current
}

fn same_object(a: &Arc<dyn Resource>, b: &Arc<dyn Resource>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

fn address(resource: &Arc<dyn Resource>) -> usize {
    Arc::as_ptr(resource).cast::<()>() as usize
}

struct Binding {
    /// Resolved identity; holding it keeps the address from being reused.
    identity: Arc<dyn Resource>,
    resource: Arc<dyn Resource>,
}

/// Identity-keyed table of the resources bound to one transaction.
///
/// Entries are kept in binding order, which is also the release order.
#[derive(Default)]
pub struct ResourceBindings {
    entries: Vec<Binding>,
}

impl ResourceBindings {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `resource` under the identity of `key`.
    ///
    /// Fails if a resource is already bound under the same identity.
    pub fn bind(&mut self, key: &Arc<dyn Resource>, resource: Arc<dyn Resource>) -> TxResult<()> {
        let identity = identity_of(key);
        if self.position(&identity).is_some() {
            return Err(TransactionError::illegal_state(
                "a resource is already bound for this key",
            ));
        }
        self.entries.push(Binding { identity, resource });
        Ok(())
    }

    /// Returns true if a resource is bound under the identity of `key`.
    #[must_use]
    pub fn contains(&self, key: &Arc<dyn Resource>) -> bool {
        self.position(&identity_of(key)).is_some()
    }

    /// Returns the resource bound under the identity of `key`.
    #[must_use]
    pub fn get(&self, key: &Arc<dyn Resource>) -> Option<Arc<dyn Resource>> {
        self.position(&identity_of(key))
            .map(|index| Arc::clone(&self.entries[index].resource))
    }

    /// Removes the binding for `key` and returns the resource.
    pub fn unbind(&mut self, key: &Arc<dyn Resource>) -> Option<Arc<dyn Resource>> {
        let index = self.position(&identity_of(key))?;
        Some(self.entries.remove(index).resource)
    }

    /// Removes every binding, returning the resources in binding order.
    pub fn drain(&mut self) -> Vec<Arc<dyn Resource>> {
        self.entries.drain(..).map(|binding| binding.resource).collect()
    }

    /// Returns the number of bound resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, identity: &Arc<dyn Resource>) -> Option<usize> {
        self.entries
            .iter()
            .position(|binding| same_object(&binding.identity, identity))
    }
}

impl fmt::Debug for ResourceBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceBindings")
            .field("len", &self.entries.len())
            .finish()
    }
}
