//! Context keys for ancestor-to-descendant value propagation
//!
//! A component publishes a value under a [`ContextKey`] with
//! [`Scope::provide_context`](crate::Scope::provide_context); any descendant
//! reads the nearest published value with
//! [`Scope::use_context`](crate::Scope::use_context).
//!
//! Keys carry the value's [`TypeId`] plus an instance number, so several
//! independent contexts of the same type can coexist in one tree.

use std::any::TypeId;
use std::sync::atomic::{AtomicU64, Ordering};

/// Instance counter for [`ContextKey::unique`]. Zero is reserved for
/// [`ContextKey::of`].
static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Key identifying a context value in the component tree
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextKey {
    /// Type of the published value
    type_id: TypeId,
    /// Distinguishes contexts of the same type (0 = the type's shared key)
    instance: u64,
}

impl ContextKey {
    /// The shared key for values of type `C`
    pub fn of<C: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            instance: 0,
        }
    }

    /// A fresh key for values of type `C`, distinct from every other key
    pub fn unique<C: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Instance number of this key
    pub fn instance(&self) -> u64 {
        self.instance
    }
}
