//! Store handle: the {get, set, subscribe} surface of one provider instance
//!
//! A [`StoreHandle`] owns one state cell and one subscriber registry. Reads
//! and writes never re-render anything by themselves; components observe
//! changes only through subscriptions (see [`FastStore::use_store`]).
//!
//! [`FastStore::use_store`]: crate::FastStore::use_store

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

use super::merge::ShallowMerge;

/// Change-notification callback
pub type Callback = Rc<dyn Fn()>;

/// Subscriber registry keyed by callback allocation, in registration order
type SubscriberSet = IndexMap<usize, Callback, FxBuildHasher>;

/// Registry key of a callback: the address of its allocation
fn identity(callback: &Callback) -> usize {
    Rc::as_ptr(callback) as *const () as usize
}

/// A state update: a patch, or a function producing one from the current state
pub enum Update<S: ShallowMerge> {
    Patch(S::Patch),
    With(Box<dyn FnOnce(&S) -> S::Patch>),
}

impl<S: ShallowMerge> Update<S> {
    /// Updater form
    pub fn with(f: impl FnOnce(&S) -> S::Patch + 'static) -> Self {
        Update::With(Box::new(f))
    }
}

struct StoreInner<S> {
    name: Rc<str>,
    state: RefCell<S>,
    subscribers: Rc<RefCell<SubscriberSet>>,
}

/// Shared handle to one store instance (cheap to clone)
pub struct StoreHandle<S> {
    inner: Rc<StoreInner<S>>,
}

impl<S> Clone for StoreHandle<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S> StoreHandle<S> {
    /// Create a store holding `initial`
    pub fn new(name: impl Into<Rc<str>>, initial: S) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                name: name.into(),
                state: RefCell::new(initial),
                subscribers: Rc::new(RefCell::new(SubscriberSet::default())),
            }),
        }
    }

    /// Store name (from its factory configuration)
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Identity of this store instance
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    /// Whether both handles refer to the same store instance
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Non-owning handle to this store
    pub fn downgrade(&self) -> WeakStoreHandle<S> {
        WeakStoreHandle {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Current state (cloned)
    pub fn get(&self) -> S
    where
        S: Clone,
    {
        self.inner.state.borrow().clone()
    }

    /// Read the current state without cloning it
    ///
    /// The state stays borrowed while `f` runs, so `f` must not update this
    /// store. Use [`get`](Self::get) when it might.
    pub fn with<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.inner.state.borrow())
    }

    /// Register `callback` to run after every update
    ///
    /// Registering the same `Rc` twice keeps a single entry. The callback
    /// stays registered until [`Unsubscribe::unsubscribe`] is called;
    /// dropping the returned value does not unsubscribe.
    pub fn subscribe(&self, callback: Callback) -> Unsubscribe {
        let key = identity(&callback);
        let mut subscribers = self.inner.subscribers.borrow_mut();
        subscribers.entry(key).or_insert_with(|| Rc::clone(&callback));
        debug!(
            store = %self.inner.name,
            subscribers = subscribers.len(),
            "subscribed"
        );
        Unsubscribe {
            registry: Rc::downgrade(&self.inner.subscribers),
            callback,
        }
    }

    /// Number of registered callbacks
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    /// Run every callback registered right now, in registration order
    ///
    /// Callbacks removed by an earlier callback in the same pass are skipped;
    /// callbacks added during the pass wait for the next one.
    fn notify(&self) {
        let snapshot: SmallVec<[Callback; 8]> =
            self.inner.subscribers.borrow().values().cloned().collect();
        trace!(store = %self.inner.name, subscribers = snapshot.len(), "notify");

        for callback in snapshot {
            let registered = self
                .inner
                .subscribers
                .borrow()
                .contains_key(&identity(&callback));
            if registered {
                callback();
            }
        }
    }
}

impl<S: ShallowMerge> StoreHandle<S> {
    /// Merge `patch` into the state, then notify subscribers
    pub fn set(&self, patch: S::Patch) {
        trace!(store = %self.inner.name, "set");
        self.inner.state.borrow_mut().merge(patch);
        self.notify();
    }

    /// Merge the patch computed from the current state, then notify
    ///
    /// `f` sees the state as it is at call time, including every earlier
    /// update. It runs on a snapshot, so it may itself update this store;
    /// its patch is merged after those updates.
    pub fn set_with(&self, f: impl FnOnce(&S) -> S::Patch)
    where
        S: Clone,
    {
        let current = self.get();
        let patch = f(&current);
        self.set(patch);
    }

    /// Apply either form of update
    pub fn apply(&self, update: Update<S>)
    where
        S: Clone,
    {
        match update {
            Update::Patch(patch) => self.set(patch),
            Update::With(f) => self.set_with(f),
        }
    }
}

impl<S> fmt::Debug for StoreHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("name", &self.inner.name)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Non-owning handle, used by subscriptions so they don't keep a store alive
pub struct WeakStoreHandle<S> {
    inner: Weak<StoreInner<S>>,
}

impl<S> Clone for WeakStoreHandle<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<S> WeakStoreHandle<S> {
    /// The store, if it is still mounted
    pub fn upgrade(&self) -> Option<StoreHandle<S>> {
        self.inner.upgrade().map(|inner| StoreHandle { inner })
    }
}

/// Removes one subscription when invoked
#[must_use = "dropping an Unsubscribe leaves the callback registered"]
pub struct Unsubscribe {
    registry: Weak<RefCell<SubscriberSet>>,
    /// Held so the callback's address cannot be reused while this exists
    callback: Callback,
}

impl Unsubscribe {
    /// Remove the callback. Calling this again is a no-op.
    pub fn unsubscribe(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut subscribers = registry.borrow_mut();
        if subscribers.shift_remove(&identity(&self.callback)).is_some() {
            debug!(subscribers = subscribers.len(), "unsubscribed");
        }
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("callback", &identity(&self.callback))
            .finish_non_exhaustive()
    }
}

/// The store's setter, as returned by `use_store` (stable across renders)
pub struct Setter<S> {
    store: StoreHandle<S>,
}

impl<S> Setter<S> {
    pub(crate) fn new(store: StoreHandle<S>) -> Self {
        Self { store }
    }

    /// Whether both setters write to the same store instance
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.store.ptr_eq(&other.store)
    }
}

impl<S: ShallowMerge> Setter<S> {
    /// See [`StoreHandle::set`]
    pub fn set(&self, patch: S::Patch) {
        self.store.set(patch);
    }

    /// See [`StoreHandle::set_with`]
    pub fn set_with(&self, f: impl FnOnce(&S) -> S::Patch)
    where
        S: Clone,
    {
        self.store.set_with(f);
    }

    /// See [`StoreHandle::apply`]
    pub fn apply(&self, update: Update<S>)
    where
        S: Clone,
    {
        self.store.apply(update);
    }
}

/// The store's getter, as returned by `use_store` (stable across renders)
///
/// Reading through a getter never subscribes.
pub struct Getter<S> {
    store: StoreHandle<S>,
}

impl<S> Getter<S> {
    pub(crate) fn new(store: StoreHandle<S>) -> Self {
        Self { store }
    }

    /// See [`StoreHandle::get`]
    pub fn get(&self) -> S
    where
        S: Clone,
    {
        self.store.get()
    }

    /// See [`StoreHandle::with`]
    pub fn with<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        self.store.with(f)
    }

    /// Whether both getters read the same store instance
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.store.ptr_eq(&other.store)
    }
}

macro_rules! impl_identity_traits {
    ($($ty:ident),*) => {
        $(
            impl<S> Clone for $ty<S> {
                fn clone(&self) -> Self {
                    Self { store: self.store.clone() }
                }
            }

            impl<S> PartialEq for $ty<S> {
                fn eq(&self, other: &Self) -> bool {
                    self.ptr_eq(other)
                }
            }

            impl<S> Eq for $ty<S> {}

            impl<S> fmt::Debug for $ty<S> {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.debug_tuple(stringify!($ty)).field(&self.store.name()).finish()
                }
            }
        )*
    };
}

impl_identity_traits!(Setter, Getter);

/// A state projection with a stable identity
///
/// Clones share identity. Building a new `Selector` (or passing a closure
/// straight to `use_store`) creates a new identity, which makes the hook
/// re-subscribe.
pub struct Selector<S, T> {
    f: Rc<dyn Fn(&S) -> T>,
}

impl<S, T> Selector<S, T> {
    /// Wrap `f` in a new selector identity
    pub fn new(f: impl Fn(&S) -> T + 'static) -> Self {
        Self { f: Rc::new(f) }
    }

    /// Apply the projection
    pub fn select(&self, state: &S) -> T {
        (self.f)(state)
    }

    /// Identity of this selector
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.f) as *const () as usize
    }
}

impl<S, T> Clone for Selector<S, T> {
    fn clone(&self) -> Self {
        Self {
            f: Rc::clone(&self.f),
        }
    }
}

impl<S, T, F> From<F> for Selector<S, T>
where
    F: Fn(&S) -> T + 'static,
{
    fn from(f: F) -> Self {
        Self::new(f)
    }
}
