//! The access hook: selector-based subscriptions to the nearest store

use std::rc::Rc;
use tracing::trace;

use super::factory::FastStore;
use super::handle::{Callback, Getter, Selector, Setter, StoreHandle};
use super::merge::ShallowMerge;
use crate::error::{Error, Result};
use crate::scope::{Cleanup, Scope};

impl<S> FastStore<S>
where
    S: ShallowMerge + Clone + 'static,
{
    /// Read a slice of the nearest store and subscribe to it
    ///
    /// Returns the selected value, the store's setter and its getter. The
    /// calling component re-renders after a store update only if `selector`
    /// now returns a value unequal to the one it holds.
    ///
    /// A closure passed here is a new selector on every render, so the
    /// subscription is renewed on every render. Use [`use_selector`] with a
    /// long-lived [`Selector`] to keep one subscription for the mount.
    ///
    /// Fails with [`Error::StoreNotFound`] when no provider from this factory
    /// encloses the component.
    ///
    /// [`use_selector`]: FastStore::use_selector
    pub fn use_store<T, F>(
        &self,
        cx: &mut Scope<'_>,
        selector: F,
    ) -> Result<(T, Setter<S>, Getter<S>)>
    where
        T: Clone + PartialEq + 'static,
        F: Fn(&S) -> T + 'static,
    {
        self.use_selector(cx, Selector::new(selector))
    }

    /// [`use_store`](FastStore::use_store) with a selector whose identity
    /// the caller controls
    pub fn use_selector<T>(
        &self,
        cx: &mut Scope<'_>,
        selector: Selector<S, T>,
    ) -> Result<(T, Setter<S>, Getter<S>)>
    where
        T: Clone + PartialEq + 'static,
    {
        let store = self.lookup(cx)?;

        let (value, set_value) = cx.use_state(|| selector.select(&store.get()))?;

        let deps = (store.id(), selector.id());
        let subscribed = store.clone();
        let component = cx.component_name();
        cx.use_effect(deps, move || {
            let source = subscribed.downgrade();
            let callback: Callback = Rc::new(move || {
                let Some(store) = source.upgrade() else {
                    return;
                };
                let next = selector.select(&store.get());
                trace!(store = store.name(), component, "selected slice recomputed");
                set_value.set(next);
            });
            let unsubscribe = subscribed.subscribe(callback);
            Some(Box::new(move || unsubscribe.unsubscribe()) as Cleanup)
        })?;

        Ok((value, Setter::new(store.clone()), Getter::new(store)))
    }

    /// Setter and getter of the nearest store, without selecting anything
    ///
    /// The returned value is `()`, so store updates never re-render the
    /// caller.
    pub fn use_store_unselected(&self, cx: &mut Scope<'_>) -> Result<((), Setter<S>, Getter<S>)> {
        self.use_selector(cx, self.shared.unselected.clone())
    }

    /// The nearest store's full handle, including `subscribe`
    ///
    /// Nothing is subscribed on the caller's behalf.
    pub fn use_handle(&self, cx: &Scope<'_>) -> Result<StoreHandle<S>> {
        self.lookup(cx)
    }

    /// Nearest store published by a provider of this factory
    fn lookup(&self, cx: &Scope<'_>) -> Result<StoreHandle<S>> {
        cx.use_context::<StoreHandle<S>>(self.shared.key)
            .map(|store| (*store).clone())
            .ok_or_else(|| Error::StoreNotFound {
                store: self.shared.name.to_string(),
            })
    }
}
