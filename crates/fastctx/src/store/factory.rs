//! Store factory
//!
//! [`create_store`] captures an initial state and returns a [`FastStore`]:
//! the provider/hook pair for one independent store type.
//!
//! - [`FastStore::provider`] wraps a subtree; every mount of it owns a fresh
//!   store seeded with a clone of the initial state
//! - [`FastStore::use_store`] lets any descendant read a selected slice and
//!   re-render only when that slice changes
//!
//! Stores live per provider mount, never at process scope: two providers
//! from the same factory are fully isolated, and so are two factories over
//! the same state type.

use std::borrow::Cow;
use std::rc::Rc;
use tracing::debug;

use super::handle::{Selector, StoreHandle};
use super::merge::ShallowMerge;
use crate::context::ContextKey;
use crate::element::Element;

/// Store configuration
#[derive(Clone, Debug, Default)]
pub struct StoreConfig {
    /// Name used in logs and in [`Error::StoreNotFound`](crate::Error::StoreNotFound)
    ///
    /// `None` names the store after its state type.
    pub name: Option<Cow<'static, str>>,
}

impl StoreConfig {
    /// Default configuration, named after the state type
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the store name
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }
}

pub(crate) struct FactoryShared<S> {
    pub(crate) initial: S,
    pub(crate) key: ContextKey,
    pub(crate) name: Rc<str>,
    /// Shared by every unselected hook call, so its identity never changes
    pub(crate) unselected: Selector<S, ()>,
}

/// Provider/hook pair created by [`create_store`] (cheap to clone)
pub struct FastStore<S> {
    pub(crate) shared: Rc<FactoryShared<S>>,
}

impl<S> Clone for FastStore<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

/// Create a store factory seeded with `initial`
pub fn create_store<S>(initial: S) -> FastStore<S>
where
    S: ShallowMerge + Clone + 'static,
{
    create_store_with(initial, StoreConfig::default())
}

/// Create a store factory with a custom configuration
pub fn create_store_with<S>(initial: S, config: StoreConfig) -> FastStore<S>
where
    S: ShallowMerge + Clone + 'static,
{
    let name: Rc<str> = match config.name {
        Some(name) => Rc::from(name.as_ref()),
        None => Rc::from(std::any::type_name::<S>()),
    };
    let key = ContextKey::unique::<StoreHandle<S>>();
    debug!(store = %name, instance = key.instance(), "store factory created");
    FastStore {
        shared: Rc::new(FactoryShared {
            initial,
            key,
            name,
            unselected: Selector::new(|_: &S| ()),
        }),
    }
}

impl<S> FastStore<S>
where
    S: ShallowMerge + Clone + 'static,
{
    /// Provider element wrapping `children`
    ///
    /// Each mount creates one store, kept for the lifetime of the mount and
    /// published to every descendant. Renders `children` unchanged.
    pub fn provider(&self, children: Vec<Element>) -> Element {
        let shared = Rc::clone(&self.shared);
        Element::new("StoreProvider", move |cx| {
            let store = cx.use_ref(|| {
                debug!(store = %shared.name, "provider mounted");
                StoreHandle::new(Rc::clone(&shared.name), shared.initial.clone())
            })?;
            cx.provide_context(shared.key, store);
            Ok(children.clone())
        })
        .with_key(self.shared.key.instance())
    }

    /// Name of the stores this factory creates
    pub fn name(&self) -> &str {
        &self.shared.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use std::cell::RefCell;

    crate::store_state! {
        #[derive(Clone, Debug, PartialEq)]
        struct Settings => SettingsPatch {
            theme: String,
        }
    }

    fn settings() -> Settings {
        Settings {
            theme: "light".into(),
        }
    }

    #[test]
    fn test_default_name_is_type_name() {
        let store = create_store(settings());
        assert!(store.name().ends_with("Settings"));

        let unnamed = create_store_with(settings(), StoreConfig::new());
        assert_eq!(unnamed.name(), store.name());

        let named = create_store_with(settings(), StoreConfig::new().name("settings"));
        assert_eq!(named.name(), "settings");
    }

    #[test]
    fn test_provider_publishes_one_store_per_mount() {
        let store = create_store(settings());
        let seen: Rc<RefCell<Vec<StoreHandle<Settings>>>> = Rc::new(RefCell::new(Vec::new()));

        let key = store.shared.key;
        let viewer_seen = seen.clone();
        let viewer = Element::new("Viewer", move |cx| {
            if let Some(handle) = cx.use_context::<StoreHandle<Settings>>(key) {
                viewer_seen.borrow_mut().push((*handle).clone());
            }
            Ok(Vec::new())
        });

        let mut runtime = Runtime::new();
        runtime
            .mount(Element::new("Root", {
                let left = store.provider(vec![viewer.clone()]);
                let right = store.provider(vec![viewer]);
                move |_| Ok(vec![left.clone(), right.clone()])
            }))
            .unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert!(!seen[0].ptr_eq(&seen[1]));
        assert_eq!(seen[0].get(), settings());
    }
}
