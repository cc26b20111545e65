//! fastctx - selector-based shared state for component trees
//!
//! [`create_store`] takes an initial state and returns a [`FastStore`]: a
//! provider element that owns one store per mount, and a hook that lets any
//! descendant read a selected slice of that store. A component re-renders
//! only when its slice changes; the setter and getter handed out by the hook
//! never cause re-renders on their own.
//!
//! The crate also carries the small component runtime the store is built
//! on:
//!
//! - **Elements**: named render functions ([`Element`])
//! - **Hooks**: call-order state, refs and effects ([`Scope`])
//! - **Context**: ancestor-to-descendant values keyed by [`ContextKey`]
//! - **Runtime**: mount, re-render scheduling and unmount ([`Runtime`])
//!
//! # Example
//!
//! ```rust
//! use fastctx::{create_store, store_state, Element, Runtime};
//! use std::cell::{Cell, RefCell};
//! use std::rc::Rc;
//!
//! store_state! {
//!     #[derive(Clone, Debug, PartialEq)]
//!     pub struct Counter => CounterPatch {
//!         pub count: i32,
//!         pub label: String,
//!     }
//! }
//!
//! let store = create_store(Counter { count: 0, label: "clicks".into() });
//! let renders = Rc::new(Cell::new(0));
//! let setter = Rc::new(RefCell::new(None));
//!
//! let view = {
//!     let store = store.clone();
//!     let renders = renders.clone();
//!     let setter = setter.clone();
//!     Element::new("CountView", move |cx| {
//!         let (_count, set, _get) = store.use_store(cx, |s| s.count)?;
//!         renders.set(renders.get() + 1);
//!         *setter.borrow_mut() = Some(set);
//!         Ok(Vec::new())
//!     })
//! };
//!
//! let mut runtime = Runtime::new();
//! runtime.mount(store.provider(vec![view])).unwrap();
//! let set = setter.borrow().clone().unwrap();
//!
//! // `label` is not selected: no re-render
//! set.set(CounterPatch::default().label("taps"));
//! runtime.flush().unwrap();
//! assert_eq!(renders.get(), 1);
//!
//! set.set(CounterPatch::default().count(1));
//! runtime.flush().unwrap();
//! assert_eq!(renders.get(), 2);
//! ```

pub mod context;
pub mod element;
pub mod error;
pub mod runtime;
pub mod scope;
pub mod store;

pub use context::ContextKey;
pub use element::{Element, RenderFn};
pub use error::{Error, Result};
pub use runtime::{ComponentId, Runtime, RuntimeConfig, RuntimeStats};
pub use scope::{Cleanup, Scope, StateSetter};

// Re-export store types
pub use store::{
    create_store, create_store_with, Callback, FastStore, Getter, Selector, Setter, ShallowMerge,
    StoreConfig, StoreHandle, Unsubscribe, Update, WeakStoreHandle,
};
