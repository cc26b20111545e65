//! Selector-based shared state
//!
//! See [`create_store`] for the entry point.

pub mod factory;
pub mod handle;
mod hook;
pub mod merge;

pub use factory::{create_store, create_store_with, FastStore, StoreConfig};
pub use handle::{
    Callback, Getter, Selector, Setter, StoreHandle, Unsubscribe, Update, WeakStoreHandle,
};
pub use merge::ShallowMerge;
