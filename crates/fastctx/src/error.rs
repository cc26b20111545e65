//! Error types for fastctx

use thiserror::Error;

/// Errors raised while rendering a component tree
///
/// Every variant is a programmer error: none of them can be produced by
/// state updates or subscriptions, only by how components are composed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// `use_store` was called by a component with no enclosing provider
    /// from the same store factory
    #[error("store not found: `{store}` has no provider above this component")]
    StoreNotFound { store: String },

    /// A component called its hooks in a different order (or a different
    /// number of them) than on its previous render
    #[error("hook order changed in `{component}` at slot {slot}")]
    HookMismatch {
        component: &'static str,
        slot: usize,
    },

    /// Renders kept scheduling further renders past the configured limit
    #[error("render loop: still dirty after {passes} flush passes")]
    RenderLoop { passes: usize },
}

/// Result type for fastctx operations
pub type Result<T> = std::result::Result<T, Error>;
