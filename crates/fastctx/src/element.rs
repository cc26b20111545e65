//! Component descriptions
//!
//! An [`Element`] is what render functions return: a named render function
//! that the [`Runtime`](crate::Runtime) instantiates as a component. Elements
//! are cheap to clone, so a parent can hand the same children back on every
//! render.

use std::any::TypeId;
use std::fmt;
use std::rc::Rc;

use crate::error::Result;
use crate::scope::Scope;

/// Render function of a component
pub type RenderFn = dyn Fn(&mut Scope<'_>) -> Result<Vec<Element>>;

/// A component description (cheap to clone)
#[derive(Clone)]
pub struct Element {
    name: &'static str,
    /// Type of the render closure; two elements built from the same closure
    /// expression are the same component
    kind: TypeId,
    key: Option<u64>,
    render: Rc<RenderFn>,
}

impl Element {
    /// Create an element from a render function
    ///
    /// The render function receives the component's [`Scope`] and returns the
    /// component's children.
    pub fn new<F>(name: &'static str, render: F) -> Self
    where
        F: Fn(&mut Scope<'_>) -> Result<Vec<Element>> + 'static,
    {
        Self {
            name,
            kind: TypeId::of::<F>(),
            key: None,
            render: Rc::new(render),
        }
    }

    /// Attach a key; elements with different keys are never reconciled
    /// into the same component instance
    pub fn with_key(mut self, key: u64) -> Self {
        self.key = Some(key);
        self
    }

    /// Component name (used in logs and errors)
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Reconciliation key, if any
    pub fn key(&self) -> Option<u64> {
        self.key
    }

    /// Whether `other` describes the same component, so an existing
    /// instance can be re-rendered with it instead of being replaced
    pub(crate) fn same_component(&self, other: &Element) -> bool {
        self.kind == other.kind && self.key == other.key && self.name == other.name
    }

    pub(crate) fn render(&self, cx: &mut Scope<'_>) -> Result<Vec<Element>> {
        (self.render)(cx)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("name", &self.name)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &'static str) -> Element {
        Element::new(name, |_| Ok(Vec::new()))
    }

    #[test]
    fn test_same_closure_is_same_component() {
        assert!(leaf("a").same_component(&leaf("a")));
    }

    #[test]
    fn test_name_and_key_distinguish() {
        assert!(!leaf("a").same_component(&leaf("b")));
        assert!(!leaf("a").with_key(1).same_component(&leaf("a").with_key(2)));
        assert!(leaf("a").with_key(1).same_component(&leaf("a").with_key(1)));
    }

    #[test]
    fn test_different_closures_differ() {
        let a = Element::new("x", |_| Ok(Vec::new()));
        let b = Element::new("x", |_| Ok(vec![leaf("child")]));
        assert!(!a.same_component(&b));
    }
}
