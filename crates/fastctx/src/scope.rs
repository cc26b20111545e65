//! Render-time hook API
//!
//! Every render function receives a [`Scope`]. Hooks are identified by call
//! order: the n-th hook call on one render refers to the same slot as the
//! n-th call on the previous render. Changing the order (or count) of hook
//! calls between renders is reported as [`Error::HookMismatch`].
//!
//! ```ignore
//! Element::new("Counter", |cx| {
//!     let (count, set_count) = cx.use_state(|| 0)?;
//!     cx.use_effect(count, move || {
//!         tracing::info!(count, "count committed");
//!         None
//!     })?;
//!     Ok(Vec::new())
//! })
//! ```

use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::context::ContextKey;
use crate::error::{Error, Result};
use crate::runtime::{ComponentId, ComponentNode, PendingEffect, Scheduler};

/// Cleanup returned by an effect, run before the effect re-runs and on unmount
pub type Cleanup = Box<dyn FnOnce()>;

/// Shared cell holding an effect's pending cleanup
pub(crate) type Teardown = Rc<RefCell<Option<Cleanup>>>;

/// One hook's persistent storage
pub(crate) struct HookSlot {
    value: Box<dyn Any>,
    teardown: Option<Teardown>,
}

impl HookSlot {
    fn new<T: 'static>(value: T) -> Self {
        Self {
            value: Box::new(value),
            teardown: None,
        }
    }

    /// Run the pending cleanup, if any (component unmount)
    pub(crate) fn teardown(self) {
        let Some(teardown) = self.teardown else {
            return;
        };
        let cleanup = teardown.borrow_mut().take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }
    }
}

/// Storage of a `use_effect` slot
struct EffectSlot<D> {
    deps: Option<D>,
    cleanup: Teardown,
}

/// Render context handed to a component's render function
pub struct Scope<'a> {
    id: ComponentId,
    name: &'static str,
    parent: Option<ComponentId>,
    depth: u32,
    first_render: bool,
    hooks: Vec<HookSlot>,
    cursor: usize,
    /// Contexts published by this component during this render
    contexts: FxHashMap<ContextKey, Rc<dyn Any>>,
    nodes: &'a SlotMap<ComponentId, ComponentNode>,
    scheduler: &'a Rc<Scheduler>,
    effects: &'a mut Vec<PendingEffect>,
}

/// What the runtime needs to know to open a scope
pub(crate) struct ScopeInit {
    pub id: ComponentId,
    pub name: &'static str,
    pub parent: Option<ComponentId>,
    pub depth: u32,
    pub first_render: bool,
    pub hooks: Vec<HookSlot>,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(
        init: ScopeInit,
        nodes: &'a SlotMap<ComponentId, ComponentNode>,
        scheduler: &'a Rc<Scheduler>,
        effects: &'a mut Vec<PendingEffect>,
    ) -> Self {
        Self {
            id: init.id,
            name: init.name,
            parent: init.parent,
            depth: init.depth,
            first_render: init.first_render,
            hooks: init.hooks,
            cursor: 0,
            contexts: FxHashMap::default(),
            nodes,
            scheduler,
            effects,
        }
    }

    /// Id of the component being rendered
    pub fn component_id(&self) -> ComponentId {
        self.id
    }

    /// Name of the component being rendered
    pub fn component_name(&self) -> &'static str {
        self.name
    }

    /// Whether this is the component's first render
    pub fn is_first_render(&self) -> bool {
        self.first_render
    }

    // =========================================================================
    // HOOKS
    // =========================================================================

    /// A value created on first render and kept for the component's lifetime
    ///
    /// Later renders ignore `init` and return the same `Rc`.
    pub fn use_ref<T: 'static>(&mut self, init: impl FnOnce() -> T) -> Result<Rc<T>> {
        let value = self.hook::<Rc<T>>(|| HookSlot::new(Rc::new(init())))?;
        Ok(Rc::clone(value))
    }

    /// Reactive component state
    ///
    /// Returns the current value and a setter. Setting a value that compares
    /// unequal to the current one schedules a re-render of this component;
    /// setting an equal value does nothing.
    pub fn use_state<T>(&mut self, init: impl FnOnce() -> T) -> Result<(T, StateSetter<T>)>
    where
        T: Clone + PartialEq + 'static,
    {
        let component = self.id;
        let scheduler = Rc::downgrade(self.scheduler);
        let cell = self.hook::<Rc<RefCell<T>>>(|| HookSlot::new(Rc::new(RefCell::new(init()))))?;
        let value = cell.borrow().clone();
        let setter = StateSetter {
            cell: Rc::clone(cell),
            component,
            scheduler,
        };
        Ok((value, setter))
    }

    /// Run `effect` after this render commits, whenever `deps` changed
    ///
    /// The effect runs after the first render and after every render whose
    /// `deps` compare unequal to the previous ones. The cleanup it returns
    /// runs before the next run and when the component unmounts.
    pub fn use_effect<D, F>(&mut self, deps: D, effect: F) -> Result<()>
    where
        D: PartialEq + 'static,
        F: FnOnce() -> Option<Cleanup> + 'static,
    {
        let depth = self.depth;
        let slot = self.hook::<EffectSlot<D>>(|| {
            let cleanup = Teardown::default();
            HookSlot {
                value: Box::new(EffectSlot::<D> {
                    deps: None,
                    cleanup: Rc::clone(&cleanup),
                }),
                teardown: Some(cleanup),
            }
        })?;

        if slot.deps.as_ref() == Some(&deps) {
            return Ok(());
        }
        slot.deps = Some(deps);
        let teardown = Rc::clone(&slot.cleanup);

        self.effects.push(PendingEffect {
            depth,
            run: Box::new(move || {
                let previous = teardown.borrow_mut().take();
                if let Some(cleanup) = previous {
                    cleanup();
                }
                let next = effect();
                *teardown.borrow_mut() = next;
            }),
        });
        Ok(())
    }

    // =========================================================================
    // CONTEXT
    // =========================================================================

    /// Publish `value` to this component's descendants under `key`
    pub fn provide_context<C: 'static>(&mut self, key: ContextKey, value: Rc<C>) {
        self.contexts.insert(key, value);
    }

    /// Nearest value published under `key` by an ancestor
    ///
    /// A component never sees its own published values.
    pub fn use_context<C: 'static>(&self, key: ContextKey) -> Option<Rc<C>> {
        let mut cursor = self.parent;
        while let Some(id) = cursor {
            let node = self.nodes.get(id)?;
            if let Some(value) = node.contexts.get(&key) {
                return Rc::clone(value).downcast::<C>().ok();
            }
            cursor = node.parent;
        }
        None
    }

    // =========================================================================
    // INTERNAL
    // =========================================================================

    /// Next hook slot, created with `init` on first render
    fn hook<T: 'static>(&mut self, init: impl FnOnce() -> HookSlot) -> Result<&mut T> {
        let component = self.name;
        let slot = self.cursor;
        self.cursor += 1;

        if slot == self.hooks.len() && self.first_render {
            self.hooks.push(init());
        }

        self.hooks
            .get_mut(slot)
            .and_then(|hook| hook.value.downcast_mut::<T>())
            .ok_or(Error::HookMismatch { component, slot })
    }

    /// Check the hook count after a successful render
    pub(crate) fn finish(&self) -> Result<()> {
        if !self.first_render && self.cursor != self.hooks.len() {
            return Err(Error::HookMismatch {
                component: self.name,
                slot: self.cursor,
            });
        }
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (Vec<HookSlot>, FxHashMap<ContextKey, Rc<dyn Any>>) {
        (self.hooks, self.contexts)
    }
}

/// Setter returned by [`Scope::use_state`]
///
/// Stays valid after the component unmounts; setting then only updates the
/// orphaned cell.
pub struct StateSetter<T> {
    cell: Rc<RefCell<T>>,
    component: ComponentId,
    scheduler: Weak<Scheduler>,
}

impl<T> Clone for StateSetter<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
            component: self.component,
            scheduler: Weak::clone(&self.scheduler),
        }
    }
}

impl<T: PartialEq> StateSetter<T> {
    /// Store `value`, scheduling a re-render if it differs from the current one
    pub fn set(&self, value: T) {
        {
            let mut current = self.cell.borrow_mut();
            if *current == value {
                return;
            }
            *current = value;
        }
        if let Some(scheduler) = self.scheduler.upgrade() {
            scheduler.schedule(self.component);
        }
    }

    /// Compute the next value from the current one
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.cell.borrow());
        self.set(next);
    }

    /// Current value without subscribing to anything
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.cell.borrow().clone()
    }
}
