//! Component tree runtime
//!
//! The runtime owns every mounted component, renders them, and commits their
//! effects:
//!
//! - **Mount**: [`Runtime::mount`] renders a root element and its whole subtree
//! - **Re-render**: state setters only queue their component; [`Runtime::flush`]
//!   re-renders queued components (parents first) until nothing is dirty
//! - **Effects**: run after each render pass commits, children before parents
//! - **Unmount**: effect cleanups run for the removed subtree, children first
//!
//! Children are reconciled by position: the i-th element returned by a render
//! updates the i-th existing child when both describe the same component,
//! otherwise the old child is unmounted and a new one mounted.

use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, trace};

use crate::context::ContextKey;
use crate::element::Element;
use crate::error::{Error, Result};
use crate::scope::{HookSlot, Scope, ScopeInit};

new_key_type! {
    /// Unique identifier for a mounted component
    pub struct ComponentId;
}

/// A mounted component
pub(crate) struct ComponentNode {
    pub(crate) element: Element,
    pub(crate) parent: Option<ComponentId>,
    pub(crate) children: SmallVec<[ComponentId; 4]>,
    pub(crate) hooks: Vec<HookSlot>,
    /// Contexts published by this component on its last render
    pub(crate) contexts: FxHashMap<ContextKey, Rc<dyn Any>>,
    pub(crate) depth: u32,
    pub(crate) render_count: u64,
}

/// Effect queued during a render pass
pub(crate) struct PendingEffect {
    pub(crate) depth: u32,
    pub(crate) run: Box<dyn FnOnce()>,
}

/// Queue of components waiting for a re-render
#[derive(Default)]
pub(crate) struct Scheduler {
    dirty: RefCell<SmallVec<[ComponentId; 8]>>,
}

impl Scheduler {
    pub(crate) fn schedule(&self, id: ComponentId) {
        let mut dirty = self.dirty.borrow_mut();
        if !dirty.contains(&id) {
            trace!(?id, "component scheduled");
            dirty.push(id);
        }
    }

    fn take(&self) -> SmallVec<[ComponentId; 8]> {
        std::mem::take(&mut *self.dirty.borrow_mut())
    }

    fn len(&self) -> usize {
        self.dirty.borrow().len()
    }
}

/// Runtime configuration
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Maximum number of render passes one [`Runtime::flush`] may run before
    /// giving up with [`Error::RenderLoop`]
    pub max_flush_passes: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_flush_passes: 50,
        }
    }
}

impl RuntimeConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the limit on consecutive render passes in one flush
    pub fn max_flush_passes(mut self, passes: usize) -> Self {
        self.max_flush_passes = passes;
        self
    }
}

/// State accumulated over one render pass
#[derive(Default)]
struct RenderPass {
    effects: Vec<PendingEffect>,
    rendered: FxHashSet<ComponentId>,
}

/// Owns and renders a component tree
pub struct Runtime {
    nodes: SlotMap<ComponentId, ComponentNode>,
    root: Option<ComponentId>,
    scheduler: Rc<Scheduler>,
    config: RuntimeConfig,
    total_renders: u64,
}

impl Runtime {
    /// Create an empty runtime
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create an empty runtime with a custom configuration
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            root: None,
            scheduler: Rc::new(Scheduler::default()),
            config,
            total_renders: 0,
        }
    }

    /// Mount `root`, replacing any previously mounted tree
    ///
    /// If a render fails, the partially mounted tree is torn down and the
    /// error returned.
    pub fn mount(&mut self, root: Element) -> Result<()> {
        self.unmount();

        debug!(component = root.name(), "mounting root");
        let id = self.insert_node(root, None, 0);
        self.root = Some(id);

        let mut pass = RenderPass::default();
        if let Err(err) = self.render_component(id, &mut pass) {
            debug!(error = %err, "mount failed, tearing down");
            self.unmount();
            return Err(err);
        }
        Self::commit(pass);
        Ok(())
    }

    /// Re-render every scheduled component
    ///
    /// Runs render passes until no component is dirty. Returns the number of
    /// component renders performed.
    pub fn flush(&mut self) -> Result<usize> {
        let mut renders = 0;
        let mut passes = 0;

        loop {
            let dirty = self.scheduler.take();
            if dirty.is_empty() {
                break;
            }
            if passes == self.config.max_flush_passes {
                debug!(passes, "render loop detected, tearing down");
                self.unmount();
                return Err(Error::RenderLoop { passes });
            }
            passes += 1;

            let mut queue: SmallVec<[(u32, ComponentId); 8]> = dirty
                .into_iter()
                .filter_map(|id| self.nodes.get(id).map(|node| (node.depth, id)))
                .collect();
            queue.sort_by_key(|(depth, _)| *depth);

            let mut pass = RenderPass::default();
            for (_, id) in queue {
                // Already re-rendered as part of an ancestor, or unmounted by it
                if pass.rendered.contains(&id) || !self.nodes.contains_key(id) {
                    continue;
                }
                if let Err(err) = self.render_component(id, &mut pass) {
                    debug!(error = %err, "render failed, tearing down");
                    self.unmount();
                    return Err(err);
                }
            }
            renders += pass.rendered.len();
            Self::commit(pass);
        }

        if renders > 0 {
            trace!(renders, passes, "flush complete");
        }
        Ok(renders)
    }

    /// Unmount the whole tree, running every effect cleanup
    pub fn unmount(&mut self) {
        if let Some(root) = self.root.take() {
            debug!("unmounting tree");
            self.unmount_subtree(root);
        }
        // Anything still queued belongs to the removed tree
        self.scheduler.take();
    }

    /// Whether a tree is mounted
    pub fn is_mounted(&self) -> bool {
        self.root.is_some()
    }

    /// Number of components waiting for a re-render
    pub fn pending_renders(&self) -> usize {
        self.scheduler.len()
    }

    /// Get statistics about the runtime
    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            component_count: self.nodes.len(),
            pending_renders: self.scheduler.len(),
            total_renders: self.total_renders,
        }
    }

    // =========================================================================
    // INTERNAL
    // =========================================================================

    fn insert_node(
        &mut self,
        element: Element,
        parent: Option<ComponentId>,
        depth: u32,
    ) -> ComponentId {
        self.nodes.insert(ComponentNode {
            element,
            parent,
            children: SmallVec::new(),
            hooks: Vec::new(),
            contexts: FxHashMap::default(),
            depth,
            render_count: 0,
        })
    }

    /// Render one component, then reconcile and render its children
    fn render_component(&mut self, id: ComponentId, pass: &mut RenderPass) -> Result<()> {
        let Some(node) = self.nodes.get_mut(id) else {
            return Ok(());
        };
        let element = node.element.clone();
        let init = ScopeInit {
            id,
            name: element.name(),
            parent: node.parent,
            depth: node.depth,
            first_render: node.render_count == 0,
            hooks: std::mem::take(&mut node.hooks),
        };
        trace!(component = element.name(), ?id, "render");

        let mut scope = Scope::new(init, &self.nodes, &self.scheduler, &mut pass.effects);
        let outcome = element
            .render(&mut scope)
            .and_then(|children| scope.finish().map(|()| children));
        let (hooks, contexts) = scope.into_parts();

        if let Some(node) = self.nodes.get_mut(id) {
            node.hooks = hooks;
            node.contexts = contexts;
            node.render_count += 1;
        }
        self.total_renders += 1;
        pass.rendered.insert(id);

        let children = outcome?;
        self.reconcile(id, children, pass)
    }

    /// Match freshly rendered child elements against existing children
    fn reconcile(
        &mut self,
        parent: ComponentId,
        elements: Vec<Element>,
        pass: &mut RenderPass,
    ) -> Result<()> {
        let Some(node) = self.nodes.get_mut(parent) else {
            return Ok(());
        };
        let depth = node.depth + 1;
        let previous = std::mem::take(&mut node.children);

        let mut next: SmallVec<[ComponentId; 4]> = SmallVec::with_capacity(elements.len());
        let mut previous = previous.into_iter();
        for element in elements {
            let child = match previous.next() {
                Some(existing) => {
                    let reused = self
                        .nodes
                        .get_mut(existing)
                        .filter(|node| node.element.same_component(&element));
                    if let Some(node) = reused {
                        node.element = element;
                        existing
                    } else {
                        self.unmount_subtree(existing);
                        self.insert_node(element, Some(parent), depth)
                    }
                }
                None => self.insert_node(element, Some(parent), depth),
            };
            next.push(child);
        }
        for stale in previous {
            self.unmount_subtree(stale);
        }

        if let Some(node) = self.nodes.get_mut(parent) {
            node.children = next.clone();
        }
        for child in next {
            self.render_component(child, pass)?;
        }
        Ok(())
    }

    /// Remove a component and its descendants, children first
    fn unmount_subtree(&mut self, id: ComponentId) {
        let Some(node) = self.nodes.remove(id) else {
            return;
        };
        for child in node.children {
            self.unmount_subtree(child);
        }
        debug!(component = node.element.name(), ?id, "unmount");
        for slot in node.hooks {
            slot.teardown();
        }
    }

    /// Run the effects queued during a pass, deepest components first
    fn commit(pass: RenderPass) {
        let mut effects = pass.effects;
        effects.sort_by_key(|effect| std::cmp::Reverse(effect.depth));
        for effect in effects {
            (effect.run)();
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.unmount();
    }
}

/// Statistics about the runtime
#[derive(Debug, Clone)]
pub struct RuntimeStats {
    pub component_count: usize,
    pub pending_renders: usize,
    pub total_renders: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Cleanup;
    use std::cell::Cell;

    fn counter(renders: Rc<Cell<u32>>, setter: Rc<RefCell<Option<crate::StateSetter<i32>>>>) -> Element {
        Element::new("Counter", move |cx| {
            let (_, set) = cx.use_state(|| 0)?;
            renders.set(renders.get() + 1);
            *setter.borrow_mut() = Some(set);
            Ok(Vec::new())
        })
    }

    #[test]
    fn test_mount_renders_once() {
        let renders = Rc::new(Cell::new(0));
        let setter = Rc::new(RefCell::new(None));
        let mut runtime = Runtime::new();

        runtime.mount(counter(renders.clone(), setter)).unwrap();
        assert_eq!(renders.get(), 1);
        assert!(runtime.is_mounted());
        assert_eq!(runtime.stats().component_count, 1);
    }

    #[test]
    fn test_state_change_schedules_render() {
        let renders = Rc::new(Cell::new(0));
        let setter = Rc::new(RefCell::new(None));
        let mut runtime = Runtime::new();
        runtime.mount(counter(renders.clone(), setter.clone())).unwrap();

        let set = setter.borrow().clone().unwrap();
        set.set(1);
        assert_eq!(runtime.pending_renders(), 1);
        assert_eq!(runtime.flush().unwrap(), 1);
        assert_eq!(renders.get(), 2);

        // Equal value: nothing scheduled
        set.set(1);
        assert_eq!(runtime.pending_renders(), 0);
        assert_eq!(runtime.flush().unwrap(), 0);
        assert_eq!(renders.get(), 2);
    }

    #[test]
    fn test_parent_render_rerenders_children() {
        let child_renders = Rc::new(Cell::new(0));
        let setter = Rc::new(RefCell::new(None));
        let child = counter(child_renders.clone(), Rc::new(RefCell::new(None)));

        let parent_setter = setter.clone();
        let parent = Element::new("Parent", move |cx| {
            let (_, set) = cx.use_state(|| 0)?;
            *parent_setter.borrow_mut() = Some(set);
            Ok(vec![child.clone()])
        });

        let mut runtime = Runtime::new();
        runtime.mount(parent).unwrap();
        assert_eq!(child_renders.get(), 1);

        setter.borrow().as_ref().unwrap().set(5);
        assert_eq!(runtime.flush().unwrap(), 2);
        assert_eq!(child_renders.get(), 2);
        // Same instance reused, not remounted
        assert_eq!(runtime.stats().component_count, 2);
    }

    #[test]
    fn test_effect_runs_after_commit_and_cleans_up() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let setter = Rc::new(RefCell::new(None));

        let effect_log = log.clone();
        let effect_setter = setter.clone();
        let root = Element::new("Effectful", move |cx| {
            let (value, set) = cx.use_state(|| 0)?;
            *effect_setter.borrow_mut() = Some(set);
            let log = effect_log.clone();
            cx.use_effect(value, move || {
                log.borrow_mut().push(format!("run {value}"));
                let log = log.clone();
                Some(Box::new(move || log.borrow_mut().push(format!("cleanup {value}"))) as Cleanup)
            })?;
            Ok(Vec::new())
        });

        let mut runtime = Runtime::new();
        runtime.mount(root).unwrap();
        assert_eq!(*log.borrow(), vec!["run 0"]);

        setter.borrow().as_ref().unwrap().set(1);
        runtime.flush().unwrap();
        assert_eq!(*log.borrow(), vec!["run 0", "cleanup 0", "run 1"]);

        runtime.unmount();
        assert_eq!(*log.borrow(), vec!["run 0", "cleanup 0", "run 1", "cleanup 1"]);
    }

    #[test]
    fn test_child_effects_run_first() {
        let log = Rc::new(RefCell::new(Vec::new()));

        let child_log = log.clone();
        let child = Element::new("Child", move |cx| {
            let log = child_log.clone();
            cx.use_effect((), move || {
                log.borrow_mut().push("child");
                None
            })?;
            Ok(Vec::new())
        });
        let parent_log = log.clone();
        let parent = Element::new("Parent", move |cx| {
            let log = parent_log.clone();
            cx.use_effect((), move || {
                log.borrow_mut().push("parent");
                None
            })?;
            Ok(vec![child.clone()])
        });

        let mut runtime = Runtime::new();
        runtime.mount(parent).unwrap();
        assert_eq!(*log.borrow(), vec!["child", "parent"]);
    }

    #[test]
    fn test_context_reaches_descendants_only() {
        let key = ContextKey::unique::<String>();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let leaf_seen = seen.clone();
        let leaf = Element::new("Leaf", move |cx| {
            leaf_seen
                .borrow_mut()
                .push(cx.use_context::<String>(key).map(|s| (*s).clone()));
            Ok(Vec::new())
        });
        let provider_seen = seen.clone();
        let provider = Element::new("Provider", move |cx| {
            cx.provide_context(key, Rc::new("hello".to_string()));
            provider_seen
                .borrow_mut()
                .push(cx.use_context::<String>(key).map(|s| (*s).clone()));
            Ok(vec![leaf.clone()])
        });

        let mut runtime = Runtime::new();
        runtime.mount(provider).unwrap();
        assert_eq!(*seen.borrow(), vec![None, Some("hello".to_string())]);
    }

    #[test]
    fn test_replaced_child_is_unmounted() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let setter = Rc::new(RefCell::new(None));

        let a_log = log.clone();
        let a = Element::new("A", move |cx| {
            let log = a_log.clone();
            cx.use_effect((), move || {
                Some(Box::new(move || log.borrow_mut().push("a unmounted")) as Cleanup)
            })?;
            Ok(Vec::new())
        });
        let b = Element::new("B", |_| Ok(Vec::new()));

        let root_setter = setter.clone();
        let root = Element::new("Switch", move |cx| {
            let (show_a, set) = cx.use_state(|| true)?;
            *root_setter.borrow_mut() = Some(set);
            Ok(vec![if show_a { a.clone() } else { b.clone() }])
        });

        let mut runtime = Runtime::new();
        runtime.mount(root).unwrap();
        setter.borrow().as_ref().unwrap().set(false);
        runtime.flush().unwrap();

        assert_eq!(*log.borrow(), vec!["a unmounted"]);
        assert_eq!(runtime.stats().component_count, 2);
    }

    #[test]
    fn test_hook_order_change_is_an_error() {
        let setter = Rc::new(RefCell::new(None));
        let root_setter = setter.clone();
        let root = Element::new("Unstable", move |cx| {
            let (flag, set) = cx.use_state(|| false)?;
            *root_setter.borrow_mut() = Some(set);
            if flag {
                cx.use_ref(|| 0u8)?;
            }
            Ok(Vec::new())
        });

        let mut runtime = Runtime::new();
        runtime.mount(root).unwrap();
        setter.borrow().as_ref().unwrap().set(true);

        let err = runtime.flush().unwrap_err();
        assert_eq!(
            err,
            Error::HookMismatch {
                component: "Unstable",
                slot: 1
            }
        );
        assert!(!runtime.is_mounted());
    }

    #[test]
    fn test_hooks_past_the_end_after_ignored_mismatch() {
        let setter = Rc::new(RefCell::new(None));
        let root_setter = setter.clone();
        let root = Element::new("Growing", move |cx| {
            let (grown, set) = cx.use_state(|| false)?;
            *root_setter.borrow_mut() = Some(set);
            if grown {
                assert!(cx.use_ref(|| 0u8).is_err());
                assert!(cx.use_ref(|| 0u8).is_err());
            }
            Ok(Vec::new())
        });

        let mut runtime = Runtime::new();
        runtime.mount(root).unwrap();
        setter.borrow().as_ref().unwrap().set(true);

        let err = runtime.flush().unwrap_err();
        assert_eq!(
            err,
            Error::HookMismatch {
                component: "Growing",
                slot: 3
            }
        );
        assert!(!runtime.is_mounted());
    }

    #[test]
    fn test_render_loop_is_detected() {
        let root = Element::new("Looping", |cx| {
            let (n, set) = cx.use_state(|| 0u32)?;
            set.set(n + 1);
            Ok(Vec::new())
        });

        let mut runtime = Runtime::with_config(RuntimeConfig::new().max_flush_passes(5));
        runtime.mount(root).unwrap();
        assert_eq!(runtime.flush(), Err(Error::RenderLoop { passes: 5 }));
    }
}
