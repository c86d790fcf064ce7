//! Render-phase state of one root: the fiber arena, both tree generations and
//! the cursor of the interruptible traversal.

use std::rc::Rc;

use crate::element::{Element, Props, TEXT_KIND};
use crate::fiber::{EffectTag, Fiber, FiberArena, FiberId, FiberKind};
use crate::hooks::{self, HookCell, HookSnapshot};
use crate::host::{update_host_node, Host};
use crate::reconcile::reconcile_children;
use crate::runtime::RootHandle;
use crate::RenderError;

/// Last request made through `FiberRoot::render`; every restart rebuilds the
/// work-in-progress root from it.
struct RootRequest<N> {
    container: N,
    props: Rc<Props>,
}

pub(crate) struct WorkContext<N> {
    pub(crate) arena: FiberArena<N>,
    pub(crate) current: Option<FiberId>,
    pub(crate) wip: Option<FiberId>,
    pub(crate) next_unit: Option<FiberId>,
    pub(crate) deletions: Vec<FiberId>,
    request: Option<RootRequest<N>>,
}

impl<N> Default for WorkContext<N> {
    fn default() -> Self {
        Self {
            arena: FiberArena::default(),
            current: None,
            wip: None,
            next_unit: None,
            deletions: Vec::new(),
            request: None,
        }
    }
}

impl<N: Clone> WorkContext<N> {
    pub(crate) fn set_request(&mut self, container: N, element: Element) {
        self.request = Some(RootRequest {
            container,
            props: Rc::new(Props::from_children(vec![element])),
        });
        self.restart();
    }

    pub(crate) fn has_request(&self) -> bool {
        self.request.is_some()
    }

    /// Render phase finished and the tree waits for its commit.
    pub(crate) fn ready_to_commit(&self) -> bool {
        self.wip.is_some() && self.next_unit.is_none()
    }

    /// Throws away any partial work and starts a fresh traversal from the
    /// root, diffing against the committed tree.
    pub(crate) fn restart(&mut self) {
        self.discard();
        let Some(request) = &self.request else {
            return;
        };
        let root = Fiber::root(
            request.container.clone(),
            Rc::clone(&request.props),
            self.current,
        );
        let root = self.arena.insert(root);
        self.wip = Some(root);
        self.next_unit = Some(root);
    }

    /// Drops the work-in-progress tree; the committed tree is left as is.
    pub(crate) fn discard(&mut self) {
        for id in self.deletions.drain(..) {
            self.arena[id].effect = EffectTag::None;
        }
        if let Some(wip) = self.wip.take() {
            self.arena.release_tree(wip);
        }
        self.next_unit = None;
    }

    /// Processes the fiber under the cursor and advances it.
    pub(crate) fn perform_unit<H>(&mut self, host: &mut H, root: &RootHandle) -> Result<(), RenderError>
    where
        H: Host<Handle = N> + ?Sized,
    {
        let Some(id) = self.next_unit else {
            return Ok(());
        };
        log::trace!("performing unit {id}");
        match self.arena[id].kind.clone() {
            FiberKind::Component(component) => {
                let previous: Vec<HookSnapshot> = self.arena[id]
                    .alternate
                    .map(|alternate| {
                        self.arena[alternate]
                            .hooks
                            .iter()
                            .map(HookCell::snapshot)
                            .collect()
                    })
                    .unwrap_or_default();
                let props = Rc::clone(&self.arena[id].props);
                let (element, cells) =
                    hooks::render_with_hooks(previous, root.clone(), || component.render(&props));
                self.arena[id].hooks = cells;
                reconcile_children(
                    &mut self.arena,
                    &mut self.deletions,
                    id,
                    std::slice::from_ref(&element),
                );
            }
            FiberKind::Root => self.reconcile_own_children(id),
            FiberKind::Host(name) => {
                if self.arena[id].host_node.is_none() {
                    let node = host.create_node(&name, false)?;
                    self.mount_node(host, id, node)?;
                }
                self.reconcile_own_children(id);
            }
            FiberKind::Text => {
                if self.arena[id].host_node.is_none() {
                    let node = host.create_node(TEXT_KIND, true)?;
                    self.mount_node(host, id, node)?;
                }
            }
        }
        self.next_unit = self.arena.next_unit(id);
        Ok(())
    }

    /// Applies the initial props to a freshly created node. The node stays
    /// detached until its fiber is placed.
    fn mount_node<H>(&mut self, host: &mut H, id: FiberId, node: N) -> Result<(), RenderError>
    where
        H: Host<Handle = N> + ?Sized,
    {
        update_host_node(host, &node, &Props::default(), &self.arena[id].props)?;
        self.arena[id].host_node = Some(node);
        Ok(())
    }

    fn reconcile_own_children(&mut self, id: FiberId) {
        let props = Rc::clone(&self.arena[id].props);
        reconcile_children(&mut self.arena, &mut self.deletions, id, props.children());
    }
}
