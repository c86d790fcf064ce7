//! Fiber records and the arena that owns them.
//!
//! Fibers link to each other through [`FiberId`]s: `child` and `sibling`
//! describe the tree, `parent` and `alternate` are plain back-references.
//! The arena owns every record, so relinking during a diff is a matter of
//! overwriting ids.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::rc::Rc;

use crate::element::{Component, ElementKind, Props};
use crate::hooks::HookCell;
use crate::RenderError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FiberId(usize);

impl fmt::Display for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Host mutation a fiber asks the commit to perform.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum EffectTag {
    #[default]
    None,
    Place,
    Update,
    Delete,
}

#[derive(Clone, Debug)]
pub(crate) enum FiberKind {
    /// The container handed to `render`; owns its host node from the start.
    Root,
    Host(Rc<str>),
    Text,
    Component(Component),
}

impl FiberKind {
    pub(crate) fn matches(&self, kind: &ElementKind) -> bool {
        match (self, kind) {
            (FiberKind::Host(a), ElementKind::Host(b)) => a == b,
            (FiberKind::Text, ElementKind::Text) => true,
            (FiberKind::Component(a), ElementKind::Component(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&ElementKind> for FiberKind {
    fn from(kind: &ElementKind) -> Self {
        match kind {
            ElementKind::Host(name) => FiberKind::Host(Rc::clone(name)),
            ElementKind::Text => FiberKind::Text,
            ElementKind::Component(component) => FiberKind::Component(*component),
        }
    }
}

pub(crate) struct Fiber<N> {
    pub(crate) kind: FiberKind,
    pub(crate) props: Rc<Props>,
    pub(crate) host_node: Option<N>,
    pub(crate) parent: Option<FiberId>,
    pub(crate) child: Option<FiberId>,
    pub(crate) sibling: Option<FiberId>,
    pub(crate) alternate: Option<FiberId>,
    pub(crate) effect: EffectTag,
    pub(crate) hooks: Vec<HookCell>,
}

impl<N> Fiber<N> {
    pub(crate) fn new(kind: FiberKind, props: Rc<Props>, effect: EffectTag) -> Self {
        Self {
            kind,
            props,
            host_node: None,
            parent: None,
            child: None,
            sibling: None,
            alternate: None,
            effect,
            hooks: Vec::new(),
        }
    }

    pub(crate) fn root(container: N, props: Rc<Props>, alternate: Option<FiberId>) -> Self {
        Self {
            host_node: Some(container),
            alternate,
            ..Self::new(FiberKind::Root, props, EffectTag::None)
        }
    }
}

pub(crate) struct FiberArena<N> {
    slots: Vec<Option<Fiber<N>>>, // FUTURE(generations): tag ids so stale handles fail loudly after reuse.
    free: Vec<usize>,
}

impl<N> Default for FiberArena<N> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<N> FiberArena<N> {
    pub(crate) fn insert(&mut self, fiber: Fiber<N>) -> FiberId {
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(fiber);
                FiberId(index)
            }
            None => {
                self.slots.push(Some(fiber));
                FiberId(self.slots.len() - 1)
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Next fiber in work order: first child, else the closest sibling found
    /// walking up from `id`.
    pub(crate) fn next_unit(&self, id: FiberId) -> Option<FiberId> {
        if let Some(child) = self[id].child {
            return Some(child);
        }
        let mut cursor = Some(id);
        while let Some(fiber) = cursor {
            if let Some(sibling) = self[fiber].sibling {
                return Some(sibling);
            }
            cursor = self[fiber].parent;
        }
        None
    }

    /// `top` and all its descendants in preorder. Siblings of `top` are not
    /// part of its subtree.
    pub(crate) fn subtree(&self, top: FiberId) -> Vec<FiberId> {
        let mut order = Vec::new();
        let mut stack = vec![top];
        while let Some(id) = stack.pop() {
            order.push(id);
            let mut children = Vec::new();
            let mut child = self[id].child;
            while let Some(next) = child {
                children.push(next);
                child = self[next].sibling;
            }
            stack.extend(children.into_iter().rev());
        }
        order
    }

    /// Drops `top` and its whole subtree.
    pub(crate) fn release_tree(&mut self, top: FiberId) {
        for id in self.subtree(top) {
            if self.slots[id.0].take().is_some() {
                self.free.push(id.0);
            }
        }
    }

    /// Removes `id` from its parent's child chain. The subtree itself is left
    /// in the arena.
    pub(crate) fn unlink(&mut self, id: FiberId) {
        let sibling = self[id].sibling.take();
        let Some(parent) = self[id].parent.take() else {
            return;
        };
        if self[parent].child == Some(id) {
            self[parent].child = sibling;
            return;
        }
        let mut cursor = self[parent].child;
        while let Some(previous) = cursor {
            if self[previous].sibling == Some(id) {
                self[previous].sibling = sibling;
                return;
            }
            cursor = self[previous].sibling;
        }
    }

    /// Host node of the nearest ancestor that owns one.
    pub(crate) fn host_parent(&self, id: FiberId) -> Result<N, RenderError>
    where
        N: Clone,
    {
        let mut cursor = self[id].parent;
        while let Some(parent) = cursor {
            if let Some(node) = &self[parent].host_node {
                return Ok(node.clone());
            }
            cursor = self[parent].parent;
        }
        Err(RenderError::MissingHostParent { fiber: id })
    }

    /// Host node of `id` itself, or of the first descendant on its child
    /// chain that owns one.
    pub(crate) fn first_host_node(&self, id: FiberId) -> Option<N>
    where
        N: Clone,
    {
        let mut cursor = Some(id);
        while let Some(fiber) = cursor {
            if let Some(node) = &self[fiber].host_node {
                return Some(node.clone());
            }
            cursor = self[fiber].child;
        }
        None
    }
}

impl<N> Index<FiberId> for FiberArena<N> {
    type Output = Fiber<N>;

    fn index(&self, id: FiberId) -> &Fiber<N> {
        match self.slots.get(id.0).and_then(Option::as_ref) {
            Some(fiber) => fiber,
            None => panic!("fiber {id} was released"),
        }
    }
}

impl<N> IndexMut<FiberId> for FiberArena<N> {
    fn index_mut(&mut self, id: FiberId) -> &mut Fiber<N> {
        match self.slots.get_mut(id.0).and_then(Option::as_mut) {
            Some(fiber) => fiber,
            None => panic!("fiber {id} was released"),
        }
    }
}
