use std::cell::{Cell, Ref, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use fiber_core::{
    CommitSummary, Deadline, Element, EventHandler, FiberRoot, Host, HostError, HostNodeId,
    MemoryHost, PropValue, RenderError, Unbounded, WorkCallback, WorkLoopOptions, WorkScheduler,
};

/// One successful host mutation, in the order it was applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostOp {
    Create { node: HostNodeId, kind: String },
    SetProperty { node: HostNodeId, name: String, value: String },
    ClearProperty { node: HostNodeId, name: String },
    AddListener { node: HostNodeId, event: String },
    RemoveListener { node: HostNodeId, event: String },
    AppendChild { parent: HostNodeId, child: HostNodeId },
    RemoveChild { parent: HostNodeId, child: HostNodeId },
}

/// In-memory host that logs every mutation it performs.
///
/// Rejections configured through [`RecordingHost::reject_property`] fail the
/// operation without recording it.
#[derive(Default)]
pub struct RecordingHost {
    memory: MemoryHost,
    ops: Vec<HostOp>,
    rejected_property: Option<String>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a detached container node; not recorded.
    pub fn create_container(&mut self, kind: &str) -> HostNodeId {
        self.memory.create_container(kind)
    }

    pub fn memory(&self) -> &MemoryHost {
        &self.memory
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    /// Makes every later `set_property` of `name` fail.
    pub fn reject_property(&mut self, name: &str) {
        self.rejected_property = Some(name.to_owned());
    }

    pub fn accept_all(&mut self) {
        self.rejected_property = None;
    }
}

impl Host for RecordingHost {
    type Handle = HostNodeId;

    fn create_node(&mut self, kind: &str, is_text: bool) -> Result<HostNodeId, HostError> {
        let node = self.memory.create_node(kind, is_text)?;
        self.ops.push(HostOp::Create {
            node,
            kind: kind.to_owned(),
        });
        Ok(node)
    }

    fn set_property(
        &mut self,
        node: &HostNodeId,
        name: &str,
        value: &PropValue,
    ) -> Result<(), HostError> {
        if self.rejected_property.as_deref() == Some(name) {
            return Err(HostError::Rejected {
                operation: "set_property",
                reason: format!("property {name} is rejected"),
            });
        }
        self.memory.set_property(node, name, value)?;
        self.ops.push(HostOp::SetProperty {
            node: *node,
            name: name.to_owned(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn clear_property(&mut self, node: &HostNodeId, name: &str) -> Result<(), HostError> {
        self.memory.clear_property(node, name)?;
        self.ops.push(HostOp::ClearProperty {
            node: *node,
            name: name.to_owned(),
        });
        Ok(())
    }

    fn add_listener(
        &mut self,
        node: &HostNodeId,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), HostError> {
        self.memory.add_listener(node, event, handler)?;
        self.ops.push(HostOp::AddListener {
            node: *node,
            event: event.to_owned(),
        });
        Ok(())
    }

    fn remove_listener(
        &mut self,
        node: &HostNodeId,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), HostError> {
        self.memory.remove_listener(node, event, handler)?;
        self.ops.push(HostOp::RemoveListener {
            node: *node,
            event: event.to_owned(),
        });
        Ok(())
    }

    fn append_child(&mut self, parent: &HostNodeId, child: &HostNodeId) -> Result<(), HostError> {
        self.memory.append_child(parent, child)?;
        self.ops.push(HostOp::AppendChild {
            parent: *parent,
            child: *child,
        });
        Ok(())
    }

    fn remove_child(&mut self, parent: &HostNodeId, child: &HostNodeId) -> Result<(), HostError> {
        self.memory.remove_child(parent, child)?;
        self.ops.push(HostOp::RemoveChild {
            parent: *parent,
            child: *child,
        });
        Ok(())
    }
}

/// Scheduler whose requests only run when the test pumps them.
#[derive(Default)]
pub struct ManualScheduler {
    queue: RefCell<VecDeque<WorkCallback>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn run_next(&self, deadline: &dyn Deadline) -> bool {
        let next = self.queue.borrow_mut().pop_front();
        match next {
            Some(callback) => {
                callback(deadline);
                true
            }
            None => false,
        }
    }

    /// Runs unbounded slices until nothing is queued; returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut slices = 0;
        while self.run_next(&Unbounded) {
            slices += 1;
        }
        slices
    }
}

impl WorkScheduler for ManualScheduler {
    fn schedule_work(&self, callback: WorkCallback) {
        self.queue.borrow_mut().push_back(callback);
    }
}

/// Deadline that runs out after a fixed number of consultations.
///
/// The work loop consults the deadline once per unit, so a budget of `n`
/// lets exactly `n` units run in the slice.
#[derive(Debug)]
pub struct UnitBudget {
    units: usize,
    consulted: Cell<usize>,
}

impl UnitBudget {
    pub fn new(units: usize) -> Self {
        Self {
            units,
            consulted: Cell::new(0),
        }
    }

    pub fn consumed(&self) -> usize {
        self.consulted.get()
    }
}

impl Deadline for UnitBudget {
    fn time_remaining(&self) -> Duration {
        let consulted = self.consulted.get() + 1;
        self.consulted.set(consulted);
        if consulted >= self.units {
            Duration::ZERO
        } else {
            Duration::MAX
        }
    }
}

/// Headless harness for exercising fiber roots in tests.
///
/// Owns a recording host with a single container and a manual scheduler, so
/// tests decide exactly when and how much work runs.
pub struct FiberTestRule {
    scheduler: Rc<ManualScheduler>,
    root: FiberRoot<RecordingHost>,
    container: HostNodeId,
    content: Option<Element>,
}

impl FiberTestRule {
    pub fn new() -> Self {
        Self::with_options(WorkLoopOptions::default())
    }

    pub fn with_options(options: WorkLoopOptions) -> Self {
        let scheduler = Rc::new(ManualScheduler::new());
        let mut host = RecordingHost::new();
        let container = host.create_container("root");
        let root = FiberRoot::with_options(host, scheduler.clone(), options);
        Self {
            scheduler,
            root,
            container,
            content: None,
        }
    }

    /// Renders `content` into the container and pumps until idle.
    pub fn set_content(&mut self, content: Element) -> Result<(), RenderError> {
        self.content = Some(content);
        self.rerender()
    }

    /// Renders the installed content again and pumps until idle.
    pub fn rerender(&mut self) -> Result<(), RenderError> {
        self.request_render()?;
        self.pump_until_idle()
    }

    /// Hands the installed content to the root without running any work.
    pub fn request_render(&mut self) -> Result<(), RenderError> {
        if let Some(content) = self.content.clone() {
            self.root.render(content, self.container)?;
        }
        Ok(())
    }

    /// Runs every scheduled slice, reporting the first slice failure.
    pub fn pump_until_idle(&mut self) -> Result<(), RenderError> {
        self.scheduler.run_until_idle();
        match self.root.take_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Runs one scheduled slice that may perform at most `units` units.
    ///
    /// Returns `false` when no slice was scheduled.
    pub fn pump_slice(&mut self, units: usize) -> Result<bool, RenderError> {
        let ran = self.scheduler.run_next(&UnitBudget::new(units));
        match self.root.take_error() {
            Some(err) => Err(err),
            None => Ok(ran),
        }
    }

    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    pub fn scheduler(&self) -> &ManualScheduler {
        &self.scheduler
    }

    pub fn root(&self) -> &FiberRoot<RecordingHost> {
        &self.root
    }

    pub fn container(&self) -> HostNodeId {
        self.container
    }

    pub fn host(&self) -> Ref<'_, RecordingHost> {
        self.root.host()
    }

    pub fn take_ops(&self) -> Vec<HostOp> {
        self.root.host_mut().take_ops()
    }

    pub fn last_commit(&self) -> Option<CommitSummary> {
        self.root.last_commit()
    }

    pub fn text_content(&self) -> String {
        self.host().memory().text_content(self.container)
    }

    pub fn children(&self, node: HostNodeId) -> Vec<HostNodeId> {
        self.host().memory().children(node).to_vec()
    }

    /// Host node at `path`, walking child indices from the container.
    pub fn node_at(&self, path: &[usize]) -> Option<HostNodeId> {
        let host = self.host();
        path.iter().try_fold(self.container, |node, index| {
            host.memory().children(node).get(*index).copied()
        })
    }

    /// Dispatches `event` on `node` the way the platform would.
    pub fn dispatch(&self, node: HostNodeId, event: &str) -> Result<usize, HostError> {
        self.host().memory().dispatch_event(node, event)
    }

    pub fn dump_tree(&self) -> String {
        self.host().memory().dump_tree(Some(self.container))
    }
}

impl Default for FiberTestRule {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for tests that only need temporary access to a
/// `FiberTestRule`.
pub fn run_test_root<R>(f: impl FnOnce(&mut FiberTestRule) -> R) -> R {
    let mut rule = FiberTestRule::new();
    f(&mut rule)
}
