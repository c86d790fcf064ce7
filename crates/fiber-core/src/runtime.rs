use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

use crate::commit::CommitSummary;
use crate::element::Element;
use crate::host::Host;
use crate::platform::{Deadline, Unbounded, WorkLoopOptions, WorkScheduler};
use crate::work::WorkContext;
use crate::RenderError;

/// Whether a root still has work after a slice.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WorkStatus {
    Idle,
    Pending,
}

/// Receiver of whole-tree render requests.
pub trait RenderRequest {
    fn request_root_render(&self);
}

/// Weak handle through which setters ask their root to render again.
///
/// Requests made after the root is dropped are ignored.
#[derive(Clone)]
pub struct RootHandle(Weak<dyn RenderRequest>);

impl RootHandle {
    pub fn request_root_render(&self) {
        if let Some(inner) = self.0.upgrade() {
            inner.request_root_render();
        }
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        struct Detached;

        impl RenderRequest for Detached {
            fn request_root_render(&self) {}
        }

        let weak: Weak<dyn RenderRequest> = Weak::<Detached>::new();
        RootHandle(weak)
    }
}

struct RootInner<H: Host> {
    host: RefCell<H>,
    work: RefCell<WorkContext<H::Handle>>,
    scheduler: Rc<dyn WorkScheduler>,
    options: WorkLoopOptions,
    restart_requested: Cell<bool>,
    slice_scheduled: Cell<bool>,
    last_commit: Cell<Option<CommitSummary>>,
    last_error: RefCell<Option<RenderError>>,
    this: Weak<RootInner<H>>,
}

impl<H: Host + 'static> RootInner<H> {
    fn handle(&self) -> RootHandle {
        let weak: Weak<dyn RenderRequest> = self.this.clone();
        RootHandle(weak)
    }

    fn ensure_scheduled(&self) {
        if self.slice_scheduled.replace(true) {
            return;
        }
        let root = self.this.clone();
        self.scheduler.schedule_work(Box::new(move |deadline: &dyn Deadline| {
            if let Some(inner) = root.upgrade() {
                inner.run_scheduled_slice(deadline);
            }
        }));
    }

    fn run_scheduled_slice(&self, deadline: &dyn Deadline) {
        self.slice_scheduled.set(false);
        if let Err(err) = self.perform_work(deadline) {
            log::error!("render slice failed: {err}");
            *self.last_error.borrow_mut() = Some(err);
        }
    }

    fn perform_work(&self, deadline: &dyn Deadline) -> Result<WorkStatus, RenderError> {
        let status = self.run_slice(deadline)?;
        if status == WorkStatus::Pending {
            self.ensure_scheduled();
        }
        Ok(status)
    }

    fn run_slice(&self, deadline: &dyn Deadline) -> Result<WorkStatus, RenderError> {
        let mut work = self
            .work
            .try_borrow_mut()
            .map_err(|_| RenderError::Reentrant)?;
        let mut host = self
            .host
            .try_borrow_mut()
            .map_err(|_| RenderError::Reentrant)?;
        let handle = self.handle();
        let mut units = 0usize;

        loop {
            if self.restart_requested.replace(false) {
                log::debug!("restarting render from the committed tree");
                work.restart();
            }
            if work.next_unit.is_none() {
                break;
            }
            if let Err(err) = work.perform_unit(&mut *host, &handle) {
                log::debug!("discarding work-in-progress tree after render failure");
                work.discard();
                return Err(err);
            }
            units += 1;
            let capped = self
                .options
                .max_units_per_slice
                .is_some_and(|max| units >= max);
            if capped || deadline.time_remaining() < self.options.yield_threshold {
                break;
            }
        }

        if work.ready_to_commit() && !self.restart_requested.get() {
            match work.commit_root(&mut *host) {
                Ok(summary) => self.last_commit.set(Some(summary)),
                Err(err) => {
                    log::debug!("discarding work-in-progress tree after commit failure");
                    work.discard();
                    return Err(err);
                }
            }
        }

        if work.next_unit.is_some() || work.ready_to_commit() || self.restart_requested.get() {
            Ok(WorkStatus::Pending)
        } else {
            Ok(WorkStatus::Idle)
        }
    }
}

impl<H: Host + 'static> RenderRequest for RootInner<H> {
    fn request_root_render(&self) {
        self.restart_requested.set(true);
        self.ensure_scheduled();
    }
}

/// A render target: one host, one container, one committed fiber tree.
///
/// Work is never performed inside `render` or a setter. Both only ask the
/// scheduler for a slice; the slice runs units of work until the deadline
/// says to yield and commits once the whole tree has been processed.
pub struct FiberRoot<H: Host> {
    inner: Rc<RootInner<H>>,
}

impl<H: Host> Clone for FiberRoot<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<H: Host + 'static> FiberRoot<H> {
    pub fn new(host: H, scheduler: Rc<dyn WorkScheduler>) -> Self {
        Self::with_options(host, scheduler, WorkLoopOptions::default())
    }

    pub fn with_options(host: H, scheduler: Rc<dyn WorkScheduler>, options: WorkLoopOptions) -> Self {
        let inner = Rc::new_cyclic(|this| RootInner {
            host: RefCell::new(host),
            work: RefCell::new(WorkContext::default()),
            scheduler,
            options,
            restart_requested: Cell::new(false),
            slice_scheduled: Cell::new(false),
            last_commit: Cell::new(None),
            last_error: RefCell::new(None),
            this: this.clone(),
        });
        Self { inner }
    }

    pub fn handle(&self) -> RootHandle {
        self.inner.handle()
    }

    /// Replaces what the container shows with `element`.
    ///
    /// Any partial work is discarded; the new tree is diffed against the
    /// committed one once the scheduler grants a slice.
    pub fn render(&self, element: Element, container: H::Handle) -> Result<(), RenderError> {
        let mut work = self
            .inner
            .work
            .try_borrow_mut()
            .map_err(|_| RenderError::Reentrant)?;
        work.set_request(container, element);
        drop(work);
        self.inner.restart_requested.set(false);
        self.inner.ensure_scheduled();
        Ok(())
    }

    /// Runs one slice of work against `deadline`, committing if the render
    /// phase completes within it.
    pub fn perform_work(&self, deadline: &dyn Deadline) -> Result<WorkStatus, RenderError> {
        self.inner.perform_work(deadline)
    }

    /// Runs slices without a deadline until nothing is left, including
    /// renders requested by effects of the commits it performs.
    pub fn flush_sync(&self) -> Result<(), RenderError> {
        while self.inner.perform_work(&Unbounded)? == WorkStatus::Pending {}
        Ok(())
    }

    pub fn has_pending_work(&self) -> bool {
        if self.inner.restart_requested.get() {
            return true;
        }
        match self.inner.work.try_borrow() {
            Ok(work) => work.next_unit.is_some() || work.ready_to_commit(),
            Err(_) => true,
        }
    }

    /// Panics if called while a slice is running on this root.
    pub fn host(&self) -> Ref<'_, H> {
        self.inner.host.borrow()
    }

    /// Panics if called while a slice is running on this root.
    pub fn host_mut(&self) -> RefMut<'_, H> {
        self.inner.host.borrow_mut()
    }

    pub fn with_host_mut<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        f(&mut self.inner.host.borrow_mut())
    }

    pub fn last_commit(&self) -> Option<CommitSummary> {
        self.inner.last_commit.get()
    }

    /// Takes the failure of the most recent scheduler-driven slice.
    pub fn take_error(&self) -> Option<RenderError> {
        self.inner.last_error.borrow_mut().take()
    }

    /// Number of live fibers across both tree generations.
    pub fn fiber_count(&self) -> usize {
        self.inner.work.borrow().arena.len()
    }

    pub fn has_committed(&self) -> bool {
        self.inner.work.borrow().current.is_some()
    }

    pub fn has_request(&self) -> bool {
        self.inner.work.borrow().has_request()
    }
}
