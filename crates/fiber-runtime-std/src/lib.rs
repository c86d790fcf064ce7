//! Standard scheduling services backed by Rust's `std` library.
//!
//! This crate provides concrete implementations of the platform
//! abstraction traits defined in `fiber-core`. Applications construct a
//! [`StdRuntime`], create their roots through it and call
//! [`StdRuntime::run_slice`] from their event loop.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use fiber_core::{Deadline, FiberRoot, Host, WorkCallback, WorkLoopOptions, WorkScheduler};

/// Default time budget of one slice, roughly a 60 Hz frame.
pub const DEFAULT_FRAME_BUDGET: Duration = Duration::from_millis(16);

/// Scheduler that queues slice requests until the embedder runs them.
pub struct StdScheduler {
    queue: RefCell<VecDeque<WorkCallback>>,
    waker: RefCell<Option<Rc<dyn Fn() + 'static>>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            queue: RefCell::new(VecDeque::new()),
            waker: RefCell::new(None),
        }
    }

    /// Registers a waker that will be invoked whenever a new slice is requested.
    pub fn set_waker(&self, waker: impl Fn() + 'static) {
        *self.waker.borrow_mut() = Some(Rc::new(waker));
    }

    /// Clears any registered waker.
    pub fn clear_waker(&self) {
        *self.waker.borrow_mut() = None;
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Runs the oldest queued request against `deadline`.
    ///
    /// Returns `false` when nothing was queued.
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

    fn wake(&self) {
        let waker = self.waker.borrow().clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

impl WorkScheduler for StdScheduler {
    fn schedule_work(&self, callback: WorkCallback) {
        self.queue.borrow_mut().push_back(callback);
        self.wake();
    }
}

/// Deadline measured on the wall clock from the start of the slice.
#[derive(Debug, Clone, Copy)]
pub struct SliceDeadline {
    start: Instant,
    budget: Duration,
}

impl SliceDeadline {
    pub fn new(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Deadline for SliceDeadline {
    fn time_remaining(&self) -> Duration {
        self.budget.saturating_sub(self.start.elapsed())
    }
}

/// Convenience container bundling the standard scheduler and a frame budget.
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Rc<StdScheduler>,
    frame_budget: Duration,
}

impl StdRuntime {
    pub fn new() -> Self {
        Self::with_frame_budget(DEFAULT_FRAME_BUDGET)
    }

    pub fn with_frame_budget(frame_budget: Duration) -> Self {
        Self {
            scheduler: Rc::new(StdScheduler::default()),
            frame_budget,
        }
    }

    pub fn scheduler(&self) -> Rc<StdScheduler> {
        Rc::clone(&self.scheduler)
    }

    pub fn frame_budget(&self) -> Duration {
        self.frame_budget
    }

    /// Creates a root whose slices are queued on this runtime's scheduler.
    pub fn root<H: Host + 'static>(&self, host: H) -> FiberRoot<H> {
        self.root_with_options(host, WorkLoopOptions::default())
    }

    pub fn root_with_options<H: Host + 'static>(
        &self,
        host: H,
        options: WorkLoopOptions,
    ) -> FiberRoot<H> {
        FiberRoot::with_options(host, self.scheduler.clone(), options)
    }

    pub fn has_pending_slices(&self) -> bool {
        self.scheduler.pending() > 0
    }

    /// Runs one queued slice with a fresh frame budget.
    pub fn run_slice(&self) -> bool {
        let deadline = SliceDeadline::new(self.frame_budget);
        let ran = self.scheduler.run_next(&deadline);
        if ran {
            log::trace!("slice finished after {:?}", deadline.elapsed());
        }
        ran
    }

    /// Runs slices until none are queued or `max_slices` have run.
    ///
    /// Returns how many slices ran.
    pub fn run_until_idle(&self, max_slices: usize) -> usize {
        let mut slices = 0;
        while slices < max_slices && self.run_slice() {
            slices += 1;
        }
        if slices == max_slices && self.has_pending_slices() {
            log::warn!("still busy after {max_slices} slices");
        }
        slices
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .field("frame_budget", &self.frame_budget)
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}
