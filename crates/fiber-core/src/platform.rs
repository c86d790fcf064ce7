//! Platform abstraction traits for the work loop.
//!
//! The core never decides on its own when to run. It asks the host
//! environment for a slice of time through a [`WorkScheduler`] and, inside
//! that slice, consults the supplied [`Deadline`] after every unit of work.

use std::time::Duration;

/// Time budget of the slice currently being executed.
pub trait Deadline {
    /// Time left before the work loop should hand control back.
    fn time_remaining(&self) -> Duration;
}

/// Callback run by the host environment once a slice is available.
pub type WorkCallback = Box<dyn FnOnce(&dyn Deadline) + 'static>;

/// Deadline-based yield/resume primitive of the host environment.
///
/// Implementations must run the callback later, never from inside
/// `schedule_work` itself: the callback re-enters the root that asked for it.
pub trait WorkScheduler {
    fn schedule_work(&self, callback: WorkCallback);
}

/// Scheduler that drops every request.
///
/// Roots built with it are driven explicitly through
/// [`FiberRoot::perform_work`](crate::FiberRoot::perform_work) or
/// [`FiberRoot::flush_sync`](crate::FiberRoot::flush_sync).
#[derive(Debug, Default)]
pub struct DefaultScheduler;

impl WorkScheduler for DefaultScheduler {
    fn schedule_work(&self, _callback: WorkCallback) {}
}

/// Deadline that never runs out.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unbounded;

impl Deadline for Unbounded {
    fn time_remaining(&self) -> Duration {
        Duration::MAX
    }
}

/// Options of the cooperative work loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkLoopOptions {
    /// The loop yields once the deadline reports less than this.
    pub yield_threshold: Duration,
    /// Hard cap on units per slice, independent of the deadline.
    pub max_units_per_slice: Option<usize>,
}

impl Default for WorkLoopOptions {
    fn default() -> Self {
        Self {
            yield_threshold: Duration::from_millis(1),
            max_units_per_slice: None,
        }
    }
}
