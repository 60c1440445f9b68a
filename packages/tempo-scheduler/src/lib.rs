//! Cooperative, priority-based task scheduler for the Tempo runtime.
//!
//! Long-running work is time-sliced against a host event loop so it never
//! blocks interaction responsiveness: callbacks are tagged with a
//! [`Priority`] and an optional delay, ordered by computed deadlines, and
//! the work loop repeatedly yields control back to the host after a bounded
//! budget, resuming via a host-provided re-entry mechanism.
//!
//! The embedding environment implements [`Host`] (post a zero-delay message,
//! arm/clear a timeout); everything else is in-process. There is no
//! preemption and no parallelism: a callback runs to completion once
//! invoked and yields only by returning [`TaskStep::Continue`] or going
//! through [`ChunkScheduler`].

pub mod chunk;
pub mod error;
pub mod executor;
pub mod heap;
pub mod queue;
pub mod scheduler;
pub mod task;

mod actuator;

pub use chunk::ChunkScheduler;
pub use error::SchedulerError;
pub use executor::{
    Executor, Host, HostCallback, HostMessage, MessageExecutor, TimeoutCallback, TimerExecutor,
    TimerKey, VirtualHost,
};
pub use scheduler::{
    DEFAULT_FRAME_INTERVAL_MS, ScheduleOptions, Scheduler, SchedulerConfig, SchedulerStats,
    TaskHandle,
};
pub use task::{Priority, TaskCallback, TaskId, TaskStep};

use std::cell::RefCell;
use std::rc::Rc;

thread_local! {
    static CURRENT: RefCell<Option<Rc<Scheduler>>> = const { RefCell::new(None) };
}

/// Install the process-wide scheduler for this thread. There is no teardown
/// mid-process; tests wanting isolation construct their own
/// [`Scheduler::new`] instead.
pub fn init(scheduler: Rc<Scheduler>) {
    CURRENT.with(|current| {
        *current.borrow_mut() = Some(scheduler);
    });
}

/// Run `f` against the shared scheduler, constructing one on first use
/// (a [`MessageExecutor`] over a [`VirtualHost`]) if [`init`] was never
/// called.
pub fn with_scheduler<R>(f: impl FnOnce(&Rc<Scheduler>) -> R) -> R {
    let scheduler = CURRENT.with(|current| {
        current
            .borrow_mut()
            .get_or_insert_with(|| Scheduler::new(Box::new(MessageExecutor::new(VirtualHost::new()))))
            .clone()
    });
    f(&scheduler)
}

/// The shared scheduler handle.
pub fn current() -> Rc<Scheduler> {
    with_scheduler(Rc::clone)
}

/// Submit a callback to the shared scheduler.
pub fn schedule(callback: TaskCallback, options: ScheduleOptions) -> TaskHandle {
    with_scheduler(|scheduler| scheduler.schedule(callback, options))
}

/// Tune the shared scheduler's yield behavior.
pub fn configure(config: SchedulerConfig) -> Result<(), SchedulerError> {
    with_scheduler(|scheduler| scheduler.configure(config))
}

pub fn reset_configuration() {
    with_scheduler(|scheduler| scheduler.reset_configuration());
}
