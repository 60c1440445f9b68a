use crate::error::SchedulerError;
use crate::executor::{Executor, HostCallback, TimeoutCallback};
use crate::queue::{TaskQueue, TaskRef};
use crate::task::{HeapLocation, Priority, Task, TaskCallback, TaskId};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Default yield interval, ~60 fps.
pub const DEFAULT_FRAME_INTERVAL_MS: f64 = 1000.0 / 60.0;

const MAX_FPS: f64 = 125.0;

/// Submission options: a priority level and an optional start delay.
#[derive(Clone, Copy, Default)]
pub struct ScheduleOptions {
    pub priority: Option<Priority>,
    pub delay_ms: f64,
}

impl ScheduleOptions {
    pub fn priority(priority: Priority) -> Self {
        Self {
            priority: Some(priority),
            delay_ms: 0.0,
        }
    }

    pub fn delayed(mut self, delay_ms: f64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

/// Runtime-tunable yield aggressiveness.
#[derive(Clone, Copy, Default)]
pub struct SchedulerConfig {
    /// Host yield interval as frames per second, bounded to (0, 125].
    pub fps: Option<f64>,
    /// Let pending host input trigger an early yield.
    pub enable_input_pending: Option<bool>,
}

/// Lightweight counters, mostly for devtools and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerStats {
    pub scheduled: u64,
    pub completed: u64,
    pub continued: u64,
    pub cancelled: u64,
}

/// The process-wide arbiter of host yield time.
///
/// Owns the two-heap [`TaskQueue`] and one [`Executor`], computes deadlines
/// from priorities at submission, and decides per work-loop turn how much to
/// run before surrendering control to the host. Single-threaded; shared via
/// `Rc` (handles and host callbacks hold weak references).
pub struct Scheduler {
    pub(crate) queue: RefCell<TaskQueue>,
    pub(crate) executor: Box<dyn Executor>,
    self_weak: Weak<Scheduler>,
    next_task_id: Cell<u64>,
    frame_interval_ms: Cell<f64>,
    enable_input_pending: Cell<bool>,
    pub(crate) host_callback_scheduled: Cell<bool>,
    pub(crate) host_timeout_scheduled: Cell<bool>,
    pub(crate) performing_work: Cell<bool>,
    pub(crate) current_priority: Cell<Priority>,
    pub(crate) current_task: RefCell<Option<TaskRef>>,
    pub(crate) turn_start: Cell<f64>,
    stats: Cell<SchedulerStats>,
}

impl Scheduler {
    pub fn new(executor: Box<dyn Executor>) -> Rc<Self> {
        Rc::new_cyclic(|self_weak| Self {
            queue: RefCell::new(TaskQueue::new()),
            executor,
            self_weak: self_weak.clone(),
            next_task_id: Cell::new(0),
            frame_interval_ms: Cell::new(DEFAULT_FRAME_INTERVAL_MS),
            enable_input_pending: Cell::new(false),
            host_callback_scheduled: Cell::new(false),
            host_timeout_scheduled: Cell::new(false),
            performing_work: Cell::new(false),
            current_priority: Cell::new(Priority::Normal),
            current_task: RefCell::new(None),
            turn_start: Cell::new(0.0),
            stats: Cell::new(SchedulerStats::default()),
        })
    }

    /// Submit a callback. Computes its deadline from the priority level,
    /// enqueues it, and makes sure the host will call us back.
    pub fn schedule(&self, callback: TaskCallback, options: ScheduleOptions) -> TaskHandle {
        let priority = options.priority.unwrap_or(self.current_priority.get());
        let current_time = self.executor.now();
        let delay = options.delay_ms.max(0.0);
        let start_time = current_time + delay;
        let expiration_time = start_time + priority.timeout_ms();

        let id = TaskId(self.next_task_id.get());
        self.next_task_id.set(self.next_task_id.get() + 1);

        let task: TaskRef = Rc::new(RefCell::new(Task::new(
            id,
            priority,
            callback,
            start_time,
            expiration_time,
        )));
        tracing::trace!(?id, ?priority, delay, "task scheduled");
        self.record(|stats| stats.scheduled += 1);

        if start_time > current_time {
            self.queue.borrow_mut().push_delayed(task.clone());
            let is_next_wakeup = {
                let queue = self.queue.borrow();
                !queue.has_ready()
                    && queue
                        .peek_delayed()
                        .is_some_and(|first| Rc::ptr_eq(&first, &task))
            };
            // Only the earliest delayed task needs a wake-up armed; a later
            // one rides on the earlier task's promotion.
            if is_next_wakeup {
                if self.host_timeout_scheduled.get() {
                    self.executor.cancel_host_timeout();
                } else {
                    self.host_timeout_scheduled.set(true);
                }
                self.request_wakeup(start_time - current_time);
            }
        } else {
            self.queue.borrow_mut().push_ready(task.clone());
            if !self.host_callback_scheduled.get() && !self.performing_work.get() {
                self.host_callback_scheduled.set(true);
                self.request_flush();
            }
        }

        TaskHandle {
            task,
            scheduler: self.self_weak.clone(),
        }
    }

    /// True once the current turn has used up its frame interval, or when
    /// input-pending yielding is enabled and the host reports waiting input.
    pub fn should_yield_to_host(&self) -> bool {
        let elapsed = self.executor.now() - self.turn_start.get();
        if elapsed >= self.frame_interval_ms.get() {
            return true;
        }
        self.enable_input_pending.get() && self.executor.has_pending_input()
    }

    pub fn set_frame_rate(&self, fps: f64) -> Result<(), SchedulerError> {
        if !(fps > 0.0 && fps <= MAX_FPS) {
            return Err(SchedulerError::InvalidFrameRate(fps));
        }
        self.frame_interval_ms.set(1000.0 / fps);
        Ok(())
    }

    pub fn reset_frame_rate(&self) {
        self.frame_interval_ms.set(DEFAULT_FRAME_INTERVAL_MS);
    }

    pub fn set_enable_input_pending(&self, enabled: bool) {
        self.enable_input_pending.set(enabled);
    }

    pub fn configure(&self, config: SchedulerConfig) -> Result<(), SchedulerError> {
        if let Some(fps) = config.fps {
            self.set_frame_rate(fps)?;
        }
        if let Some(enabled) = config.enable_input_pending {
            self.enable_input_pending.set(enabled);
        }
        Ok(())
    }

    pub fn reset_configuration(&self) {
        self.reset_frame_rate();
        self.enable_input_pending.set(false);
    }

    /// The ambient priority level: the executing task's level during a
    /// flush, or whatever [`Scheduler::with_priority`] installed.
    pub fn current_priority(&self) -> Priority {
        self.current_priority.get()
    }

    /// Run `f` with the ambient priority swapped, restored on exit. Tasks
    /// scheduled inside without an explicit level inherit it.
    pub fn with_priority<R>(&self, priority: Priority, f: impl FnOnce() -> R) -> R {
        let previous = self.current_priority.replace(priority);
        let result = f();
        self.current_priority.set(previous);
        result
    }

    pub fn has_pending_work(&self) -> bool {
        !self.queue.borrow().is_empty()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats.get()
    }

    pub(crate) fn record(&self, f: impl FnOnce(&mut SchedulerStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }

    pub(crate) fn request_flush(&self) {
        let weak = self.self_weak.clone();
        let callback: HostCallback = Rc::new(move |has_time_remaining, current_time| {
            match weak.upgrade() {
                Some(scheduler) => scheduler.flush_work(has_time_remaining, current_time),
                None => false,
            }
        });
        self.executor.request_host_callback(callback);
    }

    pub(crate) fn request_wakeup(&self, delay_ms: f64) {
        let weak = self.self_weak.clone();
        let callback: TimeoutCallback = Rc::new(move |current_time| {
            if let Some(scheduler) = weak.upgrade() {
                scheduler.handle_timeout(current_time);
            }
        });
        if let Err(err) = self.executor.request_host_timeout(callback, delay_ms) {
            // callers cancel any armed timeout first, so this is a bug
            tracing::error!(%err, "host timeout request rejected");
        }
    }
}

/// Opaque, disposable handle returned by submission.
pub struct TaskHandle {
    task: TaskRef,
    scheduler: Weak<Scheduler>,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.task.borrow().id()
    }

    /// Whether the task still carries an unexecuted callback.
    pub fn is_pending(&self) -> bool {
        self.task.borrow().has_callback()
    }

    /// Cancel the task. Idempotent; the callback is guaranteed never to run
    /// afterwards. The task becomes a stale shell its heap discards on the
    /// next pass.
    pub fn dispose(&self) {
        let mut task = self.task.borrow_mut();
        if !task.has_callback() {
            return;
        }
        tracing::trace!(id = ?task.id(), "task disposed");
        task.clear_callback();
        drop(task);
        if let Some(scheduler) = self.scheduler.upgrade() {
            scheduler.record(|stats| stats.cancelled += 1);
        }
    }

    /// Recompute the task's deadline under `priority` and re-sort it within
    /// whichever heap currently holds it.
    pub fn update_priority(&self, priority: Priority) {
        let Some(scheduler) = self.scheduler.upgrade() else {
            return;
        };
        let now = scheduler.executor.now();
        let location = {
            let mut task = self.task.borrow_mut();
            task.reprioritize(priority, now);
            if task.location() == HeapLocation::Waiting {
                let expiration = task.expiration_time();
                task.set_sort_index(expiration);
            }
            task.location()
        };
        scheduler.queue.borrow_mut().resort(location);
    }
}
