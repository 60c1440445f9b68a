use crate::error::SchedulerError;
use std::cmp::Ordering;

/// Idle tasks have no real deadline; they only lose to work that has one.
pub const IDLE_TIMEOUT_MS: f64 = 1_073_741_823.0;

/// Urgency category, ordered most- to least-urgent. Each level maps to a
/// fixed offset from submission time to deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    /// Must run almost synchronously; its deadline is already in the past.
    Immediate,
    /// Short window, for work the user is actively waiting on.
    UserBlocking,
    #[default]
    Normal,
    Low,
    /// Runs only when nothing with a real deadline is pending.
    Idle,
}

impl Priority {
    /// Offset added to the start time to compute the expiration time.
    pub fn timeout_ms(self) -> f64 {
        match self {
            Priority::Immediate => -1.0,
            Priority::UserBlocking => 250.0,
            Priority::Normal => 5_000.0,
            Priority::Low => 10_000.0,
            Priority::Idle => IDLE_TIMEOUT_MS,
        }
    }
}

/// Monotonically increasing sequence number; tie-break for equal deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub(crate) u64);

/// What a task callback hands back to the work loop.
pub enum TaskStep {
    Done,
    /// Resume the same task on a later loop iteration at its original
    /// deadline.
    Continue(TaskCallback),
}

/// A unit of schedulable work. The argument is whether time remains before
/// the task's deadline (false once it is executing past expiration).
pub type TaskCallback = Box<dyn FnOnce(bool) -> TaskStep>;

/// Which heap currently owns the task, if any. A task resides in at most
/// one heap at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapLocation {
    None,
    Timer,
    Waiting,
}

/// Explicit callback-slot state machine. "Empty" (Running/Done) doubles as
/// the signal that the current unit of work has been taken for execution.
enum CallbackState {
    Pending(TaskCallback),
    Running,
    Continued(TaskCallback),
    Done,
}

pub struct Task {
    id: TaskId,
    priority: Priority,
    start_time: f64,
    expiration_time: f64,
    sort_index: f64,
    location: HeapLocation,
    state: CallbackState,
}

impl Task {
    pub(crate) fn new(
        id: TaskId,
        priority: Priority,
        callback: TaskCallback,
        start_time: f64,
        expiration_time: f64,
    ) -> Self {
        Self {
            id,
            priority,
            start_time,
            expiration_time,
            sort_index: -1.0,
            location: HeapLocation::None,
            state: CallbackState::Pending(callback),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn expiration_time(&self) -> f64 {
        self.expiration_time
    }

    pub fn sort_index(&self) -> f64 {
        self.sort_index
    }

    pub fn set_sort_index(&mut self, sort_index: f64) {
        self.sort_index = sort_index;
    }

    pub fn location(&self) -> HeapLocation {
        self.location
    }

    pub(crate) fn set_location(&mut self, location: HeapLocation) {
        self.location = location;
    }

    pub fn has_callback(&self) -> bool {
        matches!(
            self.state,
            CallbackState::Pending(_) | CallbackState::Continued(_)
        )
    }

    /// Take the callback for execution, leaving the slot empty (Running).
    /// Returns None for a stale shell.
    pub fn take_callback(&mut self) -> Option<TaskCallback> {
        match std::mem::replace(&mut self.state, CallbackState::Running) {
            CallbackState::Pending(callback) | CallbackState::Continued(callback) => Some(callback),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Attach a continuation. Only legal while the slot is empty; an
    /// occupied slot means unexecuted work would be discarded.
    pub fn set_callback(&mut self, callback: TaskCallback) -> Result<(), SchedulerError> {
        match self.state {
            CallbackState::Pending(_) | CallbackState::Continued(_) => {
                Err(SchedulerError::CallbackOccupied(self.id))
            }
            CallbackState::Running | CallbackState::Done => {
                self.state = CallbackState::Continued(callback);
                Ok(())
            }
        }
    }

    /// Empty the slot unconditionally. Always safe; afterwards the task is a
    /// stale shell the work loop skips.
    pub fn clear_callback(&mut self) {
        self.state = CallbackState::Done;
    }

    /// Recompute the deadline under a new priority level.
    pub fn reprioritize(&mut self, priority: Priority, now: f64) {
        self.priority = priority;
        self.expiration_time = now + priority.timeout_ms();
    }

    /// Heap order: sort index first, submission order as the tie-break.
    pub(crate) fn heap_order(&self, other: &Task) -> Ordering {
        self.sort_index
            .partial_cmp(&other.sort_index)
            .unwrap_or(Ordering::Equal)
            .then(self.id.cmp(&other.id))
    }
}
