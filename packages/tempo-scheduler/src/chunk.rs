use crate::error::SchedulerError;
use crate::scheduler::{ScheduleOptions, Scheduler, TaskHandle};
use crate::task::TaskCallback;
use std::rc::Rc;

/// Lets a task voluntarily split its own work across host turns.
///
/// Usable only while a task is executing, which is exactly when the task's
/// callback slot is empty and can legally be refilled.
pub struct ChunkScheduler {
    scheduler: Rc<Scheduler>,
}

impl ChunkScheduler {
    pub fn new(scheduler: Rc<Scheduler>) -> Self {
        Self { scheduler }
    }

    /// Resume the *same* task with `callback` on the next loop iteration,
    /// at its original deadline and queue position.
    ///
    /// Fails with [`SchedulerError::NoCurrentTask`] outside task execution,
    /// and with [`SchedulerError::CallbackOccupied`] if the slot was already
    /// refilled (calling this twice in one chunk is a misuse).
    pub fn continue_execute(&self, callback: TaskCallback) -> Result<(), SchedulerError> {
        let current = self.scheduler.current_task.borrow().clone();
        let Some(task) = current else {
            return Err(SchedulerError::NoCurrentTask);
        };
        task.borrow_mut().set_callback(callback)
    }

    /// Treat `callback` as independent follow-up work: a brand-new task with
    /// a fresh deadline window at the ambient priority level.
    pub fn execute(&self, callback: TaskCallback) -> TaskHandle {
        self.scheduler.schedule(
            callback,
            ScheduleOptions::priority(self.scheduler.current_priority()),
        )
    }
}
