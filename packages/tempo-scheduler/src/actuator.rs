//! The work loop: drains ready tasks under the time budget, decides when to
//! yield back to the host, and reschedules the continuation.

use crate::scheduler::Scheduler;
use crate::task::{Priority, TaskStep};
use std::rc::Rc;

/// Restores flush bookkeeping even when a task callback panics, so future
/// submissions are not starved by a stuck "performing work" state.
struct FlushGuard<'a> {
    scheduler: &'a Scheduler,
    previous_priority: Priority,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.scheduler.performing_work.set(false);
        self.scheduler.current_task.borrow_mut().take();
        self.scheduler.current_priority.set(self.previous_priority);
    }
}

impl Scheduler {
    /// Host-callback entry point. Returns whether more ready work remains,
    /// which drives the executor's re-request.
    pub(crate) fn flush_work(&self, has_time_remaining: bool, initial_time: f64) -> bool {
        self.host_callback_scheduled.set(false);
        if self.host_timeout_scheduled.get() {
            // we'll advance the timer queue ourselves; the armed wake-up is
            // no longer needed
            self.host_timeout_scheduled.set(false);
            self.executor.cancel_host_timeout();
        }
        self.performing_work.set(true);
        let guard = FlushGuard {
            scheduler: self,
            previous_priority: self.current_priority.get(),
        };
        let has_more = self.work_loop(has_time_remaining, initial_time);
        drop(guard);
        has_more
    }

    /// One turn of cooperative execution.
    ///
    /// Runs ready tasks in deadline order until the queue empties or the
    /// yield condition trips. A task whose deadline has already passed runs
    /// even when the host signals a yield, re-evaluated one task at a time
    /// so expired work cannot starve but also cannot monopolize the turn
    /// unchecked.
    pub(crate) fn work_loop(&self, has_time_remaining: bool, start_time: f64) -> bool {
        let mut current_time = start_time;
        self.turn_start.set(start_time);
        self.queue.borrow_mut().advance(current_time);

        loop {
            let Some(task) = self.queue.borrow().peek_ready() else {
                break;
            };
            let (expiration_time, has_callback, priority) = {
                let t = task.borrow();
                (t.expiration_time(), t.has_callback(), t.priority())
            };

            if !has_callback {
                // stale shell: consumed by a prior chunk, or cancelled
                tracing::trace!(id = ?task.borrow().id(), "stale shell dropped");
                self.queue.borrow_mut().pop_ready();
                continue;
            }

            let expired = expiration_time <= current_time;
            if !expired && (!has_time_remaining || self.should_yield_to_host()) {
                break;
            }

            let Some(callback) = task.borrow_mut().take_callback() else {
                self.queue.borrow_mut().pop_ready();
                continue;
            };
            *self.current_task.borrow_mut() = Some(task.clone());
            let previous_priority = self.current_priority.replace(priority);

            // a panic here abandons the task; FlushGuard resets the
            // bookkeeping while the panic unwinds to the host invocation
            let step = callback(!expired);

            self.current_priority.set(previous_priority);
            self.current_task.borrow_mut().take();
            current_time = self.executor.now();

            match step {
                TaskStep::Continue(next) => {
                    // same task, same deadline, next loop iteration
                    if task.borrow_mut().set_callback(next).is_err() {
                        tracing::warn!(
                            id = ?task.borrow().id(),
                            "continuation dropped: slot was refilled during execution"
                        );
                    }
                    self.record(|stats| stats.continued += 1);
                }
                TaskStep::Done => {
                    if task.borrow().has_callback() {
                        // a continuation was attached mid-execution through
                        // the chunk scheduler; the task stays put
                        self.record(|stats| stats.continued += 1);
                    } else {
                        // the callback may have reshaped the queue; only pop
                        // if this task is still the root
                        let still_root = self
                            .queue
                            .borrow()
                            .peek_ready()
                            .is_some_and(|root| Rc::ptr_eq(&root, &task));
                        if still_root {
                            self.queue.borrow_mut().pop_ready();
                        }
                        self.record(|stats| stats.completed += 1);
                    }
                }
            }
            self.queue.borrow_mut().advance(current_time);
        }

        if self.queue.borrow().has_ready() {
            true
        } else {
            let next_start = self
                .queue
                .borrow()
                .peek_delayed()
                .map(|first| first.borrow().start_time());
            if let Some(start_time) = next_start {
                if !self.host_timeout_scheduled.get() {
                    self.host_timeout_scheduled.set(true);
                    self.request_wakeup(start_time - current_time);
                }
            }
            false
        }
    }

    /// Delayed-task wake-up: promote what has become eligible, then either
    /// request a host callback or re-arm for the next delayed task.
    pub(crate) fn handle_timeout(&self, current_time: f64) {
        self.host_timeout_scheduled.set(false);
        self.queue.borrow_mut().advance(current_time);

        if self.host_callback_scheduled.get() {
            return;
        }
        if self.queue.borrow().has_ready() {
            self.host_callback_scheduled.set(true);
            self.request_flush();
        } else {
            let next_start = self
                .queue
                .borrow()
                .peek_delayed()
                .map(|first| first.borrow().start_time());
            if let Some(start_time) = next_start {
                self.host_timeout_scheduled.set(true);
                self.request_wakeup(start_time - current_time);
            }
        }
    }
}
