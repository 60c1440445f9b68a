use crate::heap::MinHeap;
use crate::task::{HeapLocation, Task};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

/// Shared ownership of a task between its heap, its handle, and the
/// scheduler's current-task slot. Single-threaded access only.
pub type TaskRef = Rc<RefCell<Task>>;

fn task_order(a: &TaskRef, b: &TaskRef) -> Ordering {
    a.borrow().heap_order(&b.borrow())
}

/// The two-heap task container: `timer_tasks` holds tasks not yet eligible
/// to run (ordered by start time), `waiting_tasks` holds tasks eligible now
/// (ordered by expiration time). `advance` is the only operation that moves
/// tasks between them.
pub struct TaskQueue {
    timer_tasks: MinHeap<TaskRef>,
    waiting_tasks: MinHeap<TaskRef>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            timer_tasks: MinHeap::with_comparator(task_order),
            waiting_tasks: MinHeap::with_comparator(task_order),
        }
    }

    /// Insert a task whose start time is still in the future.
    pub fn push_delayed(&mut self, task: TaskRef) {
        {
            let mut t = task.borrow_mut();
            let start = t.start_time();
            t.set_sort_index(start);
            t.set_location(HeapLocation::Timer);
        }
        self.timer_tasks.insert(task);
    }

    /// Insert a task eligible to run now, ordered by its deadline.
    pub fn push_ready(&mut self, task: TaskRef) {
        {
            let mut t = task.borrow_mut();
            let expiration = t.expiration_time();
            t.set_sort_index(expiration);
            t.set_location(HeapLocation::Waiting);
        }
        self.waiting_tasks.insert(task);
    }

    /// Promote every delayed task whose start time has elapsed into the
    /// ready heap. Cancelled shells at the delayed root are discarded
    /// instead of promoted. Stops at the first task whose start time is
    /// still ahead; heap order guarantees no further candidates.
    pub fn advance(&mut self, now: f64) {
        loop {
            let (start, has_callback) = match self.timer_tasks.peek() {
                Some(task) => {
                    let t = task.borrow();
                    (t.start_time(), t.has_callback())
                }
                None => break,
            };
            if !has_callback {
                if let Some(task) = self.timer_tasks.remove() {
                    task.borrow_mut().set_location(HeapLocation::None);
                }
                continue;
            }
            if start > now {
                break;
            }
            if let Some(task) = self.timer_tasks.remove() {
                tracing::trace!(id = ?task.borrow().id(), "delayed task promoted");
                self.push_ready(task);
            }
        }
    }

    pub fn peek_ready(&self) -> Option<TaskRef> {
        self.waiting_tasks.peek().cloned()
    }

    pub fn pop_ready(&mut self) -> Option<TaskRef> {
        let task = self.waiting_tasks.remove();
        if let Some(task) = &task {
            task.borrow_mut().set_location(HeapLocation::None);
        }
        task
    }

    pub fn peek_delayed(&self) -> Option<TaskRef> {
        self.timer_tasks.peek().cloned()
    }

    pub fn has_ready(&self) -> bool {
        !self.waiting_tasks.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting_tasks.is_empty() && self.timer_tasks.is_empty()
    }

    pub fn ready_len(&self) -> usize {
        self.waiting_tasks.len()
    }

    pub fn delayed_len(&self) -> usize {
        self.timer_tasks.len()
    }

    pub fn clear(&mut self) {
        self.waiting_tasks.clear();
        self.timer_tasks.clear();
    }

    /// Re-establish heap order after a task's sort key changed in place.
    pub fn resort(&mut self, location: HeapLocation) {
        match location {
            HeapLocation::Timer => self.timer_tasks.reheapify(),
            HeapLocation::Waiting => self.waiting_tasks.reheapify(),
            HeapLocation::None => {}
        }
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
