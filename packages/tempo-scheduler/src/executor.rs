//! Host-integration layer.
//!
//! The embedding environment implements [`Host`]: a way to invoke a function
//! "as soon as possible, but after yielding" and a way to invoke one after a
//! millisecond delay, both cancellable. An [`Executor`] adapts those
//! primitives into what the scheduler needs: a repeating host callback that
//! drives the work loop, and a single armed wake-up timeout for delayed
//! tasks.

use crate::error::SchedulerError;
use slotmap::{SlotMap, new_key_type};
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::rc::Rc;

new_key_type! {
    /// Identifies an armed host timer so it can be cancelled.
    pub struct TimerKey;
}

/// A one-shot invocation handed to the host.
pub type HostMessage = Box<dyn FnOnce()>;

/// The work-loop entry: (has_time_remaining, current_time) -> more work
/// remains.
pub type HostCallback = Rc<dyn Fn(bool, f64) -> bool>;

/// The delayed-task wake-up entry, invoked with the current time.
pub type TimeoutCallback = Rc<dyn Fn(f64)>;

/// Contract the embedding environment provides.
pub trait Host {
    /// Current time in milliseconds (monotonic).
    fn now(&self) -> f64;

    /// Invoke `message` on the next host turn (zero-delay, high priority).
    fn post_message(&self, message: HostMessage);

    /// Invoke `message` after `delay_ms`.
    fn set_timeout(&self, message: HostMessage, delay_ms: f64) -> TimerKey;

    fn clear_timeout(&self, key: TimerKey);

    /// Whether user input is waiting to be processed.
    fn has_pending_input(&self) -> bool {
        false
    }
}

/// What the scheduler asks of its host plumbing.
pub trait Executor {
    fn now(&self) -> f64;

    fn has_pending_input(&self) -> bool {
        false
    }

    /// Arrange for `callback` to run after yielding to the host. A second
    /// request before the first fires replaces it; only the latest runs.
    /// While the callback reports more work, the executor re-requests
    /// itself.
    fn request_host_callback(&self, callback: HostCallback);

    fn cancel_host_callback(&self);

    /// Arm a single delayed invocation. Errors if one is already armed;
    /// callers must cancel first so a scheduled wake-up is never lost
    /// silently.
    fn request_host_timeout(
        &self,
        callback: TimeoutCallback,
        delay_ms: f64,
    ) -> Result<(), SchedulerError>;

    fn cancel_host_timeout(&self);
}

// ---------------------------------------------------------------------------
// Message-based executor
// ---------------------------------------------------------------------------

struct MessageState {
    host: Rc<dyn Host>,
    callback: RefCell<Option<HostCallback>>,
    // Bumped on every request/cancel; a posted message compares its captured
    // generation at invocation time, so a stale fire-through is a no-op.
    generation: Cell<u64>,
    timeout_key: Cell<Option<TimerKey>>,
}

/// Minimal-latency executor built on the host's zero-delay message
/// primitive.
pub struct MessageExecutor {
    state: Rc<MessageState>,
}

impl MessageExecutor {
    pub fn new(host: Rc<dyn Host>) -> Self {
        Self {
            state: Rc::new(MessageState {
                host,
                callback: RefCell::new(None),
                generation: Cell::new(0),
                timeout_key: Cell::new(None),
            }),
        }
    }

    fn post(state: &Rc<MessageState>) {
        let generation = state.generation.get();
        let weak = Rc::downgrade(state);
        state.host.post_message(Box::new(move || {
            let Some(state) = weak.upgrade() else { return };
            if state.generation.get() != generation {
                // replaced or cancelled after this message was queued
                return;
            }
            let callback = state.callback.borrow().clone();
            let Some(callback) = callback else { return };
            let current_time = state.host.now();
            let has_more = callback(true, current_time);
            if state.generation.get() != generation {
                return;
            }
            if has_more {
                MessageExecutor::post(&state);
            } else {
                state.callback.borrow_mut().take();
            }
        }));
    }
}

impl Executor for MessageExecutor {
    fn now(&self) -> f64 {
        self.state.host.now()
    }

    fn has_pending_input(&self) -> bool {
        self.state.host.has_pending_input()
    }

    fn request_host_callback(&self, callback: HostCallback) {
        self.state.generation.set(self.state.generation.get() + 1);
        *self.state.callback.borrow_mut() = Some(callback);
        MessageExecutor::post(&self.state);
    }

    fn cancel_host_callback(&self) {
        self.state.generation.set(self.state.generation.get() + 1);
        self.state.callback.borrow_mut().take();
    }

    fn request_host_timeout(
        &self,
        callback: TimeoutCallback,
        delay_ms: f64,
    ) -> Result<(), SchedulerError> {
        if self.state.timeout_key.get().is_some() {
            return Err(SchedulerError::TimeoutOutstanding);
        }
        let weak = Rc::downgrade(&self.state);
        let key = self.state.host.set_timeout(
            Box::new(move || {
                if let Some(state) = weak.upgrade() {
                    state.timeout_key.set(None);
                    callback(state.host.now());
                }
            }),
            delay_ms,
        );
        self.state.timeout_key.set(Some(key));
        Ok(())
    }

    fn cancel_host_timeout(&self) {
        if let Some(key) = self.state.timeout_key.take() {
            self.state.host.clear_timeout(key);
        }
    }
}

// ---------------------------------------------------------------------------
// Timer-based executor
// ---------------------------------------------------------------------------

struct TimerState {
    host: Rc<dyn Host>,
    callback: RefCell<Option<HostCallback>>,
    callback_key: Cell<Option<TimerKey>>,
    generation: Cell<u64>,
    timeout_key: Cell<Option<TimerKey>>,
}

/// Fallback executor built on the host's coarse delay primitive
/// (zero-delay timers). Adequate correctness, coarser latency.
pub struct TimerExecutor {
    state: Rc<TimerState>,
}

impl TimerExecutor {
    pub fn new(host: Rc<dyn Host>) -> Self {
        Self {
            state: Rc::new(TimerState {
                host,
                callback: RefCell::new(None),
                callback_key: Cell::new(None),
                generation: Cell::new(0),
                timeout_key: Cell::new(None),
            }),
        }
    }

    fn post(state: &Rc<TimerState>) {
        let generation = state.generation.get();
        let weak = Rc::downgrade(state);
        let key = state.host.set_timeout(
            Box::new(move || {
                let Some(state) = weak.upgrade() else { return };
                if state.generation.get() != generation {
                    return;
                }
                state.callback_key.set(None);
                let callback = state.callback.borrow().clone();
                let Some(callback) = callback else { return };
                let has_more = callback(true, state.host.now());
                if state.generation.get() != generation {
                    return;
                }
                if has_more {
                    TimerExecutor::post(&state);
                } else {
                    state.callback.borrow_mut().take();
                }
            }),
            0.0,
        );
        state.callback_key.set(Some(key));
    }
}

impl Executor for TimerExecutor {
    fn now(&self) -> f64 {
        self.state.host.now()
    }

    fn has_pending_input(&self) -> bool {
        self.state.host.has_pending_input()
    }

    fn request_host_callback(&self, callback: HostCallback) {
        self.state.generation.set(self.state.generation.get() + 1);
        if let Some(key) = self.state.callback_key.take() {
            self.state.host.clear_timeout(key);
        }
        *self.state.callback.borrow_mut() = Some(callback);
        TimerExecutor::post(&self.state);
    }

    fn cancel_host_callback(&self) {
        self.state.generation.set(self.state.generation.get() + 1);
        if let Some(key) = self.state.callback_key.take() {
            self.state.host.clear_timeout(key);
        }
        self.state.callback.borrow_mut().take();
    }

    fn request_host_timeout(
        &self,
        callback: TimeoutCallback,
        delay_ms: f64,
    ) -> Result<(), SchedulerError> {
        if self.state.timeout_key.get().is_some() {
            return Err(SchedulerError::TimeoutOutstanding);
        }
        let weak = Rc::downgrade(&self.state);
        let key = self.state.host.set_timeout(
            Box::new(move || {
                if let Some(state) = weak.upgrade() {
                    state.timeout_key.set(None);
                    callback(state.host.now());
                }
            }),
            delay_ms,
        );
        self.state.timeout_key.set(Some(key));
        Ok(())
    }

    fn cancel_host_timeout(&self) {
        if let Some(key) = self.state.timeout_key.take() {
            self.state.host.clear_timeout(key);
        }
    }
}

// ---------------------------------------------------------------------------
// Virtual host
// ---------------------------------------------------------------------------

struct HostTimer {
    fire_at: f64,
    message: HostMessage,
}

/// Deterministic in-process [`Host`] with a manual clock. Serves the test
/// suite and embedders that drive their own loop.
pub struct VirtualHost {
    now: Cell<f64>,
    messages: RefCell<VecDeque<HostMessage>>,
    timers: RefCell<SlotMap<TimerKey, HostTimer>>,
    input_pending: Cell<bool>,
}

impl VirtualHost {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            now: Cell::new(0.0),
            messages: RefCell::new(VecDeque::new()),
            timers: RefCell::new(SlotMap::with_key()),
            input_pending: Cell::new(false),
        })
    }

    pub fn now_ms(&self) -> f64 {
        self.now.get()
    }

    pub fn set_input_pending(&self, pending: bool) {
        self.input_pending.set(pending);
    }

    /// Move the clock forward without delivering anything. Usable from
    /// inside task callbacks to simulate elapsed execution time.
    pub fn bump(&self, delta_ms: f64) {
        self.now.set(self.now.get() + delta_ms.max(0.0));
    }

    /// Deliver the oldest queued message, if any.
    pub fn run_one_message(&self) -> bool {
        let message = self.messages.borrow_mut().pop_front();
        match message {
            Some(message) => {
                message();
                true
            }
            None => false,
        }
    }

    /// Deliver queued messages until the queue stays empty.
    pub fn run_until_idle(&self) -> usize {
        let mut delivered = 0;
        while self.run_one_message() {
            delivered += 1;
        }
        delivered
    }

    pub fn pending_messages(&self) -> usize {
        self.messages.borrow().len()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Advance the clock by `delta_ms`, firing due timers in deadline order
    /// and delivering any messages they post.
    pub fn advance(&self, delta_ms: f64) {
        let target = self.now.get() + delta_ms.max(0.0);
        loop {
            let due = self
                .timers
                .borrow()
                .iter()
                .filter(|(_, timer)| timer.fire_at <= target)
                .min_by(|a, b| {
                    a.1.fire_at
                        .partial_cmp(&b.1.fire_at)
                        .unwrap_or(Ordering::Equal)
                })
                .map(|(key, timer)| (key, timer.fire_at));
            let Some((key, fire_at)) = due else { break };
            if fire_at > self.now.get() {
                self.now.set(fire_at);
            }
            let timer = self.timers.borrow_mut().remove(key);
            if let Some(timer) = timer {
                (timer.message)();
            }
            self.run_until_idle();
        }
        self.now.set(target);
        self.run_until_idle();
    }
}

impl Host for VirtualHost {
    fn now(&self) -> f64 {
        self.now.get()
    }

    fn post_message(&self, message: HostMessage) {
        self.messages.borrow_mut().push_back(message);
    }

    fn set_timeout(&self, message: HostMessage, delay_ms: f64) -> TimerKey {
        let fire_at = self.now.get() + delay_ms.max(0.0);
        self.timers
            .borrow_mut()
            .insert(HostTimer { fire_at, message })
    }

    fn clear_timeout(&self, key: TimerKey) {
        self.timers.borrow_mut().remove(key);
    }

    fn has_pending_input(&self) -> bool {
        self.input_pending.get()
    }
}
