use std::cell::RefCell;
use std::rc::Rc;
use tempo_scheduler::{
    MessageExecutor, Priority, ScheduleOptions, Scheduler, TaskStep, VirtualHost,
};

type Log = Rc<RefCell<Vec<&'static str>>>;

fn logger(log: &Log, entry: &'static str) -> tempo_scheduler::TaskCallback {
    let log = log.clone();
    Box::new(move |_| {
        log.borrow_mut().push(entry);
        TaskStep::Done
    })
}

fn setup() -> (Rc<VirtualHost>, Rc<Scheduler>) {
    let host = VirtualHost::new();
    let scheduler = Scheduler::new(Box::new(MessageExecutor::new(host.clone())));
    (host, scheduler)
}

#[test]
fn tasks_run_in_deadline_order_across_priorities() {
    let (host, scheduler) = setup();
    let log: Log = Rc::new(RefCell::new(Vec::new()));

    for (priority, entry) in [
        (Priority::Low, "low"),
        (Priority::Idle, "idle"),
        (Priority::Normal, "normal"),
        (Priority::Immediate, "immediate"),
        (Priority::UserBlocking, "user-blocking"),
    ] {
        scheduler.schedule(logger(&log, entry), ScheduleOptions::priority(priority));
    }

    host.run_until_idle();
    assert_eq!(
        *log.borrow(),
        vec!["immediate", "user-blocking", "normal", "low", "idle"]
    );
    assert!(!scheduler.has_pending_work());
}

#[test]
fn equal_priority_tasks_keep_submission_order() {
    let (host, scheduler) = setup();
    let log: Log = Rc::new(RefCell::new(Vec::new()));

    scheduler.schedule(logger(&log, "first"), ScheduleOptions::default());
    scheduler.schedule(logger(&log, "second"), ScheduleOptions::default());
    scheduler.schedule(logger(&log, "third"), ScheduleOptions::default());

    host.run_until_idle();
    assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
}

#[test]
fn delayed_tasks_wake_in_start_time_order() {
    let (host, scheduler) = setup();
    let log: Log = Rc::new(RefCell::new(Vec::new()));

    scheduler.schedule(
        logger(&log, "slow"),
        ScheduleOptions::default().delayed(100.0),
    );
    scheduler.schedule(
        logger(&log, "fast"),
        ScheduleOptions::default().delayed(50.0),
    );

    host.advance(10.0);
    assert!(log.borrow().is_empty());

    host.advance(50.0);
    assert_eq!(*log.borrow(), vec!["fast"]);

    host.advance(50.0);
    assert_eq!(*log.borrow(), vec!["fast", "slow"]);
    assert!(!scheduler.has_pending_work());
}

#[test]
fn expired_task_runs_even_when_host_wants_a_yield() {
    let (host, scheduler) = setup();
    let log: Log = Rc::new(RefCell::new(Vec::new()));

    scheduler.set_enable_input_pending(true);
    host.set_input_pending(true);

    // Immediate's deadline is already in the past; Normal's is not.
    scheduler.schedule(logger(&log, "normal"), ScheduleOptions::default());
    scheduler.schedule(
        logger(&log, "immediate"),
        ScheduleOptions::priority(Priority::Immediate),
    );

    // one host turn: the expired task is forced through, then the yield
    // signal is honored before the unexpired one
    assert!(host.run_one_message());
    assert_eq!(*log.borrow(), vec!["immediate"]);
    assert_eq!(host.pending_messages(), 1);

    host.set_input_pending(false);
    host.run_until_idle();
    assert_eq!(*log.borrow(), vec!["immediate", "normal"]);
}

#[test]
fn disposed_task_never_runs() {
    let (host, scheduler) = setup();
    let log: Log = Rc::new(RefCell::new(Vec::new()));

    let handle = scheduler.schedule(logger(&log, "ready"), ScheduleOptions::default());
    let delayed = scheduler.schedule(
        logger(&log, "delayed"),
        ScheduleOptions::default().delayed(40.0),
    );

    assert!(handle.is_pending());
    handle.dispose();
    handle.dispose(); // idempotent
    delayed.dispose();
    assert!(!handle.is_pending());

    host.advance(10_000.0);
    host.run_until_idle();
    assert!(log.borrow().is_empty());
    assert_eq!(scheduler.stats().cancelled, 2);
    assert_eq!(scheduler.stats().completed, 0);
}

#[test]
fn update_priority_resorts_within_the_ready_heap() {
    let (host, scheduler) = setup();
    let log: Log = Rc::new(RefCell::new(Vec::new()));

    scheduler.schedule(logger(&log, "a"), ScheduleOptions::priority(Priority::Low));
    let b = scheduler.schedule(logger(&log, "b"), ScheduleOptions::priority(Priority::Low));

    b.update_priority(Priority::UserBlocking);

    host.run_until_idle();
    assert_eq!(*log.borrow(), vec!["b", "a"]);
}

#[test]
fn ambient_priority_is_inherited_by_unlabelled_submissions() {
    let (host, scheduler) = setup();
    let log: Log = Rc::new(RefCell::new(Vec::new()));

    scheduler.schedule(logger(&log, "normal"), ScheduleOptions::default());
    scheduler.with_priority(Priority::UserBlocking, || {
        scheduler.schedule(logger(&log, "inherited"), ScheduleOptions::default());
    });
    assert_eq!(scheduler.current_priority(), Priority::Normal);

    host.run_until_idle();
    assert_eq!(*log.borrow(), vec!["inherited", "normal"]);
}
