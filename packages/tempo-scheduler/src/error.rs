use crate::task::TaskId;
use thiserror::Error;

/// Misuse of the scheduling API. These are always synchronous and fatal to
/// the calling operation; they are never swallowed.
#[derive(Debug, Error, PartialEq)]
pub enum SchedulerError {
    /// The task already carries an unexecuted callback. Overwriting it would
    /// silently discard work.
    #[error("task {0:?} already carries a callback")]
    CallbackOccupied(TaskId),

    /// A continuation was requested while no task is executing.
    #[error("no task is currently executing")]
    NoCurrentTask,

    /// A host timeout is already armed; it must be cancelled before a new
    /// one can be requested.
    #[error("a host timeout is already outstanding; cancel it first")]
    TimeoutOutstanding,

    /// Frame rates must lie in (0, 125] fps.
    #[error("frame rate must be in (0, 125] fps, got {0}")]
    InvalidFrameRate(f64),
}
