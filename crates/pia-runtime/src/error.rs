//! Runtime bridge failure modes (spec.md 4.7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The event-loop thread is gone (process is shutting down, or it
    /// panicked). Submission is a no-op in this case.
    #[error("the runtime event loop is not running")]
    LoopGone,

    /// The submitted operation was dropped before completing - typically
    /// because it panicked, since a job that returns normally always sends
    /// its result before the `CompletionHandle` can observe cancellation.
    #[error("the submitted operation did not complete")]
    OperationLost,
}
