use courier_store::StoreError;
use thiserror::Error;

/// Errors that end a whole execution pass (never a single job's failure).
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The job table could not be read.
    #[error("job store error: {0}")]
    Store(#[from] StoreError),

    /// A zero tick period would never fire.
    #[error("scheduler tick interval must be non-zero")]
    ZeroInterval,

    /// The worker task is gone; the request was not executed.
    #[error("scheduler is not running")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Why a submission was refused.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// Rejected before anything was stored.
    #[error("{0}")]
    Validation(String),

    #[error("could not save job: {0}")]
    Persistence(#[from] StoreError),
}
