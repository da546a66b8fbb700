//! `courier-scheduler`: turns stored jobs into SFTP deliveries.
//!
//! # Overview
//!
//! [`SubmissionGateway`] validates new jobs and keeps at most one pending.
//! [`SchedulerEngine`] scans the store on a fixed interval and delivers every
//! pending job whose `scheduled_at` has arrived, earliest first, writing
//! `completed` or the failure text back to each job.
//! [`SchedulerHandle::run_now`] runs the same execution path over every
//! pending job on demand.
//!
//! | Path        | Jobs selected                     | Result                 |
//! |-------------|-----------------------------------|------------------------|
//! | timed tick  | pending, `scheduled_at <= now`    | logged summary         |
//! | run now     | all pending                       | outcomes to the caller |
//!
//! Both paths run on one worker task, so passes never overlap and jobs
//! within a pass are delivered strictly one at a time.

pub mod clock;
pub mod engine;
pub mod error;
pub mod runner;
pub mod submission;

pub use clock::{CivilClock, Clock, ManualClock};
pub use engine::{RunningScheduler, SchedulerEngine, SchedulerHandle, TickReport};
pub use error::{Result, SchedulerError, SubmissionError};
pub use runner::{Executor, JobOutcome};
pub use submission::{Accepted, Submission, SubmissionGateway};
