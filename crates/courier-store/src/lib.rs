//! `courier-store`: durable SQLite table of scheduled delivery jobs.
//!
//! A job is created `pending`, moves exactly once to `completed` or to a
//! failure reason, and is then kept as history until the table is cleared.
//! Timestamps are naive civil times stored as `YYYY-MM-DDTHH:MM` so that
//! due-job scans are plain lexical comparisons.

pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use store::JobStore;
pub use types::{Job, JobStatus, JobSummary, NewJob, ScheduledAt};
