use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDateTime, Timelike};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Serialize, Serializer};

use crate::error::StoreError;

/// Naive civil timestamp at minute resolution.
///
/// Stored as `YYYY-MM-DDTHH:MM`, so lexical order of the column equals
/// chronological order and `scheduled_at <= ?` works directly in SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScheduledAt(NaiveDateTime);

impl ScheduledAt {
    /// Canonical storage format.
    pub const FORMAT: &'static str = "%Y-%m-%dT%H:%M";

    const ACCEPTED: [&'static str; 4] = [
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%d %H:%M:%S",
    ];

    /// Wrap `dt`, dropping seconds and sub-second precision.
    pub fn new(dt: NaiveDateTime) -> Self {
        let truncated = dt
            .with_second(0)
            .and_then(|d| d.with_nanosecond(0))
            .unwrap_or(dt);
        Self(truncated)
    }

    /// Parse one of the accepted textual forms (HTML `datetime-local` output,
    /// space-separated, with or without seconds).
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        let trimmed = s.trim();
        Self::ACCEPTED
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
            .map(Self::new)
            .ok_or_else(|| StoreError::InvalidTimestamp(s.to_string()))
    }

    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }

    pub fn add_minutes(&self, minutes: i64) -> Self {
        Self::new(self.0 + Duration::minutes(minutes))
    }
}

impl fmt::Display for ScheduledAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

impl FromStr for ScheduledAt {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ScheduledAt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl ToSql for ScheduledAt {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for ScheduledAt {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        ScheduledAt::parse(text).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Lifecycle state of a delivery job.
///
/// Only `Pending` ever transitions. The storage form is plain text:
/// `pending`, `completed`, or the failure reason verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Completed,
    Failed(String),
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Completed => "completed",
            JobStatus::Failed(reason) => reason.as_str(),
        }
    }

    /// Any text other than the two reserved words is a failure reason.
    pub fn from_storage(s: &str) -> Self {
        match s {
            "pending" => JobStatus::Pending,
            "completed" => JobStatus::Completed,
            other => JobStatus::Failed(other.to_string()),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, JobStatus::Pending)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for JobStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl ToSql for JobStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for JobStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str().map(JobStatus::from_storage)
    }
}

/// A job as submitted, before the store assigns an id.
#[derive(Clone)]
pub struct NewJob {
    pub filename: String,
    pub filepath: String,
    pub remote_host: String,
    pub remote_user: String,
    pub remote_secret: String,
    pub remote_directory: String,
    pub scheduled_at: ScheduledAt,
}

/// A persisted job record.
#[derive(Clone)]
pub struct Job {
    /// AUTOINCREMENT primary key.
    pub id: i64,
    /// Display name; also the file name written on the remote side.
    pub filename: String,
    /// Local payload path, owned by the upload storage.
    pub filepath: String,
    pub remote_host: String,
    pub remote_user: String,
    /// Stored in plain text.
    pub remote_secret: String,
    pub remote_directory: String,
    pub scheduled_at: ScheduledAt,
    pub status: JobStatus,
}

impl Job {
    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            filename: self.filename.clone(),
            scheduled_at: self.scheduled_at,
            status: self.status.clone(),
        }
    }
}

// Debug impls redact the secret so jobs can be logged with `?job`.
impl fmt::Debug for NewJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewJob")
            .field("filename", &self.filename)
            .field("filepath", &self.filepath)
            .field("remote_host", &self.remote_host)
            .field("remote_user", &self.remote_user)
            .field("remote_secret", &"***")
            .field("remote_directory", &self.remote_directory)
            .field("scheduled_at", &self.scheduled_at)
            .finish()
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("filename", &self.filename)
            .field("filepath", &self.filepath)
            .field("remote_host", &self.remote_host)
            .field("remote_user", &self.remote_user)
            .field("remote_secret", &"***")
            .field("remote_directory", &self.remote_directory)
            .field("scheduled_at", &self.scheduled_at)
            .field("status", &self.status)
            .finish()
    }
}

/// Public view of a job for status listings.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub id: i64,
    pub filename: String,
    pub scheduled_at: ScheduledAt,
    pub status: JobStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_datetime_local_form() {
        let at = ScheduledAt::parse("2024-01-01T09:05").unwrap();
        assert_eq!(at.to_string(), "2024-01-01T09:05");
    }

    #[test]
    fn parse_drops_seconds() {
        let at = ScheduledAt::parse("2024-01-01 09:05:59").unwrap();
        assert_eq!(at.to_string(), "2024-01-01T09:05");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            ScheduledAt::parse("tomorrow at nine"),
            Err(StoreError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn lexical_order_matches_chronological() {
        let a = ScheduledAt::parse("2024-01-01T09:00").unwrap();
        let b = ScheduledAt::parse("2024-01-01T10:00").unwrap();
        let c = ScheduledAt::parse("2024-12-31T08:59").unwrap();
        assert!(a < b && b < c);
        assert!(a.to_string() < b.to_string() && b.to_string() < c.to_string());
    }

    #[test]
    fn add_minutes_crosses_midnight() {
        let at = ScheduledAt::parse("2024-01-01T23:30").unwrap();
        assert_eq!(at.add_minutes(60).to_string(), "2024-01-02T00:30");
    }

    #[test]
    fn status_storage_form() {
        assert_eq!(JobStatus::from_storage("pending"), JobStatus::Pending);
        assert_eq!(JobStatus::from_storage("completed"), JobStatus::Completed);
        assert_eq!(
            JobStatus::from_storage("error: Authentication failed."),
            JobStatus::Failed("error: Authentication failed.".to_string())
        );
        assert_eq!(JobStatus::Failed("boom".into()).to_string(), "boom");
    }

    #[test]
    fn debug_redacts_secret() {
        let job = NewJob {
            filename: "a.csv".into(),
            filepath: "/tmp/a.csv".into(),
            remote_host: "sftp.example.com".into(),
            remote_user: "alice".into(),
            remote_secret: "hunter2".into(),
            remote_directory: "/inbox".into(),
            scheduled_at: ScheduledAt::parse("2024-01-01T09:00").unwrap(),
        };
        let rendered = format!("{job:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("alice"));
    }

    #[test]
    fn summary_serializes_as_plain_strings() {
        let summary = JobSummary {
            id: 7,
            filename: "a.csv".into(),
            scheduled_at: ScheduledAt::parse("2024-01-01T09:00").unwrap(),
            status: JobStatus::Completed,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["scheduled_at"], "2024-01-01T09:00");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["id"], 7);
    }
}
