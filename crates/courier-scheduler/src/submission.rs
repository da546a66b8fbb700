use std::sync::Arc;

use courier_store::{Job, JobStatus, JobStore, JobSummary, NewJob, ScheduledAt};
use tracing::{info, instrument};

use crate::error::SubmissionError;

/// A delivery request as received from a caller, before validation.
#[derive(Clone, Default)]
pub struct Submission {
    pub filename: String,
    pub scheduled_at: String,
    pub remote_host: String,
    pub remote_user: String,
    pub remote_secret: String,
    pub remote_directory: String,
}

impl Submission {
    /// Reject requests that can never be delivered, before anything is
    /// written. Returns the parsed schedule time.
    pub fn validate(&self) -> Result<ScheduledAt, SubmissionError> {
        if self.remote_user.trim().is_empty() {
            return Err(SubmissionError::Validation(
                "remote user name is required".to_string(),
            ));
        }
        if self.remote_secret.trim().is_empty() {
            return Err(SubmissionError::Validation(
                "remote password is required".to_string(),
            ));
        }
        if self.filename.trim().is_empty() {
            return Err(SubmissionError::Validation("no file was uploaded".to_string()));
        }
        ScheduledAt::parse(&self.scheduled_at)
            .map_err(|e| SubmissionError::Validation(e.to_string()))
    }
}

/// A stored submission plus the payload paths of the jobs it superseded.
#[derive(Debug, Clone)]
pub struct Accepted {
    pub job: Job,
    pub superseded: Vec<String>,
}

/// Entry point for new jobs; keeps at most one job pending.
#[derive(Clone)]
pub struct SubmissionGateway {
    store: Arc<JobStore>,
}

impl SubmissionGateway {
    pub fn new(store: Arc<JobStore>) -> Self {
        Self { store }
    }

    /// Validate `submission`, drop any pending job, and store the new one
    /// for the payload already saved at `filepath`.
    #[instrument(skip_all, fields(filename = %submission.filename))]
    pub fn submit(
        &self,
        submission: &Submission,
        filepath: &str,
    ) -> Result<Accepted, SubmissionError> {
        let scheduled_at = submission.validate()?;

        let new_job = NewJob {
            filename: submission.filename.trim().to_string(),
            filepath: filepath.to_string(),
            remote_host: submission.remote_host.trim().to_string(),
            remote_user: submission.remote_user.trim().to_string(),
            remote_secret: submission.remote_secret.trim().to_string(),
            remote_directory: submission.remote_directory.trim().to_string(),
            scheduled_at,
        };
        info!(
            host = %new_job.remote_host,
            user = %new_job.remote_user,
            secret_len = new_job.remote_secret.len(),
            directory = %new_job.remote_directory,
            %scheduled_at,
            "submission accepted"
        );

        let (id, superseded) = self.store.replace_pending(&new_job)?;
        let job = Job {
            id,
            filename: new_job.filename,
            filepath: new_job.filepath,
            remote_host: new_job.remote_host,
            remote_user: new_job.remote_user,
            remote_secret: new_job.remote_secret,
            remote_directory: new_job.remote_directory,
            scheduled_at: new_job.scheduled_at,
            status: JobStatus::Pending,
        };
        Ok(Accepted { job, superseded })
    }

    /// Most recent jobs, newest first, for status display.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<JobSummary>, SubmissionError> {
        let jobs = self.store.list_recent(limit)?;
        Ok(jobs.iter().map(Job::summary).collect())
    }

    /// Wipe the job table, history included. Returns every payload path
    /// the removed jobs referenced.
    pub fn clear_all(&self) -> Result<Vec<String>, SubmissionError> {
        Ok(self.store.clear_all()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn gateway() -> (SubmissionGateway, Arc<JobStore>) {
        let store = Arc::new(JobStore::new(Connection::open_in_memory().unwrap()).unwrap());
        (SubmissionGateway::new(Arc::clone(&store)), store)
    }

    fn submission(filename: &str) -> Submission {
        Submission {
            filename: filename.to_string(),
            scheduled_at: "2024-01-01T09:00".to_string(),
            remote_host: " sftp.example.com ".to_string(),
            remote_user: "alice".to_string(),
            remote_secret: "hunter2 ".to_string(),
            remote_directory: "/inbox".to_string(),
        }
    }

    #[test]
    fn empty_user_is_rejected_before_storage() {
        let (gateway, store) = gateway();
        let mut s = submission("a.csv");
        s.remote_user = "   ".to_string();
        let err = gateway.submit(&s, "/tmp/uploads/a.csv").unwrap_err();
        assert!(matches!(err, SubmissionError::Validation(_)));
        assert!(store.list_recent(20).unwrap().is_empty());
    }

    #[test]
    fn empty_secret_is_rejected_before_storage() {
        let (gateway, store) = gateway();
        let mut s = submission("a.csv");
        s.remote_secret = String::new();
        let err = gateway.submit(&s, "/tmp/uploads/a.csv").unwrap_err();
        assert_eq!(err.to_string(), "remote password is required");
        assert!(store.list_recent(20).unwrap().is_empty());
    }

    #[test]
    fn bad_schedule_time_is_a_validation_error() {
        let (gateway, _) = gateway();
        let mut s = submission("a.csv");
        s.scheduled_at = "next tuesday".to_string();
        assert!(matches!(
            gateway.submit(&s, "/tmp/uploads/a.csv"),
            Err(SubmissionError::Validation(_))
        ));
    }

    #[test]
    fn submit_trims_and_stores_pending() {
        let (gateway, store) = gateway();
        let job = gateway
            .submit(&submission("a.csv"), "/tmp/uploads/a.csv")
            .unwrap()
            .job;
        assert_eq!(job.status, JobStatus::Pending);

        let stored = store.get(job.id).unwrap().unwrap();
        assert_eq!(stored.remote_host, "sftp.example.com");
        assert_eq!(stored.remote_secret, "hunter2");
        assert_eq!(stored.scheduled_at.to_string(), "2024-01-01T09:00");
    }

    #[test]
    fn new_submission_supersedes_pending_one() {
        let (gateway, store) = gateway();
        let a = gateway.submit(&submission("a.csv"), "/tmp/uploads/a.csv").unwrap();
        assert!(a.superseded.is_empty());
        let b = gateway.submit(&submission("b.csv"), "/tmp/uploads/b.csv").unwrap();
        assert_eq!(b.superseded, vec!["/tmp/uploads/a.csv"]);

        let pending = store.list_pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b.job.id);
        assert!(store.get(a.job.id).unwrap().is_none());
    }

    #[test]
    fn clear_all_then_list_recent_is_empty() {
        let (gateway, _) = gateway();
        gateway.submit(&submission("a.csv"), "/tmp/uploads/a.csv").unwrap();
        assert_eq!(gateway.clear_all().unwrap(), vec!["/tmp/uploads/a.csv"]);
        assert!(gateway.list_recent(20).unwrap().is_empty());
    }
}
