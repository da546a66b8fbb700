use std::sync::Arc;

use courier_store::{Job, JobStatus, JobStore};
use courier_transfer::{DeliveryError, DeliveryRequest, TransferClient};
use tracing::{error, info, warn};

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub job_id: i64,
    pub filename: String,
    pub result: Result<(), DeliveryError>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// The status this attempt writes back to the store.
    pub fn status(&self) -> JobStatus {
        match &self.result {
            Ok(()) => JobStatus::Completed,
            Err(e) => JobStatus::Failed(format!("error: {e}")),
        }
    }

    /// One human-readable line for the "run now" reply.
    pub fn summary_line(&self) -> String {
        match &self.result {
            Ok(()) => format!("✓ {} uploaded", self.filename),
            Err(e) => format!("✗ {} error: {e}", self.filename),
        }
    }
}

/// Runs a batch of jobs one after another and records each outcome.
///
/// Shared by the timed scan and the on-demand run so both paths deliver and
/// classify failures identically.
#[derive(Clone)]
pub struct Executor {
    store: Arc<JobStore>,
    transfer: Arc<dyn TransferClient>,
}

impl Executor {
    pub fn new(store: Arc<JobStore>, transfer: Arc<dyn TransferClient>) -> Self {
        Self { store, transfer }
    }

    /// Attempt every job in order. Never stops early.
    pub async fn execute_all(&self, jobs: &[Job]) -> Vec<JobOutcome> {
        let mut outcomes = Vec::with_capacity(jobs.len());
        for job in jobs {
            outcomes.push(self.execute(job).await);
        }
        outcomes
    }

    /// Deliver one job and write its terminal status.
    ///
    /// A failed status write is logged; the outcome is still returned so the
    /// rest of the batch runs.
    pub async fn execute(&self, job: &Job) -> JobOutcome {
        let request = DeliveryRequest::from_job(job);
        info!(
            job_id = job.id,
            filename = %job.filename,
            host = %request.host,
            user = %request.user,
            secret_len = request.secret.len(),
            directory = %request.remote_directory,
            "executing delivery"
        );

        let result = self.transfer.deliver(&request).await;
        let outcome = JobOutcome {
            job_id: job.id,
            filename: job.filename.clone(),
            result,
        };

        match &outcome.result {
            Ok(()) => info!(job_id = job.id, filename = %job.filename, "delivery succeeded"),
            Err(e) => warn!(
                job_id = job.id,
                filename = %job.filename,
                kind = e.kind(),
                "delivery failed: {e}"
            ),
        }

        if let Err(e) = self.store.update_status(job.id, &outcome.status()) {
            error!(job_id = job.id, "could not record job status: {e}");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(result: Result<(), DeliveryError>) -> JobOutcome {
        JobOutcome {
            job_id: 1,
            filename: "report.csv".to_string(),
            result,
        }
    }

    #[test]
    fn success_maps_to_completed() {
        let o = outcome(Ok(()));
        assert!(o.is_success());
        assert_eq!(o.status(), JobStatus::Completed);
        assert_eq!(o.summary_line(), "✓ report.csv uploaded");
    }

    #[test]
    fn failure_keeps_diagnostic_text() {
        let o = outcome(Err(DeliveryError::Authentication(
            "Authentication failed (username/password)".into(),
        )));
        assert_eq!(
            o.status(),
            JobStatus::Failed(
                "error: authentication failed: Authentication failed (username/password)".into()
            )
        );
        assert_eq!(
            o.summary_line(),
            "✗ report.csv error: authentication failed: Authentication failed (username/password)"
        );
    }
}
