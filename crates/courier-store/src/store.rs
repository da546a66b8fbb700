use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, Row};
use tracing::{debug, info, instrument, warn};

use crate::db::init_db;
use crate::error::{Result, StoreError};
use crate::types::{Job, JobStatus, NewJob, ScheduledAt};

const JOB_COLUMNS: &str = "id, filename, filepath, remote_host, remote_user, remote_secret,
                           remote_directory, scheduled_at, status";

/// Durable table of delivery jobs.
///
/// Wraps a single SQLite connection in a `Mutex`; the scheduler worker and
/// the HTTP handlers share one store through an `Arc`. Every method holds the
/// lock for one statement or one transaction only.
pub struct JobStore {
    db: Mutex<Connection>,
}

impl JobStore {
    /// Wrap `conn`, creating the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Append a new pending job and return its id.
    #[instrument(skip(self, job), fields(filename = %job.filename))]
    pub fn insert(&self, job: &NewJob) -> Result<i64> {
        let db = self.lock()?;
        let id = insert_row(&db, job)?;
        info!(job_id = id, scheduled_at = %job.scheduled_at, "job inserted");
        Ok(id)
    }

    /// Delete every pending job and insert `job`, atomically.
    ///
    /// This is how a submission supersedes older pending work: afterwards
    /// exactly one pending job exists. Returns the new id and the payload
    /// paths of the superseded jobs, which nothing will deliver any more.
    #[instrument(skip(self, job), fields(filename = %job.filename))]
    pub fn replace_pending(&self, job: &NewJob) -> Result<(i64, Vec<String>)> {
        let mut db = self.lock()?;
        let tx = db.transaction()?;
        let superseded = delete_returning_paths(&tx, PENDING_ONLY)?;
        let id = insert_row(&tx, job)?;
        tx.commit()?;
        info!(
            job_id = id,
            superseded = superseded.len(),
            scheduled_at = %job.scheduled_at,
            "pending job replaced"
        );
        Ok((id, superseded))
    }

    /// Pending jobs whose `scheduled_at <= now`, earliest first.
    ///
    /// Equal timestamps fall back to insertion order.
    pub fn list_due(&self, now: ScheduledAt) -> Result<Vec<Job>> {
        let db = self.lock()?;
        let mut stmt = db.prepare_cached(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs
             WHERE status = 'pending' AND scheduled_at <= ?1
             ORDER BY scheduled_at ASC, id ASC"
        ))?;
        let rows = stmt.query_map([now], row_to_job)?;
        Ok(collect_jobs(rows))
    }

    /// All pending jobs regardless of their scheduled time, earliest first.
    pub fn list_pending(&self) -> Result<Vec<Job>> {
        let db = self.lock()?;
        let mut stmt = db.prepare_cached(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs
             WHERE status = 'pending'
             ORDER BY scheduled_at ASC, id ASC"
        ))?;
        let rows = stmt.query_map([], row_to_job)?;
        Ok(collect_jobs(rows))
    }

    /// The `limit` most recently created jobs, newest first.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<Job>> {
        let db = self.lock()?;
        let mut stmt = db.prepare_cached(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs ORDER BY id DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map([limit as i64], row_to_job)?;
        Ok(collect_jobs(rows))
    }

    pub fn get(&self, id: i64) -> Result<Option<Job>> {
        let db = self.lock()?;
        let job = db
            .query_row(
                &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
                [id],
                row_to_job,
            )
            .optional()?;
        Ok(job)
    }

    /// Move a pending job to `status`.
    ///
    /// Terminal jobs are never rewritten, so repeating an update is a no-op.
    /// A missing id is logged and ignored; only storage failures are errors.
    #[instrument(skip(self, status), fields(status = %status))]
    pub fn update_status(&self, id: i64, status: &JobStatus) -> Result<()> {
        let db = self.lock()?;
        let changed = db.execute(
            "UPDATE jobs SET status = ?1 WHERE id = ?2 AND status = 'pending'",
            rusqlite::params![status, id],
        )?;
        if changed > 0 {
            return Ok(());
        }

        let current: Option<JobStatus> = db
            .query_row("SELECT status FROM jobs WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;
        match current {
            None => warn!(job_id = id, "status update for unknown job ignored"),
            Some(current) => debug!(
                job_id = id,
                current = %current,
                "job already terminal, status update ignored"
            ),
        }
        Ok(())
    }

    /// Remove every job unconditionally; returns their payload paths.
    pub fn clear_all(&self) -> Result<Vec<String>> {
        let mut db = self.lock()?;
        let tx = db.transaction()?;
        let paths = delete_returning_paths(&tx, "")?;
        tx.commit()?;
        info!(count = paths.len(), "all jobs cleared");
        Ok(paths)
    }

    /// Remove every job still in `pending`; returns their payload paths.
    pub fn delete_pending(&self) -> Result<Vec<String>> {
        let mut db = self.lock()?;
        let tx = db.transaction()?;
        let paths = delete_returning_paths(&tx, PENDING_ONLY)?;
        tx.commit()?;
        if !paths.is_empty() {
            info!(count = paths.len(), "pending jobs deleted");
        }
        Ok(paths)
    }
}

const PENDING_ONLY: &str = "WHERE status = 'pending'";

/// Delete the rows matched by `filter` and return their `filepath`s.
/// Run inside a transaction so the read and the delete see the same rows.
fn delete_returning_paths(conn: &Connection, filter: &str) -> Result<Vec<String>> {
    let paths = {
        let mut stmt = conn.prepare(&format!("SELECT filepath FROM jobs {filter}"))?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };
    conn.execute(&format!("DELETE FROM jobs {filter}"), [])?;
    Ok(paths)
}

fn insert_row(conn: &Connection, job: &NewJob) -> Result<i64> {
    conn.execute(
        "INSERT INTO jobs
         (filename, filepath, remote_host, remote_user, remote_secret,
          remote_directory, scheduled_at, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending')",
        rusqlite::params![
            job.filename,
            job.filepath,
            job.remote_host,
            job.remote_user,
            job.remote_secret,
            job.remote_directory,
            job.scheduled_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn row_to_job(row: &Row<'_>) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get(0)?,
        filename: row.get(1)?,
        filepath: row.get(2)?,
        remote_host: row.get(3)?,
        remote_user: row.get(4)?,
        remote_secret: row.get(5)?,
        remote_directory: row.get(6)?,
        scheduled_at: row.get(7)?,
        status: row.get(8)?,
    })
}

/// Rows that fail to decode (e.g. a hand-edited timestamp) are skipped with
/// a warning instead of failing the whole listing.
fn collect_jobs<I>(rows: I) -> Vec<Job>
where
    I: Iterator<Item = rusqlite::Result<Job>>,
{
    rows.filter_map(|r| match r {
        Ok(job) => Some(job),
        Err(e) => {
            warn!("skipping undecodable job row: {e}");
            None
        }
    })
    .collect()
}
