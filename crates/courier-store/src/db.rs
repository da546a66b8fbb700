use rusqlite::Connection;

use crate::error::Result;

/// Initialise the delivery job schema in `conn`.
///
/// Creates the `jobs` table (idempotent) and an index on
/// `(status, scheduled_at)` so the due-job scan stays an index range query.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS jobs (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            filename         TEXT    NOT NULL,
            filepath         TEXT    NOT NULL,
            remote_host      TEXT    NOT NULL,
            remote_user      TEXT    NOT NULL,
            remote_secret    TEXT    NOT NULL,   -- plain text
            remote_directory TEXT    NOT NULL,
            scheduled_at     TEXT    NOT NULL,   -- YYYY-MM-DDTHH:MM, civil time
            status           TEXT    NOT NULL DEFAULT 'pending'
        );

        -- Due scan: WHERE status = 'pending' AND scheduled_at <= ? ORDER BY scheduled_at
        CREATE INDEX IF NOT EXISTS idx_jobs_status_scheduled
            ON jobs (status, scheduled_at);
        ",
    )?;
    Ok(())
}
