use thiserror::Error;

/// Errors raised by the job table. Any of these surfaces to callers as a
/// persistence failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Another thread panicked while holding the connection lock.
    #[error("job store connection lock poisoned")]
    Poisoned,

    /// A timestamp did not match any accepted `scheduled_at` format.
    #[error("invalid scheduled time: {0:?} (expected YYYY-MM-DDTHH:MM)")]
    InvalidTimestamp(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
