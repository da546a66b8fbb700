use thiserror::Error;

/// Why a single delivery attempt failed.
///
/// The three kinds carry different advice for the operator, so they are kept
/// apart. The `Display` text is what ends up in the job's status column.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The remote host rejected the username/password.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Resolution, TCP connect, timeout, handshake or any other protocol
    /// failure before the file write started.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Authenticated, but the file could not be written (missing remote
    /// directory, permission denied, disk full, unreadable local payload).
    #[error("transfer failed: {0}")]
    Transfer(String),
}

impl DeliveryError {
    /// Short machine-readable kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            DeliveryError::Authentication(_) => "authentication",
            DeliveryError::Connection(_) => "connection",
            DeliveryError::Transfer(_) => "transfer",
        }
    }
}

pub type Result<T> = std::result::Result<T, DeliveryError>;
