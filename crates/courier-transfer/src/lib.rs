//! `courier-transfer`: single-shot SFTP delivery of one local file.
//!
//! [`client::TransferClient`] is the seam the scheduler depends on;
//! [`client::SftpClient`] is the production implementation. Failures are
//! classified into [`DeliveryError`] kinds so operators can tell a bad
//! password from an unreachable host from a bad remote path.

pub mod client;
pub mod error;
pub mod request;

pub use client::{SftpClient, TransferClient};
pub use error::DeliveryError;
pub use request::DeliveryRequest;
