//! `courier-core`: configuration and shared error type for the courier
//! workspace.

pub mod config;
pub mod error;

pub use config::CourierConfig;
pub use error::{CourierError, Result};
