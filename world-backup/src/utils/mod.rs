//! Utility modules for the world backup pipeline.

pub mod errors;
pub mod logger;

pub use errors::{BackupError, Result, UploadError};
