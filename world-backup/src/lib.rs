//! World Backup Library
//!
//! Archives a world save directory and rotates it into Google Drive:
//! the previous remote backup is trashed, the current one is relabeled as
//! previous, and the fresh archive is uploaded in resumable chunks.

pub mod archive;
pub mod config;
pub mod drive;
pub mod executor;
pub mod fs;
pub mod rotation;
pub mod transfer;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use utils::errors::BackupError;
pub type Result<T> = std::result::Result<T, BackupError>;
