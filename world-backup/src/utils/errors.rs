//! Custom error types for the world backup pipeline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Drive API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure of a resumable transfer, classified by how a retrying client
/// would have to react to it. No retry is performed; every class aborts.
#[derive(Error, Debug)]
pub enum UploadError {
    /// The upload session is gone (404/410); only a fresh session could continue.
    #[error("upload session expired (HTTP {0}), the transfer would have to restart")]
    SessionExpired(u16),

    /// Transient server-side failure (5xx); a backoff retry of the same chunk could succeed.
    #[error("server error during transfer (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// Anything else: client errors and protocol violations.
    #[error("transfer rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed upload response: {0}")]
    Protocol(String),
}

impl UploadError {
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            404 | 410 => UploadError::SessionExpired(status),
            500..=599 => UploadError::Server { status, message },
            _ => UploadError::Rejected { status, message },
        }
    }
}

impl From<zip::result::ZipError> for BackupError {
    fn from(e: zip::result::ZipError) -> Self {
        BackupError::Archive(e.to_string())
    }
}

impl From<walkdir::Error> for BackupError {
    fn from(e: walkdir::Error) -> Self {
        BackupError::Archive(e.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for BackupError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        BackupError::Authentication(e.to_string())
    }
}

impl From<config::ConfigError> for BackupError {
    fn from(e: config::ConfigError) -> Self {
        BackupError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
