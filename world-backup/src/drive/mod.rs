//! Remote storage: the [`RemoteStore`] seam and its Google Drive v3 implementation.
//!
//! The pipeline only needs four operations on the remote side: search,
//! trash, rename and a chunked upload. [`DriveClient`] speaks the Drive REST
//! API for them; tests substitute an in-memory store.

pub mod auth;
pub mod client;
pub mod query;
pub mod upload;

#[cfg(test)]
pub mod fake;
#[cfg(test)]
pub mod memory;

pub use auth::{authenticate, DriveSession, ServiceAccountKey};
pub use client::DriveClient;
pub use query::FileQuery;

use crate::transfer::progress::TransferProgress;
use crate::utils::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A file stored at the remote location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub mime_type: String,

    #[serde(default)]
    pub trashed: bool,
}

/// Parameters of a new upload
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Local file to transfer
    pub local_path: PathBuf,

    /// Name of the created remote file
    pub name: String,

    /// Folder the file is created in
    pub parent: String,

    pub mime_type: String,

    /// Bytes per chunk, a multiple of [`upload::CHUNK_ALIGNMENT`]
    pub chunk_size: u64,
}

/// Callback invoked after every chunk the remote side acknowledged
pub type ProgressCallback<'a> = &'a mut (dyn FnMut(&TransferProgress) + Send);

/// Operations the rotation pipeline performs against remote storage
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Search for files matching `query`
    async fn list(&self, query: &FileQuery) -> Result<Vec<RemoteFile>>;

    /// Move a file to the trash
    async fn trash(&self, file_id: &str) -> Result<RemoteFile>;

    /// Give a file a new name
    async fn rename(&self, file_id: &str, new_name: &str) -> Result<RemoteFile>;

    /// Create a new file from a local one, reporting progress per chunk
    async fn upload(&self, request: &UploadRequest, progress: ProgressCallback<'_>) -> Result<RemoteFile>;
}
