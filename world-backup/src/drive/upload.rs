//! Resumable chunked upload (Drive `uploadType=resumable`).
//!
//! The session is opened with a metadata-only POST whose `Location` header is
//! the session URI. Every chunk is a PUT carrying `Content-Range`; the server
//! answers `308` with the acknowledged `Range` until the last chunk, which
//! returns the created file.

use super::auth::DriveSession;
use super::{RemoteFile, UploadRequest};
use crate::utils::{BackupError, Result, UploadError};
use reqwest::header::{CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use reqwest::StatusCode;
use serde_json::json;
use std::io::SeekFrom;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

/// Chunk sizes must be a multiple of this (256 KiB)
pub const CHUNK_ALIGNMENT: u64 = 256 * 1024;

/// Result of sending one chunk
#[derive(Debug)]
pub enum ChunkStatus {
    /// The server has acknowledged `uploaded` bytes and expects more
    InProgress { uploaded: u64 },
    /// The transfer is finished
    Complete(RemoteFile),
}

/// An open resumable upload session
pub struct ResumableUpload<'a> {
    session: &'a DriveSession,
    session_uri: String,
    file: File,
    total_bytes: u64,
    offset: u64,
    chunk_size: u64,
}

impl<'a> ResumableUpload<'a> {
    /// Open an upload session at `upload_base` (e.g. `https://www.googleapis.com/upload/drive/v3`)
    pub async fn start(session: &'a DriveSession, upload_base: &str, request: &UploadRequest) -> Result<Self> {
        if request.chunk_size == 0 || request.chunk_size % CHUNK_ALIGNMENT != 0 {
            return Err(UploadError::Protocol(format!(
                "chunk size {} is not a multiple of {}",
                request.chunk_size, CHUNK_ALIGNMENT
            ))
            .into());
        }

        let file = File::open(&request.local_path).await?;
        let total_bytes = file.metadata().await?.len();

        let metadata = json!({
            "name": request.name,
            "parents": [request.parent],
        });

        let response = session
            .http()
            .post(format!("{}/files", upload_base))
            .query(&[("uploadType", "resumable"), ("fields", "id,name,mimeType,trashed")])
            .bearer_auth(session.access_token())
            .header("X-Upload-Content-Type", request.mime_type.as_str())
            .header("X-Upload-Content-Length", total_bytes.to_string())
            .json(&metadata)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(UploadError::from_status(status.as_u16(), message).into());
        }

        let session_uri = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| UploadError::Protocol("upload session has no Location header".to_string()))?
            .to_string();

        debug!("Opened upload session for {} ({} bytes)", request.name, total_bytes);

        Ok(Self {
            session,
            session_uri,
            file,
            total_bytes,
            offset: 0,
            chunk_size: request.chunk_size,
        })
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Send the next chunk and report where the transfer stands
    pub async fn next_chunk(&mut self) -> Result<ChunkStatus> {
        let (start, end) = chunk_bounds(self.offset, self.chunk_size, self.total_bytes);
        let len = end - start;

        let mut buf = vec![0u8; len as usize];
        self.file.seek(SeekFrom::Start(start)).await?;
        self.file.read_exact(&mut buf).await?;

        let response = self
            .session
            .http()
            .put(&self.session_uri)
            .bearer_auth(self.session.access_token())
            .header(CONTENT_RANGE, content_range(start, end, self.total_bytes))
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(buf)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                let file: RemoteFile = response.json().await?;
                self.offset = self.total_bytes;
                Ok(ChunkStatus::Complete(file))
            }
            StatusCode::PERMANENT_REDIRECT => {
                let acknowledged = match response.headers().get(RANGE) {
                    Some(value) => {
                        let value = value
                            .to_str()
                            .map_err(|e| UploadError::Protocol(format!("unreadable Range header: {}", e)))?;
                        parse_range_header(value)?
                    }
                    // Nothing persisted yet
                    None => 0,
                };
                if acknowledged <= start && len > 0 {
                    return Err(UploadError::Protocol(format!(
                        "server acknowledged {} bytes after a chunk starting at {}",
                        acknowledged, start
                    ))
                    .into());
                }
                self.offset = acknowledged;
                Ok(ChunkStatus::InProgress { uploaded: acknowledged })
            }
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(UploadError::from_status(status.as_u16(), message).into())
            }
        }
    }
}

/// Byte range `[start, end)` of the chunk that begins at `offset`
pub fn chunk_bounds(offset: u64, chunk_size: u64, total: u64) -> (u64, u64) {
    let start = offset.min(total);
    (start, (start + chunk_size).min(total))
}

/// `Content-Range` value for the half-open range `[start, end)` of `total`
pub fn content_range(start: u64, end: u64, total: u64) -> String {
    if end == start {
        format!("bytes */{}", total)
    } else {
        format!("bytes {}-{}/{}", start, end - 1, total)
    }
}

/// Parse a `Range: bytes=0-<last>` response header into the next offset
pub fn parse_range_header(value: &str) -> Result<u64> {
    let invalid = || BackupError::from(UploadError::Protocol(format!("invalid Range header {:?}", value)));

    let range = value.trim().strip_prefix("bytes=").ok_or_else(invalid)?;
    let (first, last) = range.split_once('-').ok_or_else(invalid)?;
    let first: u64 = first.trim().parse().map_err(|_| invalid())?;
    let last: u64 = last.trim().parse().map_err(|_| invalid())?;

    if first != 0 || last < first {
        return Err(invalid());
    }
    Ok(last + 1)
}
