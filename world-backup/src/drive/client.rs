//! Google Drive v3 implementation of [`RemoteStore`].

use super::auth::DriveSession;
use super::upload::{ChunkStatus, ResumableUpload};
use super::{FileQuery, ProgressCallback, RemoteFile, RemoteStore, UploadRequest};
use crate::transfer::progress::{format_bytes, format_speed, ProgressTracker};
use crate::utils::{BackupError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

const DRIVE_API: &str = "https://www.googleapis.com/drive/v3";
const DRIVE_UPLOAD_API: &str = "https://www.googleapis.com/upload/drive/v3";
const FILE_FIELDS: &str = "id,name,mimeType,trashed";

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteFile>,
}

/// Drive REST client bound to one authorized session
#[derive(Debug)]
pub struct DriveClient {
    session: DriveSession,
    api_base: String,
    upload_base: String,
}

impl DriveClient {
    pub fn new(session: DriveSession) -> Self {
        Self::with_endpoints(session, DRIVE_API, DRIVE_UPLOAD_API)
    }

    /// Client against non-default endpoints (proxies, emulators)
    pub fn with_endpoints(session: DriveSession, api_base: &str, upload_base: &str) -> Self {
        Self {
            session,
            api_base: api_base.trim_end_matches('/').to_string(),
            upload_base: upload_base.trim_end_matches('/').to_string(),
        }
    }

    async fn update(&self, file_id: &str, body: Value) -> Result<RemoteFile> {
        let response = self
            .session
            .http()
            .patch(format!("{}/files/{}", self.api_base, file_id))
            .query(&[("fields", FILE_FIELDS)])
            .bearer_auth(self.session.access_token())
            .json(&body)
            .send()
            .await?;

        parse_response(response).await
    }
}

/// Decode a successful response, or turn an error response into [`BackupError::Api`]
async fn parse_response<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let body = response.text().await.unwrap_or_default();
    Err(BackupError::Api {
        status: status.as_u16(),
        message: api_error_message(&body),
    })
}

/// Pull `error.message` out of a Drive error body, falling back to the raw text
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl RemoteStore for DriveClient {
    async fn list(&self, query: &FileQuery) -> Result<Vec<RemoteFile>> {
        let q = query.to_drive_query();
        debug!("files.list q={}", q);

        let response = self
            .session
            .http()
            .get(format!("{}/files", self.api_base))
            .query(&[
                ("q", q.as_str()),
                ("spaces", "drive"),
                ("fields", "files(id,name,mimeType,trashed)"),
            ])
            .bearer_auth(self.session.access_token())
            .send()
            .await?;

        let list: FileList = parse_response(response).await?;
        Ok(list.files)
    }

    async fn trash(&self, file_id: &str) -> Result<RemoteFile> {
        self.update(file_id, json!({ "trashed": true })).await
    }

    async fn rename(&self, file_id: &str, new_name: &str) -> Result<RemoteFile> {
        self.update(file_id, json!({ "name": new_name })).await
    }

    async fn upload(&self, request: &UploadRequest, progress: ProgressCallback<'_>) -> Result<RemoteFile> {
        let mut upload = ResumableUpload::start(&self.session, &self.upload_base, request).await?;
        let mut tracker = ProgressTracker::new(upload.total_bytes());

        info!(
            "Starting upload of {} ({})",
            request.name,
            format_bytes(upload.total_bytes())
        );

        loop {
            match upload.next_chunk().await? {
                ChunkStatus::InProgress { uploaded } => {
                    progress(tracker.update(uploaded));
                }
                ChunkStatus::Complete(file) => {
                    tracker.update(upload.total_bytes());
                    info!(
                        "Upload complete: {} (id {}, average {})",
                        file.name,
                        file.id,
                        format_speed(tracker.average_speed())
                    );
                    return Ok(file);
                }
            }
        }
    }
}
