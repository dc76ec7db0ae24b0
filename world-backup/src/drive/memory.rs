//! In-memory [`RemoteStore`] used by the rotation and pipeline tests.

use super::{FileQuery, ProgressCallback, RemoteFile, RemoteStore, UploadRequest};
use crate::transfer::progress::TransferProgress;
use crate::utils::{BackupError, Result, UploadError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<Vec<RemoteFile>>,
    next_id: AtomicUsize,
    remote_calls: AtomicUsize,
    mutations: AtomicUsize,
    uploaded_bytes: Mutex<Vec<u8>>,
    fail_list: bool,
    fail_upload: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with zip archives of the given names
    pub fn with_files(names: &[&str]) -> Self {
        let store = Self::new();
        for name in names {
            store.insert(name, false);
        }
        store
    }

    /// Every `list` call fails
    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    /// Every `upload` call fails with a server error
    pub fn failing_upload(mut self) -> Self {
        self.fail_upload = true;
        self
    }

    pub fn insert(&self, name: &str, trashed: bool) -> String {
        let id = format!("file-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.files.lock().unwrap().push(RemoteFile {
            id: id.clone(),
            name: name.to_string(),
            mime_type: "application/zip".to_string(),
            trashed,
        });
        id
    }

    pub fn files(&self) -> Vec<RemoteFile> {
        self.files.lock().unwrap().clone()
    }

    /// Names of files that are not in the trash, sorted
    pub fn live_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .files()
            .into_iter()
            .filter(|f| !f.trashed)
            .map(|f| f.name)
            .collect();
        names.sort();
        names
    }

    pub fn trashed_names(&self) -> Vec<String> {
        self.files().into_iter().filter(|f| f.trashed).map(|f| f.name).collect()
    }

    /// Number of calls of any kind
    pub fn remote_calls(&self) -> usize {
        self.remote_calls.load(Ordering::SeqCst)
    }

    /// Number of trash/rename/upload calls that changed state
    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    pub fn uploaded_bytes(&self) -> Vec<u8> {
        self.uploaded_bytes.lock().unwrap().clone()
    }

    fn modify(&self, file_id: &str, change: impl FnOnce(&mut RemoteFile)) -> Result<RemoteFile> {
        let mut files = self.files.lock().unwrap();
        let file = files.iter_mut().find(|f| f.id == file_id).ok_or_else(|| BackupError::Api {
            status: 404,
            message: format!("File not found: {}.", file_id),
        })?;
        change(file);
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(file.clone())
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list(&self, query: &FileQuery) -> Result<Vec<RemoteFile>> {
        self.remote_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list {
            return Err(BackupError::Api {
                status: 500,
                message: "Internal Error".to_string(),
            });
        }
        Ok(self.files().into_iter().filter(|f| query.matches(f)).collect())
    }

    async fn trash(&self, file_id: &str) -> Result<RemoteFile> {
        self.remote_calls.fetch_add(1, Ordering::SeqCst);
        self.modify(file_id, |f| f.trashed = true)
    }

    async fn rename(&self, file_id: &str, new_name: &str) -> Result<RemoteFile> {
        self.remote_calls.fetch_add(1, Ordering::SeqCst);
        self.modify(file_id, |f| f.name = new_name.to_string())
    }

    async fn upload(&self, request: &UploadRequest, progress: ProgressCallback<'_>) -> Result<RemoteFile> {
        self.remote_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_upload {
            return Err(UploadError::from_status(503, "Service Unavailable".to_string()).into());
        }

        let data = tokio::fs::read(&request.local_path).await?;
        let total = data.len() as u64;
        let mut state = TransferProgress::new(total);
        let mut sent = 0u64;
        while sent + request.chunk_size < total {
            sent += request.chunk_size;
            state.update(sent);
            progress(&state);
        }

        *self.uploaded_bytes.lock().unwrap() = data;
        let id = self.insert(&request.name, false);
        self.mutations.fetch_add(1, Ordering::SeqCst);

        Ok(RemoteFile {
            id,
            name: request.name.clone(),
            mime_type: "application/zip".to_string(),
            trashed: false,
        })
    }
}
