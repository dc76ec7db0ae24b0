//! Backup run executor - orchestrates one rotation.
//!
//! The stages run strictly in order:
//! - archive the world directory (fatal on failure)
//! - authenticate against Drive (fatal)
//! - trash the previous remote backup (advisory)
//! - relabel the current remote backup as previous (advisory)
//! - upload the new archive (fatal)
//! - delete the local archive (advisory)
//!
//! When a fatal stage fails after the archive exists, the archive is kept on
//! disk and its path is logged.

use crate::archive::{create_archive, BackupArchive};
use crate::config::Config;
use crate::drive::{self, DriveClient, RemoteFile, RemoteStore, UploadRequest};
use crate::rotation::{RotationOutcome, Rotator};
use crate::transfer::progress::{format_bytes, format_duration, format_speed, TransferProgress};
use crate::utils::Result;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Everything one run needs, resolved from configuration
#[derive(Debug, Clone)]
pub struct BackupJob {
    /// Directory that gets archived
    pub source_dir: PathBuf,
    /// Directory the local archive is written to
    pub work_dir: PathBuf,
    /// Base name of the archive and of the remote backups
    pub base_name: String,
    /// Drive folder the archive is uploaded into
    pub dest_folder: String,
    pub chunk_size: u64,
    pub previous_marker: String,
}

impl BackupJob {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            source_dir: config.source_dir()?,
            work_dir: config.world.work_dir.clone(),
            base_name: config.world.name.clone(),
            dest_folder: config.drive.dest_folder.clone(),
            chunk_size: config.drive.chunk_size,
            previous_marker: config.rotation.previous_marker.clone(),
        })
    }
}

/// Summary of a completed run
#[derive(Debug)]
pub struct BackupResult {
    /// Outcome of trashing the previous backup, `None` if the step errored
    pub demoted: Option<RotationOutcome>,
    /// Outcome of relabeling the current backup, `None` if the step errored
    pub relabeled: Option<RotationOutcome>,
    /// The newly created remote record
    pub uploaded: RemoteFile,
    pub archive_bytes: u64,
    /// Whether the local archive was deleted
    pub local_removed: bool,
    pub duration: Duration,
}

/// Run the whole pipeline against Google Drive
pub async fn run(config: &Config) -> Result<BackupResult> {
    let start_time = Instant::now();
    let job = BackupJob::from_config(config)?;

    let archive = archive_world(&job)?;

    let session = match drive::authenticate(&config.drive.service_account_file, &config.drive.scope).await {
        Ok(session) => session,
        Err(e) => {
            retain(archive);
            return Err(e);
        }
    };
    let client = DriveClient::new(session);

    execute(&client, &job, archive, start_time).await
}

/// Create the local archive for `job`
pub fn archive_world(job: &BackupJob) -> Result<BackupArchive> {
    info!("Creating new world backup...");
    let archive = create_archive(&job.source_dir, &job.work_dir, &job.base_name).map_err(|e| {
        error!("Failed to create a world backup: {}", e);
        e
    })?;
    info!(
        "Created {} ({})",
        archive.path().display(),
        format_bytes(archive.size())
    );
    Ok(archive)
}

/// Rotate, upload and clean up, with an already authorized store
pub async fn execute<S: RemoteStore + ?Sized>(
    store: &S,
    job: &BackupJob,
    mut archive: BackupArchive,
    start_time: Instant,
) -> Result<BackupResult> {
    let rotator = Rotator::new(store, &job.base_name, &job.previous_marker);

    let demoted = advisory("trash previous backup", rotator.demote_previous().await);
    let relabeled = advisory("relabel current backup", rotator.relabel_current().await);

    let request = UploadRequest {
        local_path: archive.path().to_path_buf(),
        name: archive.file_name(),
        parent: job.dest_folder.clone(),
        mime_type: archive.format().mime_type().to_string(),
        chunk_size: job.chunk_size,
    };

    info!("Starting upload...");
    let mut report_progress = |progress: &TransferProgress| {
        info!(
            "    uploaded {}% ({} of {}, {}, eta {})",
            progress.percent(),
            format_bytes(progress.transferred_bytes),
            format_bytes(progress.total_bytes),
            format_speed(progress.bytes_per_second),
            format_duration(progress.eta_seconds)
        );
    };

    let uploaded = match store.upload(&request, &mut report_progress).await {
        Ok(file) => file,
        Err(e) => {
            // No retry: every transfer error ends the run
            error!("Upload failed: {}", e);
            retain(archive);
            return Err(e);
        }
    };
    info!("Upload Complete!");

    archive.set_remote_id(uploaded.id.clone());
    let archive_bytes = archive.size();
    let local_removed = archive.remove();

    let duration = start_time.elapsed();
    info!("Execution time: {:.2} seconds", duration.as_secs_f64());

    Ok(BackupResult {
        demoted,
        relabeled,
        uploaded,
        archive_bytes,
        local_removed,
        duration,
    })
}

/// Rotation problems never stop the run
fn advisory(step: &str, result: Result<RotationOutcome>) -> Option<RotationOutcome> {
    match result {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            warn!("Failed to {}: {}", step, e);
            None
        }
    }
}

fn retain(archive: BackupArchive) {
    warn!(
        "Keeping local backup {} for manual recovery",
        archive.path().display()
    );
}
