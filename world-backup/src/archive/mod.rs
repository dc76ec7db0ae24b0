//! Local backup archive: creation and lifetime.
//!
//! A [`BackupArchive`] owns the zip file written for one run. It is removed
//! explicitly once the upload is confirmed; on any earlier failure it is
//! simply dropped and the file stays on disk for manual recovery.

use crate::fs::walker::{walk_directory, WalkOptions};
use crate::utils::{BackupError, Result};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Archive container format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
}

impl ArchiveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "application/zip",
        }
    }

    /// File name for an archive of `base_name` in this format
    pub fn file_name(&self, base_name: &str) -> String {
        format!("{}.{}", base_name, self.extension())
    }
}

/// A compressed bundle of a source directory, living in the work directory
#[derive(Debug)]
pub struct BackupArchive {
    base_name: String,
    format: ArchiveFormat,
    path: PathBuf,
    size: u64,
    remote_id: Option<String>,
}

impl BackupArchive {
    /// Wrap an archive that already exists on disk
    pub fn open(base_name: &str, format: ArchiveFormat, path: PathBuf) -> Result<Self> {
        let size = std::fs::metadata(&path)?.len();
        Ok(Self {
            base_name: base_name.to_string(),
            format,
            path,
            size,
            remote_id: None,
        })
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn format(&self) -> ArchiveFormat {
        self.format
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Canonical remote name (`<base>.<ext>`)
    pub fn file_name(&self) -> String {
        self.format.file_name(&self.base_name)
    }

    pub fn remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref()
    }

    pub fn set_remote_id(&mut self, id: String) {
        self.remote_id = Some(id);
    }

    /// Delete the local file. Failure is logged and reported, never fatal.
    pub fn remove(self) -> bool {
        info!("Removing local backup: {}", self.path.display());
        match std::fs::remove_file(&self.path) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to remove local backup {}: {}", self.path.display(), e);
                false
            }
        }
    }
}

/// Package `source_dir` into `<output_dir>/<base_name>.zip`, replacing any
/// existing file of that name.
pub fn create_archive(source_dir: &Path, output_dir: &Path, base_name: &str) -> Result<BackupArchive> {
    let format = ArchiveFormat::Zip;

    if !source_dir.is_dir() {
        return Err(BackupError::Archive(format!(
            "source directory {} does not exist or is not a directory",
            source_dir.display()
        )));
    }

    let archive_path = output_dir.join(format.file_name(base_name));
    let mut entries = walk_directory(source_dir, &WalkOptions::default())?;
    // A work dir inside the source tree must not archive a stale copy of itself
    entries.retain(|entry| entry.path != archive_path);

    info!(
        "Creating archive {} from {} ({} entries)",
        archive_path.display(),
        source_dir.display(),
        entries.len()
    );

    let file = File::create(&archive_path)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(true);

    for entry in &entries {
        let name = entry.archive_name();
        if entry.is_dir {
            zip.add_directory(name, options)?;
        } else {
            debug!("Adding {} ({} bytes)", name, entry.size);
            zip.start_file(name, options)?;
            let mut source = File::open(&entry.path)?;
            io::copy(&mut source, &mut zip)?;
        }
    }

    let mut writer = zip.finish()?;
    io::Write::flush(&mut writer)?;
    drop(writer);

    BackupArchive::open(base_name, format, archive_path)
}
