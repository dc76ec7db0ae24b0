//! Configuration management for the world backup.
//!
//! Loads configuration from a TOML file with environment variable overrides
//! (`WORLD_BACKUP__<SECTION>__<KEY>`, e.g. `WORLD_BACKUP__DRIVE__DEST_FOLDER`).

use crate::drive::upload::CHUNK_ALIGNMENT;
use crate::utils::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "WORLD_BACKUP";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub world: WorldConfig,
    pub drive: DriveConfig,
    #[serde(default)]
    pub rotation: RotationConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    /// World name; also the base name of the archive and of the remote backups
    pub name: String,

    /// Minecraft installation directory, the world is read from `<path>/saves/<name>`
    #[serde(default)]
    pub minecraft_path: Option<PathBuf>,

    /// Explicit source directory, takes precedence over `minecraft_path`
    #[serde(default)]
    pub source_dir: Option<PathBuf>,

    /// Directory the local archive is written to
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    /// Service account JSON key file
    pub service_account_file: PathBuf,

    /// Drive folder id the backup is uploaded into
    pub dest_folder: String,

    /// OAuth scope requested for the session
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Upload chunk size in bytes (multiple of 256 KiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Prefix marking the superseded remote backup
    #[serde(default = "default_previous_marker")]
    pub previous_marker: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            previous_marker: default_previous_marker(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default values
fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_scope() -> String {
    "https://www.googleapis.com/auth/drive".to_string()
}

fn default_chunk_size() -> u64 {
    CHUNK_ALIGNMENT * 200 // 50 MiB
}

fn default_previous_marker() -> String {
    "OLD_".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file, applying environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text, without environment overrides
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Toml))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Directory that gets archived
    pub fn source_dir(&self) -> Result<PathBuf> {
        match (&self.world.source_dir, &self.world.minecraft_path) {
            (Some(dir), _) => Ok(dir.clone()),
            (None, Some(minecraft)) => Ok(minecraft.join("saves").join(&self.world.name)),
            (None, None) => Err(BackupError::Config(
                "either world.source_dir or world.minecraft_path must be set".to_string(),
            )),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.world.name.trim().is_empty() {
            return Err(BackupError::Config("world.name must not be empty".to_string()));
        }
        if self.world.name.contains(['/', '\\']) {
            return Err(BackupError::Config(format!(
                "world.name must be a plain name, got {:?}",
                self.world.name
            )));
        }
        if self.drive.dest_folder.trim().is_empty() {
            return Err(BackupError::Config("drive.dest_folder must not be empty".to_string()));
        }
        if self.drive.chunk_size == 0 || self.drive.chunk_size % CHUNK_ALIGNMENT != 0 {
            return Err(BackupError::Config(format!(
                "drive.chunk_size must be a positive multiple of {} bytes, got {}",
                CHUNK_ALIGNMENT, self.drive.chunk_size
            )));
        }
        if self.rotation.previous_marker.is_empty() {
            return Err(BackupError::Config("rotation.previous_marker must not be empty".to_string()));
        }
        self.source_dir()?;
        Ok(())
    }
}
