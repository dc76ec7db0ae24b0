//! Directory traversal for archive creation.
//!
//! Produces every file and directory below a root, in a stable order, with
//! paths relative to that root so they can be used as archive entry names.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Options for directory walking
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Follow symbolic links
    pub follow_links: bool,

    /// Exclude patterns (matched against file names)
    pub exclude_patterns: Vec<String>,
}

/// Information about an entry discovered during walking
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Full path to the entry
    pub path: PathBuf,

    /// Relative path from the root
    pub relative_path: PathBuf,

    /// File size in bytes (0 for directories)
    pub size: u64,

    /// Is this a directory?
    pub is_dir: bool,
}

impl FileInfo {
    fn from_entry(entry: &DirEntry, root: &Path) -> walkdir::Result<Self> {
        let metadata = entry.metadata()?;
        let path = entry.path().to_path_buf();
        let relative_path = path.strip_prefix(root).unwrap_or(&path).to_path_buf();

        Ok(Self {
            path,
            relative_path,
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            is_dir: metadata.is_dir(),
        })
    }

    /// Entry name inside an archive: forward slashes, trailing slash for directories
    pub fn archive_name(&self) -> String {
        let name = self
            .relative_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if self.is_dir {
            format!("{}/", name)
        } else {
            name
        }
    }
}

/// Walk a directory tree and collect all entries below `root`.
///
/// The root itself is not returned. Entries are sorted by file name at each
/// level, so the result is deterministic. Symlinks are skipped unless
/// `follow_links` is set.
///
/// # Errors
/// Fails if `root` does not exist or any entry below it cannot be read.
pub fn walk_directory(root: &Path, options: &WalkOptions) -> walkdir::Result<Vec<FileInfo>> {
    let mut entries = Vec::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(options.follow_links)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry?;

        if should_exclude(&entry, &options.exclude_patterns) {
            continue;
        }

        if entry.path_is_symlink() && !options.follow_links {
            continue;
        }

        entries.push(FileInfo::from_entry(&entry, root)?);
    }

    Ok(entries)
}

/// Check if a directory entry should be excluded based on patterns
fn should_exclude(entry: &DirEntry, patterns: &[String]) -> bool {
    let file_name = entry.file_name().to_string_lossy();
    patterns.iter().any(|pattern| file_name.contains(pattern.as_str()))
}
