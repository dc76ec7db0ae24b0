//! Remote backup rotation.
//!
//! Remote records carry no state besides their name: `<base>.zip` is the
//! current backup, `<marker><base>.zip` the previous one. A run first trashes
//! the previous record, then relabels the current one as previous, leaving
//! the canonical name free for the upload.
//!
//! Each step queries by name and refuses to act on anything but exactly one
//! match. The steps are independent: if a run dies between them, the next
//! run finds nothing to demote and relabels the stale current record.

use crate::drive::{FileQuery, RemoteFile, RemoteStore};
use crate::utils::Result;
use std::fmt;
use tracing::{info, warn};

/// What a rotation step did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    /// No matching record, nothing changed
    NotFound,
    /// More than one candidate, nothing changed
    Ambiguous { matches: Vec<String> },
    /// The previous backup was moved to the trash
    Trashed { name: String },
    /// The current backup was renamed
    Renamed { from: String, to: String },
}

impl RotationOutcome {
    pub fn is_mutation(&self) -> bool {
        matches!(self, RotationOutcome::Trashed { .. } | RotationOutcome::Renamed { .. })
    }
}

impl fmt::Display for RotationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotationOutcome::NotFound => write!(f, "nothing found"),
            RotationOutcome::Ambiguous { matches } => write!(f, "ambiguous ({} matches)", matches.len()),
            RotationOutcome::Trashed { name } => write!(f, "trashed {}", name),
            RotationOutcome::Renamed { from, to } => write!(f, "renamed {} to {}", from, to),
        }
    }
}

/// Rotates the remote records of one backup set
pub struct Rotator<'a, S: RemoteStore + ?Sized> {
    store: &'a S,
    base_name: String,
    previous_marker: String,
}

impl<'a, S: RemoteStore + ?Sized> Rotator<'a, S> {
    pub fn new(store: &'a S, base_name: &str, previous_marker: &str) -> Self {
        Self {
            store,
            base_name: base_name.to_string(),
            previous_marker: previous_marker.to_string(),
        }
    }

    /// Name token identifying the previous backup (`OLD_world1`)
    pub fn previous_token(&self) -> String {
        format!("{}{}", self.previous_marker, self.base_name)
    }

    /// Move the previous backup to the trash
    pub async fn demote_previous(&self) -> Result<RotationOutcome> {
        info!("Removing old backup file...");
        let token = self.previous_token();
        let found = self.store.list(&FileQuery::archives_named(token.as_str())).await?;
        log_found(&found);

        let file = match single(&found) {
            Selection::None => {
                info!("Failed to locate file with name {}", token);
                return Ok(RotationOutcome::NotFound);
            }
            Selection::Many(matches) => {
                warn!("Found more than 1 file with name {}, leaving them untouched", token);
                return Ok(RotationOutcome::Ambiguous { matches });
            }
            Selection::One(file) => file,
        };

        let trashed = self.store.trash(&file.id).await?;
        let name = if trashed.name.is_empty() { file.name.clone() } else { trashed.name };
        info!("Moved {} to trash", name);
        Ok(RotationOutcome::Trashed { name })
    }

    /// Rename the current backup to carry the previous-marker
    pub async fn relabel_current(&self) -> Result<RotationOutcome> {
        info!("Renaming current backup file to {}<filename>...", self.previous_marker);
        let found = self.store.list(&FileQuery::archives_named(self.base_name.as_str())).await?;
        log_found(&found);

        let current: Vec<RemoteFile> = found
            .into_iter()
            .filter(|f| !f.name.contains(&self.previous_marker))
            .collect();

        let file = match single(&current) {
            Selection::None => {
                info!("Failed to locate file with name {}", self.base_name);
                return Ok(RotationOutcome::NotFound);
            }
            Selection::Many(matches) => {
                warn!("Found more than 1 file with name {}, leaving them untouched", self.base_name);
                return Ok(RotationOutcome::Ambiguous { matches });
            }
            Selection::One(file) => file,
        };

        let new_name = format!("{}{}", self.previous_marker, file.name);
        let renamed = self.store.rename(&file.id, &new_name).await?;
        let to = if renamed.name.is_empty() { new_name } else { renamed.name };
        info!("Renamed {} to {}", file.name, to);
        Ok(RotationOutcome::Renamed {
            from: file.name.clone(),
            to,
        })
    }
}

enum Selection<'f> {
    None,
    One(&'f RemoteFile),
    Many(Vec<String>),
}

fn single(files: &[RemoteFile]) -> Selection<'_> {
    match files {
        [] => Selection::None,
        [file] => Selection::One(file),
        many => Selection::Many(many.iter().map(|f| f.name.clone()).collect()),
    }
}

fn log_found(files: &[RemoteFile]) {
    for file in files {
        info!("Found file {}", file.name);
    }
}
