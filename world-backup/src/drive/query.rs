//! Drive `files.list` search queries.

use super::RemoteFile;

/// A search for non-trashed archives whose name contains a token.
///
/// Renders to `trashed = false and name contains '<token>' and mimeType contains 'zip'`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileQuery {
    name_contains: String,
    mime_contains: String,
}

impl FileQuery {
    /// Query for zip archives whose name contains `token`
    pub fn archives_named(token: impl Into<String>) -> Self {
        Self {
            name_contains: token.into(),
            mime_contains: "zip".to_string(),
        }
    }

    /// Query string in Drive search syntax
    pub fn to_drive_query(&self) -> String {
        format!(
            "trashed = false and name contains '{}' and mimeType contains '{}'",
            escape_literal(&self.name_contains),
            escape_literal(&self.mime_contains)
        )
    }

    /// Local evaluation of the same predicate
    pub fn matches(&self, file: &RemoteFile) -> bool {
        !file.trashed
            && file.name.contains(&self.name_contains)
            && file.mime_type.contains(&self.mime_contains)
    }
}

/// Escape a value for use inside a single-quoted query literal
fn escape_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
