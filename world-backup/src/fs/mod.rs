//! Local filesystem access for the backup.

pub mod walker;
