//! Upload progress reporting.

pub mod progress;
