//! Error types for the export module.

use std::path::PathBuf;

use thiserror::Error;

use crate::store::StoreError;

/// Errors that abort an export run.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Reading image rows back from the database failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The export directory could not be created.
    #[error("Failed to create export directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A copy failed for a reason other than a missing source.
    #[error("Failed to copy {src} to {dest}: {source}")]
    Copy {
        src: PathBuf,
        dest: PathBuf,
        source: std::io::Error,
    },
}
