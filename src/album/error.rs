//! Error types for library document loading.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading and normalizing an AlbumData.xml file.
#[derive(Debug, Error)]
pub enum AlbumError {
    /// The library file does not exist.
    #[error("Library file not found: {0}")]
    NotFound(PathBuf),

    /// The file exists but could not be decoded as a property list.
    #[error("Could not parse library file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: plist::Error,
    },

    /// A required top-level key is absent from the document.
    #[error("Library file is missing required key '{0}'")]
    MissingKey(&'static str),

    /// A field was present but had an unusable shape or value.
    #[error("Malformed field '{key}': {detail}")]
    Malformed { key: &'static str, detail: String },

    /// The library's major version does not match the supported version.
    /// Hard stop — no partial import is attempted.
    #[error("Incompatible library version '{found}' (supported: {supported})")]
    VersionIncompatible { found: String, supported: String },

    /// An image record carries no thumbnail, working, or original path.
    #[error("Image {id} has no thumbnail, working copy, or original path")]
    NoImagePaths { id: i64 },
}
