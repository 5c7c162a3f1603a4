//! Error types for the database store module.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open or create the database file.
    #[error("Failed to open database at {path}: {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    /// Failed to create or migrate the table set.
    #[error("Database migration failed: {0}")]
    Migration(#[from] rusqlite::Error),

    /// A query failed.
    #[error("Database query failed: {0}")]
    Query(String),

    /// A statement was issued with no columns to work with.
    #[error("Empty field map for statement on table {0}")]
    EmptyFields(String),

    /// The database schema version is newer than supported.
    #[error("Database schema version {found} is newer than supported version {expected}")]
    UnsupportedSchemaVersion { found: i32, expected: i32 },

    /// A row that was just inserted could not be read back.
    #[error("Inserted row in table {table} is not visible on re-select")]
    InsertNotVisible { table: String },
}

impl StoreError {
    /// Create a Query error from a rusqlite error.
    pub fn query(source: rusqlite::Error) -> Self {
        Self::Query(source.to_string())
    }
}
