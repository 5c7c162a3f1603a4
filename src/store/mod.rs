//! SQL persistence: schema management and the loosely-typed store the sync
//! and export stages drive.

mod db;
mod error;
mod schema;
mod value;

pub use db::{SqliteStore, Store};
pub use error::StoreError;
pub use schema::{SCHEMA_VERSION, TABLES};
pub use value::{escape_text, FieldMap, Row, SqlValue};
