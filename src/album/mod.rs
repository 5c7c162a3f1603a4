//! Library document ingest: plist decoding, field normalization, and the
//! typed record structs the rest of the pipeline consumes.

mod error;
mod loader;
pub mod normalize;
mod types;

pub use error::AlbumError;
pub use loader::{load, AlbumData, SUPPORTED_MAJOR, SUPPORTED_MINOR};
pub use types::{Album, Filter, Image, LibraryProperties, Roll, TimerDate};
