//! Database schema definitions and migrations.

use rusqlite::Connection;

use super::error::StoreError;

/// Current schema version. Increment when making schema changes.
pub const SCHEMA_VERSION: i32 = 1;

/// All tables, in creation order. `{p}` is the configured table-name prefix.
pub const TABLES: [&str; 8] = [
    "iPhotoLibrary",
    "Albums",
    "Rolls",
    "Images",
    "Filters",
    "Keywords",
    "ImageKeywords",
    "AlbumImages",
];

/// Schema DDL for version 1. Row identity is the library id plus each
/// entity's id from the source document; membership tables carry no key of
/// their own because they are rebuilt wholesale every run.
const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS {p}iPhotoLibrary (
    ID INTEGER PRIMARY KEY AUTOINCREMENT,
    ArchiveID INTEGER NOT NULL,
    Path TEXT NOT NULL,
    iPhotoVersion TEXT DEFAULT '',
    MajorVersion INTEGER DEFAULT 0,
    MinorVersion INTEGER DEFAULT 0
);

CREATE TABLE IF NOT EXISTS {p}Albums (
    iPhotoLibraryID INTEGER NOT NULL,
    AlbumID INTEGER NOT NULL,
    AlbumName TEXT DEFAULT '',
    AlbumType TEXT DEFAULT '',
    FilterMode TEXT DEFAULT '',
    Master INTEGER DEFAULT 0,
    GUID TEXT DEFAULT '',
    PhotoCount INTEGER DEFAULT 0,
    PlayMusic INTEGER DEFAULT 0,
    RepeatSlideShow INTEGER DEFAULT 0,
    SecondsPerSlide INTEGER DEFAULT 0,
    SlideShowUseTitles INTEGER DEFAULT 0,
    SongPath TEXT,
    TransitionDirection INTEGER DEFAULT 0,
    TransitionName TEXT DEFAULT 'Dissolve',
    TransitionSpeed REAL DEFAULT 0.0,
    PanAndZoom INTEGER DEFAULT 0,
    ShuffleSlides INTEGER DEFAULT 0,
    PRIMARY KEY (iPhotoLibraryID, AlbumID)
);

CREATE TABLE IF NOT EXISTS {p}Rolls (
    iPhotoLibraryID INTEGER NOT NULL,
    RollID INTEGER NOT NULL,
    RollName TEXT DEFAULT '',
    PhotoCount INTEGER DEFAULT 0,
    KeyPhoto INTEGER DEFAULT 0,
    RollDate TEXT DEFAULT '0000-00-00 00:00:00',
    RollDateAsAppleTimer REAL DEFAULT 0.0,
    PRIMARY KEY (iPhotoLibraryID, RollID)
);

CREATE TABLE IF NOT EXISTS {p}Images (
    iPhotoLibraryID INTEGER NOT NULL,
    GUID TEXT NOT NULL,
    RollID INTEGER DEFAULT 0,
    ImageID INTEGER NOT NULL,
    Rating INTEGER DEFAULT 0,
    Comment TEXT DEFAULT '',
    Caption TEXT DEFAULT '',
    MediaType TEXT DEFAULT '',
    AspectRatio REAL DEFAULT 0.0,
    RotationIsOnlyEdit INTEGER DEFAULT 0,
    OriginalDate TEXT DEFAULT '0000-00-00 00:00:00',
    OriginalDateAsAppleTimer REAL DEFAULT 0.0,
    ModifiedDate TEXT DEFAULT '0000-00-00 00:00:00',
    ModifiedDateAsAppleTimer REAL DEFAULT 0.0,
    ImportDate TEXT DEFAULT '0000-00-00 00:00:00',
    ImportDateAsAppleTimer REAL DEFAULT 0.0,
    ThumbPath TEXT,
    ImagePath TEXT,
    OriginalPath TEXT,
    PRIMARY KEY (iPhotoLibraryID, ImageID)
);

CREATE TABLE IF NOT EXISTS {p}Filters (
    iPhotoLibraryID INTEGER NOT NULL,
    AlbumID INTEGER NOT NULL,
    Count INTEGER DEFAULT 0,
    Operation TEXT DEFAULT '',
    Type TEXT DEFAULT ''
);

CREATE TABLE IF NOT EXISTS {p}Keywords (
    KeywordID INTEGER NOT NULL,
    iPhotoLibraryID INTEGER NOT NULL,
    Keyword TEXT DEFAULT '',
    PRIMARY KEY (KeywordID, iPhotoLibraryID)
);

CREATE TABLE IF NOT EXISTS {p}ImageKeywords (
    iPhotoLibraryID INTEGER NOT NULL,
    ImageID INTEGER NOT NULL,
    KeywordID INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS {p}AlbumImages (
    iPhotoLibraryID INTEGER NOT NULL,
    AlbumID INTEGER NOT NULL,
    ImageID INTEGER NOT NULL
);
"#;

/// Get the current schema version from the database.
pub(crate) fn get_schema_version(conn: &Connection) -> Result<i32, StoreError> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

/// Set the schema version in the database.
fn set_schema_version(conn: &Connection, version: i32) -> Result<(), StoreError> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

/// Initialize or migrate the database schema.
///
/// This function is idempotent and safe to call on both new and existing
/// databases. Existing data is never touched.
pub(crate) fn migrate(conn: &Connection, prefix: &str) -> Result<(), StoreError> {
    let current_version = get_schema_version(conn)?;

    if current_version > SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchemaVersion {
            found: current_version,
            expected: SCHEMA_VERSION,
        });
    }

    if current_version < SCHEMA_VERSION {
        conn.execute_batch(&SCHEMA_V1.replace("{p}", prefix))?;
        set_schema_version(conn, SCHEMA_VERSION)?;
        tracing::debug!("Initialized database schema at version {}", SCHEMA_VERSION);
    }

    Ok(())
}

/// Drop every table and re-create the schema from scratch. Destroys data.
pub(crate) fn rebuild(conn: &Connection, prefix: &str) -> Result<(), StoreError> {
    for table in TABLES {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {}{}", prefix, table))?;
        tracing::warn!("Dropped table {}{}", prefix, table);
    }
    set_schema_version(conn, 0)?;
    migrate(conn, prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_db_migration() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn, "").unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_idempotent_migration() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn, "").unwrap();
        migrate(&conn, "").unwrap(); // Should be no-op
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_unsupported_version() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
            .unwrap();
        let result = migrate(&conn, "");
        assert!(matches!(
            result,
            Err(StoreError::UnsupportedSchemaVersion { .. })
        ));
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn, "").unwrap();

        for table in TABLES {
            let count: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })
                .unwrap();
            assert_eq!(count, 0, "table {} should exist and be empty", table);
        }
    }

    #[test]
    fn test_prefixed_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn, "exhibit_").unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' \
                 AND name LIKE 'exhibit\\_%' ESCAPE '\\'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, TABLES.len() as i64);
    }

    #[test]
    fn test_rebuild_drops_existing_rows() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn, "").unwrap();
        conn.execute(
            "INSERT INTO iPhotoLibrary (ArchiveID, Path) VALUES (1, '/lib')",
            [],
        )
        .unwrap();

        rebuild(&conn, "").unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM iPhotoLibrary", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }
}
