//! Media file export.
//!
//! For every synchronized image, each stored path (working image, thumbnail,
//! original) is materialized in a flat export directory under a
//! deterministic name. Failing transfers are collected and retried once
//! through the system `cp` at the end of the run; files that still cannot
//! be produced are reported, never fatal.

mod error;
mod paths;

pub use error::ExportError;
pub use paths::{dest_filename, strip_backslashes, PathRole};

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use indicatif::ProgressBar;

use crate::progress::Progress;
use crate::store::{FieldMap, SqlValue, Store};

/// How exported files are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStrategy {
    /// Copy file contents.
    Copy,
    /// Create symlinks back into the library.
    Link,
}

/// Outcome of one export run.
#[derive(Debug, Default)]
pub struct ExportReport {
    /// Files produced in the primary phase.
    pub exported: u64,
    /// Images with no database row to export from.
    pub missing_rows: u64,
    /// Transfers pushed to the retry phase.
    pub deferred: u64,
    /// Deferred transfers the retry phase recovered.
    pub recovered: u64,
    /// Destinations that could not be produced at all.
    pub unrecoverable: Vec<PathBuf>,
}

/// Export every stored path of the given images into `export_dir`.
pub fn export(
    store: &dyn Store,
    library_id: i64,
    image_ids: &[i64],
    export_dir: &Path,
    strategy: TransferStrategy,
    progress: &Progress,
) -> Result<ExportReport, ExportError> {
    std::fs::create_dir_all(export_dir).map_err(|source| ExportError::CreateDir {
        path: export_dir.to_path_buf(),
        source,
    })?;

    let mut report = ExportReport::default();
    let mut deferred: Vec<(PathBuf, PathBuf)> = Vec::new();

    let pb = progress.bar(image_ids.len() as u64, "export");
    for &image_id in image_ids {
        export_image(
            store, library_id, image_id, export_dir, strategy, &pb, &mut report, &mut deferred,
        )?;
        pb.inc(1);
    }
    pb.finish();

    report.deferred = deferred.len() as u64;
    retry_deferred(deferred, &mut report);

    tracing::info!(
        exported = report.exported,
        deferred = report.deferred,
        recovered = report.recovered,
        unrecoverable = report.unrecoverable.len(),
        "Export complete"
    );
    Ok(report)
}

#[allow(clippy::too_many_arguments)]
fn export_image(
    store: &dyn Store,
    library_id: i64,
    image_id: i64,
    export_dir: &Path,
    strategy: TransferStrategy,
    pb: &ProgressBar,
    report: &mut ExportReport,
    deferred: &mut Vec<(PathBuf, PathBuf)>,
) -> Result<(), ExportError> {
    let mut matches = FieldMap::new();
    matches.insert("iPhotoLibraryID".into(), SqlValue::Int(library_id));
    matches.insert("ImageID".into(), SqlValue::Int(image_id));
    let rows = store.select("Images", &matches, Some(1))?;

    let row = match rows.first() {
        Some(row) => row,
        None => {
            pb.suspend(|| tracing::warn!(image_id, "No database row for image, skipping export"));
            report.missing_rows += 1;
            return Ok(());
        }
    };
    let guid = row
        .get("GUID")
        .and_then(SqlValue::as_text)
        .unwrap_or_default();

    for role in PathRole::ALL {
        let source = match row.get(role.column()).and_then(SqlValue::as_text) {
            Some(path) if !path.is_empty() => strip_backslashes(path),
            _ => continue,
        };
        let src = PathBuf::from(&source);
        let dest = export_dir.join(dest_filename(library_id, guid, role, &source));

        match transfer(strategy, &src, &dest)? {
            Transfer::Done => report.exported += 1,
            Transfer::Deferred => {
                pb.suspend(|| {
                    tracing::warn!(
                        src = %src.display(),
                        dest = %dest.display(),
                        "Transfer failed, deferring"
                    )
                });
                deferred.push((src, dest));
            }
        }
    }
    Ok(())
}

enum Transfer {
    Done,
    Deferred,
}

fn transfer(strategy: TransferStrategy, src: &Path, dest: &Path) -> Result<Transfer, ExportError> {
    match strategy {
        TransferStrategy::Link => Ok(link(src, dest)),
        TransferStrategy::Copy => copy(src, dest),
    }
}

/// Symlink `dest` at `src`. An existing destination is replaced; any other
/// failure is deferred to the retry phase.
fn link(src: &Path, dest: &Path) -> Transfer {
    match std::os::unix::fs::symlink(src, dest) {
        Ok(()) => Transfer::Done,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            if std::fs::remove_file(dest).is_err() {
                return Transfer::Deferred;
            }
            match std::os::unix::fs::symlink(src, dest) {
                Ok(()) => Transfer::Done,
                Err(_) => Transfer::Deferred,
            }
        }
        Err(_) => Transfer::Deferred,
    }
}

/// Copy `src` to `dest`. A missing source is deferred; any other I/O
/// failure aborts the run.
fn copy(src: &Path, dest: &Path) -> Result<Transfer, ExportError> {
    match std::fs::copy(src, dest) {
        Ok(_) => {
            if dest.exists() {
                Ok(Transfer::Done)
            } else {
                Ok(Transfer::Deferred)
            }
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Transfer::Deferred),
        Err(source) => Err(ExportError::Copy {
            src: src.to_path_buf(),
            dest: dest.to_path_buf(),
            source,
        }),
    }
}

/// Retry deferred transfers through the system `cp`, which handles cases
/// the direct calls occasionally trip over (dangling replacements, odd
/// permission bits). Whatever still fails is recorded and the run goes on.
fn retry_deferred(deferred: Vec<(PathBuf, PathBuf)>, report: &mut ExportReport) {
    for (src, dest) in deferred {
        let recovered = Command::new("cp")
            .arg(&src)
            .arg(&dest)
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
            && dest.exists();

        if recovered {
            report.recovered += 1;
        } else {
            tracing::warn!(
                src = %src.display(),
                dest = %dest.display(),
                "Could not export file"
            );
            report.unrecoverable.push(dest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use std::fs;

    fn insert_image(
        store: &SqliteStore,
        image_id: i64,
        guid: &str,
        thumb: Option<&str>,
        image: Option<&str>,
        original: Option<&str>,
    ) {
        let mut fields = FieldMap::new();
        fields.insert("iPhotoLibraryID".into(), SqlValue::Int(1));
        fields.insert("ImageID".into(), SqlValue::Int(image_id));
        fields.insert("GUID".into(), SqlValue::from(guid));
        if let Some(p) = thumb {
            fields.insert("ThumbPath".into(), SqlValue::from(p));
        }
        if let Some(p) = image {
            fields.insert("ImagePath".into(), SqlValue::from(p));
        }
        if let Some(p) = original {
            fields.insert("OriginalPath".into(), SqlValue::from(p));
        }
        store.insert("Images", &fields).unwrap();
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"pixels").unwrap();
        path
    }

    #[test]
    fn test_copy_exports_every_stored_path() {
        let store = SqliteStore::open_in_memory("").unwrap();
        let src_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();

        let thumb = touch(src_dir.path(), "thumb.jpg");
        let image = touch(src_dir.path(), "image.jpg");
        let original = touch(src_dir.path(), "original.jpg");
        insert_image(
            &store,
            7,
            "G-1",
            Some(thumb.to_str().unwrap()),
            Some(image.to_str().unwrap()),
            Some(original.to_str().unwrap()),
        );

        let report = export(
            &store,
            1,
            &[7],
            out_dir.path(),
            TransferStrategy::Copy,
            &Progress::disabled(),
        )
        .unwrap();

        assert_eq!(report.exported, 3);
        assert!(report.unrecoverable.is_empty());
        assert!(out_dir.path().join("1G-1.jpg").exists());
        assert!(out_dir.path().join("1G-1T.jpg").exists());
        assert!(out_dir.path().join("1G-1O.jpg").exists());
    }

    #[test]
    fn test_roles_without_paths_are_not_exported() {
        let store = SqliteStore::open_in_memory("").unwrap();
        let src_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();

        let image = touch(src_dir.path(), "only.jpg");
        insert_image(&store, 7, "G-1", None, Some(image.to_str().unwrap()), None);

        let report = export(
            &store,
            1,
            &[7],
            out_dir.path(),
            TransferStrategy::Copy,
            &Progress::disabled(),
        )
        .unwrap();

        assert_eq!(report.exported, 1);
        assert!(out_dir.path().join("1G-1.jpg").exists());
        assert!(!out_dir.path().join("1G-1T.jpg").exists());
        assert!(!out_dir.path().join("1G-1O.jpg").exists());
    }

    #[test]
    fn test_link_strategy_replaces_existing_destination() {
        let store = SqliteStore::open_in_memory("").unwrap();
        let src_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();

        let image = touch(src_dir.path(), "image.jpg");
        insert_image(&store, 7, "G-1", None, Some(image.to_str().unwrap()), None);

        // Stale file from a previous run sits at the destination.
        let dest = out_dir.path().join("1G-1.jpg");
        fs::write(&dest, b"stale").unwrap();

        let report = export(
            &store,
            1,
            &[7],
            out_dir.path(),
            TransferStrategy::Link,
            &Progress::disabled(),
        )
        .unwrap();

        assert_eq!(report.exported, 1);
        let meta = fs::symlink_metadata(&dest).unwrap();
        assert!(meta.file_type().is_symlink());
        assert_eq!(fs::read_link(&dest).unwrap(), image);
    }

    #[test]
    fn test_missing_row_is_skipped() {
        let store = SqliteStore::open_in_memory("").unwrap();
        let src_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();

        let image = touch(src_dir.path(), "image.jpg");
        insert_image(&store, 7, "G-1", None, Some(image.to_str().unwrap()), None);

        let report = export(
            &store,
            1,
            &[7, 99],
            out_dir.path(),
            TransferStrategy::Copy,
            &Progress::disabled(),
        )
        .unwrap();

        assert_eq!(report.exported, 1);
        assert_eq!(report.missing_rows, 1);
    }

    #[test]
    fn test_deferred_transfer_recovered_by_retry() {
        let store = SqliteStore::open_in_memory("").unwrap();
        let src_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();

        let image = touch(src_dir.path(), "image.jpg");
        insert_image(&store, 7, "G-1", None, Some(image.to_str().unwrap()), None);

        // A directory at the destination cannot be linked over or removed
        // in the primary phase; the `cp` retry copies into it.
        let dest = out_dir.path().join("1G-1.jpg");
        fs::create_dir(&dest).unwrap();

        let report = export(
            &store,
            1,
            &[7],
            out_dir.path(),
            TransferStrategy::Link,
            &Progress::disabled(),
        )
        .unwrap();

        assert_eq!(report.exported, 0);
        assert_eq!(report.deferred, 1);
        assert_eq!(report.recovered, 1);
        assert!(report.unrecoverable.is_empty());
        assert!(dest.join("image.jpg").exists());
    }

    #[test]
    fn test_missing_source_ends_unrecoverable_without_aborting() {
        let store = SqliteStore::open_in_memory("").unwrap();
        let src_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();

        let good = touch(src_dir.path(), "good.jpg");
        insert_image(&store, 7, "G-1", None, Some(good.to_str().unwrap()), None);
        insert_image(&store, 8, "G-2", None, Some("/nonexistent/gone.jpg"), None);

        let report = export(
            &store,
            1,
            &[7, 8],
            out_dir.path(),
            TransferStrategy::Copy,
            &Progress::disabled(),
        )
        .unwrap();

        assert_eq!(report.exported, 1);
        assert_eq!(report.deferred, 1);
        assert_eq!(report.recovered, 0);
        assert_eq!(report.unrecoverable, vec![out_dir.path().join("1G-2.jpg")]);
        assert!(out_dir.path().join("1G-1.jpg").exists());
    }

    #[test]
    fn test_escaped_stored_paths_are_read_back() {
        let store = SqliteStore::open_in_memory("").unwrap();
        let src_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();

        // The store escapes '%' on insert; export must strip it again.
        let image = touch(src_dir.path(), "50% off.jpg");
        insert_image(&store, 7, "G-1", None, Some(image.to_str().unwrap()), None);

        let report = export(
            &store,
            1,
            &[7],
            out_dir.path(),
            TransferStrategy::Copy,
            &Progress::disabled(),
        )
        .unwrap();

        assert_eq!(report.exported, 1);
        assert!(out_dir.path().join("1G-1.jpg").exists());
    }
}
