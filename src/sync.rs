//! Library-to-database synchronization.
//!
//! Images, albums, and rolls are upserted in place, keyed by the library row
//! plus their id from the source document, so repeated runs against the same
//! database converge instead of duplicating. Membership facts (keywords and
//! album contents) have no stable identity of their own and are rebuilt
//! wholesale each run, one transaction per related table pair.

use crate::album::{normalize::format_timestamp, Album, AlbumData, Image, Roll, TimerDate};
use crate::progress::Progress;
use crate::store::{FieldMap, SqlValue, Store, StoreError};

/// Insert/update counts for one upserted entity.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Upserts {
    pub inserted: u64,
    pub updated: u64,
}

/// Outcome of one synchronization run.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub library_id: i64,
    pub images: Upserts,
    pub albums: Upserts,
    pub rolls: Upserts,
    pub keywords: u64,
    pub image_keywords: u64,
    pub album_images: u64,
    pub filters: u64,
}

/// Write the loaded library document into the store.
pub fn synchronize(
    store: &dyn Store,
    data: &AlbumData,
    progress: &Progress,
) -> Result<SyncReport, StoreError> {
    let library_id = resolve_library_id(store, data)?;
    tracing::info!(library_id, "Synchronizing library");

    let mut report = SyncReport {
        library_id,
        ..SyncReport::default()
    };

    // Each entity's membership facts are rebuilt right after its rows, so a
    // partial run never leaves facts ahead of their owners.
    let pb = progress.bar(data.images.len() as u64, "images");
    for image in data.images.values() {
        let matches = image_key(library_id, image.image_id);
        let values = image_fields(image);
        upsert(store, "Images", &matches, &values, &mut report.images)?;
        pb.inc(1);
    }
    pb.finish();
    rebuild_keyword_facts(store, library_id, data, &mut report)?;

    let pb = progress.bar(data.albums.len() as u64, "albums");
    for album in data.albums.values() {
        let matches = album_key(library_id, album.album_id);
        let values = album_fields(album);
        upsert(store, "Albums", &matches, &values, &mut report.albums)?;
        pb.inc(1);
    }
    pb.finish();
    rebuild_album_facts(store, library_id, data, &mut report)?;

    let pb = progress.bar(data.rolls.len() as u64, "rolls");
    for roll in data.rolls.values() {
        let matches = roll_key(library_id, roll.roll_id);
        let values = roll_fields(roll);
        upsert(store, "Rolls", &matches, &values, &mut report.rolls)?;
        pb.inc(1);
    }
    pb.finish();

    tracing::info!(
        images_inserted = report.images.inserted,
        images_updated = report.images.updated,
        albums_inserted = report.albums.inserted,
        albums_updated = report.albums.updated,
        rolls_inserted = report.rolls.inserted,
        rolls_updated = report.rolls.updated,
        "Synchronization complete"
    );
    Ok(report)
}

/// Find or create the library row for this archive, returning its row id.
///
/// Identity is the archive path plus archive id, so the same database can
/// hold several libraries side by side.
fn resolve_library_id(store: &dyn Store, data: &AlbumData) -> Result<i64, StoreError> {
    let props = &data.properties;
    let mut matches = FieldMap::new();
    matches.insert("Path".into(), SqlValue::from(props.path.as_str()));
    matches.insert("ArchiveID".into(), SqlValue::Int(props.archive_id));

    if let Some(id) = library_row_id(store, &matches)? {
        return Ok(id);
    }

    let mut values = matches.clone();
    values.insert(
        "iPhotoVersion".into(),
        SqlValue::from(props.application_version.as_str()),
    );
    values.insert("MajorVersion".into(), SqlValue::Int(props.major_version));
    values.insert("MinorVersion".into(), SqlValue::Int(props.minor_version));
    store.insert("iPhotoLibrary", &values)?;

    library_row_id(store, &matches)?.ok_or_else(|| StoreError::InsertNotVisible {
        table: "iPhotoLibrary".to_string(),
    })
}

fn library_row_id(store: &dyn Store, matches: &FieldMap) -> Result<Option<i64>, StoreError> {
    let rows = store.select("iPhotoLibrary", matches, Some(1))?;
    match rows.first() {
        None => Ok(None),
        Some(row) => row
            .get("ID")
            .and_then(SqlValue::as_int)
            .map(Some)
            .ok_or_else(|| StoreError::Query("iPhotoLibrary row has no ID".to_string())),
    }
}

/// Select-then-write upsert: one probe by natural key, then an update of
/// that row or a fresh insert.
fn upsert(
    store: &dyn Store,
    table: &str,
    matches: &FieldMap,
    values: &FieldMap,
    counts: &mut Upserts,
) -> Result<(), StoreError> {
    let existing = store.select(table, matches, Some(1))?;
    if existing.is_empty() {
        let mut row = matches.clone();
        row.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
        store.insert(table, &row)?;
        counts.inserted += 1;
    } else {
        store.update(table, matches, values)?;
        counts.updated += 1;
    }
    Ok(())
}

fn image_key(library_id: i64, image_id: i64) -> FieldMap {
    let mut m = FieldMap::new();
    m.insert("iPhotoLibraryID".into(), SqlValue::Int(library_id));
    m.insert("ImageID".into(), SqlValue::Int(image_id));
    m
}

fn album_key(library_id: i64, album_id: i64) -> FieldMap {
    let mut m = FieldMap::new();
    m.insert("iPhotoLibraryID".into(), SqlValue::Int(library_id));
    m.insert("AlbumID".into(), SqlValue::Int(album_id));
    m
}

fn roll_key(library_id: i64, roll_id: i64) -> FieldMap {
    let mut m = FieldMap::new();
    m.insert("iPhotoLibraryID".into(), SqlValue::Int(library_id));
    m.insert("RollID".into(), SqlValue::Int(roll_id));
    m
}

fn timer_text(date: &Option<TimerDate>) -> SqlValue {
    SqlValue::Text(format_timestamp(date.as_ref().map(|d| d.epoch)))
}

fn timer_raw(date: &Option<TimerDate>) -> SqlValue {
    SqlValue::Real(date.as_ref().map(|d| d.timer).unwrap_or(0.0))
}

fn opt_text(value: &Option<String>) -> SqlValue {
    match value {
        Some(s) => SqlValue::from(s.as_str()),
        None => SqlValue::Null,
    }
}

/// All non-key Images columns for one image. Timer fields are written
/// twice, as a rendered timestamp and as the raw interval.
fn image_fields(image: &Image) -> FieldMap {
    let mut f = FieldMap::new();
    f.insert("GUID".into(), SqlValue::from(image.guid.as_str()));
    f.insert("RollID".into(), SqlValue::Int(image.roll_id.unwrap_or(0)));
    f.insert("Rating".into(), SqlValue::Int(image.rating.unwrap_or(0)));
    f.insert(
        "Comment".into(),
        SqlValue::from(image.comment.as_deref().unwrap_or("")),
    );
    f.insert(
        "Caption".into(),
        SqlValue::from(image.caption.as_deref().unwrap_or("")),
    );
    f.insert(
        "MediaType".into(),
        SqlValue::from(image.media_type.as_deref().unwrap_or("")),
    );
    f.insert(
        "AspectRatio".into(),
        SqlValue::Real(image.aspect_ratio.unwrap_or(0.0)),
    );
    f.insert(
        "RotationIsOnlyEdit".into(),
        SqlValue::from(image.rotation_is_only_edit),
    );
    f.insert("OriginalDate".into(), timer_text(&image.original_date));
    f.insert(
        "OriginalDateAsAppleTimer".into(),
        timer_raw(&image.original_date),
    );
    f.insert("ModifiedDate".into(), timer_text(&image.modified_date));
    f.insert(
        "ModifiedDateAsAppleTimer".into(),
        timer_raw(&image.modified_date),
    );
    f.insert("ImportDate".into(), timer_text(&image.import_date));
    f.insert(
        "ImportDateAsAppleTimer".into(),
        timer_raw(&image.import_date),
    );
    f.insert("ThumbPath".into(), opt_text(&image.thumb_path));
    f.insert("ImagePath".into(), opt_text(&image.image_path));
    f.insert("OriginalPath".into(), opt_text(&image.original_path));
    f
}

fn album_fields(album: &Album) -> FieldMap {
    let mut f = FieldMap::new();
    f.insert("AlbumName".into(), SqlValue::from(album.name.as_str()));
    f.insert(
        "AlbumType".into(),
        SqlValue::from(album.album_type.as_deref().unwrap_or("")),
    );
    f.insert(
        "FilterMode".into(),
        SqlValue::from(album.filter_mode.as_deref().unwrap_or("")),
    );
    f.insert("Master".into(), SqlValue::from(album.master));
    f.insert(
        "GUID".into(),
        SqlValue::from(album.guid.as_deref().unwrap_or("")),
    );
    f.insert("PhotoCount".into(), SqlValue::Int(album.photo_count));
    f.insert("PlayMusic".into(), SqlValue::from(album.play_music));
    f.insert(
        "RepeatSlideShow".into(),
        SqlValue::from(album.repeat_slide_show),
    );
    f.insert(
        "SecondsPerSlide".into(),
        SqlValue::Int(album.seconds_per_slide.unwrap_or(0)),
    );
    f.insert(
        "SlideShowUseTitles".into(),
        SqlValue::from(album.slide_show_use_titles),
    );
    f.insert("SongPath".into(), opt_text(&album.song_path));
    f.insert(
        "TransitionDirection".into(),
        SqlValue::Int(album.transition_direction.unwrap_or(0)),
    );
    f.insert(
        "TransitionName".into(),
        SqlValue::from(album.transition_name.as_deref().unwrap_or("Dissolve")),
    );
    f.insert(
        "TransitionSpeed".into(),
        SqlValue::Real(album.transition_speed.unwrap_or(0.0)),
    );
    f.insert("PanAndZoom".into(), SqlValue::from(album.pan_and_zoom));
    f.insert("ShuffleSlides".into(), SqlValue::from(album.shuffle_slides));
    f
}

fn roll_fields(roll: &Roll) -> FieldMap {
    let mut f = FieldMap::new();
    f.insert("RollName".into(), SqlValue::from(roll.name.as_str()));
    f.insert("PhotoCount".into(), SqlValue::Int(roll.photo_count));
    f.insert(
        "KeyPhoto".into(),
        SqlValue::Int(roll.key_photo.unwrap_or(0)),
    );
    f.insert("RollDate".into(), timer_text(&roll.roll_date));
    f.insert("RollDateAsAppleTimer".into(), timer_raw(&roll.roll_date));
    f
}

/// Rebuild Keywords and ImageKeywords together from the document.
fn rebuild_keyword_facts(
    store: &dyn Store,
    library_id: i64,
    data: &AlbumData,
    report: &mut SyncReport,
) -> Result<(), StoreError> {
    let keywords: Vec<FieldMap> = data
        .keywords
        .iter()
        .map(|(id, text)| {
            let mut f = FieldMap::new();
            f.insert("KeywordID".into(), SqlValue::Int(*id));
            f.insert("iPhotoLibraryID".into(), SqlValue::Int(library_id));
            f.insert("Keyword".into(), SqlValue::from(text.as_str()));
            f
        })
        .collect();

    let image_keywords: Vec<FieldMap> = data
        .images
        .values()
        .flat_map(|image| {
            image.keywords.iter().map(move |keyword_id| {
                let mut f = FieldMap::new();
                f.insert("iPhotoLibraryID".into(), SqlValue::Int(library_id));
                f.insert("ImageID".into(), SqlValue::Int(image.image_id));
                f.insert("KeywordID".into(), SqlValue::Int(*keyword_id));
                f
            })
        })
        .collect();

    report.keywords = keywords.len() as u64;
    report.image_keywords = image_keywords.len() as u64;
    store.replace_all(&[("Keywords", keywords), ("ImageKeywords", image_keywords)])
}

/// Rebuild AlbumImages and Filters together from the document.
fn rebuild_album_facts(
    store: &dyn Store,
    library_id: i64,
    data: &AlbumData,
    report: &mut SyncReport,
) -> Result<(), StoreError> {
    let album_images: Vec<FieldMap> = data
        .albums
        .values()
        .flat_map(|album| {
            album.key_list.iter().map(move |image_id| {
                let mut f = FieldMap::new();
                f.insert("iPhotoLibraryID".into(), SqlValue::Int(library_id));
                f.insert("AlbumID".into(), SqlValue::Int(album.album_id));
                f.insert("ImageID".into(), SqlValue::Int(*image_id));
                f
            })
        })
        .collect();

    let filters: Vec<FieldMap> = data
        .albums
        .values()
        .flat_map(|album| {
            album.filters.iter().map(move |filter| {
                let mut f = FieldMap::new();
                f.insert("iPhotoLibraryID".into(), SqlValue::Int(library_id));
                f.insert("AlbumID".into(), SqlValue::Int(album.album_id));
                f.insert("Count".into(), SqlValue::Int(filter.count));
                f.insert("Operation".into(), SqlValue::from(filter.operation.as_str()));
                f.insert("Type".into(), SqlValue::from(filter.filter_type.as_str()));
                f
            })
        })
        .collect();

    report.album_images = album_images.len() as u64;
    report.filters = filters.len() as u64;
    store.replace_all(&[("AlbumImages", album_images), ("Filters", filters)])
}
