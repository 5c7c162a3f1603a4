//! Normalized record types built by the loader.
//!
//! Records are constructed once during parse and never mutated afterwards;
//! optional fields encode presence explicitly instead of being probed at
//! use sites.

/// A timestamp kept in both representations: the raw Apple timer interval
/// for audit, and the converted UNIX epoch seconds for queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerDate {
    pub timer: f64,
    pub epoch: i64,
}

/// Top-level library properties.
#[derive(Debug, Clone)]
pub struct LibraryProperties {
    /// Full path of the iPhoto library the document describes.
    pub path: String,
    /// iPhoto's internal archive identifier; (path, archive id) is the
    /// library's natural identity.
    pub archive_id: i64,
    /// Raw application version string, e.g. `"7.1.5 (378)"`.
    pub application_version: String,
    pub major_version: i64,
    pub minor_version: i64,
}

/// A roll (iPhoto's "event"): a chronological grouping of images.
#[derive(Debug, Clone)]
pub struct Roll {
    pub roll_id: i64,
    pub name: String,
    pub photo_count: i64,
    /// Image id of the roll's cover photo.
    pub key_photo: Option<i64>,
    pub roll_date: Option<TimerDate>,
    /// Member image ids; consumed by the sync engine, never persisted as an
    /// entity column.
    pub key_list: Vec<i64>,
}

/// A smart-album filter descriptor.
#[derive(Debug, Clone)]
pub struct Filter {
    pub count: i64,
    pub operation: String,
    pub filter_type: String,
}

/// A named, possibly filtered grouping of images with optional slideshow
/// configuration.
#[derive(Debug, Clone)]
pub struct Album {
    pub album_id: i64,
    pub name: String,
    pub album_type: Option<String>,
    pub filter_mode: Option<String>,
    pub master: bool,
    pub guid: Option<String>,
    pub photo_count: i64,
    pub play_music: bool,
    pub repeat_slide_show: bool,
    pub seconds_per_slide: Option<i64>,
    pub slide_show_use_titles: bool,
    pub song_path: Option<String>,
    pub transition_direction: Option<i64>,
    pub transition_name: Option<String>,
    pub transition_speed: Option<f64>,
    pub pan_and_zoom: bool,
    pub shuffle_slides: bool,
    /// Ordered member image ids; persisted only as join rows.
    pub key_list: Vec<i64>,
    pub filters: Vec<Filter>,
}

/// One image (or movie — iPhoto files everything under "image").
///
/// At least one of `thumb_path`, `image_path`, `original_path` is present;
/// the loader rejects records with none.
#[derive(Debug, Clone)]
pub struct Image {
    pub image_id: i64,
    pub guid: String,
    /// Roll the image was imported into, when recorded.
    pub roll_id: Option<i64>,
    pub rating: Option<i64>,
    pub comment: Option<String>,
    pub caption: Option<String>,
    pub media_type: Option<String>,
    pub aspect_ratio: Option<f64>,
    pub rotation_is_only_edit: bool,
    pub original_date: Option<TimerDate>,
    pub modified_date: Option<TimerDate>,
    pub import_date: Option<TimerDate>,
    /// Thumbnail file.
    pub thumb_path: Option<String>,
    /// Working copy — the current full-size file (modified image, or the
    /// movie file itself).
    pub image_path: Option<String>,
    /// Pre-edit original; absent when the image was never modified.
    pub original_path: Option<String>,
    /// Keyword ids tagged on this image; persisted only as join rows.
    pub keywords: Vec<i64>,
}
