//! AlbumData.xml loader.
//!
//! Decodes the property-list export, gates on the application version, and
//! copies the four nested structures out into typed, immutable collections.
//! Schema-specific key names are renamed to canonical ones, timer intervals
//! are converted alongside their raw values, and boolean encodings are
//! coerced — all here, so nothing downstream probes raw dictionaries.

use std::collections::BTreeMap;
use std::path::Path;

use plist::{Dictionary, Value};

use super::error::AlbumError;
use super::normalize::{as_f64, as_i64, as_str, coerce_boolean, epoch_convert};
use super::types::{Album, Filter, Image, LibraryProperties, Roll, TimerDate};

/// The application version this loader was written against. A differing
/// major triplet is a hard stop; a differing minor build only warns.
pub const SUPPORTED_MAJOR: [&str; 3] = ["7", "1", "5"];
pub const SUPPORTED_MINOR: &str = "378";

/// The fully normalized contents of one AlbumData.xml document.
#[derive(Debug)]
pub struct AlbumData {
    pub properties: LibraryProperties,
    /// Keyword id → display text, from the library's keyword dictionary.
    pub keywords: BTreeMap<i64, String>,
    pub rolls: BTreeMap<i64, Roll>,
    pub albums: BTreeMap<i64, Album>,
    pub images: BTreeMap<i64, Image>,
    /// Non-fatal findings (currently only the minor-version mismatch)
    /// surfaced to the caller instead of being printed here.
    pub warnings: Vec<String>,
}

/// Load and normalize an AlbumData.xml file.
pub fn load(path: &Path) -> Result<AlbumData, AlbumError> {
    if !path.exists() {
        return Err(AlbumError::NotFound(path.to_path_buf()));
    }

    let root = Value::from_file(path).map_err(|source| AlbumError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let root = root.as_dictionary().ok_or(AlbumError::Malformed {
        key: "root",
        detail: "top-level value is not a dictionary".into(),
    })?;

    let application_version = required_str(root, "Application Version")?.to_string();
    let mut warnings = Vec::new();
    check_version(&application_version, &mut warnings)?;

    let properties = LibraryProperties {
        path: required_str(root, "Archive Path")?.to_string(),
        archive_id: required_i64(root, "ArchiveId")?,
        application_version,
        major_version: required_i64(root, "Major Version")?,
        minor_version: required_i64(root, "Minor Version")?,
    };

    let keywords = parse_keywords(required_dict(root, "List of Keywords")?)?;
    let rolls = parse_rolls(required_array(root, "List of Rolls")?)?;
    let albums = parse_albums(required_array(root, "List of Albums")?)?;
    let images = parse_images(required_dict(root, "Master Image List")?)?;

    tracing::debug!(
        rolls = rolls.len(),
        albums = albums.len(),
        images = images.len(),
        keywords = keywords.len(),
        "Loaded library document"
    );

    Ok(AlbumData {
        properties,
        keywords,
        rolls,
        albums,
        images,
        warnings,
    })
}

/// Split `"7.1.5 (378)"` into a major triplet and minor build, then compare
/// against the supported version. Major mismatch is fatal; minor mismatch
/// appends a warning.
fn check_version(version: &str, warnings: &mut Vec<String>) -> Result<(), AlbumError> {
    let (major, minor) = version
        .split_once(' ')
        .ok_or_else(|| AlbumError::Malformed {
            key: "Application Version",
            detail: format!("expected 'N.N.N (build)', got '{}'", version),
        })?;
    let major_parts: Vec<&str> = major.split('.').collect();
    let minor = minor.trim_matches(|c| c == '(' || c == ')');

    if major_parts != SUPPORTED_MAJOR {
        return Err(AlbumError::VersionIncompatible {
            found: version.to_string(),
            supported: format!("{} ({})", SUPPORTED_MAJOR.join("."), SUPPORTED_MINOR),
        });
    }
    if minor != SUPPORTED_MINOR {
        let warning = format!(
            "Library minor version '{}' differs from supported '{}'; possible data loss",
            minor, SUPPORTED_MINOR
        );
        tracing::warn!("{}", warning);
        warnings.push(warning);
    }
    Ok(())
}

fn required<'a>(dict: &'a Dictionary, key: &'static str) -> Result<&'a Value, AlbumError> {
    dict.get(key).ok_or(AlbumError::MissingKey(key))
}

fn required_str<'a>(dict: &'a Dictionary, key: &'static str) -> Result<&'a str, AlbumError> {
    as_str(required(dict, key)?).ok_or(AlbumError::Malformed {
        key,
        detail: "expected a string".into(),
    })
}

fn required_i64(dict: &Dictionary, key: &'static str) -> Result<i64, AlbumError> {
    as_i64(required(dict, key)?).ok_or(AlbumError::Malformed {
        key,
        detail: "expected an integer".into(),
    })
}

fn required_dict<'a>(dict: &'a Dictionary, key: &'static str) -> Result<&'a Dictionary, AlbumError> {
    required(dict, key)?
        .as_dictionary()
        .ok_or(AlbumError::Malformed {
            key,
            detail: "expected a dictionary".into(),
        })
}

fn required_array<'a>(dict: &'a Dictionary, key: &'static str) -> Result<&'a [Value], AlbumError> {
    required(dict, key)?
        .as_array()
        .map(|a| a.as_slice())
        .ok_or(AlbumError::Malformed {
            key,
            detail: "expected an array".into(),
        })
}

fn opt_str(dict: &Dictionary, key: &str) -> Option<String> {
    dict.get(key).and_then(as_str).map(str::to_string)
}

fn opt_i64(dict: &Dictionary, key: &str) -> Option<i64> {
    dict.get(key).and_then(as_i64)
}

fn opt_f64(dict: &Dictionary, key: &str) -> Option<f64> {
    dict.get(key).and_then(as_f64)
}

/// Parse a timer-interval field into its retained raw + converted pair.
fn opt_timer_date(dict: &Dictionary, key: &str) -> Option<TimerDate> {
    opt_f64(dict, key).map(|timer| TimerDate {
        timer,
        epoch: epoch_convert(timer),
    })
}

/// Parse a key list (image/keyword ids stored as an array of strings).
fn id_list(dict: &Dictionary, key: &'static str) -> Result<Vec<i64>, AlbumError> {
    match dict.get(key) {
        None => Ok(Vec::new()),
        Some(value) => {
            let array = value.as_array().ok_or(AlbumError::Malformed {
                key,
                detail: "expected an array of ids".into(),
            })?;
            array
                .iter()
                .map(|v| {
                    as_i64(v).ok_or(AlbumError::Malformed {
                        key,
                        detail: format!("unparsable id entry {:?}", v),
                    })
                })
                .collect()
        }
    }
}

fn parse_keywords(raw: &Dictionary) -> Result<BTreeMap<i64, String>, AlbumError> {
    let mut keywords = BTreeMap::new();
    for (key, value) in raw.iter() {
        let id: i64 = key.parse().map_err(|_| AlbumError::Malformed {
            key: "List of Keywords",
            detail: format!("non-numeric keyword id '{}'", key),
        })?;
        let text = as_str(value).ok_or(AlbumError::Malformed {
            key: "List of Keywords",
            detail: format!("keyword {} is not a string", id),
        })?;
        keywords.insert(id, text.to_string());
    }
    Ok(keywords)
}

fn parse_rolls(raw: &[Value]) -> Result<BTreeMap<i64, Roll>, AlbumError> {
    let mut rolls = BTreeMap::new();
    for entry in raw {
        let dict = entry.as_dictionary().ok_or(AlbumError::Malformed {
            key: "List of Rolls",
            detail: "roll entry is not a dictionary".into(),
        })?;
        let roll = Roll {
            roll_id: required_i64(dict, "RollID")?,
            name: opt_str(dict, "RollName").unwrap_or_default(),
            photo_count: opt_i64(dict, "PhotoCount").unwrap_or(0),
            key_photo: opt_i64(dict, "KeyPhotoKey"),
            roll_date: opt_timer_date(dict, "RollDateAsTimerInterval"),
            key_list: id_list(dict, "KeyList")?,
        };
        rolls.insert(roll.roll_id, roll);
    }
    Ok(rolls)
}

fn parse_albums(raw: &[Value]) -> Result<BTreeMap<i64, Album>, AlbumError> {
    let mut albums = BTreeMap::new();
    for entry in raw {
        let dict = entry.as_dictionary().ok_or(AlbumError::Malformed {
            key: "List of Albums",
            detail: "album entry is not a dictionary".into(),
        })?;
        let album = Album {
            album_id: required_i64(dict, "AlbumId")?,
            name: opt_str(dict, "AlbumName").unwrap_or_default(),
            album_type: opt_str(dict, "Album Type"),
            filter_mode: opt_str(dict, "Filter Mode"),
            master: coerce_boolean(dict.get("Master")),
            guid: opt_str(dict, "GUID"),
            photo_count: opt_i64(dict, "PhotoCount").unwrap_or(0),
            play_music: coerce_boolean(dict.get("PlayMusic")),
            repeat_slide_show: coerce_boolean(dict.get("RepeatSlideShow")),
            seconds_per_slide: opt_i64(dict, "SecondsPerSlide"),
            slide_show_use_titles: coerce_boolean(dict.get("SlideShowUseTitles")),
            song_path: opt_str(dict, "SongPath"),
            transition_direction: opt_i64(dict, "TransitionDirection"),
            transition_name: opt_str(dict, "TransitionName"),
            transition_speed: opt_f64(dict, "TransitionSpeed"),
            pan_and_zoom: coerce_boolean(dict.get("PanAndZoom")),
            shuffle_slides: coerce_boolean(dict.get("ShuffleSlides")),
            key_list: id_list(dict, "KeyList")?,
            filters: parse_filters(dict)?,
        };
        albums.insert(album.album_id, album);
    }
    Ok(albums)
}

fn parse_filters(album: &Dictionary) -> Result<Vec<Filter>, AlbumError> {
    let raw = match album.get("Filters").and_then(|v| v.as_array()) {
        Some(array) => array,
        None => return Ok(Vec::new()),
    };
    let mut filters = Vec::with_capacity(raw.len());
    for entry in raw {
        let dict = entry.as_dictionary().ok_or(AlbumError::Malformed {
            key: "Filters",
            detail: "filter entry is not a dictionary".into(),
        })?;
        filters.push(Filter {
            count: opt_i64(dict, "Count").unwrap_or(0),
            operation: opt_str(dict, "Operation").unwrap_or_default(),
            filter_type: opt_str(dict, "Type").unwrap_or_default(),
        });
    }
    Ok(filters)
}

fn parse_images(raw: &Dictionary) -> Result<BTreeMap<i64, Image>, AlbumError> {
    let mut images = BTreeMap::new();
    for (key, value) in raw.iter() {
        let image_id: i64 = key.parse().map_err(|_| AlbumError::Malformed {
            key: "Master Image List",
            detail: format!("non-numeric image id '{}'", key),
        })?;
        let dict = value.as_dictionary().ok_or(AlbumError::Malformed {
            key: "Master Image List",
            detail: format!("image {} is not a dictionary", image_id),
        })?;

        let image = Image {
            image_id,
            guid: opt_str(dict, "GUID").ok_or(AlbumError::Malformed {
                key: "Master Image List",
                detail: format!("image {} has no GUID", image_id),
            })?,
            roll_id: opt_i64(dict, "Roll"),
            rating: opt_i64(dict, "Rating"),
            comment: opt_str(dict, "Comment"),
            caption: opt_str(dict, "Caption"),
            media_type: opt_str(dict, "MediaType"),
            aspect_ratio: opt_f64(dict, "Aspect Ratio"),
            rotation_is_only_edit: coerce_boolean(dict.get("RotationIsOnlyEdit")),
            original_date: opt_timer_date(dict, "DateAsTimerInterval"),
            modified_date: opt_timer_date(dict, "ModDateAsTimerInterval"),
            import_date: opt_timer_date(dict, "MetaModDateAsTimerInterval"),
            thumb_path: opt_str(dict, "ThumbPath"),
            image_path: opt_str(dict, "ImagePath"),
            original_path: opt_str(dict, "OriginalPath"),
            keywords: id_list(dict, "Keywords")?,
        };

        if image.thumb_path.is_none() && image.image_path.is_none() && image.original_path.is_none()
        {
            return Err(AlbumError::NoImagePaths { id: image_id });
        }

        images.insert(image_id, image);
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn dict(entries: Vec<(&str, Value)>) -> Dictionary {
        let mut d = Dictionary::new();
        for (k, v) in entries {
            d.insert(k.to_string(), v);
        }
        d
    }

    fn s(text: &str) -> Value {
        Value::String(text.to_string())
    }

    fn i(n: i64) -> Value {
        Value::Integer(n.into())
    }

    /// Build a small but fully-featured AlbumData.xml in a temp dir.
    fn write_fixture(version: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let keywords = dict(vec![("1", s("family")), ("2", s("fun"))]);

        let roll = dict(vec![
            ("RollID", i(1)),
            ("RollName", s("Summer")),
            ("PhotoCount", i(2)),
            ("KeyPhotoKey", i(7)),
            ("RollDateAsTimerInterval", Value::Real(107_292_766.0)),
            ("KeyList", Value::Array(vec![s("7"), s("8")])),
        ]);

        let filter = dict(vec![
            ("Count", i(0)),
            ("Operation", s("In Key List")),
            ("Type", s("Roll")),
        ]);
        let album = dict(vec![
            ("AlbumId", i(3)),
            ("AlbumName", s("Favorites")),
            ("Album Type", s("Regular")),
            ("Filter Mode", s("All")),
            ("Master", s("YES")),
            ("GUID", s("EEBF1D90-7A64-49F7-A49E-0925D1BBEF50")),
            ("PhotoCount", i(2)),
            ("PlayMusic", Value::Boolean(true)),
            ("RepeatSlideShow", i(1)),
            ("ShuffleSlides", s("NO")),
            ("KeyList", Value::Array(vec![s("7"), s("8")])),
            ("Filters", Value::Array(vec![Value::Dictionary(filter)])),
        ]);

        let image7 = dict(vec![
            ("GUID", s("A91BD448-2DA1-48AA-920F-086290E15EC4")),
            ("Roll", i(1)),
            ("Rating", i(5)),
            ("Caption", s("IMG_2671")),
            ("Comment", s("great pic")),
            ("MediaType", s("Image")),
            ("Aspect Ratio", Value::Real(1.32635)),
            ("RotationIsOnlyEdit", s("YES")),
            ("DateAsTimerInterval", Value::Real(194_507_075.39234)),
            ("ModDateAsTimerInterval", Value::Real(206_835_802.21532)),
            ("MetaModDateAsTimerInterval", Value::Real(230_762_401.31222)),
            ("ThumbPath", s("/lib/Thumbs/IMG_2671.jpg")),
            ("ImagePath", s("/lib/Modified/IMG_2671.jpg")),
            ("OriginalPath", s("/lib/Originals/IMG_2671.jpg")),
            ("Keywords", Value::Array(vec![s("1"), s("2")])),
        ]);
        let image8 = dict(vec![
            ("GUID", s("B0000000-0000-0000-0000-000000000001")),
            ("Roll", i(1)),
            ("MediaType", s("Image")),
            ("DateAsTimerInterval", Value::Real(194_507_080.0)),
            ("ImagePath", s("/lib/Data/IMG_2672.jpg")),
        ]);

        let root = dict(vec![
            ("Application Version", s(version)),
            ("Major Version", i(2)),
            ("Minor Version", i(0)),
            ("Archive Path", s("/Users/me/Pictures/iPhoto Library")),
            ("ArchiveId", i(1)),
            ("List of Keywords", Value::Dictionary(keywords)),
            ("List of Rolls", Value::Array(vec![Value::Dictionary(roll)])),
            (
                "List of Albums",
                Value::Array(vec![Value::Dictionary(album)]),
            ),
            (
                "Master Image List",
                Value::Dictionary(dict(vec![
                    ("7", Value::Dictionary(image7)),
                    ("8", Value::Dictionary(image8)),
                ])),
            ),
        ]);

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("AlbumData.xml");
        Value::Dictionary(root).to_file_xml(&path).unwrap();
        (tmp, path)
    }

    #[test]
    fn test_load_keys_collections_by_natural_ids() {
        let (_tmp, path) = write_fixture("7.1.5 (378)");
        let data = load(&path).unwrap();

        assert_eq!(data.properties.path, "/Users/me/Pictures/iPhoto Library");
        assert_eq!(data.properties.archive_id, 1);
        assert_eq!(data.rolls.keys().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(data.albums.keys().copied().collect::<Vec<_>>(), vec![3]);
        assert_eq!(data.images.keys().copied().collect::<Vec<_>>(), vec![7, 8]);
        assert_eq!(data.keywords.len(), 2);
        assert!(data.warnings.is_empty());
    }

    #[test]
    fn test_load_normalizes_timer_fields() {
        let (_tmp, path) = write_fixture("7.1.5 (378)");
        let data = load(&path).unwrap();

        let roll = &data.rolls[&1];
        let date = roll.roll_date.unwrap();
        assert_eq!(date.timer, 107_292_766.0);
        assert_eq!(date.epoch, 978_307_200 + 107_292_766);

        let image = &data.images[&7];
        assert_eq!(
            image.original_date.unwrap().epoch,
            978_307_200 + 194_507_075
        );
        assert!(image.modified_date.is_some());
        assert!(image.import_date.is_some());
    }

    #[test]
    fn test_load_coerces_boolean_encodings() {
        let (_tmp, path) = write_fixture("7.1.5 (378)");
        let data = load(&path).unwrap();

        let album = &data.albums[&3];
        assert!(album.master); // "YES"
        assert!(album.play_music); // true
        assert!(album.repeat_slide_show); // 1
        assert!(!album.shuffle_slides); // "NO"
        assert!(!album.pan_and_zoom); // absent

        assert!(data.images[&7].rotation_is_only_edit);
        assert!(!data.images[&8].rotation_is_only_edit);
    }

    #[test]
    fn test_load_parses_membership_lists() {
        let (_tmp, path) = write_fixture("7.1.5 (378)");
        let data = load(&path).unwrap();

        assert_eq!(data.albums[&3].key_list, vec![7, 8]);
        assert_eq!(data.albums[&3].filters.len(), 1);
        assert_eq!(data.albums[&3].filters[0].operation, "In Key List");
        assert_eq!(data.rolls[&1].key_list, vec![7, 8]);
        assert_eq!(data.images[&7].keywords, vec![1, 2]);
        assert!(data.images[&8].keywords.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let result = load(Path::new("/nonexistent/AlbumData.xml"));
        assert!(matches!(result, Err(AlbumError::NotFound(_))));
    }

    #[test]
    fn test_load_unparsable_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("AlbumData.xml");
        fs::write(&path, b"this is not a plist").unwrap();
        assert!(matches!(load(&path), Err(AlbumError::Parse { .. })));
    }

    #[test]
    fn test_load_missing_required_key() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("AlbumData.xml");
        let root = dict(vec![("Application Version", s("7.1.5 (378)"))]);
        Value::Dictionary(root).to_file_xml(&path).unwrap();
        assert!(matches!(load(&path), Err(AlbumError::MissingKey(_))));
    }

    #[test]
    fn test_load_major_version_mismatch_is_fatal() {
        let (_tmp, path) = write_fixture("8.0.1 (402)");
        assert!(matches!(
            load(&path),
            Err(AlbumError::VersionIncompatible { .. })
        ));
    }

    #[test]
    fn test_load_minor_version_mismatch_warns() {
        let (_tmp, path) = write_fixture("7.1.5 (380)");
        let data = load(&path).unwrap();
        assert_eq!(data.warnings.len(), 1);
        assert!(data.warnings[0].contains("possible data loss"));
    }

    #[test]
    fn test_load_rejects_image_without_any_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("AlbumData.xml");
        let pathless = dict(vec![("GUID", s("C-1")), ("MediaType", s("Image"))]);
        let root = dict(vec![
            ("Application Version", s("7.1.5 (378)")),
            ("Major Version", i(2)),
            ("Minor Version", i(0)),
            ("Archive Path", s("/lib")),
            ("ArchiveId", i(1)),
            ("List of Keywords", Value::Dictionary(Dictionary::new())),
            ("List of Rolls", Value::Array(vec![])),
            ("List of Albums", Value::Array(vec![])),
            (
                "Master Image List",
                Value::Dictionary(dict(vec![("9", Value::Dictionary(pathless))])),
            ),
        ]);
        Value::Dictionary(root).to_file_xml(&path).unwrap();
        assert!(matches!(
            load(&path),
            Err(AlbumError::NoImagePaths { id: 9 })
        ));
    }
}
