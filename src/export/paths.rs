//! Export filename construction.
//!
//! Exported files are named `{library row id}{GUID}{role suffix}{ext}` so
//! every variant of every image in every library lands in one flat
//! directory without collisions.

/// Which stored path of an image is being exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRole {
    /// The working (possibly edited) image.
    Image,
    /// The thumbnail.
    Thumb,
    /// The unedited original.
    Original,
}

impl PathRole {
    pub const ALL: [PathRole; 3] = [PathRole::Image, PathRole::Thumb, PathRole::Original];

    /// Filename suffix distinguishing the role. The working image gets none.
    pub fn suffix(self) -> &'static str {
        match self {
            PathRole::Image => "",
            PathRole::Thumb => "T",
            PathRole::Original => "O",
        }
    }

    /// The Images column holding this role's source path.
    pub fn column(self) -> &'static str {
        match self {
            PathRole::Image => "ImagePath",
            PathRole::Thumb => "ThumbPath",
            PathRole::Original => "OriginalPath",
        }
    }
}

/// Build the destination filename for one exported file.
///
/// The extension is taken from the source path's final component,
/// dot included; a name with no extension gets none.
pub fn dest_filename(library_id: i64, guid: &str, role: PathRole, source_path: &str) -> String {
    format!(
        "{}{}{}{}",
        library_id,
        guid,
        role.suffix(),
        extension(source_path)
    )
}

/// Extract the extension (with leading dot) from a path's final component.
/// Leading dots of the basename do not start an extension.
fn extension(path: &str) -> &str {
    let basename = path.rsplit('/').next().unwrap_or(path);
    let trimmed = basename.trim_start_matches('.');
    match trimmed.rfind('.') {
        Some(idx) => &trimmed[idx..],
        None => "",
    }
}

/// Remove the backslashes that escaping added before a path went into the
/// database.
pub fn strip_backslashes(path: &str) -> String {
    path.chars().filter(|c| *c != '\\').collect()
}
