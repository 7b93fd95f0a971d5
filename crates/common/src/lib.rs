use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

mod sanitize;

pub use sanitize::{album_folder_name, destination_path, sanitize_segment, track_file_name};

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";
pub const UNKNOWN_GENRE: &str = "Unknown Genre";
pub const DEFAULT_TRACK_NUMBER: &str = "00";

/// One inventory entry. `absolute_path` is canonical and unique within the
/// inventory; `library_relative_path` uses forward slashes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub title: String,
    pub artist: String,
    pub album: String,
    #[serde(default)]
    pub year: Option<i32>,
    pub track_number: String,
    #[serde(default)]
    pub genres: Vec<String>,
    pub file_extension: String,
    pub absolute_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_relative_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u32>,
}

impl Track {
    /// Minimal record for a path that has no inventory entry.
    pub fn placeholder(path: &Path) -> Self {
        let title = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self {
            title,
            artist: UNKNOWN_ARTIST.to_string(),
            album: UNKNOWN_ALBUM.to_string(),
            year: None,
            track_number: DEFAULT_TRACK_NUMBER.to_string(),
            genres: Vec::new(),
            file_extension: file_extension(path),
            absolute_path: path.to_path_buf(),
            library_relative_path: None,
            duration_ms: None,
        }
    }
}

/// Lowercased extension with its leading dot, or an empty string.
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

pub fn relpath_from(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(path_to_slash_string(rel))
}

pub fn join_relpath(root: &Path, relpath: &str) -> PathBuf {
    let mut out = PathBuf::from(root);
    for part in relpath.split(['/', '\\']) {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            out.pop();
            continue;
        }
        out.push(part);
    }
    out
}

/// Path from `from_dir` to `to`, with `..` hops and forward slashes.
/// Both inputs are expected to be absolute.
pub fn relative_path(from_dir: &Path, to: &Path) -> Option<String> {
    let from = normalize_lexically(from_dir);
    let to = normalize_lexically(to);
    let from_parts: Vec<Component> = from.components().collect();
    let to_parts: Vec<Component> = to.components().collect();

    // Different roots or prefixes (Windows drives) have no relative form.
    if from_parts.first() != to_parts.first() {
        return None;
    }

    let common = from_parts
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..from_parts.len() {
        parts.push("..".to_string());
    }
    for part in &to_parts[common..] {
        parts.push(part.as_os_str().to_string_lossy().to_string());
    }
    Some(parts.join("/"))
}

/// Resolves `.` and `..` without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component.as_os_str());
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Canonical form used for identity comparisons: the resolved path when the
/// file exists, otherwise the lexically normalized one.
pub fn canonical_key(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| normalize_lexically(path))
}

/// Playlist lines are compared with forward slashes and no leading `./`.
pub fn normalize_entry(line: &str) -> String {
    let mut value = line.trim().replace('\\', "/");
    while let Some(rest) = value.strip_prefix("./") {
        value = rest.to_string();
    }
    value
}

fn path_to_slash_string(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    parts.join("/")
}
