use std::path::{Path, PathBuf};

use crate::Track;

/// Makes a single directory or file name segment safe on every common
/// filesystem. Illegal characters become `-`; an empty result yields
/// `fallback`.
pub fn sanitize_segment(value: &str, fallback: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        let bad = matches!(ch, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*')
            || ch.is_control();
        out.push(if bad { '-' } else { ch });
    }
    let trimmed = out.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn album_folder_name(album: &str, year: Option<i32>) -> String {
    let album = sanitize_segment(album, crate::UNKNOWN_ALBUM);
    match year {
        Some(year) => format!("({}) {}", year, album),
        None => album,
    }
}

pub fn track_file_name(track_number: &str, title: &str, extension: &str) -> String {
    let number = sanitize_segment(track_number, crate::DEFAULT_TRACK_NUMBER);
    let title = sanitize_segment(title, "Untitled");
    format!("{} - {}{}", number, title, extension)
}

/// `{root}/{artist}/{album or "(year) album"}/{nn} - {title}{ext}`
pub fn destination_path(root: &Path, track: &Track) -> PathBuf {
    root.join(sanitize_segment(&track.artist, crate::UNKNOWN_ARTIST))
        .join(album_folder_name(&track.album, track.year))
        .join(track_file_name(
            &track.track_number,
            &track.title,
            &track.file_extension,
        ))
}
