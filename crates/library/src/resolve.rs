use std::path::Path;

use common::{
    file_extension, sanitize_segment, Track, DEFAULT_TRACK_NUMBER, UNKNOWN_ALBUM, UNKNOWN_ARTIST,
    UNKNOWN_GENRE,
};
use metadata::{read_tags, read_tags_fast, MetadataError, TagInfo};

pub const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "m4a", "aac", "ogg", "opus", "wav", "aiff", "wma",
];

/// Tag-parsing collaborator. The engine only needs the fields of
/// [`TagInfo`]; how they are read is up to the implementation.
pub trait MetadataSource: Send + Sync {
    fn read(&self, path: &Path) -> Result<TagInfo, MetadataError>;
}

/// Reads embedded tags with lofty.
#[derive(Clone, Copy, Debug, Default)]
pub struct TagReader {
    skip_properties: bool,
}

impl TagReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skips audio property parsing; tracks will carry no duration.
    pub fn without_duration() -> Self {
        Self {
            skip_properties: true,
        }
    }
}

impl MetadataSource for TagReader {
    fn read(&self, path: &Path) -> Result<TagInfo, MetadataError> {
        if self.skip_properties {
            read_tags_fast(path)
        } else {
            read_tags(path)
        }
    }
}

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            AUDIO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Applies the default-value policy to raw tags.
pub fn resolve_track(path: &Path, tags: TagInfo) -> Track {
    let title = tags
        .title
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| file_stem(path));
    let artist = tags
        .artist
        .or(tags.album_artist)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
    let album = tags
        .album
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_ALBUM.to_string());
    let track_number = match tags.track_no {
        Some(no) => format!("{:02}", no),
        None => DEFAULT_TRACK_NUMBER.to_string(),
    };
    let mut genres: Vec<String> = tags
        .genres
        .into_iter()
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty())
        .collect();
    if genres.is_empty() {
        genres.push(UNKNOWN_GENRE.to_string());
    }

    Track {
        title: title.trim().to_string(),
        artist: artist.trim().to_string(),
        album: album.trim().to_string(),
        year: tags.year,
        track_number,
        genres,
        file_extension: file_extension(path),
        absolute_path: path.to_path_buf(),
        library_relative_path: None,
        duration_ms: tags.duration_ms,
    }
}

/// `[Favorites][Workout]` yields both tokens; a name with no complete `[...]`
/// token is a single hint.
pub fn folder_hints(name: &str) -> Vec<String> {
    let mut hints: Vec<String> = Vec::new();
    let mut rest = name;
    let mut bracketed = false;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let close = match after.find(']') {
            Some(close) => close,
            None => break,
        };
        bracketed = true;
        push_hint(&mut hints, &after[..close]);
        rest = &after[close + 1..];
    }
    // No complete `[...]` token: the whole name is the hint.
    if !bracketed {
        push_hint(&mut hints, name);
    }
    hints
}

fn push_hint(hints: &mut Vec<String>, raw: &str) {
    let hint = sanitize_segment(raw, "");
    if !hint.is_empty() && !hints.contains(&hint) {
        hints.push(hint);
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Unknown Track".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracket_tokens_become_hints() {
        assert_eq!(folder_hints("[Favorites][Workout]"), vec!["Favorites", "Workout"]);
        assert_eq!(folder_hints("Mix [Chill] [ Road Trip ]"), vec!["Chill", "Road Trip"]);
    }

    #[test]
    fn plain_folder_name_is_single_hint() {
        assert_eq!(folder_hints("Summer 2024"), vec!["Summer 2024"]);
    }

    #[test]
    fn empty_brackets_yield_nothing() {
        assert!(folder_hints("[]").is_empty());
        assert!(folder_hints("[  ]").is_empty());
    }

    #[test]
    fn unclosed_bracket_falls_back_to_whole_name() {
        assert_eq!(folder_hints("Mix [unclosed"), vec!["Mix [unclosed"]);
        assert_eq!(folder_hints("]odd["), vec!["]odd["]);
    }

    #[test]
    fn defaults_fill_missing_tags() {
        let track = resolve_track(Path::new("/inbox/song.MP3"), TagInfo::default());
        assert_eq!(track.title, "song");
        assert_eq!(track.artist, UNKNOWN_ARTIST);
        assert_eq!(track.album, UNKNOWN_ALBUM);
        assert_eq!(track.track_number, DEFAULT_TRACK_NUMBER);
        assert_eq!(track.genres, vec![UNKNOWN_GENRE.to_string()]);
        assert_eq!(track.file_extension, ".mp3");
    }

    #[test]
    fn track_number_is_zero_padded() {
        let tags = TagInfo {
            track_no: Some(7),
            title: Some("  Seven ".to_string()),
            ..TagInfo::default()
        };
        let track = resolve_track(Path::new("/inbox/x.flac"), tags);
        assert_eq!(track.track_number, "07");
        assert_eq!(track.title, "Seven");
    }

    #[test]
    fn audio_extensions_are_case_insensitive() {
        assert!(is_audio_file(Path::new("a.FLAC")));
        assert!(!is_audio_file(Path::new("cover.jpg")));
        assert!(!is_audio_file(Path::new("README")));
    }
}
