use std::path::Path;

use lofty::config::ParseOptions;
use lofty::error::LoftyError;
use lofty::file::TaggedFile;
use lofty::picture::{Picture, PictureType};
use lofty::prelude::{Accessor, AudioFile, ItemKey, TaggedFileExt};
use lofty::probe::Probe;

#[derive(Debug, Default, Clone)]
pub struct TagInfo {
    pub artist: Option<String>,
    pub album_artist: Option<String>,
    pub album: Option<String>,
    pub title: Option<String>,
    pub track_no: Option<u16>,
    pub year: Option<i32>,
    pub duration_ms: Option<u32>,
    pub genres: Vec<String>,
    pub pictures: Vec<CoverArt>,
}

#[derive(Debug, Clone)]
pub struct CoverArt {
    pub data: Vec<u8>,
    pub mime: Option<String>,
}

#[derive(Debug)]
pub enum MetadataError {
    NotFound(String),
    Io(std::io::Error),
    Unreadable(LoftyError),
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::NotFound(path) => write!(f, "file not found: {}", path),
            MetadataError::Io(err) => write!(f, "io error: {}", err),
            MetadataError::Unreadable(err) => write!(f, "unreadable audio file: {}", err),
        }
    }
}

impl std::error::Error for MetadataError {}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        MetadataError::Io(err)
    }
}

impl From<LoftyError> for MetadataError {
    fn from(err: LoftyError) -> Self {
        MetadataError::Unreadable(err)
    }
}

/// Reads tags, audio properties and embedded pictures.
pub fn read_tags(path: &Path) -> Result<TagInfo, MetadataError> {
    ensure_exists(path)?;
    let tagged_file = lofty::read_from_path(path)?;

    let mut info = collect_tags(&tagged_file);
    let duration_ms = tagged_file.properties().duration().as_millis();
    if duration_ms > 0 {
        let clamped = duration_ms.min(u128::from(u32::MAX)) as u32;
        info.duration_ms = Some(clamped);
    }
    Ok(info)
}

/// Same as [`read_tags`] but skips audio property parsing, so `duration_ms`
/// is always `None`.
pub fn read_tags_fast(path: &Path) -> Result<TagInfo, MetadataError> {
    ensure_exists(path)?;
    let tagged_file = Probe::open(path)?
        .options(ParseOptions::new().read_properties(false))
        .guess_file_type()?
        .read()?;
    Ok(collect_tags(&tagged_file))
}

pub fn read_cover(path: &Path) -> Result<Option<CoverArt>, MetadataError> {
    ensure_exists(path)?;
    let tagged_file = Probe::open(path)?
        .options(ParseOptions::new().read_properties(false))
        .guess_file_type()?
        .read()?;
    let tag = match tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        Some(tag) => tag,
        None => return Ok(None),
    };

    let picture = match pick_picture(tag.pictures()) {
        Some(picture) => picture,
        None => return Ok(None),
    };
    Ok(Some(cover_art(picture)))
}

fn ensure_exists(path: &Path) -> Result<(), MetadataError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(MetadataError::NotFound(path.display().to_string()))
    }
}

fn collect_tags(tagged_file: &TaggedFile) -> TagInfo {
    let mut info = TagInfo::default();
    let tag = match tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        Some(tag) => tag,
        None => return info,
    };

    info.title = non_empty(tag.title().map(|v| v.to_string()));
    info.album = non_empty(tag.album().map(|v| v.to_string()));
    let album_artist = non_empty(tag.get_string(&ItemKey::AlbumArtist).map(|v| v.to_string()));
    let track_artist = non_empty(tag.artist().map(|v| v.to_string()));
    info.artist = track_artist.or_else(|| album_artist.clone());
    info.album_artist = album_artist;
    info.track_no = tag
        .get_string(&ItemKey::TrackNumber)
        .and_then(parse_u16);
    info.year = tag
        .get_string(&ItemKey::Year)
        .or_else(|| tag.get_string(&ItemKey::RecordingDate))
        .and_then(parse_year);
    if let Some(value) = tag.get_string(&ItemKey::Genre) {
        info.genres = parse_genres(value);
    }

    let mut pictures: Vec<&Picture> = tag.pictures().iter().collect();
    pictures.sort_by_key(|picture| picture.pic_type() != PictureType::CoverFront);
    info.pictures = pictures.into_iter().map(cover_art).collect();
    info
}

fn cover_art(picture: &Picture) -> CoverArt {
    let data = picture.data().to_vec();
    let mime = guess_mime(&data);
    CoverArt { data, mime }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_u16(text: &str) -> Option<u16> {
    let head = text.split('/').next().unwrap_or(text).trim();
    head.parse().ok()
}

fn parse_year(text: &str) -> Option<i32> {
    let mut digits = String::new();
    for ch in text.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            if digits.len() == 4 {
                break;
            }
        } else if !digits.is_empty() {
            break;
        }
    }
    if digits.len() != 4 {
        None
    } else {
        digits.parse().ok()
    }
}

pub fn parse_genres(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for part in text.split(&[';', ',', '/', '|', '\0'][..]) {
        let trimmed = part.trim();
        if trimmed.is_empty() {
            continue;
        }
        if out.iter().any(|g| g.eq_ignore_ascii_case(trimmed)) {
            continue;
        }
        out.push(trimmed.to_string());
    }
    out
}

fn pick_picture(pictures: &[Picture]) -> Option<&Picture> {
    for picture in pictures {
        if picture.pic_type() == PictureType::CoverFront {
            return Some(picture);
        }
    }
    pictures.first()
}

fn guess_mime(bytes: &[u8]) -> Option<String> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg".to_string())
    } else if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        Some("image/png".to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genres_split_on_common_separators() {
        assert_eq!(parse_genres("Rock; Pop/Jazz"), vec!["Rock", "Pop", "Jazz"]);
        assert_eq!(parse_genres("Rock, rock"), vec!["Rock"]);
        assert!(parse_genres(" ; ").is_empty());
    }

    #[test]
    fn year_takes_leading_four_digits() {
        assert_eq!(parse_year("1999-04-01"), Some(1999));
        assert_eq!(parse_year("99"), None);
    }

    #[test]
    fn track_number_ignores_total() {
        assert_eq!(parse_u16("7/12"), Some(7));
        assert_eq!(parse_u16("x"), None);
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = read_tags(Path::new("/definitely/not/here.mp3")).unwrap_err();
        assert!(matches!(err, MetadataError::NotFound(_)));
    }

    #[test]
    fn mime_is_sniffed_from_magic_bytes() {
        assert_eq!(guess_mime(&[0xFF, 0xD8, 0xFF, 0x00]).as_deref(), Some("image/jpeg"));
        assert_eq!(guess_mime(b"nope"), None);
    }
}
