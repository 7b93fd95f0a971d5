use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use common::{canonical_key, file_extension, Track};
use metadata::{MetadataError, TagInfo};
use tempfile::TempDir;

use crate::resolve::MetadataSource;
use crate::LibraryHandle;

/// Tag source keyed by file name. Unknown files read as untagged.
#[derive(Default)]
pub struct FakeSource {
    tags: HashMap<String, TagInfo>,
    failing: HashSet<String>,
}

impl FakeSource {
    pub fn with(mut self, file_name: &str, tags: TagInfo) -> Self {
        self.tags.insert(file_name.to_string(), tags);
        self
    }

    pub fn failing(mut self, file_name: &str) -> Self {
        self.failing.insert(file_name.to_string());
        self
    }
}

impl MetadataSource for FakeSource {
    fn read(&self, path: &Path) -> Result<TagInfo, MetadataError> {
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        if self.failing.contains(&name) {
            return Err(MetadataError::NotFound(path.display().to_string()));
        }
        Ok(self.tags.get(&name).cloned().unwrap_or_default())
    }
}

pub fn tags(
    title: &str,
    artist: &str,
    album: &str,
    year: Option<i32>,
    track_no: u16,
    genres: &[&str],
) -> TagInfo {
    TagInfo {
        title: Some(title.to_string()),
        artist: Some(artist.to_string()),
        album: Some(album.to_string()),
        year,
        track_no: Some(track_no),
        genres: genres.iter().map(|g| g.to_string()).collect(),
        ..TagInfo::default()
    }
}

pub fn touch(path: &Path) {
    touch_with(path, b"audio");
}

pub fn touch_with(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, bytes).unwrap();
}

pub fn sample_track(path: &str, genres: &[&str]) -> Track {
    let absolute_path = PathBuf::from(path);
    Track {
        title: absolute_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default(),
        artist: "Artist".to_string(),
        album: "Album".to_string(),
        year: None,
        track_number: "01".to_string(),
        genres: genres.iter().map(|g| g.to_string()).collect(),
        file_extension: file_extension(&absolute_path),
        absolute_path,
        library_relative_path: None,
        duration_ms: None,
    }
}

/// Temp directory with an `inbox/` and a `lib/` library root, both under a
/// canonical base.
pub struct Fixture {
    _dir: TempDir,
    base: PathBuf,
    pub inbox: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let base = canonical_key(dir.path());
        let inbox = base.join("inbox");
        fs::create_dir_all(&inbox).unwrap();
        Self {
            _dir: dir,
            base,
            inbox,
        }
    }

    pub fn library_root(&self) -> PathBuf {
        self.base.join("lib")
    }

    pub fn handle(&self) -> LibraryHandle {
        LibraryHandle::open(self.library_root()).unwrap()
    }

    /// Creates a file under the library root and returns its canonical path.
    pub fn library_file(&self, relative: &str) -> PathBuf {
        let path = self.library_root().join(relative);
        touch(&path);
        canonical_key(&path)
    }

    pub fn outside(&self, relative: &str) -> PathBuf {
        self.base.join("out").join(relative)
    }
}
