use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use common::{canonical_key, Track};
use tracing::debug;

use crate::LibraryError;

pub const INVENTORY_FILE: &str = "library_inventory.json";

/// Flat, ordered catalog of every track inside the library root.
#[derive(Clone, Debug, Default)]
pub struct Inventory {
    tracks: Vec<Track>,
}

impl Inventory {
    /// An absent file is an empty inventory.
    pub fn load(path: &Path) -> Result<Self, LibraryError> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(err.into()),
        };
        if data.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Self::default());
        }
        let tracks: Vec<Track> = serde_json::from_slice(&data)?;
        debug!("Loaded {} inventory entries from {:?}", tracks.len(), path);
        Ok(Self { tracks })
    }

    /// Whole-document rewrite, staged through a sibling file and renamed
    /// into place.
    pub fn save(&self, path: &Path) -> Result<(), LibraryError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.tracks)?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, contents)?;
        fs::rename(&staging, path)?;
        Ok(())
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn into_tracks(self) -> Vec<Track> {
        self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        let key = canonical_key(path);
        self.tracks.iter().any(|track| track.absolute_path == key)
    }

    /// Appends unless the absolute path is already catalogued.
    pub fn push(&mut self, track: Track) -> bool {
        if self
            .tracks
            .iter()
            .any(|existing| existing.absolute_path == track.absolute_path)
        {
            return false;
        }
        self.tracks.push(track);
        true
    }

    pub fn remove_paths(&mut self, keys: &HashSet<PathBuf>) -> usize {
        let before = self.tracks.len();
        self.tracks
            .retain(|track| !keys.contains(&track.absolute_path));
        before - self.tracks.len()
    }

    pub fn by_path(&self) -> HashMap<&Path, &Track> {
        self.tracks
            .iter()
            .map(|track| (track.absolute_path.as_path(), track))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::sample_track;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let inventory = Inventory::load(&dir.path().join(INVENTORY_FILE)).unwrap();
        assert!(inventory.is_empty());
    }

    #[test]
    fn save_writes_two_space_camel_case_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(INVENTORY_FILE);
        let mut inventory = Inventory::default();
        inventory.push(sample_track("/music/A/B/01 - x.mp3", &["Rock"]));
        inventory.save(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("[\n  {\n    \"title\""));
        assert!(text.contains("\"absolutePath\": \"/music/A/B/01 - x.mp3\""));
        assert!(text.contains("\"trackNumber\""));
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = Inventory::load(&path).unwrap();
        assert_eq!(loaded.tracks(), inventory.tracks());
    }

    #[test]
    fn push_rejects_duplicate_paths() {
        let mut inventory = Inventory::default();
        assert!(inventory.push(sample_track("/music/a.mp3", &[])));
        assert!(!inventory.push(sample_track("/music/a.mp3", &[])));
        assert_eq!(inventory.len(), 1);
    }

    #[test]
    fn remove_paths_keeps_order_of_rest() {
        let mut inventory = Inventory::default();
        inventory.push(sample_track("/music/a.mp3", &[]));
        inventory.push(sample_track("/music/b.mp3", &[]));
        inventory.push(sample_track("/music/c.mp3", &[]));
        let removed: HashSet<PathBuf> = [PathBuf::from("/music/b.mp3")].into_iter().collect();
        assert_eq!(inventory.remove_paths(&removed), 1);
        let left: Vec<_> = inventory
            .tracks()
            .iter()
            .map(|t| t.absolute_path.clone())
            .collect();
        assert_eq!(left, vec![PathBuf::from("/music/a.mp3"), PathBuf::from("/music/c.mp3")]);
    }
}
