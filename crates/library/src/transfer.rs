use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use common::{canonical_key, join_relpath, normalize_lexically, relpath_from, Track};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::inventory::Inventory;
use crate::playlist::{
    delete_files, prune_custom, read_entries, regenerate_derived, tracks_for_entries, PlaylistRef,
};
use crate::relocate::{copy_new, move_new};
use crate::{require_absolute, ItemFailure, LibraryError, LibraryHandle};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    Copy,
    Move,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "name")]
pub enum TransferSource {
    Playlist(String),
    Library,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferRequest {
    pub source: TransferSource,
    pub destination: PathBuf,
    pub mode: TransferMode,
    #[serde(default)]
    pub preserve_structure: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransferReport {
    pub success_count: usize,
    pub fail_count: usize,
    pub failures: Vec<ItemFailure>,
}

impl LibraryHandle {
    /// Copies or moves a playlist's tracks, or the whole library, out to
    /// `destination`. Existing files there are never replaced. A move also
    /// takes the tracks out of the inventory and every playlist.
    pub fn transfer(&self, request: &TransferRequest) -> Result<TransferReport, LibraryError> {
        let playlist = match &request.source {
            TransferSource::Playlist(name) => {
                let playlist = PlaylistRef::parse(name)?;
                playlist.ensure_exportable()?;
                Some(playlist)
            }
            TransferSource::Library => None,
        };
        require_absolute(&request.destination)?;
        let root = self.root();
        if normalize_lexically(&request.destination).starts_with(&root)
            || canonical_key(&request.destination).starts_with(&root)
        {
            return Err(LibraryError::InvalidRequest(format!(
                "destination is inside the library: {}",
                request.destination.display()
            )));
        }

        let _guard = self.lock();
        let dir = self.playlist_dir();
        let mut inventory = Inventory::load(&self.inventory_path())?;
        let tracks = match &playlist {
            Some(playlist) => {
                let path = playlist.existing_path(&dir).ok_or_else(|| {
                    LibraryError::NotFound(format!("playlist {}", playlist.name()))
                })?;
                tracks_for_entries(&dir, &read_entries(&path)?, &inventory)
            }
            None => inventory.tracks().to_vec(),
        };

        fs::create_dir_all(&request.destination)?;
        let mut report = TransferReport::default();
        let mut used_names: HashSet<String> = HashSet::new();
        let mut moved: HashSet<PathBuf> = HashSet::new();

        for track in &tracks {
            let source = &track.absolute_path;
            if !source.is_file() {
                warn!("Source missing for transfer: {:?}", source);
                report.fail_count += 1;
                report.failures.push(ItemFailure::new(source, "source file missing"));
                continue;
            }
            let relative = if request.preserve_structure {
                structured_path(&root, track)
            } else {
                flat_name(track, &mut used_names)
            };
            let target = join_relpath(&request.destination, &relative);
            let result = match request.mode {
                TransferMode::Copy => copy_new(source, &target),
                TransferMode::Move => move_new(source, &target),
            };
            match result {
                Ok(()) => {
                    debug!("Transferred {:?} -> {:?}", source, target);
                    report.success_count += 1;
                    if request.mode == TransferMode::Move {
                        moved.insert(source.clone());
                    }
                }
                Err(err) => {
                    warn!("Failed to transfer {:?}: {}", source, err);
                    report.fail_count += 1;
                    report.failures.push(ItemFailure::new(source, err));
                }
            }
        }

        if request.mode == TransferMode::Move && report.fail_count == 0 {
            // Keep the list while some of its tracks are still here.
            if let Some(playlist) = &playlist {
                delete_files(&dir, playlist)?;
                info!("Removed playlist {} after moving it out", playlist.name());
            }
        }

        if !moved.is_empty() {
            let removed = inventory.remove_paths(&moved);
            inventory.save(&self.inventory_path())?;
            regenerate_derived(&dir, &inventory)?;
            prune_custom(&dir, &moved)?;
            let swept = remove_empty_dirs(&root, &dir);
            info!(
                "Moved {} tracks out of the library ({} catalogued, {} empty folders removed)",
                moved.len(),
                removed,
                swept
            );
        }

        info!(
            "Transfer to {:?} finished: {} succeeded, {} failed",
            request.destination, report.success_count, report.fail_count
        );
        Ok(report)
    }
}

fn structured_path(root: &Path, track: &Track) -> String {
    track
        .library_relative_path
        .clone()
        .or_else(|| relpath_from(root, &track.absolute_path))
        .unwrap_or_else(|| file_name(&track.absolute_path))
}

/// Basename, suffixed ` (n)` when an earlier track in the batch already took
/// it.
fn flat_name(track: &Track, used: &mut HashSet<String>) -> String {
    let name = file_name(&track.absolute_path);
    if used.insert(name.to_lowercase()) {
        return name;
    }
    let path = Path::new(&name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| name.clone());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let mut n = 1usize;
    loop {
        let candidate = format!("{} ({}){}", stem, n, ext);
        if used.insert(candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "track".to_string())
}

/// Bottom-up sweep of directories left empty under `root`. The root and
/// the playlist directory always stay.
fn remove_empty_dirs(root: &Path, playlist_dir: &Path) -> usize {
    let mut removed = 0usize;
    for entry in WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_dir() || entry.path() == playlist_dir {
            continue;
        }
        if fs::remove_dir(entry.path()).is_ok() {
            removed += 1;
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{sample_track, touch};

    #[test]
    fn flat_names_get_numbered_suffixes() {
        let mut used = HashSet::new();
        let a = sample_track("/m/A/x/01 - Intro.mp3", &[]);
        let b = sample_track("/m/B/y/01 - Intro.mp3", &[]);
        let c = sample_track("/m/C/z/01 - intro.MP3", &[]);
        assert_eq!(flat_name(&a, &mut used), "01 - Intro.mp3");
        assert_eq!(flat_name(&b, &mut used), "01 - Intro (1).mp3");
        assert_eq!(flat_name(&c, &mut used), "01 - intro (2).MP3");
    }

    #[test]
    fn structured_path_prefers_recorded_relative_path() {
        let mut track = sample_track("/m/A/B/01 - x.mp3", &[]);
        assert_eq!(structured_path(Path::new("/m"), &track), "A/B/01 - x.mp3");
        track.library_relative_path = Some("Z/01 - x.mp3".to_string());
        assert_eq!(structured_path(Path::new("/m"), &track), "Z/01 - x.mp3");
    }

    #[test]
    fn sweep_removes_nested_empty_dirs_only() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let playlists = root.join("Playlists");
        fs::create_dir_all(&playlists).unwrap();
        fs::create_dir_all(root.join("Gone/Album/Disc")).unwrap();
        touch(&root.join("Kept/Album/a.mp3"));

        assert_eq!(remove_empty_dirs(root, &playlists), 3);
        assert!(!root.join("Gone").exists());
        assert!(root.join("Kept/Album/a.mp3").exists());
        assert!(playlists.exists());
    }
}
