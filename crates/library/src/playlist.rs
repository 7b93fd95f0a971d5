use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use common::{
    canonical_key, join_relpath, normalize_entry, relative_path, sanitize_segment, Track,
    UNKNOWN_GENRE,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::inventory::Inventory;
use crate::{require_absolute, LibraryError, LibraryHandle};

pub const PLAYLIST_DIR: &str = "Playlists";
pub const MASTER_PLAYLIST: &str = "00_Master_Library";
pub const GENRE_PREFIX: &str = "Genre - ";
pub const PRIMARY_EXTENSION: &str = "m3u8";
pub const LEGACY_EXTENSION: &str = "m3u";

const HEADER: &str = "#EXTM3U";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistKind {
    /// Mirrors the whole inventory.
    Master,
    /// One per distinct genre value.
    Genre,
    Custom,
}

/// A playlist name together with its kind. The kind is decided once, when
/// the reference is built, and every protection check matches on it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaylistRef {
    name: String,
    kind: PlaylistKind,
}

impl PlaylistRef {
    pub fn master() -> Self {
        Self {
            name: MASTER_PLAYLIST.to_string(),
            kind: PlaylistKind::Master,
        }
    }

    pub fn genre(genre: &str) -> Self {
        Self {
            name: format!("{}{}", GENRE_PREFIX, sanitize_segment(genre, UNKNOWN_GENRE)),
            kind: PlaylistKind::Genre,
        }
    }

    /// Validates a caller-supplied name and classifies it.
    pub fn parse(name: &str) -> Result<Self, LibraryError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(LibraryError::InvalidRequest(
                "playlist name is required".to_string(),
            ));
        }
        if sanitize_segment(trimmed, "") != trimmed {
            return Err(LibraryError::InvalidRequest(format!(
                "invalid playlist name: {}",
                name
            )));
        }
        Ok(Self::from_stem(trimmed))
    }

    fn from_stem(stem: &str) -> Self {
        let kind = if stem == MASTER_PLAYLIST {
            PlaylistKind::Master
        } else if stem.starts_with(GENRE_PREFIX) {
            PlaylistKind::Genre
        } else {
            PlaylistKind::Custom
        };
        Self {
            name: stem.to_string(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PlaylistKind {
        self.kind
    }

    /// Only custom playlists accept direct add/remove/delete.
    pub fn ensure_editable(&self) -> Result<(), LibraryError> {
        match self.kind {
            PlaylistKind::Custom => Ok(()),
            PlaylistKind::Master | PlaylistKind::Genre => {
                Err(LibraryError::ProtectedPlaylist(self.name.clone()))
            }
        }
    }

    pub fn ensure_exportable(&self) -> Result<(), LibraryError> {
        match self.kind {
            PlaylistKind::Master => Err(LibraryError::ProtectedPlaylist(self.name.clone())),
            PlaylistKind::Genre | PlaylistKind::Custom => Ok(()),
        }
    }

    pub fn primary_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.{}", self.name, PRIMARY_EXTENSION))
    }

    pub fn legacy_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.{}", self.name, LEGACY_EXTENSION))
    }

    /// Primary file first, legacy second.
    pub fn existing_path(&self, dir: &Path) -> Option<PathBuf> {
        let primary = self.primary_path(dir);
        if primary.is_file() {
            return Some(primary);
        }
        let legacy = self.legacy_path(dir);
        if legacy.is_file() {
            return Some(legacy);
        }
        None
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub name: String,
    pub kind: PlaylistKind,
    pub track_count: usize,
    pub path: PathBuf,
}

impl LibraryHandle {
    /// Merges the given tracks into a custom playlist, creating the file on
    /// first use. Returns how many entries were new.
    pub fn add_to_playlist(&self, name: &str, tracks: &[PathBuf]) -> Result<usize, LibraryError> {
        let playlist = PlaylistRef::parse(name)?;
        playlist.ensure_editable()?;
        for track in tracks {
            require_absolute(track)?;
        }

        let _guard = self.lock();
        let dir = self.playlist_dir();
        fs::create_dir_all(&dir)?;
        let entries: Vec<String> = tracks
            .iter()
            .map(|track| entry_for(&dir, &canonical_key(track)))
            .collect();
        let added = merge_into(&dir, &playlist, &entries)?;
        info!("Added {} tracks to playlist {}", added, playlist.name());
        Ok(added)
    }

    /// Returns `false` when the track was not listed; the file is then left
    /// untouched.
    pub fn remove_from_playlist(&self, name: &str, track: &Path) -> Result<bool, LibraryError> {
        let playlist = PlaylistRef::parse(name)?;
        playlist.ensure_editable()?;
        require_absolute(track)?;

        let _guard = self.lock();
        let dir = self.playlist_dir();
        let path = playlist
            .existing_path(&dir)
            .ok_or_else(|| LibraryError::NotFound(format!("playlist {}", playlist.name())))?;

        let key = canonical_key(track);
        let target = entry_for(&dir, &key);
        let removed = retain_entries(&path, |line| {
            normalize_entry(line) != target && resolve_entry(&dir, line) != key
        })?;
        if removed == 0 {
            info!(
                "Track {:?} is not in playlist {}; nothing removed",
                track,
                playlist.name()
            );
            return Ok(false);
        }
        info!("Removed {:?} from playlist {}", track, playlist.name());
        Ok(true)
    }

    pub fn delete_playlist(&self, name: &str) -> Result<(), LibraryError> {
        let playlist = PlaylistRef::parse(name)?;
        playlist.ensure_editable()?;

        let _guard = self.lock();
        let dir = self.playlist_dir();
        if !delete_files(&dir, &playlist)? {
            return Err(LibraryError::NotFound(format!(
                "playlist {}",
                playlist.name()
            )));
        }
        info!("Deleted playlist {}", playlist.name());
        Ok(())
    }

    /// Every playlist except the master, sorted by name.
    pub fn list_playlists(&self) -> Result<Vec<PlaylistSummary>, LibraryError> {
        let dir = self.playlist_dir();
        let mut by_name: BTreeMap<String, (PlaylistRef, PathBuf)> = BTreeMap::new();
        for (path, playlist) in playlist_files(&dir)? {
            if playlist.kind() == PlaylistKind::Master {
                continue;
            }
            // The primary file shadows a legacy one of the same name.
            let shadowed =
                by_name.contains_key(playlist.name()) && !has_extension(&path, PRIMARY_EXTENSION);
            if !shadowed {
                by_name.insert(playlist.name().to_string(), (playlist, path));
            }
        }

        let mut out = Vec::with_capacity(by_name.len());
        for (name, (playlist, path)) in by_name {
            let track_count = read_entries(&path)?.len();
            out.push(PlaylistSummary {
                name,
                kind: playlist.kind(),
                track_count,
                path,
            });
        }
        Ok(out)
    }

    /// Tracks of one playlist in file order. Lines with no inventory match
    /// come back as placeholder tracks.
    pub fn playlist_details(&self, name: &str) -> Result<Vec<Track>, LibraryError> {
        let playlist = PlaylistRef::parse(name)?;
        let dir = self.playlist_dir();
        let path = playlist
            .existing_path(&dir)
            .ok_or_else(|| LibraryError::NotFound(format!("playlist {}", playlist.name())))?;
        let entries = read_entries(&path)?;
        let inventory = Inventory::load(&self.inventory_path())?;
        Ok(tracks_for_entries(&dir, &entries, &inventory))
    }

    /// Names of the custom playlists listing `track`. A linear scan over
    /// every custom playlist file.
    pub fn playlists_for_track(&self, track: &Path) -> Result<Vec<String>, LibraryError> {
        require_absolute(track)?;
        let dir = self.playlist_dir();
        let key = canonical_key(track);
        let target = entry_for(&dir, &key);

        let mut names = BTreeSet::new();
        for (path, playlist) in playlist_files(&dir)? {
            if playlist.kind() != PlaylistKind::Custom {
                continue;
            }
            let entries = read_entries(&path)?;
            let listed = entries.iter().any(|line| {
                normalize_entry(line) == target || resolve_entry(&dir, line) == key
            });
            if listed {
                names.insert(playlist.name().to_string());
            }
        }
        Ok(names.into_iter().collect())
    }
}

/// Rewrites the master and every genre playlist from the inventory and
/// drops genre playlists nothing maps to any more.
pub(crate) fn regenerate_derived(dir: &Path, inventory: &Inventory) -> Result<(), LibraryError> {
    fs::create_dir_all(dir)?;

    let mut master: Vec<String> = Vec::with_capacity(inventory.len());
    let mut genres: BTreeMap<String, (PlaylistRef, Vec<String>)> = BTreeMap::new();
    for track in inventory.tracks() {
        let entry = entry_for(dir, &track.absolute_path);
        for genre in &track.genres {
            let playlist = PlaylistRef::genre(genre);
            let (_, entries) = genres
                .entry(playlist.name().to_string())
                .or_insert_with(|| (playlist, Vec::new()));
            if !entries.contains(&entry) {
                entries.push(entry.clone());
            }
        }
        master.push(entry);
    }

    write_entries(&PlaylistRef::master().primary_path(dir), &master)?;
    for (playlist, entries) in genres.values() {
        write_entries(&playlist.primary_path(dir), entries)?;
    }

    for (path, playlist) in playlist_files(dir)? {
        let stale = match playlist.kind() {
            PlaylistKind::Master => !has_extension(&path, PRIMARY_EXTENSION),
            PlaylistKind::Genre => {
                !has_extension(&path, PRIMARY_EXTENSION)
                    || !genres.contains_key(playlist.name())
            }
            PlaylistKind::Custom => false,
        };
        if stale {
            debug!("Removing stale playlist {:?}", path);
            fs::remove_file(&path)?;
        }
    }

    info!(
        "Regenerated master playlist ({} tracks) and {} genre playlists",
        master.len(),
        genres.len()
    );
    Ok(())
}

/// Set union of the playlist's current entries and `entries`, keeping the
/// existing lines as they are.
pub(crate) fn merge_into(
    dir: &Path,
    playlist: &PlaylistRef,
    entries: &[String],
) -> Result<usize, LibraryError> {
    let path = playlist
        .existing_path(dir)
        .unwrap_or_else(|| playlist.primary_path(dir));
    let existing = match fs::read_to_string(&path) {
        Ok(text) => Some(text),
        Err(err) if err.kind() == ErrorKind::NotFound => None,
        Err(err) => return Err(err.into()),
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut out = String::new();
    match &existing {
        Some(text) if !text.trim().is_empty() => {
            for line in text.lines() {
                let trimmed = line.trim();
                if !trimmed.is_empty() && !trimmed.starts_with('#') {
                    seen.insert(normalize_entry(trimmed));
                }
            }
            out.push_str(text);
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }
        _ => {
            out.push_str(HEADER);
            out.push('\n');
        }
    }

    let mut added = 0usize;
    for entry in entries {
        let normalized = normalize_entry(entry);
        if seen.insert(normalized.clone()) {
            out.push_str(&normalized);
            out.push('\n');
            added += 1;
        }
    }

    if added > 0 || existing.is_none() {
        fs::write(&path, out)?;
    }
    Ok(added)
}

/// Drops custom playlist lines that point at any of `removed`.
pub(crate) fn prune_custom(dir: &Path, removed: &HashSet<PathBuf>) -> Result<usize, LibraryError> {
    let mut total = 0usize;
    for (path, playlist) in playlist_files(dir)? {
        if playlist.kind() != PlaylistKind::Custom {
            continue;
        }
        let dropped = retain_entries(&path, |line| !removed.contains(&resolve_entry(dir, line)))?;
        if dropped > 0 {
            debug!("Dropped {} moved tracks from {:?}", dropped, path);
        }
        total += dropped;
    }
    Ok(total)
}

/// Removes both the primary and legacy file; `false` if neither existed.
pub(crate) fn delete_files(dir: &Path, playlist: &PlaylistRef) -> Result<bool, LibraryError> {
    let mut deleted = false;
    for path in [playlist.primary_path(dir), playlist.legacy_path(dir)] {
        match fs::remove_file(&path) {
            Ok(()) => deleted = true,
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(deleted)
}

pub(crate) fn tracks_for_entries(dir: &Path, entries: &[String], inventory: &Inventory) -> Vec<Track> {
    let by_path = inventory.by_path();
    entries
        .iter()
        .map(|entry| {
            let key = resolve_entry(dir, entry);
            match by_path.get(key.as_path()) {
                Some(track) => (*track).clone(),
                None => Track::placeholder(&key),
            }
        })
        .collect()
}

/// Track paths as written into playlists: relative to the playlist
/// directory, forward slashes.
pub(crate) fn entry_for(dir: &Path, track: &Path) -> String {
    relative_path(dir, track)
        .unwrap_or_else(|| normalize_entry(&track.to_string_lossy()))
}

/// Absolute, canonical path a playlist line points at.
pub(crate) fn resolve_entry(dir: &Path, line: &str) -> PathBuf {
    let normalized = normalize_entry(line);
    let path = Path::new(&normalized);
    if path.is_absolute() {
        canonical_key(path)
    } else {
        canonical_key(&join_relpath(dir, &normalized))
    }
}

/// Entry lines of a playlist file; header, comments and blanks are skipped.
pub(crate) fn read_entries(path: &Path) -> Result<Vec<String>, LibraryError> {
    let text = fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn write_entries(path: &Path, entries: &[String]) -> Result<(), LibraryError> {
    let mut out = String::with_capacity(entries.len() * 64 + HEADER.len() + 1);
    out.push_str(HEADER);
    out.push('\n');
    for entry in entries {
        out.push_str(entry);
        out.push('\n');
    }
    fs::write(path, out)?;
    Ok(())
}

/// Rewrites the file keeping only entries accepted by `keep`. An `#EXTINF`
/// line goes with the entry that follows it. The file is only written when
/// something was dropped.
fn retain_entries(path: &Path, mut keep: impl FnMut(&str) -> bool) -> Result<usize, LibraryError> {
    let text = fs::read_to_string(path)?;
    let mut out = String::with_capacity(text.len());
    let mut pending: Vec<&str> = Vec::new();
    let mut dropped = 0usize;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with("#EXTINF") {
            pending.push(trimmed);
            continue;
        }
        if trimmed.starts_with('#') {
            out.push_str(trimmed);
            out.push('\n');
            continue;
        }
        if keep(trimmed) {
            for info in pending.drain(..) {
                out.push_str(info);
                out.push('\n');
            }
            out.push_str(trimmed);
            out.push('\n');
        } else {
            pending.clear();
            dropped += 1;
        }
    }
    for info in pending {
        out.push_str(info);
        out.push('\n');
    }

    if dropped > 0 {
        if !out.starts_with(HEADER) {
            out.insert_str(0, "#EXTM3U\n");
        }
        fs::write(path, out)?;
    }
    Ok(dropped)
}

/// Recognized playlist files in `dir`, sorted by path. A missing directory
/// has none.
fn playlist_files(dir: &Path) -> Result<Vec<(PathBuf, PlaylistRef)>, LibraryError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut out = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if !has_extension(&path, PRIMARY_EXTENSION) && !has_extension(&path, LEGACY_EXTENSION) {
            continue;
        }
        let stem = match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => stem.to_string(),
            None => continue,
        };
        out.push((path, PlaylistRef::from_stem(&stem)));
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}
