use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use common::{canonical_key, destination_path, normalize_lexically, relpath_from, Track};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::inventory::Inventory;
use crate::playlist::{entry_for, merge_into, regenerate_derived, PlaylistRef};
use crate::relocate::relocate;
use crate::resolve::{is_audio_file, resolve_track, MetadataSource};
use crate::scan::ScanProposal;
use crate::{require_absolute, ItemFailure, LibraryError, LibraryHandle};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OrganizeReport {
    pub organized: usize,
    pub failed: usize,
    pub failures: Vec<ItemFailure>,
    /// Inventory records for every organized item, in input order.
    pub tracks: Vec<Track>,
}

impl OrganizeReport {
    fn fail(&mut self, path: &Path, error: impl ToString) {
        self.failed += 1;
        self.failures.push(ItemFailure::new(path, error));
    }
}

/// Library locations and state shared by one write cycle.
struct Commit {
    root: PathBuf,
    playlist_dir: PathBuf,
    inventory: Inventory,
    hints: BTreeMap<String, Vec<String>>,
}

impl Commit {
    fn begin(handle: &LibraryHandle) -> Result<Self, LibraryError> {
        fs::create_dir_all(handle.root())?;
        let root = handle.root();
        let playlist_dir = handle.playlist_dir();
        fs::create_dir_all(&playlist_dir)?;
        let inventory = Inventory::load(&handle.inventory_path())?;
        Ok(Self {
            root,
            playlist_dir,
            inventory,
            hints: BTreeMap::new(),
        })
    }

    /// Relocates one file and records it. The returned track carries its
    /// final location.
    fn place(
        &mut self,
        source: &Path,
        destination: &Path,
        mut track: Track,
        hints: &[String],
    ) -> Result<Track, LibraryError> {
        let final_path = relocate(source, destination)?;
        let key = canonical_key(&final_path);
        track.library_relative_path = relpath_from(&self.root, &key);
        track.absolute_path = key;
        if !self.inventory.push(track.clone()) {
            info!("{:?} is already catalogued", track.absolute_path);
        }
        self.hint(&track.absolute_path, hints);
        Ok(track)
    }

    fn hint(&mut self, track: &Path, hints: &[String]) {
        if hints.is_empty() {
            return;
        }
        let entry = entry_for(&self.playlist_dir, track);
        for hint in hints {
            self.hints
                .entry(hint.clone())
                .or_default()
                .push(entry.clone());
        }
    }

    /// Persist inventory, rebuild derived playlists, merge custom ones. A
    /// failed merge is recorded against the playlist file and the rest go on.
    fn finish(
        self,
        handle: &LibraryHandle,
        report: &mut OrganizeReport,
    ) -> Result<(), LibraryError> {
        self.inventory.save(&handle.inventory_path())?;
        regenerate_derived(&self.playlist_dir, &self.inventory)?;
        for (hint, entries) in &self.hints {
            let playlist = match PlaylistRef::parse(hint) {
                Ok(playlist) => playlist,
                Err(err) => {
                    warn!("Skipping playlist hint {:?}: {}", hint, err);
                    continue;
                }
            };
            if let Err(err) = playlist.ensure_editable() {
                warn!("Skipping playlist hint {:?}: {}", hint, err);
                continue;
            }
            match merge_into(&self.playlist_dir, &playlist, entries) {
                Ok(added) => info!("Merged {} tracks into playlist {}", added, playlist.name()),
                Err(err) => {
                    let path = playlist.primary_path(&self.playlist_dir);
                    warn!("Failed to update playlist {:?}: {}", path, err);
                    report.failures.push(ItemFailure::new(&path, err));
                }
            }
        }
        Ok(())
    }
}

impl LibraryHandle {
    /// Commits scan proposals: relocate, catalogue, regenerate derived
    /// playlists, merge hinted custom playlists. Individual failures are
    /// reported, never fatal.
    pub fn organize(&self, proposals: &[ScanProposal]) -> Result<OrganizeReport, LibraryError> {
        for proposal in proposals {
            require_absolute(&proposal.source_path)?;
            require_absolute(&proposal.destination)?;
        }

        let root = self.root();
        for proposal in proposals {
            if !normalize_lexically(&proposal.destination).starts_with(&root) {
                return Err(LibraryError::InvalidRequest(format!(
                    "destination outside library: {}",
                    proposal.destination.display()
                )));
            }
        }

        let _guard = self.lock();
        let mut commit = Commit::begin(self)?;

        let mut report = OrganizeReport::default();
        for proposal in proposals {
            match commit.place(
                &proposal.source_path,
                &proposal.destination,
                proposal.track.clone(),
                &proposal.playlist_hints,
            ) {
                Ok(track) => {
                    report.organized += 1;
                    report.tracks.push(track);
                }
                Err(err) => {
                    warn!("Failed to organize {:?}: {}", proposal.source_path, err);
                    report.fail(&proposal.source_path, err);
                }
            }
        }

        commit.finish(self, &mut report)?;
        info!(
            "Organize finished: {} succeeded, {} failed",
            report.organized, report.failed
        );
        Ok(report)
    }

    /// Adds files to a custom playlist, bringing any that live outside the
    /// library in first, the same way organize does.
    pub fn import_into_playlist(
        &self,
        name: &str,
        files: &[PathBuf],
        source: &dyn MetadataSource,
    ) -> Result<OrganizeReport, LibraryError> {
        let playlist = PlaylistRef::parse(name)?;
        playlist.ensure_editable()?;
        for file in files {
            require_absolute(file)?;
        }

        let _guard = self.lock();
        let mut commit = Commit::begin(self)?;
        let hints = vec![playlist.name().to_string()];
        let mut report = OrganizeReport::default();

        for file in files {
            let key = canonical_key(file);
            if let Some(track) = commit
                .inventory
                .tracks()
                .iter()
                .find(|t| t.absolute_path == key)
                .cloned()
            {
                commit.hint(&key, &hints);
                report.organized += 1;
                report.tracks.push(track);
                continue;
            }
            if !is_audio_file(file) {
                report.fail(file, "not a recognized audio file");
                continue;
            }
            let tags = match source.read(file) {
                Ok(tags) => tags,
                Err(err) => {
                    warn!("Failed to read tags for {:?}: {}", file, err);
                    report.fail(file, err);
                    continue;
                }
            };
            let track = resolve_track(file, tags);
            let destination = destination_path(&commit.root, &track);
            match commit.place(file, &destination, track, &hints) {
                Ok(track) => {
                    report.organized += 1;
                    report.tracks.push(track);
                }
                Err(err) => {
                    warn!("Failed to import {:?}: {}", file, err);
                    report.fail(file, err);
                }
            }
        }

        commit.finish(self, &mut report)?;
        info!(
            "Imported {} tracks into {} ({} failed)",
            report.organized,
            playlist.name(),
            report.failed
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::read_entries;
    use crate::testutil::{tags, touch, FakeSource, Fixture};

    #[test]
    fn organize_moves_catalogues_and_writes_playlists() {
        let fx = Fixture::new();
        touch(&fx.inbox.join("[Road Trip]/x.mp3"));
        let source = FakeSource::default()
            .with("x.mp3", tags("Song", "Band", "Record", Some(2001), 4, &["Rock"]));
        let handle = fx.handle();

        let scan = handle.scan_inbox(&fx.inbox, &source).unwrap();
        let report = handle.organize(&scan.proposals).unwrap();
        assert_eq!((report.organized, report.failed), (1, 0));

        let dest = handle.root().join("Band/(2001) Record/04 - Song.mp3");
        assert!(dest.is_file());
        assert!(!fx.inbox.join("[Road Trip]/x.mp3").exists());

        let inventory = handle.inventory().unwrap();
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory[0].absolute_path, dest);
        assert_eq!(
            inventory[0].library_relative_path.as_deref(),
            Some("Band/(2001) Record/04 - Song.mp3")
        );

        let dir = handle.playlist_dir();
        let expected = vec!["../Band/(2001) Record/04 - Song.mp3".to_string()];
        assert_eq!(read_entries(&dir.join("00_Master_Library.m3u8")).unwrap(), expected);
        assert_eq!(read_entries(&dir.join("Genre - Rock.m3u8")).unwrap(), expected);
        assert_eq!(read_entries(&dir.join("Road Trip.m3u8")).unwrap(), expected);
    }

    #[test]
    fn failed_relocation_does_not_abort_batch() {
        let fx = Fixture::new();
        touch(&fx.inbox.join("a.mp3"));
        touch(&fx.inbox.join("b.mp3"));
        let handle = fx.handle();
        let scan = handle.scan_inbox(&fx.inbox, &FakeSource::default()).unwrap();
        fs::remove_file(&scan.proposals[0].source_path).unwrap();

        let report = handle.organize(&scan.proposals).unwrap();
        assert_eq!((report.organized, report.failed), (1, 1));
        assert_eq!(handle.inventory().unwrap().len(), 1);
    }

    #[test]
    fn colliding_destinations_collapse_without_duplicates() {
        let fx = Fixture::new();
        touch(&fx.inbox.join("one/x.mp3"));
        touch(&fx.inbox.join("two/x.mp3"));
        let handle = fx.handle();
        let scan = handle.scan_inbox(&fx.inbox, &FakeSource::default()).unwrap();
        assert_eq!(scan.proposals[0].destination, scan.proposals[1].destination);

        let report = handle.organize(&scan.proposals).unwrap();
        assert_eq!(report.organized, 2);
        assert_eq!(handle.inventory().unwrap().len(), 1);
        assert!(fx.inbox.join("two/x.mp3").exists());
        assert_eq!(
            read_entries(&handle.playlist_dir().join("00_Master_Library.m3u8"))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn destinations_outside_library_are_rejected_before_io() {
        let fx = Fixture::new();
        touch(&fx.inbox.join("a.mp3"));
        let handle = fx.handle();
        let mut scan = handle.scan_inbox(&fx.inbox, &FakeSource::default()).unwrap();
        scan.proposals[0].destination = fx.inbox.join("elsewhere/a.mp3");

        let err = handle.organize(&scan.proposals).unwrap_err();
        assert!(matches!(err, LibraryError::InvalidRequest(_)));
        assert!(fx.inbox.join("a.mp3").exists());
        assert!(!handle.inventory_path().exists());
    }

    #[test]
    fn import_brings_outside_files_in_and_lists_them() {
        let fx = Fixture::new();
        let outside = fx.inbox.join("loose.flac");
        touch(&outside);
        let handle = fx.handle();

        let report = handle
            .import_into_playlist("Picks", &[outside.clone()], &FakeSource::default())
            .unwrap();
        assert_eq!(report.organized, 1);
        let track = &report.tracks[0];
        assert!(track.absolute_path.starts_with(handle.root()));
        assert!(!outside.exists());
        assert_eq!(handle.inventory().unwrap().len(), 1);
        assert_eq!(
            handle.playlists_for_track(&track.absolute_path).unwrap(),
            vec!["Picks".to_string()]
        );

        // Already catalogued: merged without moving anything.
        let again = handle
            .import_into_playlist("Other", &[track.absolute_path.clone()], &FakeSource::default())
            .unwrap();
        assert_eq!(again.organized, 1);
        assert_eq!(handle.inventory().unwrap().len(), 1);
    }

    #[test]
    fn failed_playlist_merge_still_reports_the_batch() {
        let fx = Fixture::new();
        touch(&fx.inbox.join("[Blocked]/a.mp3"));
        touch(&fx.inbox.join("[Open]/b.mp3"));
        let handle = fx.handle();
        // A directory where the playlist file should be makes the write fail.
        fs::create_dir_all(handle.playlist_dir().join("Blocked.m3u8")).unwrap();

        let scan = handle.scan_inbox(&fx.inbox, &FakeSource::default()).unwrap();
        let report = handle.organize(&scan.proposals).unwrap();
        assert_eq!((report.organized, report.failed), (2, 0));
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].path.ends_with("Blocked.m3u8"));
        assert_eq!(handle.inventory().unwrap().len(), 2);
        assert_eq!(
            read_entries(&handle.playlist_dir().join("Open.m3u8")).unwrap().len(),
            1
        );
    }

    #[test]
    fn import_into_genre_playlist_is_protected() {
        let fx = Fixture::new();
        let err = fx
            .handle()
            .import_into_playlist("Genre - Rock", &[], &FakeSource::default())
            .unwrap_err();
        assert!(matches!(err, LibraryError::ProtectedPlaylist(_)));
    }
}
