use std::fs;
use std::path::{Path, PathBuf};

use common::{canonical_key, destination_path, Track};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::resolve::{folder_hints, is_audio_file, resolve_track, MetadataSource};
use crate::{ItemFailure, LibraryError, LibraryHandle};

/// A file the scanner would move into the library, and where to.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ScanProposal {
    pub source_path: PathBuf,
    pub track: Track,
    pub destination: PathBuf,
    #[serde(default)]
    pub playlist_hints: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ScanReport {
    pub proposals: Vec<ScanProposal>,
    pub failures: Vec<ItemFailure>,
    pub skipped: usize,
}

impl LibraryHandle {
    pub fn scan_inbox(
        &self,
        inbox: &Path,
        source: &dyn MetadataSource,
    ) -> Result<ScanReport, LibraryError> {
        scan_inbox(inbox, &self.root(), source)
    }
}

/// Walks the inbox without touching it. Top-level folders are tag carriers;
/// top-level files carry no hints.
pub fn scan_inbox(
    inbox: &Path,
    library_root: &Path,
    source: &dyn MetadataSource,
) -> Result<ScanReport, LibraryError> {
    if !inbox.exists() {
        return Err(LibraryError::NotFound(format!(
            "inbox {}",
            inbox.display()
        )));
    }
    if !inbox.is_dir() {
        return Err(LibraryError::InvalidRequest(format!(
            "inbox is not a directory: {}",
            inbox.display()
        )));
    }

    let inbox = canonical_key(inbox);
    let library_root = canonical_key(library_root);
    let mut report = ScanReport::default();

    let mut entries: Vec<PathBuf> = fs::read_dir(&inbox)?
        .flatten()
        .map(|entry| entry.path())
        .collect();
    entries.sort();

    for entry in entries {
        if entry == library_root {
            continue;
        }
        if entry.is_dir() {
            let name = entry
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            let hints = folder_hints(&name);
            for file in audio_files_under(&entry, &mut report.skipped) {
                scan_file(&file, &library_root, &hints, source, &mut report);
            }
        } else if entry.is_file() {
            if is_audio_file(&entry) {
                scan_file(&entry, &library_root, &[], source, &mut report);
            } else {
                report.skipped += 1;
            }
        }
    }

    info!(
        "Inbox scan of {:?}: {} proposals, {} failed, {} skipped",
        inbox,
        report.proposals.len(),
        report.failures.len(),
        report.skipped
    );
    Ok(report)
}

fn audio_files_under(dir: &Path, skipped: &mut usize) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        if is_audio_file(entry.path()) {
            files.push(entry.into_path());
        } else {
            *skipped += 1;
        }
    }
    files
}

fn scan_file(
    file: &Path,
    library_root: &Path,
    hints: &[String],
    source: &dyn MetadataSource,
    report: &mut ScanReport,
) {
    let tags = match source.read(file) {
        Ok(tags) => tags,
        Err(err) => {
            warn!("Failed to read tags for {:?}: {}", file, err);
            report.failures.push(ItemFailure::new(file, err));
            return;
        }
    };
    let track = resolve_track(file, tags);
    let destination = destination_path(library_root, &track);
    report.proposals.push(ScanProposal {
        source_path: file.to_path_buf(),
        track,
        destination,
        playlist_hints: hints.to_vec(),
    });
}
