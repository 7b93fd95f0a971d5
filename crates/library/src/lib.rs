use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::canonical_key;
use metadata::MetadataError;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

mod inventory;
mod organize;
mod playlist;
mod relocate;
mod resolve;
mod scan;
mod transfer;

#[cfg(test)]
mod testutil;

pub use common::Track;
pub use inventory::{Inventory, INVENTORY_FILE};
pub use organize::OrganizeReport;
pub use playlist::{
    PlaylistKind, PlaylistRef, PlaylistSummary, GENRE_PREFIX, LEGACY_EXTENSION, MASTER_PLAYLIST,
    PLAYLIST_DIR, PRIMARY_EXTENSION,
};
pub use relocate::relocate;
pub use resolve::{folder_hints, is_audio_file, resolve_track, MetadataSource, TagReader};
pub use scan::{scan_inbox, ScanProposal, ScanReport};
pub use transfer::{TransferMode, TransferReport, TransferRequest, TransferSource};

/// Explicit reference to one library root. Every engine operation goes
/// through a handle; clones share the write lock, so all mutating calls
/// against the same handle family are serialized.
#[derive(Clone)]
pub struct LibraryHandle {
    root: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl LibraryHandle {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, LibraryError> {
        let root = root.into();
        if root.as_os_str().is_empty() {
            return Err(LibraryError::InvalidRequest(
                "library path must be set".to_string(),
            ));
        }
        let root = if root.is_absolute() {
            root
        } else {
            std::env::current_dir()?.join(root)
        };
        Ok(Self {
            root,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Library root in canonical form once it exists on disk.
    pub fn root(&self) -> PathBuf {
        canonical_key(&self.root)
    }

    pub fn playlist_dir(&self) -> PathBuf {
        self.root().join(PLAYLIST_DIR)
    }

    pub fn inventory_path(&self) -> PathBuf {
        self.root().join(INVENTORY_FILE)
    }

    pub fn inventory(&self) -> Result<Vec<Track>, LibraryError> {
        let inventory = Inventory::load(&self.inventory_path())?;
        Ok(inventory.into_tracks())
    }

    pub fn contains(&self, path: &Path) -> bool {
        canonical_key(path).starts_with(self.root())
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock()
    }
}

/// One item of a batch that could not be processed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ItemFailure {
    pub path: PathBuf,
    pub error: String,
}

impl ItemFailure {
    pub(crate) fn new(path: &Path, error: impl ToString) -> Self {
        Self {
            path: path.to_path_buf(),
            error: error.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum LibraryError {
    NotFound(String),
    ProtectedPlaylist(String),
    InvalidRequest(String),
    Io(std::io::Error),
    Metadata(MetadataError),
    Json(serde_json::Error),
}

impl std::fmt::Display for LibraryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryError::NotFound(what) => write!(f, "not found: {}", what),
            LibraryError::ProtectedPlaylist(name) => {
                write!(f, "playlist is managed automatically: {}", name)
            }
            LibraryError::InvalidRequest(message) => write!(f, "invalid request: {}", message),
            LibraryError::Io(err) => write!(f, "io error: {}", err),
            LibraryError::Metadata(err) => write!(f, "metadata error: {}", err),
            LibraryError::Json(err) => write!(f, "inventory error: {}", err),
        }
    }
}

impl std::error::Error for LibraryError {}

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        LibraryError::Io(err)
    }
}

impl From<MetadataError> for LibraryError {
    fn from(err: MetadataError) -> Self {
        LibraryError::Metadata(err)
    }
}

impl From<serde_json::Error> for LibraryError {
    fn from(err: serde_json::Error) -> Self {
        LibraryError::Json(err)
    }
}

pub(crate) fn require_absolute(path: &Path) -> Result<(), LibraryError> {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(LibraryError::InvalidRequest(format!(
            "path must be absolute: {}",
            path.display()
        )))
    }
}
