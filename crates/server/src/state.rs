use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::Json;
use library::{LibraryError, LibraryHandle, ScanProposal};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::config::{resolve_setting, ServerConfig};

#[derive(Clone)]
pub struct AppState {
    pub config_path: PathBuf,
    pub config: Arc<RwLock<ServerConfig>>,
    /// One handle per library root, so every request against the same root
    /// shares its write lock.
    pub libraries: Arc<Mutex<HashMap<PathBuf, LibraryHandle>>>,
}

impl AppState {
    pub fn new(config_path: PathBuf, config: ServerConfig) -> Self {
        Self {
            config_path,
            config: Arc::new(RwLock::new(config)),
            libraries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn library(&self) -> Result<LibraryHandle, LibraryError> {
        let configured = self.config.read().library_path.clone();
        let root = resolve_setting(&self.config_path, &configured).ok_or_else(|| {
            LibraryError::InvalidRequest("library path must be set".to_string())
        })?;
        let mut libraries = self.libraries.lock();
        if let Some(handle) = libraries.get(&root) {
            return Ok(handle.clone());
        }
        let handle = LibraryHandle::open(root.clone())?;
        libraries.insert(root, handle.clone());
        Ok(handle)
    }

    pub fn inbox(&self) -> Option<PathBuf> {
        let configured = self.config.read().inbox_path.clone();
        resolve_setting(&self.config_path, &configured)
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct SettingsUpdate {
    pub inbox_path: Option<String>,
    pub library_path: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScanRequest {
    pub inbox: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrganizeRequest {
    pub proposals: Vec<ScanProposal>,
}

#[derive(Debug, Deserialize)]
pub struct TrackPathsRequest {
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct TrackPathRequest {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct TrackQuery {
    pub path: String,
}

#[derive(Serialize)]
pub struct AddedResponse {
    pub added: usize,
}

#[derive(Serialize)]
pub struct RemovedResponse {
    pub removed: bool,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> ListResponse<T> {
    pub fn new(items: Vec<T>) -> Self {
        let total = items.len();
        Self { items, total }
    }
}

pub type JsonResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;
