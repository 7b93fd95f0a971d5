use std::path::PathBuf;

use axum::{extract::State, http::StatusCode, response::Response, Json};
use library::{OrganizeReport, ScanReport, TagReader, Track, TransferReport, TransferRequest};

use crate::config::resolve_path;
use crate::reveal::{ensure_revealable, reveal_in_file_manager};
use crate::state::{
    AppState, JsonResult, ListResponse, OrganizeRequest, ScanRequest, TrackPathRequest,
};
use crate::utils::{json_error, json_error_response, json_ok_response, run_blocking};

use super::library_or_json_error;

/// Dry run over the inbox; nothing on disk changes.
pub async fn scan(
    State(state): State<AppState>,
    body: Option<Json<ScanRequest>>,
) -> JsonResult<ScanReport> {
    let library = library_or_json_error(&state)?;
    let request = body.map(|Json(body)| body).unwrap_or_default();
    let inbox: PathBuf = match request.inbox.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => resolve_path(&state.config_path, value),
        _ => state.inbox().ok_or_else(|| {
            json_error(StatusCode::BAD_REQUEST, "inbox path must be set".to_string())
        })?,
    };

    let report = run_blocking(move || library.scan_inbox(&inbox, &TagReader::new())).await?;
    Ok(Json(report))
}

pub async fn organize(
    State(state): State<AppState>,
    Json(request): Json<OrganizeRequest>,
) -> JsonResult<OrganizeReport> {
    let library = library_or_json_error(&state)?;
    let report = run_blocking(move || library.organize(&request.proposals)).await?;
    Ok(Json(report))
}

pub async fn inventory(State(state): State<AppState>) -> JsonResult<ListResponse<Track>> {
    let library = library_or_json_error(&state)?;
    let tracks = run_blocking(move || library.inventory()).await?;
    Ok(Json(ListResponse::new(tracks)))
}

pub async fn export(
    State(state): State<AppState>,
    Json(request): Json<TransferRequest>,
) -> JsonResult<TransferReport> {
    let library = library_or_json_error(&state)?;
    let report = run_blocking(move || library.transfer(&request)).await?;
    Ok(Json(report))
}

pub async fn reveal(Json(request): Json<TrackPathRequest>) -> Response {
    if let Err(err) = ensure_revealable(&request.path) {
        return json_error_response(StatusCode::NOT_FOUND, err.to_string());
    }
    reveal_in_file_manager(&request.path);
    json_ok_response()
}
