use axum::{
    extract::{Path as AxumPath, State},
    response::{IntoResponse, Response},
    Json,
};
use library::{OrganizeReport, PlaylistSummary, TagReader, Track};

use crate::state::{
    AddedResponse, AppState, JsonResult, ListResponse, RemovedResponse, TrackPathRequest,
    TrackPathsRequest,
};
use crate::utils::{json_ok_response, run_blocking};

use super::library_or_json_error;

pub async fn list_playlists(
    State(state): State<AppState>,
) -> JsonResult<ListResponse<PlaylistSummary>> {
    let library = library_or_json_error(&state)?;
    let playlists = run_blocking(move || library.list_playlists()).await?;
    Ok(Json(ListResponse::new(playlists)))
}

pub async fn get_playlist(
    State(state): State<AppState>,
    AxumPath(name): AxumPath<String>,
) -> JsonResult<ListResponse<Track>> {
    let library = library_or_json_error(&state)?;
    let tracks = run_blocking(move || library.playlist_details(&name)).await?;
    Ok(Json(ListResponse::new(tracks)))
}

pub async fn delete_playlist(
    State(state): State<AppState>,
    AxumPath(name): AxumPath<String>,
) -> Response {
    let library = match library_or_json_error(&state) {
        Ok(library) => library,
        Err(err) => return err.into_response(),
    };
    match run_blocking(move || library.delete_playlist(&name)).await {
        Ok(()) => json_ok_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn add_tracks(
    State(state): State<AppState>,
    AxumPath(name): AxumPath<String>,
    Json(request): Json<TrackPathsRequest>,
) -> JsonResult<AddedResponse> {
    let library = library_or_json_error(&state)?;
    let added = run_blocking(move || library.add_to_playlist(&name, &request.paths)).await?;
    Ok(Json(AddedResponse { added }))
}

/// Removing a track that is not listed is not an error; `removed` is then
/// false.
pub async fn remove_track(
    State(state): State<AppState>,
    AxumPath(name): AxumPath<String>,
    Json(request): Json<TrackPathRequest>,
) -> JsonResult<RemovedResponse> {
    let library = library_or_json_error(&state)?;
    let removed =
        run_blocking(move || library.remove_from_playlist(&name, &request.path)).await?;
    Ok(Json(RemovedResponse { removed }))
}

pub async fn import_tracks(
    State(state): State<AppState>,
    AxumPath(name): AxumPath<String>,
    Json(request): Json<TrackPathsRequest>,
) -> JsonResult<OrganizeReport> {
    let library = library_or_json_error(&state)?;
    let report = run_blocking(move || {
        library.import_into_playlist(&name, &request.paths, &TagReader::new())
    })
    .await?;
    Ok(Json(report))
}
