use std::path::PathBuf;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use library::LibraryError;
use metadata::{read_cover, MetadataError};

use crate::state::{AppState, JsonResult, ListResponse, TrackQuery};
use crate::utils::{image_response, json_error_response, library_error, run_blocking};

use super::library_or_json_error;

/// Custom playlists that list the track.
pub async fn playlists_for_track(
    State(state): State<AppState>,
    Query(query): Query<TrackQuery>,
) -> JsonResult<ListResponse<String>> {
    let library = library_or_json_error(&state)?;
    let path = PathBuf::from(query.path);
    let names = run_blocking(move || library.playlists_for_track(&path)).await?;
    Ok(Json(ListResponse::new(names)))
}

pub async fn get_cover(Query(query): Query<TrackQuery>) -> Response {
    let path = PathBuf::from(query.path);
    let result = tokio::task::spawn_blocking(move || read_cover(&path)).await;
    match result {
        Ok(Ok(Some(cover))) => {
            let mime = cover
                .mime
                .unwrap_or_else(|| "application/octet-stream".to_string());
            image_response(cover.data, &mime)
        }
        Ok(Ok(None)) => json_error_response(StatusCode::NOT_FOUND, "cover not found"),
        Ok(Err(MetadataError::NotFound(path))) => {
            json_error_response(StatusCode::NOT_FOUND, format!("file not found: {}", path))
        }
        Ok(Err(err)) => library_error(LibraryError::Metadata(err)).into_response(),
        Err(err) => json_error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("task failed: {}", err),
        ),
    }
}
