pub mod library;
pub mod playlists;
pub mod settings;
pub mod tracks;

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use ::library::LibraryHandle;

use crate::state::{AppState, ErrorResponse, HealthResponse};
use crate::utils::library_error;

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/settings",
            get(settings::get_settings).post(settings::update_settings),
        )
        .route("/scan", post(library::scan))
        .route("/organize", post(library::organize))
        .route("/inventory", get(library::inventory))
        .route("/export", post(library::export))
        .route("/reveal", post(library::reveal))
        .route("/playlists", get(playlists::list_playlists))
        .route(
            "/playlists/:name",
            get(playlists::get_playlist).delete(playlists::delete_playlist),
        )
        .route(
            "/playlists/:name/tracks",
            post(playlists::add_tracks).delete(playlists::remove_track),
        )
        .route("/playlists/:name/import", post(playlists::import_tracks))
        .route("/tracks/playlists", get(tracks::playlists_for_track))
        .route("/tracks/cover", get(tracks::get_cover))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

pub(crate) fn library_or_json_error(
    state: &AppState,
) -> Result<LibraryHandle, (StatusCode, Json<ErrorResponse>)> {
    state.library().map_err(library_error)
}
