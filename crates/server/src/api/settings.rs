use axum::{extract::State, http::StatusCode, Json};
use tracing::info;

use crate::config::{save_config, ServerConfig};
use crate::state::{AppState, JsonResult, SettingsUpdate};
use crate::utils::json_error;

pub async fn get_settings(State(state): State<AppState>) -> JsonResult<ServerConfig> {
    Ok(Json(state.config.read().clone()))
}

/// Port changes are saved but take effect on the next start.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> JsonResult<ServerConfig> {
    let mut next = state.config.read().clone();
    if let Some(inbox_path) = update.inbox_path {
        next.inbox_path = inbox_path.trim().to_string();
    }
    if let Some(library_path) = update.library_path {
        next.library_path = library_path.trim().to_string();
    }
    if let Some(port) = update.port {
        if port == 0 {
            return Err(json_error(StatusCode::BAD_REQUEST, "port must be non-zero"));
        }
        next.port = port;
    }

    if let Err(err) = save_config(&state.config_path, &next) {
        return Err(json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to save config: {}", err),
        ));
    }
    *state.config.write() = next.clone();
    info!("Settings saved to {:?}", state.config_path);
    Ok(Json(next))
}
