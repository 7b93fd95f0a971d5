use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use library::LibraryError;
use tracing::warn;

use crate::state::{ErrorResponse, HealthResponse};

pub fn json_error(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub fn json_error_response(status: StatusCode, message: impl Into<String>) -> Response {
    json_error(status, message).into_response()
}

pub fn json_ok_response() -> Response {
    Json(HealthResponse { status: "ok" }).into_response()
}

pub fn status_for(err: &LibraryError) -> StatusCode {
    match err {
        LibraryError::NotFound(_) => StatusCode::NOT_FOUND,
        LibraryError::ProtectedPlaylist(_) => StatusCode::FORBIDDEN,
        LibraryError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        LibraryError::Io(_) | LibraryError::Metadata(_) | LibraryError::Json(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub fn library_error(err: LibraryError) -> (StatusCode, Json<ErrorResponse>) {
    let status = status_for(&err);
    if status.is_server_error() {
        warn!("Library operation failed: {}", err);
    }
    json_error(status, err.to_string())
}

/// Runs an engine call on the blocking pool.
pub async fn run_blocking<T, F>(task: F) -> Result<T, (StatusCode, Json<ErrorResponse>)>
where
    F: FnOnce() -> Result<T, LibraryError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(task).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(library_error(err)),
        Err(err) => Err(json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("task failed: {}", err),
        )),
    }
}

pub fn image_response(data: Vec<u8>, mime: &str) -> Response {
    let mut response = Response::new(Body::from(data));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime).unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_errors_map_to_statuses() {
        let cases = [
            (LibraryError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (LibraryError::ProtectedPlaylist("x".into()), StatusCode::FORBIDDEN),
            (LibraryError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
            (
                LibraryError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(status_for(&err), status);
        }
    }

    #[test]
    fn error_body_carries_message() {
        let (status, Json(body)) =
            library_error(LibraryError::ProtectedPlaylist("00_Master_Library".into()));
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.error.contains("00_Master_Library"));
    }
}
