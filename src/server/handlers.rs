//! HTTP request handlers for the image API.
//!
//! # Endpoints
//!
//! - `GET /api/images` - List images
//! - `GET /api/images/{id}/metadata` - Image metadata record
//! - `GET /api/images/{id}/dzi` - DZI XML descriptor
//! - `GET /api/images/{id}/dzi.json` - DZI JSON descriptor
//! - `GET /api/images/{id}/tiles/{level}/{column}/{row}` - Serve a tile
//! - `DELETE /api/images/{id}` - Delete an image
//! - `GET /health` - Health check endpoint
//! - `GET /` - Upload page and viewer
//!
//! Uploads are handled in [`super::upload`].

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::config::Environment;
use crate::error::StoreError;
use crate::imaging::ImagingBackend;
use crate::tile::{DziDescriptor, ImageRecord, TileStore};

use super::upload::{UploadConfig, UploadError};

/// Tile file suffixes a client may append to the row segment.
const ROW_SUFFIXES: [&str; 4] = [".jpeg", ".jpg", ".png", ".webp"];

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<B: ImagingBackend> {
    /// The tile store holding every generated pyramid
    pub store: Arc<TileStore<B>>,

    /// Where and what uploads are accepted
    pub uploads: Arc<UploadConfig>,

    /// Controls whether error bodies carry a `stack` field
    pub environment: Environment,

    /// Cache-Control max-age for tiles and descriptors, in seconds
    pub cache_max_age: u32,

    /// Process start, reported as uptime by the health check
    pub started_at: Instant,
}

impl<B: ImagingBackend> AppState<B> {
    /// Create application state in production mode with a 1 hour max-age.
    pub fn new(store: TileStore<B>, uploads: UploadConfig) -> Self {
        Self {
            store: Arc::new(store),
            uploads: Arc::new(uploads),
            environment: Environment::Production,
            cache_max_age: 3600,
            started_at: Instant::now(),
        }
    }

    /// Set the deployment environment.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Convert an error for the response, attaching a debug rendering in
    /// development mode.
    pub fn error<E>(&self, err: E) -> ApiError
    where
        E: Into<ApiError> + fmt::Debug,
    {
        let stack = self
            .environment
            .is_development()
            .then(|| format!("{:#?}", err));

        let mut api_error = err.into();
        api_error.stack = stack;
        api_error
    }

    fn cache_control(&self) -> String {
        format!("public, max-age={}", self.cache_max_age)
    }
}

impl<B: ImagingBackend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            uploads: Arc::clone(&self.uploads),
            environment: self.environment,
            cache_max_age: self.cache_max_age,
            started_at: self.started_at,
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,

    /// Debug rendering of the error (development mode only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Body of the 404 fallback.
#[derive(Debug, Serialize)]
pub struct NotFoundResponse {
    pub error: String,
    pub path: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "OK"
    pub status: String,

    /// Time of the check
    pub timestamp: DateTime<Utc>,

    /// Seconds since the server started
    pub uptime: f64,
}

/// Response from the image list endpoint.
#[derive(Debug, Serialize)]
pub struct ImageListResponse {
    pub count: usize,
    pub images: Vec<ImageRecord>,
}

/// Plain confirmation message.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Error returned by every handler.
///
/// Carries the status, the message rendered as `error`, and an optional
/// `stack` that [`AppState::error`] fills in development mode.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub stack: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            stack: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::InvalidImageId { .. } | StoreError::InvalidOptions { .. } => {
                StatusCode::BAD_REQUEST
            }
            StoreError::UnreadableImage { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            StoreError::TileNotFound { .. }
            | StoreError::DescriptorNotFound { .. }
            | StoreError::MetadataNotFound { .. }
            | StoreError::ImageNotFound { .. } => StatusCode::NOT_FOUND,
            StoreError::TileGenerationFailed { .. }
            | StoreError::MetadataCorrupt { .. }
            | StoreError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        Self::new(status, err.to_string())
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        let status = match &err {
            UploadError::MissingFile
            | UploadError::UnsupportedType { .. }
            | UploadError::InvalidField { .. } => StatusCode::BAD_REQUEST,
            UploadError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::Multipart { status, .. } => *status,
            UploadError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        Self::new(status, err.to_string())
    }
}

/// Convert ApiError to HTTP response.
///
/// Logs by severity:
/// - 5xx errors at ERROR level
/// - 404 at DEBUG level (common and expected)
/// - other 4xx at WARN level
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;

        if status.is_server_error() {
            error!(status = status.as_u16(), "Server error: {}", self.message);
        } else if status == StatusCode::NOT_FOUND {
            debug!(status = status.as_u16(), "Resource not found: {}", self.message);
        } else if status.is_client_error() {
            warn!(status = status.as_u16(), "Client error: {}", self.message);
        }

        let body = ErrorResponse {
            error: self.message,
            stack: self.stack,
        };

        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Request Parsing
// =============================================================================

/// Parse the `{level}/{column}/{row}` segments of a tile path.
///
/// The row may carry one tile file suffix, which is ignored.
pub fn parse_tile_coordinates(
    level: &str,
    column: &str,
    row: &str,
) -> Result<(u32, u32, u32), ApiError> {
    let row = ROW_SUFFIXES
        .iter()
        .find_map(|suffix| row.strip_suffix(suffix))
        .unwrap_or(row);

    let parse = |name: &str, value: &str| {
        value.parse::<u32>().map_err(|_| {
            ApiError::bad_request(format!("Invalid tile {}: {:?}", name, value))
        })
    };

    Ok((
        parse("level", level)?,
        parse("column", column)?,
        parse("row", row)?,
    ))
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle image list requests.
///
/// # Endpoint
///
/// `GET /api/images`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// { "count": 1, "images": [ { "id": "scan-1712000000000-0", ... } ] }
/// ```
pub async fn list_images_handler<B: ImagingBackend>(
    State(state): State<AppState<B>>,
) -> Result<Json<ImageListResponse>, ApiError> {
    let images = state.store.list_images().await.map_err(|e| state.error(e))?;

    Ok(Json(ImageListResponse {
        count: images.len(),
        images,
    }))
}

/// Handle metadata requests.
///
/// # Endpoint
///
/// `GET /api/images/{id}/metadata`
///
/// # Errors
///
/// - `400 Bad Request`: Invalid identifier
/// - `404 Not Found`: No metadata for the image
/// - `500 Internal Server Error`: Corrupt metadata or storage error
pub async fn metadata_handler<B: ImagingBackend>(
    State(state): State<AppState<B>>,
    Path(id): Path<String>,
) -> Result<Json<ImageRecord>, ApiError> {
    let record = state
        .store
        .get_metadata(&id)
        .await
        .map_err(|e| state.error(e))?;

    Ok(Json(record))
}

/// Handle DZI descriptor requests - returns the stored XML verbatim.
///
/// # Endpoint
///
/// `GET /api/images/{id}/dzi`
///
/// # Example Response
///
/// ```xml
/// <?xml version="1.0" encoding="UTF-8"?>
/// <Image xmlns="http://schemas.microsoft.com/deepzoom/2008" Format="jpeg" Overlap="1" TileSize="256">
///   <Size Height="600" Width="800"/>
/// </Image>
/// ```
pub async fn dzi_descriptor_handler<B: ImagingBackend>(
    State(state): State<AppState<B>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let xml = state
        .store
        .get_dzi_descriptor(&id)
        .await
        .map_err(|e| state.error(e))?;

    Ok((
        [(header::CONTENT_TYPE, "application/xml")],
        [(header::CACHE_CONTROL, state.cache_control())],
        xml,
    )
        .into_response())
}

/// Handle DZI JSON requests.
///
/// # Endpoint
///
/// `GET /api/images/{id}/dzi.json`
///
/// The `Format` field is always `"jpeg"`, whatever the tiles were encoded as.
pub async fn dzi_json_handler<B: ImagingBackend>(
    State(state): State<AppState<B>>,
    Path(id): Path<String>,
) -> Result<Json<DziDescriptor>, ApiError> {
    let descriptor = state
        .store
        .get_dzi_json(&id)
        .await
        .map_err(|e| state.error(e))?;

    Ok(Json(descriptor))
}

/// Handle tile requests.
///
/// # Endpoint
///
/// `GET /api/images/{id}/tiles/{level}/{column}/{row}`
///
/// The row may end in `.jpeg`, `.jpg`, `.png` or `.webp`.
///
/// # Response
///
/// - `200 OK`: Tile bytes with `Content-Type: image/jpeg`, whatever the
///   stored encoding
/// - `400 Bad Request`: Non-numeric coordinate or invalid identifier
/// - `404 Not Found`: No tile at the coordinate
pub async fn tile_handler<B: ImagingBackend>(
    State(state): State<AppState<B>>,
    Path((id, level, column, row)): Path<(String, String, String, String)>,
) -> Result<Response, ApiError> {
    let (level, column, row) =
        parse_tile_coordinates(&level, &column, &row).map_err(|e| state.error(e))?;

    let data = state
        .store
        .get_tile(&id, level, column, row)
        .await
        .map_err(|e| state.error(e))?;

    Ok((
        [(header::CONTENT_TYPE, "image/jpeg")],
        [(header::CACHE_CONTROL, state.cache_control())],
        data,
    )
        .into_response())
}

/// Handle image deletion.
///
/// # Endpoint
///
/// `DELETE /api/images/{id}`
///
/// # Response
///
/// `200 OK` with `{"message": "Image deleted successfully"}`, or
/// `404 Not Found` if the image does not exist.
pub async fn delete_image_handler<B: ImagingBackend>(
    State(state): State<AppState<B>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .store
        .delete_image(&id)
        .await
        .map_err(|e| state.error(e))?;

    Ok(Json(MessageResponse {
        message: "Image deleted successfully".to_string(),
    }))
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "OK",
///   "timestamp": "2024-04-01T12:00:00Z",
///   "uptime": 12.5
/// }
/// ```
pub async fn health_handler<B: ImagingBackend>(
    State(state): State<AppState<B>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: Utc::now(),
        uptime: state.started_at.elapsed().as_secs_f64(),
    })
}

/// Serve the upload page with the current image list.
///
/// A failed listing still renders the page, without images.
pub async fn index_handler<B: ImagingBackend>(State(state): State<AppState<B>>) -> Html<String> {
    let images = match state.store.list_images().await {
        Ok(images) => images,
        Err(e) => {
            warn!(error = %e, "Failed to list images for index page");
            Vec::new()
        }
    };

    Html(super::viewer::generate_index_html(&images))
}

/// Fallback for unmatched routes.
pub async fn not_found_handler(uri: Uri) -> (StatusCode, Json<NotFoundResponse>) {
    debug!(path = %uri.path(), "No route");

    (
        StatusCode::NOT_FOUND,
        Json(NotFoundResponse {
            error: "Resource not found".to_string(),
            path: uri.path().to_string(),
        }),
    )
}

// =============================================================================
// Tests
// =============================================================================
