//! Multipart upload handling.
//!
//! `POST /api/images/upload` takes a `multipart/form-data` body with:
//!
//! - `image` - the file (required, MIME type must be allowed)
//! - `tileSize`, `overlap`, `format`, `quality` - optional text fields
//!
//! The file is streamed to the upload directory under a unique name
//! `<stem>-<unix millis>-<sequence><.ext>`, and that name becomes the
//! image's `filename` (and so its identifier, minus the extension).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::imaging::{ImagingBackend, TileFormat};
use crate::io;
use crate::tile::{sanitize_file_stem, GenerationOptions, ImageRecord};

use super::handlers::{ApiError, AppState};

/// Name of the multipart file field.
pub const FILE_FIELD: &str = "image";

/// Longest extension carried over into the stored name.
const MAX_EXTENSION_LEN: usize = 10;

static UPLOAD_SEQUENCE: AtomicU64 = AtomicU64::new(0);

// =============================================================================
// Configuration
// =============================================================================

/// Upload acceptance rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    /// Directory the uploaded files are written to
    pub upload_dir: PathBuf,

    /// Accepted MIME types, lowercase
    pub allowed_types: Vec<String>,

    /// Largest accepted file in bytes
    pub max_file_size: usize,
}

impl UploadConfig {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            allowed_types: crate::config::DEFAULT_ALLOWED_FORMATS
                .iter()
                .map(|t| t.to_string())
                .collect(),
            max_file_size: crate::config::DEFAULT_MAX_FILE_SIZE,
        }
    }

    pub fn with_allowed_types(mut self, types: Vec<String>) -> Self {
        self.allowed_types = types;
        self
    }

    pub fn with_max_file_size(mut self, bytes: usize) -> Self {
        self.max_file_size = bytes;
        self
    }

    fn is_allowed(&self, content_type: &str) -> bool {
        let content_type = content_type.trim().to_ascii_lowercase();
        self.allowed_types.iter().any(|t| *t == content_type)
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Errors raised while receiving an upload, before the store is involved.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The request had no `image` file field
    #[error("No file uploaded")]
    MissingFile,

    /// The file's MIME type is not in the allowed list
    #[error("Invalid file type. Allowed: {allowed}")]
    UnsupportedType {
        content_type: String,
        allowed: String,
    },

    /// A text field could not be parsed
    #[error("Invalid value for {field}: {message}")]
    InvalidField { field: String, message: String },

    /// The file exceeded the size limit
    #[error("File too large. Maximum size is {limit} bytes")]
    TooLarge { limit: usize },

    /// The body is not valid multipart data or the body limit was hit
    #[error("Invalid multipart request: {message}")]
    Multipart { status: StatusCode, message: String },

    /// The upload could not be written
    #[error("Failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MultipartError> for UploadError {
    fn from(err: MultipartError) -> Self {
        UploadError::Multipart {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl From<MultipartRejection> for UploadError {
    fn from(rejection: MultipartRejection) -> Self {
        UploadError::Multipart {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

// =============================================================================
// Receiving
// =============================================================================

/// An upload written to the upload directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    /// Full path of the stored file
    pub path: PathBuf,

    /// Stored file name
    pub filename: String,

    /// File name as sent by the client
    pub client_name: String,

    /// MIME type as sent by the client
    pub content_type: String,

    /// Bytes written
    pub size: u64,
}

/// Build the stored name for a client file name.
///
/// The stem is sanitized so the name always derives a valid identifier, and
/// that identifier is always `<stem>-<millis>-<sequence>`. Extensions that
/// are not short and alphanumeric are dropped, together with any dots left in
/// the stem, so nothing after the sequence can be mistaken for an extension.
pub fn stored_file_name(client_name: &str, millis: i64, sequence: u64) -> String {
    let stem = Path::new(client_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = io::file_extension(client_name);

    let keep_extension = !extension.is_empty()
        && extension.len() <= MAX_EXTENSION_LEN
        && extension.chars().all(|c| c.is_ascii_alphanumeric());

    let stem = sanitize_file_stem(&stem);
    if keep_extension {
        format!("{}-{}-{}.{}", stem, millis, sequence, extension)
    } else {
        format!("{}-{}-{}", stem.replace('.', "_"), millis, sequence)
    }
}

/// An upload file that is deleted on drop unless [`PendingUpload::finish`]
/// hands it over.
///
/// Covers error returns and a request future dropped mid-stream.
#[derive(Debug, Default)]
struct PendingUpload {
    upload: Option<StoredUpload>,
}

impl PendingUpload {
    fn finish(mut self) -> Option<StoredUpload> {
        self.upload.take()
    }
}

impl Drop for PendingUpload {
    fn drop(&mut self) {
        let Some(upload) = self.upload.take() else {
            return;
        };
        match std::fs::remove_file(&upload.path) {
            Ok(()) => debug!(path = %upload.path.display(), "Removed rejected upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %upload.path.display(),
                error = %e,
                "Failed to remove rejected upload"
            ),
        }
    }
}

/// Read the multipart body, storing the file and collecting options.
///
/// A partially or fully written file is removed again on any error, or if
/// the returned future is dropped before it completes.
pub async fn receive_upload(
    mut multipart: Multipart,
    config: &UploadConfig,
) -> Result<(StoredUpload, GenerationOptions), UploadError> {
    let mut pending = PendingUpload::default();
    let options = read_fields(&mut multipart, config, &mut pending).await?;

    match pending.finish() {
        Some(upload) => Ok((upload, options)),
        None => Err(UploadError::MissingFile),
    }
}

async fn read_fields(
    multipart: &mut Multipart,
    config: &UploadConfig,
    pending: &mut PendingUpload,
) -> Result<GenerationOptions, UploadError> {
    let mut options = GenerationOptions::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            FILE_FIELD => {
                if pending.upload.is_some() {
                    return Err(UploadError::InvalidField {
                        field: FILE_FIELD.to_string(),
                        message: "only one file may be uploaded".to_string(),
                    });
                }
                store_file(field, config, pending).await?;
            }
            "tileSize" => options.tile_size = parse_number(&name, &field.text().await?)?,
            "overlap" => options.overlap = parse_number(&name, &field.text().await?)?,
            "quality" => options.quality = parse_number(&name, &field.text().await?)?,
            "format" => options.format = parse_format(&field.text().await?)?,
            _ => {}
        }
    }

    Ok(options)
}

async fn store_file(
    mut field: Field<'_>,
    config: &UploadConfig,
    pending: &mut PendingUpload,
) -> Result<(), UploadError> {
    let content_type = field.content_type().unwrap_or_default().to_string();
    if !config.is_allowed(&content_type) {
        return Err(UploadError::UnsupportedType {
            content_type,
            allowed: config.allowed_types.join(", "),
        });
    }

    let client_name = field.file_name().unwrap_or_default().to_string();
    let filename = stored_file_name(
        &client_name,
        Utc::now().timestamp_millis(),
        UPLOAD_SEQUENCE.fetch_add(1, Ordering::Relaxed),
    );
    let path = config.upload_dir.join(&filename);

    io::ensure_dir(&config.upload_dir).await?;
    let mut file = File::create(&path).await?;

    let upload = pending.upload.insert(StoredUpload {
        path,
        filename,
        client_name,
        content_type,
        size: 0,
    });

    while let Some(chunk) = field.chunk().await? {
        upload.size += chunk.len() as u64;
        if upload.size > config.max_file_size as u64 {
            return Err(UploadError::TooLarge {
                limit: config.max_file_size,
            });
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    Ok(())
}

/// Parse an optional numeric field. Empty means unset.
fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<Option<T>, UploadError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    value
        .parse()
        .map(Some)
        .map_err(|_| UploadError::InvalidField {
            field: field.to_string(),
            message: format!("{:?} is not a valid number", value),
        })
}

fn parse_format(value: &str) -> Result<Option<TileFormat>, UploadError> {
    if value.trim().is_empty() {
        return Ok(None);
    }

    value
        .parse()
        .map(Some)
        .map_err(|message| UploadError::InvalidField {
            field: "format".to_string(),
            message,
        })
}

// =============================================================================
// Handler
// =============================================================================

/// Response of a successful upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub data: ImageRecord,
}

/// Handle image uploads.
///
/// # Endpoint
///
/// `POST /api/images/upload`
///
/// # Response
///
/// - `201 Created`: `{"message": "...", "data": ImageRecord}`
/// - `400 Bad Request`: No file, disallowed type, bad option or identifier
/// - `413 Payload Too Large`: File over the size limit
/// - `422 Unprocessable Entity`: The file is not a readable image
/// - `500 Internal Server Error`: Pyramid generation or storage failure
///
/// Generation runs in its own task, so it completes even if the client
/// disconnects.
pub async fn upload_handler<B: ImagingBackend>(
    State(state): State<AppState<B>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let multipart = multipart.map_err(|e| state.error(UploadError::from(e)))?;

    let (upload, options) = receive_upload(multipart, &state.uploads)
        .await
        .map_err(|e| state.error(e))?;

    info!(
        filename = %upload.filename,
        client_name = %upload.client_name,
        content_type = %upload.content_type,
        size = upload.size,
        "Received upload"
    );

    let store = Arc::clone(&state.store);
    let record = tokio::spawn(async move {
        store
            .generate_tiles(&upload.path, &upload.filename, options)
            .await
    })
    .await
    .map_err(|e| {
        state.error(StoreError::TileGenerationFailed {
            message: e.to_string(),
        })
    })?
    .map_err(|e| state.error(e))?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: "Image uploaded and tiles generated successfully".to_string(),
            data: record,
        }),
    ))
}
