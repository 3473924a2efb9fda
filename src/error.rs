use thiserror::Error;

/// Errors raised by the imaging backend while inspecting a source image or
/// writing its pyramid.
#[derive(Debug, Error)]
pub enum ImagingError {
    /// Filesystem error while reading the source or writing tiles
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Source image could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// A tile or descriptor could not be encoded
    #[error("Encode error: {0}")]
    Encode(String),
}

impl From<image::ImageError> for ImagingError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(io) => ImagingError::Io(io),
            image::ImageError::Encoding(e) => ImagingError::Encode(e.to_string()),
            other => ImagingError::Decode(other.to_string()),
        }
    }
}

/// Errors that can occur in the tile store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Identifier is not a safe path segment
    #[error("Invalid image id: {id:?}")]
    InvalidImageId { id: String },

    /// Generation options outside their valid range
    #[error("Invalid tile options: {message}")]
    InvalidOptions { message: String },

    /// Source dimensions could not be read
    #[error("Unable to read image dimensions: {message}")]
    UnreadableImage { message: String },

    /// The imaging backend failed while building the pyramid
    #[error("Failed to generate tiles: {message}")]
    TileGenerationFailed { message: String },

    /// No tile exists at the coordinate in any supported encoding
    #[error("Tile not found: {id} level {level} ({column}, {row})")]
    TileNotFound {
        id: String,
        level: u32,
        column: u32,
        row: u32,
    },

    /// The image has no DZI XML descriptor
    #[error("DZI descriptor not found: {id}")]
    DescriptorNotFound { id: String },

    /// The image has no metadata record
    #[error("Metadata not found: {id}")]
    MetadataNotFound { id: String },

    /// The metadata record exists but cannot be decoded
    #[error("Metadata for {id} is corrupt: {message}")]
    MetadataCorrupt { id: String, message: String },

    /// The image directory does not exist
    #[error("Image not found: {id}")]
    ImageNotFound { id: String },

    /// Underlying storage error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether the error means the requested artifact does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::TileNotFound { .. }
                | StoreError::DescriptorNotFound { .. }
                | StoreError::MetadataNotFound { .. }
                | StoreError::ImageNotFound { .. }
        )
    }
}
