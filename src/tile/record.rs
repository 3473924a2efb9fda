//! Persisted image metadata and generation parameters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::imaging::{
    is_valid_quality, PyramidParams, TileContainer, TileFormat, DEFAULT_QUALITY,
    DEFAULT_TILE_OVERLAP, DEFAULT_TILE_SIZE,
};

// =============================================================================
// Image Record
// =============================================================================

/// Metadata for one generated pyramid.
///
/// Stored as pretty-printed JSON in `<tiles>/<id>/metadata.json` and never
/// modified after generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    /// Public identifier and directory name
    pub id: String,

    /// Stored name of the uploaded file
    pub filename: String,

    /// Basename of the source path
    pub original_name: String,

    /// Source width in pixels
    pub width: u32,

    /// Source height in pixels
    pub height: u32,

    /// Source format tag ("jpeg", "png", ..., or "unknown")
    pub format: String,

    /// Source size in bytes
    pub size: u64,

    /// Tile edge length in pixels
    pub tile_size: u32,

    /// Overlap between adjacent tiles in pixels
    pub overlap: u32,

    /// ceil(log2(max(width, height) / tile_size)), never negative
    pub max_level: u32,

    /// Relative URL of the XML descriptor
    pub dzi_url: String,

    /// Relative URL prefix for tiles
    pub tiles_url: String,

    /// Generation time
    pub uploaded_at: DateTime<Utc>,
}

/// Compute the zoom level count reported in [`ImageRecord::max_level`].
///
/// Images that fit inside a single tile report 0.
pub fn compute_max_level(width: u32, height: u32, tile_size: u32) -> u32 {
    let max_dim = width.max(height) as f64;
    let levels = (max_dim / tile_size as f64).log2().ceil();
    if levels.is_finite() && levels > 0.0 {
        levels as u32
    } else {
        0
    }
}

/// Relative URL of an image's XML descriptor.
pub fn dzi_url(id: &str) -> String {
    format!("/api/images/{}/dzi", id)
}

/// Relative URL prefix of an image's tiles.
pub fn tiles_url(id: &str) -> String {
    format!("/api/images/{}/tiles", id)
}

// =============================================================================
// Generation Options
// =============================================================================

/// Process-wide defaults applied when a request leaves an option unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileDefaults {
    pub tile_size: u32,
    pub overlap: u32,
    pub format: TileFormat,
    pub quality: u8,
}

impl Default for TileDefaults {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            overlap: DEFAULT_TILE_OVERLAP,
            format: TileFormat::Jpeg,
            quality: DEFAULT_QUALITY,
        }
    }
}

/// Per-request generation options. `None` means "use the default".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationOptions {
    pub tile_size: Option<u32>,
    pub overlap: Option<u32>,
    pub format: Option<TileFormat>,
    pub quality: Option<u8>,
}

impl GenerationOptions {
    /// Merge with `defaults` and validate the result.
    pub fn resolve(&self, defaults: &TileDefaults) -> Result<PyramidParams, StoreError> {
        let tile_size = self.tile_size.unwrap_or(defaults.tile_size);
        if tile_size == 0 {
            return Err(StoreError::InvalidOptions {
                message: "tileSize must be greater than 0".to_string(),
            });
        }

        let overlap = self.overlap.unwrap_or(defaults.overlap);
        if overlap >= tile_size {
            return Err(StoreError::InvalidOptions {
                message: format!(
                    "overlap must be less than tileSize ({}), got {}",
                    tile_size, overlap
                ),
            });
        }

        let quality = self.quality.unwrap_or(defaults.quality);
        if !is_valid_quality(quality) {
            return Err(StoreError::InvalidOptions {
                message: format!("quality must be between 1 and 100, got {}", quality),
            });
        }

        Ok(PyramidParams {
            tile_size,
            overlap,
            format: self.format.unwrap_or(defaults.format),
            quality,
            container: TileContainer::Fs,
        })
    }
}
