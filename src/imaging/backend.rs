//! Imaging capability interface.
//!
//! The tile store never touches pixels. It asks an [`ImagingBackend`] for the
//! dimensions of a source image and to write a Deep Zoom pyramid for it, and
//! keeps everything else (layout, metadata, descriptors) to itself.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ImagingError;

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Default overlap between adjacent tiles in pixels.
pub const DEFAULT_TILE_OVERLAP: u32 = 1;

/// Default encoding quality (1-100).
pub const DEFAULT_QUALITY: u8 = 80;

/// Minimum allowed encoding quality.
pub const MIN_QUALITY: u8 = 1;

/// Maximum allowed encoding quality.
pub const MAX_QUALITY: u8 = 100;

/// Check if a quality value is within the valid range.
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_QUALITY..=MAX_QUALITY).contains(&quality)
}

// =============================================================================
// Tile Format
// =============================================================================

/// Output encoding for generated tiles.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum TileFormat {
    #[default]
    Jpeg,
    Png,
    Webp,
}

impl TileFormat {
    /// File extension written for tiles of this format.
    pub fn extension(&self) -> &'static str {
        match self {
            TileFormat::Jpeg => "jpeg",
            TileFormat::Png => "png",
            TileFormat::Webp => "webp",
        }
    }

    /// Get a human-readable name for the format.
    pub fn name(&self) -> &'static str {
        self.extension()
    }
}

impl fmt::Display for TileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TileFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(TileFormat::Jpeg),
            "png" => Ok(TileFormat::Png),
            "webp" => Ok(TileFormat::Webp),
            other => Err(format!(
                "unsupported tile format '{}' (expected jpeg, png or webp)",
                other
            )),
        }
    }
}

// =============================================================================
// Backend Contract
// =============================================================================

/// How the pyramid is laid out on storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileContainer {
    /// `<base>.dzi` next to a `<base>_files/<level>/<col>_<row>.<ext>` tree
    #[default]
    Fs,
}

/// Basic facts about a source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    /// Width in pixels (0 when unknown)
    pub width: u32,

    /// Height in pixels (0 when unknown)
    pub height: u32,

    /// Container format tag such as "jpeg" or "png"
    pub format: Option<String>,

    /// Size of the source file in bytes
    pub size: u64,
}

/// Fully resolved pyramid generation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PyramidParams {
    /// Tile edge length in pixels
    pub tile_size: u32,

    /// Overlap between adjacent tiles in pixels
    pub overlap: u32,

    /// Tile encoding
    pub format: TileFormat,

    /// Encoding quality (1-100)
    pub quality: u8,

    /// Storage layout
    pub container: TileContainer,
}

impl Default for PyramidParams {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            overlap: DEFAULT_TILE_OVERLAP,
            format: TileFormat::Jpeg,
            quality: DEFAULT_QUALITY,
            container: TileContainer::Fs,
        }
    }
}

/// Pixel-level capability used by the tile store.
///
/// Both methods are blocking and may be CPU-bound for seconds on large
/// images; the store calls them from the blocking thread pool.
pub trait ImagingBackend: Send + Sync + 'static {
    /// Read dimensions and format of the image at `path`.
    fn inspect(&self, path: &Path) -> Result<ImageInfo, ImagingError>;

    /// Write a Deep Zoom pyramid for `source`.
    ///
    /// `output` is the base path without extension: the descriptor goes to
    /// `<output>.dzi` and tiles to `<output>_files/`.
    fn build_pyramid(
        &self,
        source: &Path,
        output: &Path,
        params: &PyramidParams,
    ) -> Result<(), ImagingError>;
}
