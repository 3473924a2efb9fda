//! Imaging capability.
//!
//! The tile store delegates all pixel work to an [`ImagingBackend`]:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               Tile Store                │
//! └────────────────────┬────────────────────┘
//!                      │ inspect / build_pyramid
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          ImagingBackend Trait           │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │           ImageCrateBackend             │
//! │   (decode → halve → crop → encode)      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Tests substitute a fake backend that records invocations and writes
//! placeholder files, so the store logic runs without a codec.

mod backend;
mod layout;
mod pyramid;

pub use backend::{
    is_valid_quality, ImageInfo, ImagingBackend, PyramidParams, TileContainer, TileFormat,
    DEFAULT_QUALITY, DEFAULT_TILE_OVERLAP, DEFAULT_TILE_SIZE, MAX_QUALITY, MIN_QUALITY,
};
pub use layout::{calculate_max_dzi_level, dzi_level_dimensions, dzi_tile_count, tile_span};
pub use pyramid::{encode_tile, ImageCrateBackend, ResampleFilter};
