//! Deep Zoom pyramid geometry.
//!
//! Deep Zoom numbers levels from the bottom up:
//! - level 0 is a 1x1 pixel image
//! - the max level is the full-resolution image
//!
//! Each level halves the one above it, rounding up.

/// Calculate the maximum DZI level for given image dimensions.
///
/// max_level = ceil(log2(max(width, height)))
pub fn calculate_max_dzi_level(width: u32, height: u32) -> u32 {
    let max_dim = width.max(height);
    if max_dim <= 1 {
        return 0;
    }
    // Bit length of (max_dim - 1) is exactly ceil(log2(max_dim))
    32 - (max_dim - 1).leading_zeros()
}

/// Calculate dimensions at a specific DZI level.
///
/// At DZI level L, the dimensions are:
/// - width = ceil(original_width / 2^(max_level - L))
/// - height = ceil(original_height / 2^(max_level - L))
pub fn dzi_level_dimensions(width: u32, height: u32, dzi_level: u32, max_dzi_level: u32) -> (u32, u32) {
    if dzi_level > max_dzi_level {
        return (0, 0);
    }

    let shift = max_dzi_level - dzi_level;
    let scale = 1u64 << shift;
    let level_width = (width as u64).div_ceil(scale) as u32;
    let level_height = (height as u64).div_ceil(scale) as u32;

    (level_width.max(1), level_height.max(1))
}

/// Calculate tile count at a DZI level.
pub fn dzi_tile_count(level_width: u32, level_height: u32, tile_size: u32) -> (u32, u32) {
    let tiles_x = level_width.div_ceil(tile_size);
    let tiles_y = level_height.div_ceil(tile_size);
    (tiles_x.max(1), tiles_y.max(1))
}

/// Pixel span of one tile along a single axis: `(offset, length)`.
///
/// Interior edges grow by `overlap` pixels on each side; the span is
/// clipped to the level extent.
pub fn tile_span(index: u32, count: u32, tile_size: u32, overlap: u32, extent: u32) -> (u32, u32) {
    let leading = if index > 0 { overlap } else { 0 };
    let trailing = if index + 1 < count { overlap } else { 0 };

    let start = (index * tile_size).saturating_sub(leading);
    let end = ((index + 1) * tile_size + trailing).min(extent);

    (start, end.saturating_sub(start))
}
