//! Deep Zoom pyramid writer backed by the `image` crate.
//!
//! # Design Decisions
//!
//! - **Progressive halving**: the full-resolution image is decoded once and
//!   each lower level is resampled from the level above it, not from the
//!   source. This keeps every resize at most a 2x reduction.
//!
//! - **Lossless PNG and WebP**: only JPEG honors the quality setting. The
//!   `image` crate's WebP encoder is lossless-only.
//!
//! - **Alpha**: JPEG tiles are flattened to RGB; PNG and WebP keep alpha.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use tracing::debug;

use crate::error::ImagingError;
use crate::tile::generate_dzi_xml;

use super::backend::{ImageInfo, ImagingBackend, PyramidParams, TileFormat};
use super::layout::{calculate_max_dzi_level, dzi_level_dimensions, dzi_tile_count, tile_span};

/// [`ImagingBackend`] that decodes, resamples and encodes with the `image`
/// crate.
#[derive(Debug, Clone, Default)]
pub struct ImageCrateBackend {
    filter: ResampleFilter,
}

/// Resampling filter used between pyramid levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ResampleFilter {
    Nearest,
    #[default]
    Triangle,
    Lanczos3,
}

impl From<ResampleFilter> for FilterType {
    fn from(filter: ResampleFilter) -> Self {
        match filter {
            ResampleFilter::Nearest => FilterType::Nearest,
            ResampleFilter::Triangle => FilterType::Triangle,
            ResampleFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl ImageCrateBackend {
    /// Create a backend with the default (triangle) filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different resampling filter.
    pub fn with_filter(mut self, filter: ResampleFilter) -> Self {
        self.filter = filter;
        self
    }
}

impl ImagingBackend for ImageCrateBackend {
    fn inspect(&self, path: &Path) -> Result<ImageInfo, ImagingError> {
        let size = fs::metadata(path)?.len();
        let reader = ImageReader::open(path)?.with_guessed_format()?;
        let format = reader.format().map(format_tag);
        let (width, height) = reader.into_dimensions()?;

        Ok(ImageInfo {
            width,
            height,
            format,
            size,
        })
    }

    fn build_pyramid(
        &self,
        source: &Path,
        output: &Path,
        params: &PyramidParams,
    ) -> Result<(), ImagingError> {
        let image = ImageReader::open(source)?.with_guessed_format()?.decode()?;
        let (width, height) = image.dimensions();
        let max_level = calculate_max_dzi_level(width, height);

        let files_dir = sibling_path(output, "_files")?;
        fs::create_dir_all(&files_dir)?;

        let mut current = image;
        for level in (0..=max_level).rev() {
            let (level_width, level_height) = dzi_level_dimensions(width, height, level, max_level);
            if current.dimensions() != (level_width, level_height) {
                current = current.resize_exact(level_width, level_height, self.filter.into());
            }

            let level_dir = files_dir.join(level.to_string());
            let written = write_level(&current, &level_dir, params)?;
            debug!(
                level = level,
                width = level_width,
                height = level_height,
                tiles = written,
                "Wrote pyramid level"
            );
        }

        let xml = generate_dzi_xml(
            width,
            height,
            params.tile_size,
            params.overlap,
            params.format.extension(),
        );
        fs::write(sibling_path(output, ".dzi")?, xml)?;

        Ok(())
    }
}

/// Slice one level into tiles. Returns the number of tiles written.
fn write_level(
    level: &DynamicImage,
    dir: &Path,
    params: &PyramidParams,
) -> Result<usize, ImagingError> {
    fs::create_dir_all(dir)?;

    let (level_width, level_height) = level.dimensions();
    let (cols, rows) = dzi_tile_count(level_width, level_height, params.tile_size);
    let extension = params.format.extension();

    for row in 0..rows {
        let (y, tile_height) = tile_span(row, rows, params.tile_size, params.overlap, level_height);
        for col in 0..cols {
            let (x, tile_width) =
                tile_span(col, cols, params.tile_size, params.overlap, level_width);

            let tile = level.crop_imm(x, y, tile_width, tile_height);
            let bytes = encode_tile(&tile, params.format, params.quality)?;
            fs::write(dir.join(format!("{}_{}.{}", col, row, extension)), bytes)?;
        }
    }

    Ok((cols * rows) as usize)
}

/// Encode a single tile in the requested format.
pub fn encode_tile(tile: &DynamicImage, format: TileFormat, quality: u8) -> Result<Vec<u8>, ImagingError> {
    let mut output = Vec::new();

    match format {
        TileFormat::Jpeg => {
            let rgb = tile.to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut output, quality);
            encoder.encode_image(&rgb)?;
        }
        TileFormat::Png => {
            tile.write_with_encoder(PngEncoder::new(&mut output))?;
        }
        TileFormat::Webp => {
            let rgba = DynamicImage::ImageRgba8(tile.to_rgba8());
            rgba.write_with_encoder(WebPEncoder::new_lossless(&mut output))?;
        }
    }

    Ok(output)
}

/// Append `suffix` to the final component of `base`: `a/image` -> `a/image_files`.
fn sibling_path(base: &Path, suffix: &str) -> Result<PathBuf, ImagingError> {
    let name = base.file_name().ok_or_else(|| {
        ImagingError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("output path has no file name: {}", base.display()),
        ))
    })?;

    let mut name = OsString::from(name);
    name.push(suffix);
    Ok(base.with_file_name(name))
}

/// Lowercase format tag recorded in image metadata.
fn format_tag(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpeg".to_string(),
        ImageFormat::Tiff => "tiff".to_string(),
        other => other
            .extensions_str()
            .first()
            .map(|ext| ext.to_string())
            .unwrap_or_else(|| "unknown".to_string()),
    }
}
