//! Configuration management for the Deep Zoom server.
//!
//! Every option can be given as a command-line flag or an environment
//! variable; flags win.
//!
//! # Example
//!
//! ```ignore
//! use deepzoom_server::config::Config;
//!
//! let config = Config::parse();
//! config.validate()?;
//!
//! println!("Listening on {}", config.bind_address());
//! println!("Tiles under {}", config.tiles_dir.display());
//! ```
//!
//! # Environment Variables
//!
//! - `HOST` - Server bind address (default: 0.0.0.0)
//! - `PORT` - Server port (default: 3000)
//! - `TILES_DIR` - Root of generated pyramids (default: tiles)
//! - `UPLOAD_DIR` - Where uploaded sources are kept (default: uploads)
//! - `TILE_SIZE` - Default tile edge length (default: 256)
//! - `TILE_OVERLAP` - Default tile overlap (default: 1)
//! - `TILE_FORMAT` - Default tile encoding: jpeg, png, webp (default: jpeg)
//! - `TILE_QUALITY` - Default JPEG quality (default: 80)
//! - `RESAMPLE_FILTER` - Downsampling filter: nearest, triangle, lanczos3 (default: triangle)
//! - `MAX_FILE_SIZE` - Upload size limit in bytes (default: 100MB)
//! - `ALLOWED_FORMATS` - Accepted upload MIME types, comma-separated
//! - `CORS_ORIGIN` - Allowed CORS origins, comma-separated (default: any)
//! - `PUBLIC_DIR` - Directory served under `/static` (default: none)
//! - `APP_ENV` - development or production (default: production)

use std::fmt;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::imaging::{
    is_valid_quality, ResampleFilter, TileFormat, DEFAULT_QUALITY, DEFAULT_TILE_OVERLAP, DEFAULT_TILE_SIZE,
};
use crate::tile::{StoreConfig, TileDefaults};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default tiles root.
pub const DEFAULT_TILES_DIR: &str = "tiles";

/// Default upload directory.
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Default upload size limit (100MB).
pub const DEFAULT_MAX_FILE_SIZE: usize = 100 * 1024 * 1024;

/// MIME types accepted for upload by default.
pub const DEFAULT_ALLOWED_FORMATS: [&str; 4] =
    ["image/jpeg", "image/png", "image/tiff", "image/webp"];

// =============================================================================
// Environment
// =============================================================================

/// Deployment environment.
///
/// Development mode adds a debug rendering of the error to JSON error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }

    pub fn name(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// Deep Zoom Server - turns uploaded images into DZI tile pyramids.
///
/// Accepts image uploads, generates Deep Zoom pyramids on local disk and
/// serves tiles and descriptors to OpenSeadragon-style viewers.
#[derive(Parser, Debug, Clone)]
#[command(name = "deepzoom-server")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PORT")]
    pub port: u16,

    /// Deployment environment.
    #[arg(long, value_enum, default_value_t = Environment::Production, env = "APP_ENV")]
    pub environment: Environment,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    /// Root directory for generated tile pyramids.
    #[arg(long, default_value = DEFAULT_TILES_DIR, env = "TILES_DIR")]
    pub tiles_dir: PathBuf,

    /// Directory where uploaded source images are stored.
    #[arg(long, default_value = DEFAULT_UPLOAD_DIR, env = "UPLOAD_DIR")]
    pub upload_dir: PathBuf,

    /// Directory served under /static (disabled if not set).
    #[arg(long, env = "PUBLIC_DIR")]
    pub public_dir: Option<PathBuf>,

    // =========================================================================
    // Tile Configuration
    // =========================================================================
    /// Default tile edge length in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "TILE_SIZE")]
    pub tile_size: u32,

    /// Default overlap between adjacent tiles in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_OVERLAP, env = "TILE_OVERLAP")]
    pub tile_overlap: u32,

    /// Default tile encoding.
    #[arg(long, value_enum, default_value_t = TileFormat::Jpeg, env = "TILE_FORMAT")]
    pub tile_format: TileFormat,

    /// Default JPEG quality for tile encoding (1-100).
    #[arg(long, default_value_t = DEFAULT_QUALITY, env = "TILE_QUALITY")]
    pub tile_quality: u8,

    /// Filter used to downsample between pyramid levels.
    #[arg(long, value_enum, default_value = "triangle", env = "RESAMPLE_FILTER")]
    pub resample_filter: ResampleFilter,

    // =========================================================================
    // Upload Configuration
    // =========================================================================
    /// Maximum upload size in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_FILE_SIZE, env = "MAX_FILE_SIZE")]
    pub max_file_size: usize,

    /// Accepted upload MIME types (comma-separated).
    #[arg(
        long,
        env = "ALLOWED_FORMATS",
        value_delimiter = ',',
        default_values = DEFAULT_ALLOWED_FORMATS
    )]
    pub allowed_formats: Vec<String>,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "CORS_ORIGIN", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.tile_size == 0 {
            return Err("tile_size must be greater than 0".to_string());
        }

        if self.tile_overlap >= self.tile_size {
            return Err("tile_overlap must be less than tile_size".to_string());
        }

        if !is_valid_quality(self.tile_quality) {
            return Err("tile_quality must be between 1 and 100".to_string());
        }

        if self.max_file_size == 0 {
            return Err("max_file_size must be greater than 0".to_string());
        }

        if self.allowed_formats.iter().all(|f| f.trim().is_empty()) {
            return Err(
                "At least one upload format is required. Set --allowed-formats or ALLOWED_FORMATS"
                    .to_string(),
            );
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Tile defaults applied to uploads that leave options unset.
    pub fn tile_defaults(&self) -> TileDefaults {
        TileDefaults {
            tile_size: self.tile_size,
            overlap: self.tile_overlap,
            format: self.tile_format,
            quality: self.tile_quality,
        }
    }

    /// Settings for [`crate::tile::TileStore::open`].
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(&self.tiles_dir).with_defaults(self.tile_defaults())
    }

    /// Allowed MIME types with whitespace and empty entries removed.
    pub fn allowed_mime_types(&self) -> Vec<String> {
        self.allowed_formats
            .iter()
            .map(|f| f.trim().to_ascii_lowercase())
            .filter(|f| !f.is_empty())
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
