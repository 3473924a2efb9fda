//! # Deep Zoom Server
//!
//! An HTTP tile server that turns uploaded images into Deep Zoom (DZI)
//! pyramids on local disk and serves tiles and descriptors to web viewers
//! such as OpenSeadragon.
//!
//! ## Features
//!
//! - **Upload and tile**: multipart upload, pyramid generation on the blocking pool
//! - **Two descriptor formats**: the stored DZI XML and a JSON rendering
//! - **Format fallback**: tiles are found whether stored as jpeg, jpg, png or webp
//! - **Pluggable imaging**: pixel work sits behind [`imaging::ImagingBackend`]
//! - **Built-in web viewer**: upload page with an OpenSeadragon viewer
//!
//! ## Architecture
//!
//! - [`io`] - Filesystem helpers
//! - [`imaging`] - Imaging backend trait and the `image` crate implementation
//! - [`tile`] - Tile store, identifiers, metadata and descriptors
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use deepzoom_server::{create_router, ImageCrateBackend, RouterConfig, StoreConfig, TileStore, UploadConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = TileStore::open(&StoreConfig::new("tiles"), ImageCrateBackend::new()).await?;
//!     let router = create_router(store, UploadConfig::new("uploads"), RouterConfig::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod imaging;
pub mod io;
pub mod server;
pub mod tile;

// Re-export commonly used types
pub use config::{Config, Environment};
pub use error::{ImagingError, StoreError};
pub use imaging::{
    ImageCrateBackend, ImageInfo, ImagingBackend, PyramidParams, TileContainer, TileFormat,
};
pub use server::{
    create_router, ApiError, AppState, ErrorResponse, HealthResponse, RouterConfig, UploadConfig,
    UploadError,
};
pub use tile::{
    compute_max_level, derive_image_id, validate_image_id, DziDescriptor, GenerationOptions,
    ImageRecord, StoreConfig, TileDefaults, TileStore,
};
