//! Tile store layer.
//!
//! Owns the directory of generated pyramids and everything read back out of
//! it: tiles, descriptors and metadata records.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │               TileStore                 │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │   IdLocks    │  │  ImageRecord /  │  │
//! │  │  (per-id     │  │  DziDescriptor  │  │
//! │  │   mutex)     │  │                 │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │            ImagingBackend               │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileStore`]: generate, read, list and delete pyramids
//! - [`ImageRecord`]: metadata persisted beside each pyramid
//! - [`DziDescriptor`]: JSON form of the DZI descriptor
//! - [`GenerationOptions`] / [`TileDefaults`]: per-request and process-wide
//!   tiling parameters
//! - [`IdLocks`]: serializes mutations of one identifier
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use deepzoom_server::imaging::ImageCrateBackend;
//! use deepzoom_server::tile::{GenerationOptions, StoreConfig, TileStore};
//!
//! # async fn example() -> Result<(), deepzoom_server::StoreError> {
//! let store = TileStore::open(&StoreConfig::new("tiles"), ImageCrateBackend::new()).await?;
//!
//! let record = store
//!     .generate_tiles(
//!         Path::new("uploads/scan.png"),
//!         "scan.png",
//!         GenerationOptions::default(),
//!     )
//!     .await?;
//!
//! let tile = store.get_tile(&record.id, record.max_level, 0, 0).await;
//! # Ok(())
//! # }
//! ```

mod descriptor;
mod id;
mod locks;
mod record;
mod store;

pub use descriptor::{generate_dzi_xml, DziDescriptor, DziImage, DziSize, DZI_JSON_FORMAT, DZI_XMLNS};
pub use id::{
    derive_image_id, sanitize_file_stem, validate_image_id, MAX_IMAGE_ID_LEN, STAGING_DIR,
};
pub use locks::IdLocks;
pub use record::{
    compute_max_level, dzi_url, tiles_url, GenerationOptions, ImageRecord, TileDefaults,
};
pub use store::{
    StoreConfig, TileStore, DZI_FILE, METADATA_FILE, PYRAMID_BASENAME, TILES_SUBDIR,
    TILE_EXTENSIONS,
};
