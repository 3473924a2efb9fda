//! Tile Store: owns the on-disk artifact trees.
//!
//! # Layout
//!
//! ```text
//! <tiles>/
//! └── <id>/
//!     ├── metadata.json            ImageRecord, pretty-printed
//!     ├── image.dzi                XML descriptor
//!     └── image_files/
//!         └── <level>/
//!             └── <column>_<row>.<jpeg|jpg|png|webp>
//! ```
//!
//! The filesystem is the only source of truth. Nothing is cached between
//! calls; every read goes back to disk.
//!
//! Pyramids are built under `<tiles>/.staging/<id>/` and renamed into place
//! when complete, so readers never see a half-written or mixed tree.
//!
//! # Concurrency
//!
//! Generation and deletion take a per-identifier lock, so two uploads that
//! derive the same identifier, or a delete racing a generation, never
//! interleave. Reads do not lock.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{ImagingError, StoreError};
use crate::imaging::ImagingBackend;
use crate::io;

use super::descriptor::DziDescriptor;
use super::id::{derive_image_id, validate_image_id, STAGING_DIR};
use super::locks::IdLocks;
use super::record::{
    compute_max_level, dzi_url, tiles_url, GenerationOptions, ImageRecord, TileDefaults,
};

/// Metadata file name inside an image directory.
pub const METADATA_FILE: &str = "metadata.json";

/// Base name handed to the imaging backend (`image.dzi`, `image_files/`).
pub const PYRAMID_BASENAME: &str = "image";

/// XML descriptor file name inside an image directory.
pub const DZI_FILE: &str = "image.dzi";

/// Tile tree directory name inside an image directory.
pub const TILES_SUBDIR: &str = "image_files";

/// Tile extensions tried by [`TileStore::get_tile`], in order.
pub const TILE_EXTENSIONS: [&str; 4] = ["jpeg", "jpg", "png", "webp"];

// =============================================================================
// Configuration
// =============================================================================

/// Settings the store is constructed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Root directory holding one subdirectory per image
    pub tiles_dir: PathBuf,

    /// Defaults for options an upload leaves unset
    pub defaults: TileDefaults,
}

impl StoreConfig {
    /// Create a configuration with default tile settings.
    pub fn new(tiles_dir: impl Into<PathBuf>) -> Self {
        Self {
            tiles_dir: tiles_dir.into(),
            defaults: TileDefaults::default(),
        }
    }

    /// Replace the tile defaults.
    pub fn with_defaults(mut self, defaults: TileDefaults) -> Self {
        self.defaults = defaults;
        self
    }
}

// =============================================================================
// Cleanup Guard
// =============================================================================

/// Removes a staging directory unless disarmed.
///
/// Runs on every exit path of a generation, including early returns and a
/// dropped future.
struct CleanupGuard {
    path: PathBuf,
    armed: bool,
}

impl CleanupGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed partial tile output"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove partial tile output"
            ),
        }
    }
}

// =============================================================================
// Tile Store
// =============================================================================

/// Generates, serves and deletes Deep Zoom artifact trees.
///
/// # Type Parameters
///
/// * `B` - The imaging backend that inspects sources and writes pyramids
pub struct TileStore<B: ImagingBackend> {
    /// Root directory of all image trees
    root: PathBuf,

    /// Defaults for unset generation options
    defaults: TileDefaults,

    /// Pixel-level capability
    backend: Arc<B>,

    /// Serializes generate/delete per identifier
    locks: IdLocks,
}

impl<B: ImagingBackend> TileStore<B> {
    /// Open the store, creating the tiles root if it does not exist.
    pub async fn open(config: &StoreConfig, backend: B) -> Result<Self, StoreError> {
        io::ensure_dir(&config.tiles_dir).await?;
        debug!(root = %config.tiles_dir.display(), "Opened tile store");

        Ok(Self {
            root: config.tiles_dir.clone(),
            defaults: config.defaults,
            backend: Arc::new(backend),
            locks: IdLocks::new(),
        })
    }

    /// Root directory of all image trees.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Defaults applied to unset generation options.
    pub fn defaults(&self) -> &TileDefaults {
        &self.defaults
    }

    /// The imaging backend.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    fn image_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    fn staging_dir(&self, id: &str) -> PathBuf {
        self.root.join(STAGING_DIR).join(id)
    }

    // -------------------------------------------------------------------------
    // Generation
    // -------------------------------------------------------------------------

    /// Generate a pyramid for `source` and persist its metadata.
    ///
    /// The identifier is derived from `filename`. The pyramid and its metadata
    /// are built in a staging directory and only moved to `<tiles>/<id>` once
    /// complete, replacing any previous tree for the same identifier. On
    /// failure the staging directory is removed and an existing tree is left
    /// exactly as it was.
    ///
    /// # Errors
    ///
    /// - `InvalidImageId` if `filename` does not derive a safe identifier
    /// - `InvalidOptions` if an option is out of range
    /// - `UnreadableImage` if the source dimensions cannot be read
    /// - `TileGenerationFailed` if the backend fails to write the pyramid
    /// - `Io` for storage errors
    pub async fn generate_tiles(
        &self,
        source: &Path,
        filename: &str,
        options: GenerationOptions,
    ) -> Result<ImageRecord, StoreError> {
        let id = derive_image_id(filename)?;
        let params = options.resolve(&self.defaults)?;

        let _lock = self.locks.acquire(&id).await;

        let staging_dir = self.staging_dir(&id);
        io::delete_directory(&staging_dir).await?;
        io::ensure_dir(&staging_dir).await?;
        let mut cleanup = CleanupGuard::new(staging_dir.clone());

        let src = source.to_path_buf();
        let image_info = self
            .run_backend(move |backend| backend.inspect(&src))
            .await
            .map_err(|message| StoreError::UnreadableImage { message })?;

        if image_info.width == 0 || image_info.height == 0 {
            return Err(StoreError::UnreadableImage {
                message: format!(
                    "source reports {}x{} pixels",
                    image_info.width, image_info.height
                ),
            });
        }

        let src = source.to_path_buf();
        let output = staging_dir.join(PYRAMID_BASENAME);
        self.run_backend(move |backend| backend.build_pyramid(&src, &output, &params))
            .await
            .map_err(|message| StoreError::TileGenerationFailed { message })?;

        let record = ImageRecord {
            id: id.clone(),
            filename: filename.to_string(),
            original_name: source
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            width: image_info.width,
            height: image_info.height,
            format: image_info
                .format
                .unwrap_or_else(|| "unknown".to_string()),
            size: image_info.size,
            tile_size: params.tile_size,
            overlap: params.overlap,
            max_level: compute_max_level(image_info.width, image_info.height, params.tile_size),
            dzi_url: dzi_url(&id),
            tiles_url: tiles_url(&id),
            uploaded_at: Utc::now(),
        };

        let json = serde_json::to_string_pretty(&record).map_err(|e| {
            StoreError::TileGenerationFailed {
                message: e.to_string(),
            }
        })?;
        fs::write(staging_dir.join(METADATA_FILE), json).await?;

        self.publish(&id, &staging_dir).await?;
        cleanup.disarm();

        info!(
            image_id = %record.id,
            width = record.width,
            height = record.height,
            tile_size = record.tile_size,
            overlap = record.overlap,
            format = %params.format,
            "Generated tile pyramid"
        );

        Ok(record)
    }

    /// Move a finished staging tree to `<tiles>/<id>`.
    ///
    /// A previous tree is first moved aside and only deleted once the new one
    /// is in place; if the swap fails it is moved back.
    async fn publish(&self, id: &str, staging_dir: &Path) -> Result<(), StoreError> {
        let target = self.image_dir(id);
        // `~` is not an identifier character, so this never names a build
        let retired = self.root.join(STAGING_DIR).join(format!("{}~retired", id));

        let replacing = fs::try_exists(&target).await?;
        if replacing {
            io::delete_directory(&retired).await?;
            fs::rename(&target, &retired).await?;
        }

        if let Err(e) = fs::rename(staging_dir, &target).await {
            if replacing {
                if let Err(restore) = fs::rename(&retired, &target).await {
                    warn!(
                        image_id = %id,
                        error = %restore,
                        "Failed to restore previous tile tree"
                    );
                }
            }
            return Err(e.into());
        }

        if replacing {
            debug!(image_id = %id, "Replaced existing tile tree");
            if let Err(e) = io::delete_directory(&retired).await {
                warn!(image_id = %id, error = %e, "Failed to remove replaced tile tree");
            }
        }

        Ok(())
    }

    /// Run a blocking backend call on the blocking pool.
    ///
    /// Failures, including a panicked task, are flattened to their message.
    async fn run_backend<T, F>(&self, f: F) -> Result<T, String>
    where
        F: FnOnce(&B) -> Result<T, ImagingError> + Send + 'static,
        T: Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        match tokio::task::spawn_blocking(move || f(&backend)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(e.to_string()),
            Err(join_err) => Err(format!("imaging task failed: {}", join_err)),
        }
    }

    // -------------------------------------------------------------------------
    // Retrieval
    // -------------------------------------------------------------------------

    /// Read a tile, trying each of [`TILE_EXTENSIONS`] in order.
    ///
    /// Coordinates are not checked against the pyramid; anything without a
    /// file is `TileNotFound`.
    pub async fn get_tile(
        &self,
        id: &str,
        level: u32,
        column: u32,
        row: u32,
    ) -> Result<Bytes, StoreError> {
        validate_image_id(id)?;

        let level_dir = self
            .image_dir(id)
            .join(TILES_SUBDIR)
            .join(level.to_string());

        for ext in TILE_EXTENSIONS {
            let path = level_dir.join(format!("{}_{}.{}", column, row, ext));
            match fs::read(&path).await {
                Ok(data) => return Ok(Bytes::from(data)),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::TileNotFound {
            id: id.to_string(),
            level,
            column,
            row,
        })
    }

    /// Read the stored XML descriptor verbatim.
    pub async fn get_dzi_descriptor(&self, id: &str) -> Result<String, StoreError> {
        validate_image_id(id)?;

        match fs::read_to_string(self.image_dir(id).join(DZI_FILE)).await {
            Ok(xml) => Ok(xml),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::DescriptorNotFound {
                id: id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Build the JSON descriptor from the metadata record.
    pub async fn get_dzi_json(&self, id: &str) -> Result<DziDescriptor, StoreError> {
        let record = self.get_metadata(id).await?;
        Ok(DziDescriptor::from_record(&record))
    }

    /// Read and decode an image's metadata record.
    pub async fn get_metadata(&self, id: &str) -> Result<ImageRecord, StoreError> {
        validate_image_id(id)?;

        let data = match fs::read_to_string(self.image_dir(id).join(METADATA_FILE)).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::MetadataNotFound { id: id.to_string() })
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&data).map_err(|e| StoreError::MetadataCorrupt {
            id: id.to_string(),
            message: e.to_string(),
        })
    }

    /// List every image with a readable metadata record.
    ///
    /// Directories whose metadata is missing or corrupt are logged and
    /// skipped. Order follows directory enumeration.
    pub async fn list_images(&self) -> Result<Vec<ImageRecord>, StoreError> {
        let mut images = Vec::new();

        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(images),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }

            let name = entry.file_name();
            if name == STAGING_DIR {
                continue;
            }
            let Some(id) = name.to_str() else {
                warn!(name = ?name, "Skipping directory with non UTF-8 name");
                continue;
            };

            match self.get_metadata(id).await {
                Ok(record) => images.push(record),
                Err(e) => warn!(image_id = %id, error = %e, "No metadata for image, skipping"),
            }
        }

        Ok(images)
    }

    // -------------------------------------------------------------------------
    // Deletion
    // -------------------------------------------------------------------------

    /// Remove an image's whole artifact tree.
    pub async fn delete_image(&self, id: &str) -> Result<(), StoreError> {
        validate_image_id(id)?;

        let _lock = self.locks.acquire(id).await;

        let dir = self.image_dir(id);
        if !fs::try_exists(&dir).await? {
            return Err(StoreError::ImageNotFound { id: id.to_string() });
        }

        io::delete_directory(&dir).await?;
        info!(image_id = %id, "Deleted image");

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
