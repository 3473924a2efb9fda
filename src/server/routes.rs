//! Router configuration for the Deep Zoom server.
//!
//! This module defines the HTTP routes and applies middleware for CORS,
//! compression, body limits and tracing.
//!
//! # Route Structure
//!
//! ```text
//! /                                                  - Upload page and viewer
//! /health                                            - Health check
//! /api/images                                        - List images
//! /api/images/upload                                 - Upload (POST)
//! /api/images/{id}                                   - Delete (DELETE)
//! /api/images/{id}/metadata                          - Metadata record
//! /api/images/{id}/dzi                               - XML descriptor
//! /api/images/{id}/dzi.json                          - JSON descriptor
//! /api/images/{id}/tiles/{level}/{column}/{row}      - Tile
//! /static/*                                          - Public directory (optional)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use deepzoom_server::imaging::ImageCrateBackend;
//! use deepzoom_server::server::{create_router, RouterConfig, UploadConfig};
//! use deepzoom_server::tile::{StoreConfig, TileStore};
//!
//! let store = TileStore::open(&StoreConfig::new("tiles"), ImageCrateBackend::new()).await?;
//!
//! let config = RouterConfig::new()
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(store, UploadConfig::new("uploads"), config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::path::PathBuf;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::handlers::{
    delete_image_handler, dzi_descriptor_handler, dzi_json_handler, health_handler,
    index_handler, list_images_handler, metadata_handler, not_found_handler, tile_handler,
    AppState,
};
use super::upload::{upload_handler, UploadConfig};
use crate::config::Environment;
use crate::imaging::ImagingBackend;
use crate::tile::TileStore;

/// Room for multipart boundaries and text fields on top of the file limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds for tiles and descriptors
    pub cache_max_age: u32,

    /// Whether to enable request tracing
    pub enable_tracing: bool,

    /// Directory served under `/static`
    pub public_dir: Option<PathBuf>,

    /// Deployment environment
    pub environment: Environment,
}

impl RouterConfig {
    /// Create a new router configuration.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Cache max-age is 1 hour (3600 seconds)
    /// - Tracing is enabled
    /// - No static directory
    /// - Production mode
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            cache_max_age: 3600,
            enable_tracing: true,
            public_dir: None,
            environment: Environment::Production,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    /// Serve `dir` under `/static`.
    pub fn with_public_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.public_dir = Some(dir.into());
        self
    }

    /// Set the deployment environment.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// # Arguments
///
/// * `store` - The tile store backing every image route
/// * `uploads` - Upload directory and acceptance rules
/// * `config` - Router configuration
pub fn create_router<B>(store: TileStore<B>, uploads: UploadConfig, config: RouterConfig) -> Router
where
    B: ImagingBackend,
{
    let body_limit = uploads.max_file_size.saturating_add(MULTIPART_OVERHEAD);

    let app_state = AppState::new(store, uploads)
        .with_environment(config.environment)
        .with_cache_max_age(config.cache_max_age);

    let upload_routes = Router::new()
        .route("/api/images/upload", post(upload_handler::<B>))
        .layer(DefaultBodyLimit::max(body_limit));

    let mut router = Router::new()
        .route("/", get(index_handler::<B>))
        .route("/health", get(health_handler::<B>))
        .route("/api/images", get(list_images_handler::<B>))
        .route("/api/images/{id}", delete(delete_image_handler::<B>))
        .route("/api/images/{id}/metadata", get(metadata_handler::<B>))
        .route("/api/images/{id}/dzi", get(dzi_descriptor_handler::<B>))
        .route("/api/images/{id}/dzi.json", get(dzi_json_handler::<B>))
        .route(
            "/api/images/{id}/tiles/{level}/{column}/{row}",
            get(tile_handler::<B>),
        )
        .merge(upload_routes);

    if let Some(dir) = &config.public_dir {
        router = router.nest_service("/static", ServeDir::new(dir));
    }

    let router = router
        .fallback(not_found_handler)
        .with_state(app_state)
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&config));

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) if origins.iter().any(|o| o.trim() == "*") => cors.allow_origin(Any),
        Some(origins) => {
            let parsed_origins: Vec<_> = origins
                .iter()
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
