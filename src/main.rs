//! Deep Zoom Server - turns uploaded images into DZI tile pyramids.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deepzoom_server::{
    config::Config,
    imaging::ImageCrateBackend,
    io,
    server::{create_router, RouterConfig, UploadConfig},
    tile::TileStore,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // Initialize logging
    init_logging(config.verbose);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    print_banner();

    info!("Configuration:");
    info!("  Environment: {}", config.environment);
    info!("  Tiles dir: {}", config.tiles_dir.display());
    info!("  Upload dir: {}", config.upload_dir.display());
    info!(
        "  Tile defaults: {}px, overlap {}, {}, quality {}",
        config.tile_size, config.tile_overlap, config.tile_format, config.tile_quality
    );
    info!("  Resample filter: {:?}", config.resample_filter);
    info!(
        "  Uploads: max {}MB, types {}",
        config.max_file_size / (1024 * 1024),
        config.allowed_mime_types().join(", ")
    );
    match &config.public_dir {
        Some(dir) => info!("  Static files: {}", dir.display()),
        None => info!("  Static files: disabled"),
    }
    if config.environment.is_development() {
        warn!("  Development mode: error responses include debug details");
    }

    // Storage roots
    if let Err(e) = io::ensure_dir(&config.upload_dir).await {
        error!(
            "Failed to create upload directory {}: {}",
            config.upload_dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let backend = ImageCrateBackend::new().with_filter(config.resample_filter);
    let store = match TileStore::open(&config.store_config(), backend).await {
        Ok(store) => store,
        Err(e) => {
            error!(
                "Failed to open tile store at {}: {}",
                config.tiles_dir.display(),
                e
            );
            return ExitCode::FAILURE;
        }
    };

    match store.list_images().await {
        Ok(images) => info!("  Found {} existing image(s)", images.len()),
        Err(e) => warn!("  Could not list existing images: {}", e),
    }

    let uploads = UploadConfig::new(&config.upload_dir)
        .with_allowed_types(config.allowed_mime_types())
        .with_max_file_size(config.max_file_size);

    let router = create_router(store, uploads, build_router_config(&config));

    // Bind and serve
    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Open the upload page:");
    info!("    open http://{}/", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}/api/images", addr);
    info!(
        "    curl -F image=@photo.jpg http://{}/api/images/upload",
        addr
    );
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Print the startup banner.
fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");

    info!("");
    info!("╔══════════════════════════════════════════════╗");
    info!("║            Deep Zoom Tile Server             ║");
    info!("╚══════════════════════════════════════════════╝");
    info!("                   v{}", version);
    info!("");
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "deepzoom_server=debug,tower_http=debug"
    } else {
        "deepzoom_server=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_environment(config.environment)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    if let Some(ref dir) = config.public_dir {
        router_config = router_config.with_public_dir(dir);
    }

    router_config
}
