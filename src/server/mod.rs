//! HTTP server layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │      GET /api/images/{id}/tiles/{level}/{column}/{row}          │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │  handlers   │  │   upload    │  │        routes           │  │
//! │  │ (requests)  │  │ (multipart) │  │  (router config)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;
pub mod upload;
mod viewer;

pub use handlers::{
    delete_image_handler, dzi_descriptor_handler, dzi_json_handler, health_handler,
    index_handler, list_images_handler, metadata_handler, not_found_handler,
    parse_tile_coordinates, tile_handler, ApiError, AppState, ErrorResponse, HealthResponse,
    ImageListResponse, MessageResponse, NotFoundResponse,
};
pub use routes::{create_router, RouterConfig};
pub use upload::{
    receive_upload, stored_file_name, upload_handler, StoredUpload, UploadConfig, UploadError,
    UploadResponse,
};
