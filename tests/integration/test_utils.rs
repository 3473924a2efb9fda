//! Test utilities for integration tests.
//!
//! Provides:
//! - `FakeImaging`: an imaging backend that records calls and writes a
//!   placeholder pyramid
//! - `TestServer`: a router over a temporary tiles root and upload directory
//! - Multipart body builder and response helpers

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use image::{ImageFormat, Rgb, RgbImage};
use tempfile::TempDir;
use tower::ServiceExt;

use deepzoom_server::imaging::{calculate_max_dzi_level, ImageInfo, ImagingBackend, PyramidParams};
use deepzoom_server::tile::{generate_dzi_xml, StoreConfig, TileStore, STAGING_DIR};
use deepzoom_server::{create_router, ImagingError, RouterConfig, UploadConfig};

// =============================================================================
// Fake Imaging Backend
// =============================================================================

/// One recorded `build_pyramid` call.
#[derive(Debug, Clone)]
pub struct BuildCall {
    pub source: PathBuf,
    pub output: PathBuf,
    pub params: PyramidParams,
}

/// Imaging backend that reports fixed dimensions and writes one placeholder
/// tile per level.
///
/// Calls are recorded in a shared log so tests can inspect them after the
/// backend has moved into the store.
#[derive(Clone)]
pub struct FakeImaging {
    width: u32,
    height: u32,
    fail_with: Option<String>,
    calls: Arc<Mutex<Vec<BuildCall>>>,
}

impl FakeImaging {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            fail_with: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make `build_pyramid` fail after writing part of the tree.
    pub fn failing(mut self, message: &str) -> Self {
        self.fail_with = Some(message.to_string());
        self
    }

    /// Shared handle to the call log.
    pub fn calls(&self) -> Arc<Mutex<Vec<BuildCall>>> {
        Arc::clone(&self.calls)
    }
}

impl ImagingBackend for FakeImaging {
    fn inspect(&self, path: &Path) -> Result<ImageInfo, ImagingError> {
        let size = std::fs::metadata(path)?.len();
        Ok(ImageInfo {
            width: self.width,
            height: self.height,
            format: Some("png".to_string()),
            size,
        })
    }

    fn build_pyramid(
        &self,
        source: &Path,
        output: &Path,
        params: &PyramidParams,
    ) -> Result<(), ImagingError> {
        self.calls.lock().unwrap().push(BuildCall {
            source: source.to_path_buf(),
            output: output.to_path_buf(),
            params: *params,
        });

        let dir = output.parent().expect("output has a parent");
        let files = dir.join("image_files");
        let extension = params.format.extension();

        for level in 0..=calculate_max_dzi_level(self.width, self.height) {
            let level_dir = files.join(level.to_string());
            std::fs::create_dir_all(&level_dir)?;
            std::fs::write(
                level_dir.join(format!("0_0.{}", extension)),
                format!("tile-{}", level),
            )?;

            if let Some(message) = &self.fail_with {
                return Err(ImagingError::Encode(message.clone()));
            }
        }

        std::fs::write(
            dir.join("image.dzi"),
            generate_dzi_xml(
                self.width,
                self.height,
                params.tile_size,
                params.overlap,
                extension,
            ),
        )?;

        Ok(())
    }
}

// =============================================================================
// Test Server
// =============================================================================

/// A router over fresh temporary directories.
pub struct TestServer {
    _tmp: TempDir,
    pub tiles_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub router: Router,
}

impl TestServer {
    pub async fn new<B: ImagingBackend>(backend: B) -> Self {
        Self::build(backend, RouterConfig::new().with_tracing(false), |uploads| uploads).await
    }

    pub async fn build<B, F>(backend: B, config: RouterConfig, uploads: F) -> Self
    where
        B: ImagingBackend,
        F: FnOnce(UploadConfig) -> UploadConfig,
    {
        let tmp = TempDir::new().unwrap();
        let tiles_dir = tmp.path().join("tiles");
        let upload_dir = tmp.path().join("uploads");

        let store = TileStore::open(&StoreConfig::new(&tiles_dir), backend)
            .await
            .unwrap();
        let router = create_router(store, uploads(UploadConfig::new(&upload_dir)), config);

        Self {
            _tmp: tmp,
            tiles_dir,
            upload_dir,
            router,
        }
    }

    /// Send a request through a clone of the router.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&self, uri: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// POST a multipart upload.
    pub async fn upload(&self, parts: &[Part]) -> Response<Body> {
        let (content_type, body) = multipart_body(parts);
        self.send(
            Request::builder()
                .method("POST")
                .uri("/api/images/upload")
                .header("content-type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    /// Files currently in the upload directory.
    pub fn uploaded_files(&self) -> Vec<String> {
        match std::fs::read_dir(&self.upload_dir) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Image directories currently under the tiles root.
    pub fn image_dirs(&self) -> Vec<String> {
        std::fs::read_dir(&self.tiles_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name != STAGING_DIR)
            .collect()
    }

    /// Entries left in the staging area.
    pub fn staging_entries(&self) -> Vec<String> {
        match std::fs::read_dir(self.tiles_dir.join(STAGING_DIR)) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Write a tile file directly into an image tree.
    pub fn write_tile(&self, id: &str, level: u32, name: &str, data: &[u8]) {
        let dir = self
            .tiles_dir
            .join(id)
            .join("image_files")
            .join(level.to_string());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), data).unwrap();
    }
}

// =============================================================================
// Multipart
// =============================================================================

pub const BOUNDARY: &str = "----deepzoom-test-boundary";

/// One multipart part.
pub enum Part {
    File {
        name: String,
        filename: String,
        content_type: String,
        data: Vec<u8>,
    },
    Text {
        name: String,
        value: String,
    },
}

impl Part {
    pub fn image(filename: &str, content_type: &str, data: Vec<u8>) -> Self {
        Part::File {
            name: "image".to_string(),
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            data,
        }
    }

    pub fn text(name: &str, value: &str) -> Self {
        Part::Text {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Encode parts as `multipart/form-data`. Returns (content type, body).
pub fn multipart_body(parts: &[Part]) -> (String, Vec<u8>) {
    let mut body = Vec::new();

    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File {
                name,
                filename,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: {}\r\n\r\n",
                        name, filename, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}",
                        name, value
                    )
                    .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

// =============================================================================
// Response Helpers
// =============================================================================

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

// =============================================================================
// Test Images
// =============================================================================

/// Encode a gradient image of the given size.
pub fn create_test_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });

    let mut data = std::io::Cursor::new(Vec::new());
    img.write_to(&mut data, format).unwrap();
    data.into_inner()
}

/// Check for JPEG SOI marker.
pub fn is_valid_jpeg(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0xFF && data[1] == 0xD8
}
