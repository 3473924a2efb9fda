//! Upload integration tests.
//!
//! Tests verify:
//! - Field validation and the rejection paths
//! - Option pass-through to the imaging backend
//! - No partial image directory survives a failed generation

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bytes::Bytes;
use http_body::Frame;
use image::ImageFormat;
use tower::ServiceExt;

use deepzoom_server::tile::STAGING_DIR;
use deepzoom_server::{RouterConfig, TileFormat};

use super::test_utils::{
    body_json, create_test_image, FakeImaging, Part, TestServer, BOUNDARY,
};

fn png_part(filename: &str) -> Part {
    Part::image(filename, "image/png", create_test_image(4, 4, ImageFormat::Png))
}

// =============================================================================
// Rejections
// =============================================================================

#[tokio::test]
async fn test_upload_without_file() {
    let server = TestServer::new(FakeImaging::new(100, 100)).await;

    let response = server.upload(&[Part::text("tileSize", "256")]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No file uploaded");
    assert!(server.image_dirs().is_empty());
}

#[tokio::test]
async fn test_upload_disallowed_type() {
    let server = TestServer::new(FakeImaging::new(100, 100)).await;

    let response = server
        .upload(&[Part::image("anim.gif", "image/gif", vec![0x47, 0x49, 0x46])])
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("Invalid file type. Allowed: "));
    assert!(error.contains("image/png"));

    assert!(server.uploaded_files().is_empty());
    assert!(server.image_dirs().is_empty());
}

#[tokio::test]
async fn test_upload_custom_allowed_types() {
    let server = TestServer::build(
        FakeImaging::new(100, 100),
        RouterConfig::new().with_tracing(false),
        |uploads| uploads.with_allowed_types(vec!["image/tiff".to_string()]),
    )
    .await;

    let response = server.upload(&[png_part("a.png")]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = server
        .upload(&[Part::image("a.tif", "image/tiff", vec![1, 2, 3, 4])])
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_upload_too_large() {
    let server = TestServer::build(
        FakeImaging::new(100, 100),
        RouterConfig::new().with_tracing(false),
        |uploads| uploads.with_max_file_size(1024),
    )
    .await;

    let response = server
        .upload(&[Part::image("big.png", "image/png", vec![0u8; 4096])])
        .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    assert!(server.uploaded_files().is_empty());
    assert!(server.image_dirs().is_empty());
}

#[tokio::test]
async fn test_upload_invalid_number_field() {
    let server = TestServer::new(FakeImaging::new(100, 100)).await;

    let response = server
        .upload(&[png_part("a.png"), Part::text("tileSize", "big")])
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("tileSize"));
    assert!(server.uploaded_files().is_empty());
}

#[tokio::test]
async fn test_upload_invalid_format_field() {
    let server = TestServer::new(FakeImaging::new(100, 100)).await;

    let response = server
        .upload(&[png_part("a.png"), Part::text("format", "bmp")])
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_zero_tile_size() {
    let imaging = FakeImaging::new(100, 100);
    let calls = imaging.calls();
    let server = TestServer::new(imaging).await;

    let response = server
        .upload(&[png_part("a.png"), Part::text("tileSize", "0")])
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid tile options"));

    assert!(calls.lock().unwrap().is_empty());
    assert!(server.image_dirs().is_empty());
}

#[tokio::test]
async fn test_upload_overlap_not_below_tile_size() {
    let imaging = FakeImaging::new(100, 100);
    let calls = imaging.calls();
    let server = TestServer::new(imaging).await;

    let response = server
        .upload(&[png_part("a.png"), Part::text("overlap", "4294967295")])
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"]
        .as_str()
        .unwrap()
        .contains("overlap"));

    assert!(calls.lock().unwrap().is_empty());
    assert!(server.image_dirs().is_empty());
}

#[tokio::test]
async fn test_upload_two_files_rejected() {
    let server = TestServer::new(FakeImaging::new(100, 100)).await;

    let response = server.upload(&[png_part("a.png"), png_part("b.png")]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(server.uploaded_files().is_empty());
}

#[tokio::test]
async fn test_upload_not_multipart() {
    let server = TestServer::new(FakeImaging::new(100, 100)).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/images/upload")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"image": "nope"}"#))
        .unwrap();
    let response = server.send(request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());
}

/// Request body that sends its head and then never completes.
struct StalledBody {
    head: Option<Bytes>,
}

impl http_body::Body for StalledBody {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Self::Error>>> {
        match self.head.take() {
            Some(head) => Poll::Ready(Some(Ok(Frame::data(head)))),
            None => Poll::Pending,
        }
    }
}

#[tokio::test]
async fn test_upload_dropped_mid_stream_removes_file() {
    let server = TestServer::new(FakeImaging::new(100, 100)).await;

    let mut head = format!(
        "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"slow.png\"\r\n\
         Content-Type: image/png\r\n\r\n",
        BOUNDARY
    )
    .into_bytes();
    head.extend_from_slice(&[7u8; 4096]);

    let request = Request::builder()
        .method("POST")
        .uri("/api/images/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::new(StalledBody {
            head: Some(Bytes::from(head)),
        }))
        .unwrap();

    let router = server.router.clone();
    let task = tokio::spawn(async move { router.oneshot(request).await });

    for _ in 0..200 {
        if !server.uploaded_files().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(server.uploaded_files().len(), 1);

    // Client goes away
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    assert!(server.uploaded_files().is_empty());
    assert!(server.image_dirs().is_empty());
}

// =============================================================================
// Generation Failures
// =============================================================================

#[tokio::test]
async fn test_upload_zero_dimensions() {
    let imaging = FakeImaging::new(0, 0);
    let calls = imaging.calls();
    let server = TestServer::new(imaging).await;

    let response = server.upload(&[png_part("empty.png")]).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_json(response).await["error"]
        .as_str()
        .unwrap()
        .starts_with("Unable to read image dimensions"));

    assert!(calls.lock().unwrap().is_empty());
    assert!(server.image_dirs().is_empty());
}

#[tokio::test]
async fn test_upload_backend_failure_cleans_up() {
    let imaging = FakeImaging::new(500, 500).failing("disk full");
    let calls = imaging.calls();
    let server = TestServer::new(imaging).await;

    let response = server.upload(&[png_part("doomed.png")]).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let error = body_json(response).await["error"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(error.starts_with("Failed to generate tiles: "));
    assert!(error.contains("disk full"));

    assert_eq!(calls.lock().unwrap().len(), 1);
    assert!(server.image_dirs().is_empty());
    assert!(server.staging_entries().is_empty());

    let list = body_json(server.get("/api/images").await).await;
    assert_eq!(list["count"], 0);
}

// =============================================================================
// Options and Naming
// =============================================================================

#[tokio::test]
async fn test_upload_defaults_reach_backend() {
    let imaging = FakeImaging::new(100, 100);
    let calls = imaging.calls();
    let server = TestServer::new(imaging).await;

    let response = server.upload(&[png_part("a.png")]).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let params = calls[0].params;
    assert_eq!(params.tile_size, 256);
    assert_eq!(params.overlap, 1);
    assert_eq!(params.format, TileFormat::Jpeg);
    assert_eq!(params.quality, 80);
}

#[tokio::test]
async fn test_upload_options_reach_backend() {
    let imaging = FakeImaging::new(2048, 1024);
    let calls = imaging.calls();
    let server = TestServer::new(imaging).await;

    let response = server
        .upload(&[
            Part::text("tileSize", "512"),
            Part::text("overlap", "0"),
            Part::text("quality", "75"),
            Part::text("format", "png"),
            png_part("wide.png"),
        ])
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["data"]["tileSize"], 512);
    assert_eq!(body["data"]["overlap"], 0);
    assert_eq!(body["data"]["maxLevel"], 2);

    let calls = calls.lock().unwrap();
    let params = calls[0].params;
    assert_eq!(params.tile_size, 512);
    assert_eq!(params.overlap, 0);
    assert_eq!(params.quality, 75);
    assert_eq!(params.format, TileFormat::Png);
}

#[tokio::test]
async fn test_upload_empty_option_uses_default() {
    let imaging = FakeImaging::new(100, 100);
    let calls = imaging.calls();
    let server = TestServer::new(imaging).await;

    let response = server
        .upload(&[png_part("a.png"), Part::text("tileSize", "")])
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(calls.lock().unwrap()[0].params.tile_size, 256);
}

#[tokio::test]
async fn test_upload_stored_name_and_id() {
    let imaging = FakeImaging::new(100, 100);
    let calls = imaging.calls();
    let server = TestServer::new(imaging).await;

    let response = server.upload(&[png_part("My Holiday.png")]).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    let id = body["data"]["id"].as_str().unwrap();
    let filename = body["data"]["filename"].as_str().unwrap();

    // <sanitized stem>-<millis>-<sequence>
    let mut parts = id.rsplitn(3, '-');
    let sequence = parts.next().unwrap();
    let millis = parts.next().unwrap();
    let stem = parts.next().unwrap();
    assert_eq!(stem, "My_Holiday");
    assert!(millis.chars().all(|c| c.is_ascii_digit()));
    assert!(sequence.chars().all(|c| c.is_ascii_digit()));
    assert_eq!(filename, format!("{}.png", id));

    // The stored upload stays in place and is what the backend read
    assert_eq!(server.uploaded_files(), vec![filename.to_string()]);
    let calls = calls.lock().unwrap();
    assert_eq!(calls[0].source, server.upload_dir.join(filename));
    assert_eq!(
        calls[0].output,
        server.tiles_dir.join(STAGING_DIR).join(id).join("image")
    );
    assert!(server.tiles_dir.join(id).join("metadata.json").is_file());
}

#[tokio::test]
async fn test_uploads_get_distinct_ids() {
    let server = TestServer::new(FakeImaging::new(100, 100)).await;

    let first = body_json(server.upload(&[png_part("same.png")]).await).await;
    let second = body_json(server.upload(&[png_part("same.png")]).await).await;

    assert_ne!(first["data"]["id"], second["data"]["id"]);

    let list = body_json(server.get("/api/images").await).await;
    assert_eq!(list["count"], 2);
}

#[tokio::test]
async fn test_dotted_names_without_extension_get_distinct_ids() {
    let server = TestServer::new(FakeImaging::new(100, 100)).await;

    let left = body_json(server.upload(&[png_part("scan.left.final-v2")]).await).await;
    let right = body_json(server.upload(&[png_part("scan.right.final-v2")]).await).await;

    let left_id = left["data"]["id"].as_str().unwrap();
    let right_id = right["data"]["id"].as_str().unwrap();
    assert_ne!(left_id, right_id);
    assert!(left_id.starts_with("scan_left-"));
    assert!(right_id.starts_with("scan_right-"));
    assert_eq!(left["data"]["filename"], left_id);

    let list = body_json(server.get("/api/images").await).await;
    assert_eq!(list["count"], 2);
}
