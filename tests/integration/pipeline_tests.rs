//! End-to-end tests with the `image` crate backend.

use axum::http::StatusCode;
use image::ImageFormat;

use deepzoom_server::{
    GenerationOptions, ImageCrateBackend, StoreConfig, TileFormat, TileStore,
};

use super::test_utils::{
    body_bytes, body_json, body_text, create_test_image, is_valid_jpeg, Part, TestServer,
};

#[tokio::test]
async fn test_png_upload_builds_real_pyramid() {
    let server = TestServer::new(ImageCrateBackend::new()).await;

    let response = server
        .upload(&[Part::image(
            "gradient.png",
            "image/png",
            create_test_image(300, 200, ImageFormat::Png),
        )])
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    let data = &body["data"];
    let id = data["id"].as_str().unwrap().to_string();
    assert_eq!(data["width"], 300);
    assert_eq!(data["height"], 200);
    assert_eq!(data["format"], "png");
    assert_eq!(data["maxLevel"], 1);

    // Full resolution level of a 300px image is 9
    let response = server.get(&format!("/api/images/{}/tiles/9/0/0", id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let tile = body_bytes(response).await;
    assert!(is_valid_jpeg(&tile));

    let decoded = image::load_from_memory(&tile).unwrap();
    assert_eq!(decoded.width(), 257);
    assert_eq!(decoded.height(), 200);

    let response = server.get(&format!("/api/images/{}/tiles/9/1/0.jpeg", id)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = server.get(&format!("/api/images/{}/tiles/9/2/0", id)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Level 0 is a single pixel
    let response = server.get(&format!("/api/images/{}/tiles/0/0/0", id)).await;
    let tile = image::load_from_memory(&body_bytes(response).await).unwrap();
    assert_eq!((tile.width(), tile.height()), (1, 1));

    let xml = body_text(server.get(&format!("/api/images/{}/dzi", id)).await).await;
    assert!(xml.contains(r#"Width="300""#));
    assert!(xml.contains(r#"Height="200""#));
    assert!(xml.contains(r#"Format="jpeg""#));

    let list = body_json(server.get("/api/images").await).await;
    assert_eq!(list["count"], 1);
    assert_eq!(list["images"][0]["id"], id.as_str());

    let response = server.delete(&format!("/api/images/{}", id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(server.image_dirs().is_empty());
}

#[tokio::test]
async fn test_png_tiles_with_upload_options() {
    let server = TestServer::new(ImageCrateBackend::new()).await;

    let response = server
        .upload(&[
            Part::text("tileSize", "128"),
            Part::text("overlap", "0"),
            Part::text("format", "png"),
            Part::image(
                "small.png",
                "image/png",
                create_test_image(200, 100, ImageFormat::Png),
            ),
        ])
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let id = body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    // Stored as png, still served from the same URL
    assert!(server
        .tiles_dir
        .join(&id)
        .join("image_files")
        .join("8")
        .join("1_0.png")
        .is_file());

    let response = server.get(&format!("/api/images/{}/tiles/8/1/0", id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let tile = image::load_from_memory(&body_bytes(response).await).unwrap();
    assert_eq!((tile.width(), tile.height()), (72, 100));
}

#[tokio::test]
async fn test_garbage_upload_is_unprocessable() {
    let server = TestServer::new(ImageCrateBackend::new()).await;

    let response = server
        .upload(&[Part::image(
            "fake.png",
            "image/png",
            b"this is not an image".to_vec(),
        )])
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(server.image_dirs().is_empty());
}

#[tokio::test]
async fn test_regenerating_in_another_format_serves_new_tiles() {
    let tmp = tempfile::TempDir::new().unwrap();
    let source = tmp.path().join("same.png");
    std::fs::write(&source, create_test_image(64, 48, ImageFormat::Png)).unwrap();

    let store = TileStore::open(&StoreConfig::new(tmp.path().join("tiles")), ImageCrateBackend::new())
        .await
        .unwrap();

    store
        .generate_tiles(&source, "same.png", GenerationOptions::default())
        .await
        .unwrap();
    let tile = store.get_tile("same", 3, 0, 0).await.unwrap();
    assert!(is_valid_jpeg(&tile));

    store
        .generate_tiles(
            &source,
            "same.png",
            GenerationOptions {
                format: Some(TileFormat::Png),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let tile = store.get_tile("same", 3, 0, 0).await.unwrap();
    assert!(tile.starts_with(&[0x89, b'P', b'N', b'G']));
    assert!(store
        .get_dzi_descriptor("same")
        .await
        .unwrap()
        .contains(r#"Format="png""#));
}
