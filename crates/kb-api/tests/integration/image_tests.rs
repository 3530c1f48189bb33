//! Image storage endpoint tests.

use axum::body::Body;
use axum::http::{header, Method, StatusCode};
use serde_json::{json, Value};

use super::common::{
    create_test_app, delete_request, get_request, post_json_request, send_request,
    send_request_raw, PUBLIC_BASE_URL,
};

const BOUNDARY: &str = "----kb-integration";

fn upload_request(kind: &str, id: Option<&str>, file_name: &str, content_type: &str) -> axum::extract::Request<Body> {
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"type\"\r\n\r\n{kind}\r\n",
        b = BOUNDARY
    );
    if let Some(id) = id {
        body.push_str(&format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"id\"\r\n\r\n{id}\r\n",
            b = BOUNDARY
        ));
    }
    body.push_str(&format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\nGIF89a-bytes\r\n--{b}--\r\n",
        b = BOUNDARY
    ));

    axum::extract::Request::builder()
        .method(Method::POST)
        .uri("/api/images")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Strips the public base URL, leaving the `/api/images/...` path.
fn local_path(url: &str) -> String {
    url.strip_prefix(PUBLIC_BASE_URL)
        .expect("url under public base")
        .to_string()
}

#[tokio::test]
async fn test_upload_download_delete_with_owner() {
    let app = create_test_app().await;

    let (status, body): (StatusCode, Value) = send_request(
        app.router.clone(),
        upload_request("actor", Some("apt29"), "logo.gif", "image/gif"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let url = body["image"].as_str().unwrap();
    let path = local_path(url);
    assert!(path.starts_with("/api/images/actor/apt29/"));
    assert!(path.ends_with(".gif"));

    let response = tower::ServiceExt::oneshot(app.router.clone(), get_request(&path))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/gif");

    let (status, body): (StatusCode, Value) =
        send_request(app.router.clone(), delete_request(&path)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Image deleted successfully");

    // The owner folder was emptied and removed with the file.
    assert!(!app.images.path().join("actor").join("apt29").exists());

    let (status, _) = send_request_raw(app.router, get_request(&path)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_staged_upload_is_promoted() {
    let app = create_test_app().await;

    let (_, body): (StatusCode, Value) = send_request(
        app.router.clone(),
        upload_request("technique", None, "diagram.png", "image/png"),
    )
    .await;
    let path = local_path(body["image"].as_str().unwrap());
    assert!(path.starts_with("/api/images/technique/temp/"));
    let file_name = path.rsplit('/').next().unwrap().to_string();

    let (status, body): (StatusCode, Value) = send_request(
        app.router.clone(),
        post_json_request(
            "/api/path",
            &json!({"type": "technique", "id": "t1566", "name": [file_name]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": true}));

    let promoted = format!("/api/images/technique/t1566/{}", file_name);
    let (status, bytes) = send_request_raw(app.router.clone(), get_request(&promoted)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"GIF89a-bytes");

    let (status, _) = send_request_raw(app.router, get_request(&path)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_rejections() {
    let app = create_test_app().await;

    let (status, body): (StatusCode, Value) = send_request(
        app.router.clone(),
        upload_request("actor", None, "payload.exe", "application/octet-stream"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _): (StatusCode, Value) = send_request(
        app.router.clone(),
        upload_request("actor", None, "noextension", "image/png"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _): (StatusCode, Value) = send_request(
        app.router,
        upload_request("..", None, "x.png", "image/png"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_promote_missing_file_is_not_found() {
    let app = create_test_app().await;

    let (status, body): (StatusCode, Value) = send_request(
        app.router,
        post_json_request(
            "/api/path",
            &json!({"type": "technique", "id": "t1", "name": ["nope.png"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "File not found");
}
