//! End-to-end tests driving the HTTP router over in-memory backends.

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;

use helpers::TestApp;
use nimbus_core::config::AppConfig;

fn sample(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[tokio::test]
async fn test_health_reports_backends() {
    let app = TestApp::new().await;

    let response = app.request("GET", "/api/health", None, None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["status"], "ok");
    assert_eq!(response.body["data"]["storage"], "memory");
    assert_eq!(response.body["data"]["ws_connections"], 0);
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = TestApp::new().await;

    let response = app.request("GET", "/api/files", None, None).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], "AUTHENTICATION");
}

#[tokio::test]
async fn test_unknown_file_is_not_found() {
    let app = TestApp::new().await;
    let (_, token) = app.user("alice");

    let response = app
        .request(
            "GET",
            "/api/files/00000000-0000-0000-0000-999999999999",
            None,
            Some(&token),
        )
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_upload_list_and_download() {
    let app = TestApp::new().await;
    let (_, token) = app.user("alice");
    let data = sample(1000);

    let uploaded = app.upload(&token, "clip.mp4", &data).await;
    assert_eq!(uploaded.status, StatusCode::CREATED);
    assert_eq!(uploaded.body["data"]["size"], 1000);
    assert_eq!(uploaded.body["data"]["mime_type"], "video/mp4");
    let id = uploaded.id();

    let listed = app.request("GET", "/api/files", None, Some(&token)).await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.body["data"].as_array().map(Vec::len), Some(1));

    let downloaded = app
        .request("GET", &format!("/api/files/{id}/download"), None, Some(&token))
        .await;
    assert_eq!(downloaded.status, StatusCode::OK);
    assert_eq!(downloaded.bytes, data);
    assert_eq!(
        downloaded.header("content-disposition"),
        Some("attachment; filename=\"clip.mp4\"")
    );
}

#[tokio::test]
async fn test_other_users_cannot_see_files() {
    let app = TestApp::new().await;
    let (_, alice) = app.user("alice");
    let (_, bob) = app.user("bob");

    let id = app.upload(&alice, "notes.txt", b"private").await.id();

    let response = app
        .request("GET", &format!("/api/files/{id}"), None, Some(&bob))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_range_request_returns_partial_content() {
    let app = TestApp::new().await;
    let (_, token) = app.user("alice");
    let data = sample(1000);
    let id = app.upload(&token, "clip.mp4", &data).await.id();

    let req = Request::builder()
        .uri(format!("/api/files/{id}/stream"))
        .header("Authorization", format!("Bearer {token}"))
        .header("Range", "bytes=100-199")
        .body(Body::empty())
        .unwrap();
    let response = app.send(req).await;

    assert_eq!(response.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.header("content-range"), Some("bytes 100-199/1000"));
    assert_eq!(response.header("content-length"), Some("100"));
    assert_eq!(response.bytes, &data[100..200]);
}

#[tokio::test]
async fn test_unsatisfiable_range_returns_416() {
    let app = TestApp::new().await;
    let (_, token) = app.user("alice");
    let id = app.upload(&token, "clip.mp4", &sample(1000)).await.id();

    let req = Request::builder()
        .uri(format!("/api/files/{id}/stream"))
        .header("Authorization", format!("Bearer {token}"))
        .header("Range", "bytes=5000-")
        .body(Body::empty())
        .unwrap();
    let response = app.send(req).await;

    assert_eq!(response.status, StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(response.header("content-range"), Some("bytes */1000"));
}

#[tokio::test]
async fn test_stream_token_is_bound_to_its_file() {
    let app = TestApp::new().await;
    let (_, token) = app.user("alice");
    let first = app.upload(&token, "a.mp3", &sample(64)).await.id();
    let second = app.upload(&token, "b.mp3", &sample(64)).await.id();

    let issued = app
        .request(
            "POST",
            &format!("/api/files/{first}/stream-token"),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(issued.status, StatusCode::OK);
    let stream_token = issued.body["data"]["token"].as_str().unwrap().to_string();
    let url = issued.body["data"]["url"].as_str().unwrap().to_string();

    let ok = app.request("GET", &url, None, None).await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.bytes, sample(64));

    let wrong = app
        .request(
            "GET",
            &format!("/api/stream/{second}?token={stream_token}"),
            None,
            None,
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_quota_exceeded_maps_to_413() {
    let mut config = AppConfig::default();
    config.storage.default_quota_bytes = 100;
    let app = TestApp::with_config(config).await;
    let (_, token) = app.user("alice");

    assert_eq!(
        app.upload(&token, "small.bin", &sample(80)).await.status,
        StatusCode::CREATED
    );

    let response = app.upload(&token, "big.bin", &sample(50)).await;
    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(response.body["error"], "QUOTA_EXCEEDED");

    let stats = app
        .request("GET", "/api/storage/stats", None, Some(&token))
        .await;
    assert_eq!(stats.body["data"]["used_bytes"], 80);
}

#[tokio::test]
async fn test_trash_restore_and_empty() {
    let app = TestApp::new().await;
    let (_, token) = app.user("alice");
    let id = app.upload(&token, "draft.txt", b"draft").await.id();

    let deleted = app
        .request("DELETE", &format!("/api/files/{id}"), None, Some(&token))
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.body["data"]["is_trashed"], true);

    let trash = app.request("GET", "/api/trash", None, Some(&token)).await;
    assert_eq!(trash.body["data"].as_array().map(Vec::len), Some(1));

    let restored = app
        .request("POST", &format!("/api/files/{id}/restore"), None, Some(&token))
        .await;
    assert_eq!(restored.body["data"]["is_trashed"], false);

    app.request("DELETE", &format!("/api/files/{id}"), None, Some(&token))
        .await;
    let emptied = app.request("DELETE", "/api/trash", None, Some(&token)).await;
    assert_eq!(emptied.status, StatusCode::OK);
    assert_eq!(emptied.body["data"]["deleted"], 1);

    let gone = app
        .request("GET", &format!("/api/files/{id}"), None, Some(&token))
        .await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_public_share_password_and_download_limit() {
    let app = TestApp::new().await;
    let (_, token) = app.user("alice");
    let id = app.upload(&token, "report.pdf", b"%PDF-1.7").await.id();

    let created = app
        .request(
            "POST",
            &format!("/api/files/{id}/shares/public"),
            Some(json!({ "password": "hunter2", "max_downloads": 1 })),
            Some(&token),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert!(created.body["data"].get("password_hash").is_none());
    let share_token = created.body["data"]["token"].as_str().unwrap().to_string();

    let info = app
        .request("GET", &format!("/api/public/shares/{share_token}"), None, None)
        .await;
    assert_eq!(info.status, StatusCode::OK);
    assert_eq!(info.body["data"]["name"], "report.pdf");
    assert_eq!(info.body["data"]["has_password"], true);
    assert_eq!(info.body["data"]["downloads_left"], 1);

    let download_path = format!("/api/public/shares/{share_token}/download");

    let missing = app.request("POST", &download_path, None, None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.body["error"], "PASSWORD_REQUIRED");

    let wrong = app
        .request("POST", &download_path, Some(json!({ "password": "nope" })), None)
        .await;
    assert_eq!(wrong.status, StatusCode::FORBIDDEN);
    assert_eq!(wrong.body["error"], "INVALID_PASSWORD");

    let accepted = app
        .request(
            "POST",
            &download_path,
            Some(json!({ "password": "hunter2" })),
            None,
        )
        .await;
    assert_eq!(accepted.status, StatusCode::OK);
    assert_eq!(accepted.bytes, b"%PDF-1.7");
    assert_eq!(accepted.header("x-downloads-left"), Some("0"));

    let exhausted = app
        .request(
            "POST",
            &download_path,
            Some(json!({ "password": "hunter2" })),
            None,
        )
        .await;
    assert_eq!(exhausted.status, StatusCode::GONE);
    assert_eq!(exhausted.body["error"], "DOWNLOAD_LIMIT_REACHED");
}

#[tokio::test]
async fn test_revoked_share_stops_resolving() {
    let app = TestApp::new().await;
    let (_, token) = app.user("alice");
    let id = app.upload(&token, "photo.png", b"png").await.id();

    let created = app
        .request(
            "POST",
            &format!("/api/files/{id}/shares/public"),
            None,
            Some(&token),
        )
        .await;
    let share_id = created.id();
    let share_token = created.body["data"]["token"].as_str().unwrap().to_string();

    let revoked = app
        .request("DELETE", &format!("/api/shares/{share_id}"), None, Some(&token))
        .await;
    assert_eq!(revoked.status, StatusCode::NO_CONTENT);

    let info = app
        .request("GET", &format!("/api/public/shares/{share_token}"), None, None)
        .await;
    assert_eq!(info.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_user_share_appears_for_grantee() {
    let app = TestApp::new().await;
    let (_, alice) = app.user("alice");
    let (bob_id, bob) = app.user("bob");
    let id = app.upload(&alice, "plan.md", b"# plan").await.id();

    // Bob must be known before he can be granted access.
    app.request("GET", "/api/files", None, Some(&bob)).await;

    let shared = app
        .request(
            "POST",
            &format!("/api/files/{id}/shares/user"),
            Some(json!({ "user_id": bob_id, "permission": "edit" })),
            Some(&alice),
        )
        .await;
    assert_eq!(shared.status, StatusCode::OK);
    assert_eq!(shared.body["data"]["permission"], "edit");

    let with_me = app
        .request("GET", "/api/shares/with-me", None, Some(&bob))
        .await;
    assert_eq!(with_me.status, StatusCode::OK);
    assert_eq!(with_me.body["data"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_upload_without_size_is_rejected() {
    let app = TestApp::new().await;
    let (_, token) = app.user("alice");

    let response = app.upload_form(&token, &[], "notes.txt", b"hello").await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "VALIDATION");
}

#[tokio::test]
async fn test_upload_larger_than_declared_is_rejected() {
    let app = TestApp::new().await;
    let (_, token) = app.user("alice");

    let response = app
        .upload_form(&token, &[("size", b"10")], "big.bin", &sample(4096))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "VALIDATION");

    let stats = app
        .request("GET", "/api/storage/stats", None, Some(&token))
        .await;
    assert_eq!(stats.body["data"]["used_bytes"], 0);

    let listed = app.request("GET", "/api/files", None, Some(&token)).await;
    assert_eq!(listed.body["data"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_upload_declared_size_is_charged_before_reading() {
    let mut config = AppConfig::default();
    config.storage.default_quota_bytes = 100;
    let app = TestApp::with_config(config).await;
    let (_, token) = app.user("alice");

    let response = app
        .upload_form(&token, &[("size", b"1000000")], "huge.bin", &sample(10))
        .await;

    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(response.body["error"], "QUOTA_EXCEEDED");
}

#[tokio::test]
async fn test_public_folder_share_resolves_but_does_not_download() {
    let app = TestApp::new().await;
    let (_, token) = app.user("alice");

    let folder = app
        .request(
            "POST",
            "/api/folders",
            Some(json!({ "name": "Album" })),
            Some(&token),
        )
        .await;
    assert_eq!(folder.status, StatusCode::CREATED);
    let folder_id = folder.id();

    let created = app
        .request(
            "POST",
            &format!("/api/files/{folder_id}/shares/public"),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let share_token = created.body["data"]["token"].as_str().unwrap().to_string();

    let info = app
        .request("GET", &format!("/api/public/shares/{share_token}"), None, None)
        .await;
    assert_eq!(info.status, StatusCode::OK);
    assert_eq!(info.body["data"]["name"], "Album");
    assert_eq!(info.body["data"]["is_folder"], true);

    let download = app
        .request(
            "POST",
            &format!("/api/public/shares/{share_token}/download"),
            None,
            None,
        )
        .await;
    assert_eq!(download.status, StatusCode::BAD_REQUEST);
    assert_eq!(download.body["error"], "VALIDATION");
}
