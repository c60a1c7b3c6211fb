//! Shared test helpers for integration tests.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use nimbus_api::{AppState, build_router};
use nimbus_core::config::AppConfig;
use nimbus_database::Database;
use nimbus_realtime::RealtimeHub;
use nimbus_storage::MemoryBlobStore;

/// Boundary used by [`TestApp::upload`].
const BOUNDARY: &str = "nimbus-test-boundary";

/// Test application over in-memory repositories and blobs.
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Shared state, for seeding and inspecting engines directly
    pub state: AppState,
}

impl TestApp {
    /// Create a new test application with default settings.
    pub async fn new() -> Self {
        Self::with_config(AppConfig::default()).await
    }

    /// Create a test application from a tweaked configuration.
    pub async fn with_config(mut config: AppConfig) -> Self {
        config.database.url = "memory://".to_string();
        config.auth.jwt_secret = "integration-test-secret".to_string();
        // Keep share password hashing fast.
        config.auth.bcrypt_cost = 4;

        let hub = RealtimeHub::spawn(&config.realtime);
        let state = AppState::new(
            config,
            Database::memory(),
            Arc::new(MemoryBlobStore::new()),
            hub,
        )
        .expect("Failed to build app state");

        Self {
            router: build_router(state.clone()),
            state,
        }
    }

    /// A fresh user id with a valid access token.
    pub fn user(&self, username: &str) -> (Uuid, String) {
        let id = Uuid::new_v4();
        let token = self
            .state
            .jwt_encoder
            .access_token(id, username, chrono::Duration::hours(1))
            .expect("Failed to issue access token");
        (id, token)
    }

    /// Make a JSON request to the test app.
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut req = Request::builder().method(method).uri(path);

        if let Some(token) = token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }

        let body = match body {
            Some(b) => {
                req = req.header("Content-Type", "application/json");
                Body::from(serde_json::to_vec(&b).expect("Failed to serialize body"))
            }
            None => Body::empty(),
        };

        self.send(req.body(body).expect("Failed to build request"))
            .await
    }

    /// Upload `data` as `name` into the caller's root.
    pub async fn upload(&self, token: &str, name: &str, data: &[u8]) -> TestResponse {
        let size = data.len().to_string();
        self.upload_form(token, &[("size", size.as_bytes())], name, data)
            .await
    }

    /// Post a multipart form of plain `fields` followed by a `file` part.
    pub async fn upload_form(
        &self,
        token: &str,
        fields: &[(&str, &[u8])],
        name: &str,
        data: &[u8],
    ) -> TestResponse {
        let mut body = Vec::new();
        for (field, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(value);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let req = Request::builder()
            .method("POST")
            .uri("/api/files")
            .header("Authorization", format!("Bearer {token}"))
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("Failed to build request");

        self.send(req).await
    }

    /// Send a prepared request.
    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), 16 * 1024 * 1024)
            .await
            .expect("Failed to read body")
            .to_vec();

        let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            bytes,
            body,
        }
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Raw body
    pub bytes: Vec<u8>,
    /// Parsed JSON body, `Null` for binary bodies
    pub body: Value,
}

impl TestResponse {
    /// Header value as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The `data.id` field of a wrapped response.
    pub fn id(&self) -> Uuid {
        self.body["data"]["id"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| panic!("No data.id in response: {:?}", self.body))
    }
}
