//! Server test utilities.

use super::counting::CountingStore;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use bytes::Bytes;
use serde_json::{Value, json};
use silo_core::config::{AppConfig, StorageConfig};
use silo_server::{AppState, create_router};
use silo_storage::MemoryBackend;
use std::sync::Arc;
use tower::ServiceExt;

pub const STORE_URL: &str = "http://store.test/registry";

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    /// The backing store, for simulating client uploads and inspecting objects.
    pub memory: Arc<MemoryBackend>,
    /// The store the server talks to.
    pub store: Arc<CountingStore>,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server over an empty in-memory store.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a test server with custom config modifications.
    pub fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        silo_server::metrics::register_metrics();

        let mut config = AppConfig::for_testing();
        config.storage = StorageConfig::Memory {
            base_url: STORE_URL.to_string(),
        };
        modifier(&mut config);

        let memory = Arc::new(MemoryBackend::new(STORE_URL).expect("valid store url"));
        let store = Arc::new(CountingStore::new(memory.clone()));

        let state = AppState::new(config, store.clone());
        let router = create_router(state.clone());

        Self {
            router,
            state,
            memory,
            store,
        }
    }

    /// Send a request and return the status and raw body.
    pub async fn raw_request(&self, method: &str, uri: &str, body: Body) -> (StatusCode, Bytes) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(body)
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body_bytes)
    }

    /// Send a request and decode the JSON response.
    pub async fn json_request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let body = match body {
            Some(v) => Body::from(serde_json::to_vec(&v).unwrap()),
            None => Body::empty(),
        };
        let (status, bytes) = self.raw_request(method, uri, body).await;

        let json: Value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// POST a push body.
    pub async fn push(&self, body: Value) -> (StatusCode, Value) {
        self.json_request("POST", "/v1/push", Some(body)).await
    }

    /// POST a push body given as text, byte for byte.
    pub async fn push_raw(&self, body: &str) -> (StatusCode, Value) {
        let (status, bytes) = self
            .raw_request("POST", "/v1/push", Body::from(body.to_string()))
            .await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    /// Store a blob directly, as if an earlier push had uploaded it.
    pub async fn seed_blob(&self, digest: &str, data: Bytes) {
        use silo_storage::ObjectStore;
        self.memory
            .put(&format!("blobs/{digest}"), data)
            .await
            .expect("seed blob");
    }

    /// Perform every upload in `requirements` against the store, taking
    /// each part's bytes from `blob_for(digest)`. Returns the completion
    /// records a client would report.
    pub async fn perform_uploads<F>(&self, requirements: &Value, blob_for: F) -> Vec<Value>
    where
        F: Fn(&str) -> Bytes,
    {
        let mut completions = Vec::new();
        for req in requirements.as_array().expect("requirements array") {
            let digest = req["digest"].as_str().unwrap();
            let offset = req["offset"].as_u64().unwrap() as usize;
            let size = req["size"].as_u64().unwrap() as usize;
            let url = req["url"].as_str().unwrap();

            let data = blob_for(digest).slice(offset..offset + size);
            let etag = self
                .memory
                .upload_to_url(url, data)
                .await
                .expect("upload to issued url");
            completions.push(json!({ "url": url, "etag": etag }));
        }
        completions
    }
}
