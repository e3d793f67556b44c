//! In-process storage backend.
//!
//! Behaves like an S3 bucket that lives in memory: objects, multipart
//! sessions, and URLs in the same shape S3 presigns. Upload URLs point at a
//! configurable base URL and are never served over HTTP; instead
//! [`MemoryBackend::upload_to_url`] plays the part of the client's PUT.

use crate::error::{StorageError, StorageResult};
use crate::traits::{
    CompletedPart, ObjectStore, PART_NUMBER_PARAM, UPLOAD_ID_PARAM, decode_key_path,
};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::instrument;
use url::Url;

/// Query parameter holding the expiry (unix seconds) of a memory URL.
const EXPIRES_PARAM: &str = "X-Silo-Expires";

/// Characters escaped in key path segments; mirrors what S3 presigners encode.
const KEY_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b':')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Default)]
struct PendingUpload {
    key: String,
    /// part number -> (etag, data)
    parts: BTreeMap<u32, (String, Bytes)>,
}

#[derive(Debug, Default)]
struct MemoryState {
    objects: HashMap<String, Bytes>,
    uploads: HashMap<String, PendingUpload>,
}

/// In-memory object store.
#[derive(Debug)]
pub struct MemoryBackend {
    base_url: Url,
    /// Path of `base_url` without a trailing slash; empty for the root.
    base_path: String,
    state: Mutex<MemoryState>,
    next_upload: AtomicU64,
}

impl MemoryBackend {
    /// Create a new empty store issuing URLs under `base_url`.
    pub fn new(base_url: &str) -> StorageResult<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| StorageError::Config(format!("invalid memory base_url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StorageError::Config(format!(
                "memory base_url cannot carry a path: {base_url}"
            )));
        }
        // Keys always start after exactly one slash.
        let base_path = base_url.path().trim_end_matches('/').to_string();
        base_url.set_query(None);
        base_url.set_fragment(None);

        Ok(Self {
            base_url,
            base_path,
            state: Mutex::new(MemoryState::default()),
            next_upload: AtomicU64::new(1),
        })
    }

    fn object_url(&self, key: &str) -> Url {
        let mut url = self.base_url.clone();
        let encoded: Vec<String> = key
            .split('/')
            .map(|segment| utf8_percent_encode(segment, KEY_SEGMENT).to_string())
            .collect();
        url.set_path(&format!("{}/{}", self.base_path, encoded.join("/")));
        url
    }

    fn expires_at(expires_in: Duration) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        (now + expires_in).as_secs()
    }

    fn etag(data: &[u8]) -> String {
        format!("\"{}\"", hex::encode(Sha256::digest(data)))
    }

    /// Store `data` as one part of an open multipart upload and return its ETag.
    pub async fn upload_part(
        &self,
        upload_id: &str,
        part_number: u32,
        data: Bytes,
    ) -> StorageResult<String> {
        let mut state = self.state.lock().await;
        let upload = state
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| StorageError::UploadNotFound(upload_id.to_string()))?;
        let etag = Self::etag(&data);
        upload.parts.insert(part_number, (etag.clone(), data));
        Ok(etag)
    }

    /// Perform the PUT a client would send to a presigned URL and return the
    /// ETag the store would answer with.
    pub async fn upload_to_url(&self, url: &str, data: Bytes) -> StorageResult<String> {
        let url = Url::parse(url).map_err(|e| StorageError::InvalidUrl(e.to_string()))?;
        let key = self.key_from_url(&url)?;

        let param = |name: &str| {
            url.query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
        };

        match param(UPLOAD_ID_PARAM) {
            Some(upload_id) => {
                let part_number = param(PART_NUMBER_PARAM)
                    .and_then(|p| p.parse::<u32>().ok())
                    .ok_or_else(|| {
                        StorageError::InvalidUrl(format!("{PART_NUMBER_PARAM} missing in {url}"))
                    })?;
                self.upload_part(&upload_id, part_number, data).await
            }
            None => {
                let etag = Self::etag(&data);
                self.put(&key, data).await?;
                Ok(etag)
            }
        }
    }

    /// Number of multipart uploads that are open.
    pub async fn open_uploads(&self) -> usize {
        self.state.lock().await.uploads.len()
    }

    /// All object keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut keys: Vec<String> = state.objects.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    #[instrument(skip(self), fields(backend = "memory"))]
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.state.lock().await.objects.contains_key(key))
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.state
            .lock()
            .await
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    #[instrument(skip(self, data), fields(backend = "memory", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.state
            .lock()
            .await
            .objects
            .insert(key.to_string(), data);
        Ok(())
    }

    async fn presign_put(&self, key: &str, expires_in: Duration) -> StorageResult<Url> {
        let mut url = self.object_url(key);
        url.query_pairs_mut()
            .append_pair(EXPIRES_PARAM, &Self::expires_at(expires_in).to_string());
        Ok(url)
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn create_multipart(&self, key: &str) -> StorageResult<String> {
        let n = self.next_upload.fetch_add(1, Ordering::Relaxed);
        let upload_id = format!("mem-upload-{n}");
        self.state.lock().await.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                key: key.to_string(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn presign_upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        expires_in: Duration,
    ) -> StorageResult<Url> {
        let mut url = self.object_url(key);
        url.query_pairs_mut()
            .append_pair(UPLOAD_ID_PARAM, upload_id)
            .append_pair(PART_NUMBER_PARAM, &part_number.to_string())
            .append_pair(EXPIRES_PARAM, &Self::expires_at(expires_in).to_string());
        Ok(url)
    }

    #[instrument(skip(self, parts), fields(backend = "memory", parts = parts.len()))]
    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StorageResult<()> {
        let mut state = self.state.lock().await;

        let upload = match state.uploads.get(upload_id) {
            Some(upload) if upload.key == key => upload,
            _ => return Err(StorageError::UploadNotFound(upload_id.to_string())),
        };

        if parts.is_empty() {
            return Err(StorageError::InvalidPart(
                "at least one part is required".to_string(),
            ));
        }
        if parts.windows(2).any(|w| w[0].part_number >= w[1].part_number) {
            return Err(StorageError::InvalidPart(
                "parts must be in ascending part number order".to_string(),
            ));
        }

        let mut assembled = BytesMut::new();
        for part in parts {
            match upload.parts.get(&part.part_number) {
                Some((etag, data))
                    if etag.trim_matches('"') == part.etag.trim_matches('"') =>
                {
                    assembled.extend_from_slice(data);
                }
                Some(_) => {
                    return Err(StorageError::InvalidPart(format!(
                        "etag mismatch for part {}",
                        part.part_number
                    )));
                }
                None => {
                    return Err(StorageError::InvalidPart(format!(
                        "part {} was never uploaded",
                        part.part_number
                    )));
                }
            }
        }

        state.uploads.remove(upload_id);
        state.objects.insert(key.to_string(), assembled.freeze());
        Ok(())
    }

    fn key_from_url(&self, url: &Url) -> StorageResult<String> {
        if url.origin() != self.base_url.origin() {
            return Err(StorageError::InvalidUrl(format!(
                "{url} was not issued by this store"
            )));
        }
        decode_key_path(url, &self.base_path)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
