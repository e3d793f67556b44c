//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use url::Url;

/// Query parameter carrying the multipart session id in a part-upload URL.
pub const UPLOAD_ID_PARAM: &str = "uploadId";

/// Query parameter carrying the 1-based part number in a part-upload URL.
pub const PART_NUMBER_PARAM: &str = "partNumber";

/// One finished part of a multipart upload, as reported back to the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

/// Object store abstraction for content-addressed storage.
///
/// Implementations hold no per-push state: multipart sessions live in the
/// store itself, so any server instance can continue a push started by
/// another.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Check if an object exists.
    ///
    /// A missing object is `Ok(false)`; every other failure is an error.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get an object's content.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Put an object atomically.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Issue a URL that lets the holder PUT the whole object at `key`.
    async fn presign_put(&self, key: &str, expires_in: Duration) -> StorageResult<Url>;

    /// Open a multipart upload for `key` and return its session id.
    async fn create_multipart(&self, key: &str) -> StorageResult<String>;

    /// Issue a URL that lets the holder PUT one part of a multipart upload.
    ///
    /// The URL carries the session id and part number as the
    /// [`UPLOAD_ID_PARAM`] and [`PART_NUMBER_PARAM`] query parameters.
    async fn presign_upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        expires_in: Duration,
    ) -> StorageResult<Url>;

    /// Assemble the listed parts into the object at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UploadNotFound`](crate::StorageError::UploadNotFound)
    /// if the store does not know `upload_id`.
    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StorageResult<()>;

    /// Recover the object key from a URL issued by one of the presign methods.
    fn key_from_url(&self, url: &Url) -> StorageResult<String>;

    /// Get the name of this storage backend.
    ///
    /// Returns a static string identifier for the backend type (e.g., "s3", "memory").
    /// Used for metrics and logging.
    fn backend_name(&self) -> &'static str;

    /// Verify storage backend connectivity.
    ///
    /// Called during server startup so a misconfigured store fails fast
    /// instead of on the first push.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Percent-decode a URL path into an object key, stripping `base_path`.
pub(crate) fn decode_key_path(url: &Url, base_path: &str) -> StorageResult<String> {
    let path = url.path();
    let rest = path
        .strip_prefix(base_path)
        .and_then(|p| p.strip_prefix('/'))
        .ok_or_else(|| {
            crate::StorageError::InvalidUrl(format!("path {path:?} is outside {base_path:?}"))
        })?;

    let key = percent_encoding::percent_decode_str(rest)
        .decode_utf8()
        .map_err(|e| crate::StorageError::InvalidUrl(format!("path is not UTF-8: {e}")))?;

    if key.is_empty() {
        return Err(crate::StorageError::InvalidUrl(format!(
            "no object key in {path:?}"
        )));
    }
    Ok(key.into_owned())
}
