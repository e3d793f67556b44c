//! S3-compatible storage backend using AWS SDK.

use crate::error::{StorageError, StorageResult};
use crate::traits::{CompletedPart, ObjectStore, decode_key_path};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_smithy_http_client::Builder as SmithyHttpClientBuilder;
use bytes::Bytes;
use std::time::Duration;
use tracing::instrument;
use url::Url;

/// S3 error codes that mean the multipart session is gone.
const UPLOAD_GONE_CODES: &[&str] = &["NoSuchUpload"];

/// S3 error codes that mean the listed parts were rejected.
const INVALID_PART_CODES: &[&str] = &["InvalidPart", "InvalidPartOrder", "EntityTooSmall"];

fn map_s3_operation_error<E>(err: SdkError<E>) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StorageError::S3(Box::new(err))
}

fn presign_config(expires_in: Duration) -> StorageResult<PresigningConfig> {
    PresigningConfig::expires_in(expires_in).map_err(|e| StorageError::Presign(e.to_string()))
}

fn part_number_i32(part_number: u32) -> StorageResult<i32> {
    i32::try_from(part_number)
        .map_err(|_| StorageError::InvalidPart(format!("part number {part_number} out of range")))
}

/// S3-compatible object store using AWS SDK.
pub struct S3Backend {
    client: Client,
    bucket: String,
    prefix: Option<String>,
    force_path_style: bool,
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("force_path_style", &self.force_path_style)
            .finish_non_exhaustive()
    }
}

impl S3Backend {
    /// Create a new S3 backend.
    ///
    /// # Arguments
    /// * `force_path_style` - Use path-style URLs (`endpoint/bucket/key`) instead of
    ///   virtual-hosted style (`bucket.endpoint/key`). Required for MinIO and some
    ///   S3-compatible services.
    pub async fn new(
        bucket: &str,
        endpoint: Option<String>,
        region: Option<String>,
        prefix: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        force_path_style: bool,
    ) -> StorageResult<Self> {
        if access_key_id.is_some() ^ secret_access_key.is_some() {
            return Err(StorageError::Config(
                "s3 config requires both access_key_id and secret_access_key when either is set"
                    .to_string(),
            ));
        }

        let resolved_region = aws_config::Region::new(
            region.unwrap_or_else(|| "us-east-1".to_string()),
        );
        let mut s3_config_builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(resolved_region.clone());

        // Presigning needs credentials up front, so the ambient chain is
        // resolved here rather than per request.
        if let (Some(key_id), Some(secret)) = (access_key_id, secret_access_key) {
            let credentials =
                aws_sdk_s3::config::Credentials::new(key_id, secret, None, None, "silo-config");
            s3_config_builder = s3_config_builder.credentials_provider(credentials);
        } else {
            let chain = aws_config::default_provider::credentials::DefaultCredentialsChain::builder()
                .region(resolved_region)
                .build()
                .await;
            s3_config_builder = s3_config_builder.credentials_provider(chain);
        }

        if let Some(endpoint_url) = endpoint.as_deref().map(normalize_endpoint) {
            // Plain HTTP endpoints (local MinIO) get an HTTP-only client so
            // startup never depends on native trust roots.
            if endpoint_url.starts_with("http://") {
                s3_config_builder =
                    s3_config_builder.http_client(SmithyHttpClientBuilder::new().build_http());
            }
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        if force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let prefix = prefix
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty());

        Ok(Self {
            client: Client::from_conf(s3_config_builder.build()),
            bucket: bucket.to_string(),
            prefix,
            force_path_style,
        })
    }

    /// Get the full object key for a key (applies prefix if configured).
    fn full_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, key),
            None => key.to_string(),
        }
    }

    /// Map a multipart completion failure onto the store-neutral variants.
    fn map_complete_error<E>(err: SdkError<E>, upload_id: &str) -> StorageError
    where
        E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    {
        let code = err.as_service_error().and_then(|e| e.code()).map(str::to_owned);
        match code.as_deref() {
            Some(code) if UPLOAD_GONE_CODES.contains(&code) => {
                StorageError::UploadNotFound(upload_id.to_string())
            }
            Some(code) if INVALID_PART_CODES.contains(&code) => {
                let message = err
                    .as_service_error()
                    .and_then(|e| e.message())
                    .unwrap_or(code)
                    .to_string();
                StorageError::InvalidPart(message)
            }
            _ => map_s3_operation_error(err),
        }
    }
}

fn normalize_endpoint(endpoint: &str) -> String {
    // Bare host:port endpoints (e.g., "minio:9000") default to http.
    let lower = endpoint.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    }
}

#[async_trait]
impl ObjectStore for S3Backend {
    #[instrument(skip(self), fields(backend = "s3"))]
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let full_key = self.full_key(key);
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                if let SdkError::ServiceError(ref service_err) = err
                    && service_err.raw().status().as_u16() == 404
                {
                    return Ok(false);
                }
                Err(map_s3_operation_error(err))
            }
        }
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let full_key = self.full_key(key);
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .send()
            .await
            .map_err(|err| {
                if let SdkError::ServiceError(ref service_err) = err
                    && service_err.raw().status().as_u16() == 404
                {
                    return StorageError::NotFound(key.to_string());
                }
                map_s3_operation_error(err)
            })?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(Box::new(e)))?
            .into_bytes();

        Ok(bytes)
    }

    #[instrument(skip(self, data), fields(backend = "s3", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let full_key = self.full_key(key);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .body(data.into())
            .send()
            .await
            .map_err(map_s3_operation_error)?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn presign_put(&self, key: &str, expires_in: Duration) -> StorageResult<Url> {
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .presigned(presign_config(expires_in)?)
            .await
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        Url::parse(request.uri()).map_err(|e| StorageError::Presign(e.to_string()))
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn create_multipart(&self, key: &str) -> StorageResult<String> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
            .map_err(map_s3_operation_error)?;

        output
            .upload_id()
            .map(str::to_owned)
            .ok_or_else(|| StorageError::Presign(format!("no upload id returned for {key}")))
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn presign_upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        expires_in: Duration,
    ) -> StorageResult<Url> {
        let request = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .upload_id(upload_id)
            .part_number(part_number_i32(part_number)?)
            .presigned(presign_config(expires_in)?)
            .await
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        Url::parse(request.uri()).map_err(|e| StorageError::Presign(e.to_string()))
    }

    #[instrument(skip(self, parts), fields(backend = "s3", parts = parts.len()))]
    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StorageResult<()> {
        let completed = parts
            .iter()
            .map(|part| {
                Ok(aws_sdk_s3::types::CompletedPart::builder()
                    .e_tag(&part.etag)
                    .part_number(part_number_i32(part.part_number)?)
                    .build())
            })
            .collect::<StorageResult<Vec<_>>>()?;

        let upload = aws_sdk_s3::types::CompletedMultipartUpload::builder()
            .set_parts(Some(completed))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .upload_id(upload_id)
            .multipart_upload(upload)
            .send()
            .await
            .map_err(|e| Self::map_complete_error(e, upload_id))?;

        Ok(())
    }

    fn key_from_url(&self, url: &Url) -> StorageResult<String> {
        let mut base = String::new();
        if self.force_path_style {
            base.push('/');
            base.push_str(&self.bucket);
        }
        let full_key = decode_key_path(url, &base)?;

        match &self.prefix {
            Some(prefix) => full_key
                .strip_prefix(prefix.as_str())
                .and_then(|k| k.strip_prefix('/'))
                .filter(|k| !k.is_empty())
                .map(str::to_owned)
                .ok_or_else(|| {
                    StorageError::InvalidUrl(format!("{full_key:?} is outside prefix {prefix:?}"))
                }),
            None => Ok(full_key),
        }
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn health_check(&self) -> StorageResult<()> {
        const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

        let probe = async {
            self.client
                .head_bucket()
                .bucket(&self.bucket)
                .send()
                .await
                .map_err(map_s3_operation_error)?;
            Ok(())
        };

        tokio::time::timeout(HEALTH_CHECK_TIMEOUT, probe)
            .await
            .map_err(|_| {
                StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "S3 health check timed out after 10 seconds",
                ))
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{PART_NUMBER_PARAM, UPLOAD_ID_PARAM};

    async fn make_backend(prefix: Option<&str>, force_path_style: bool) -> S3Backend {
        S3Backend::new(
            "test-bucket",
            Some("s3.test".to_string()),
            Some("us-east-1".to_string()),
            prefix.map(str::to_owned),
            Some("access".to_string()),
            Some("secret".to_string()),
            force_path_style,
        )
        .await
        .expect("backend should construct for unit tests")
    }

    #[tokio::test]
    async fn test_full_key_applies_prefix() {
        let backend = make_backend(Some("/registry/"), true).await;
        assert_eq!(backend.full_key("blobs/x"), "registry/blobs/x");

        let backend = make_backend(None, true).await;
        assert_eq!(backend.full_key("blobs/x"), "blobs/x");
    }

    #[tokio::test]
    async fn test_presigned_put_path_style_round_trip() {
        let backend = make_backend(Some("registry"), true).await;
        let url = backend
            .presign_put("blobs/sha256:abc", Duration::from_secs(900))
            .await
            .unwrap();

        assert_eq!(url.host_str(), Some("s3.test"));
        assert!(url.path().starts_with("/test-bucket/registry/blobs/"));
        assert!(url.query_pairs().any(|(k, _)| k == "X-Amz-Signature"));
        assert_eq!(backend.key_from_url(&url).unwrap(), "blobs/sha256:abc");
    }

    #[tokio::test]
    async fn test_presigned_part_virtual_hosted_round_trip() {
        let backend = make_backend(None, false).await;
        let url = backend
            .presign_upload_part("blobs/sha256:abc", "upload-1", 3, Duration::from_secs(900))
            .await
            .unwrap();

        assert_eq!(url.host_str(), Some("test-bucket.s3.test"));
        let param = |name: &str| {
            url.query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
        };
        assert_eq!(param(UPLOAD_ID_PARAM).as_deref(), Some("upload-1"));
        assert_eq!(param(PART_NUMBER_PARAM).as_deref(), Some("3"));
        assert_eq!(backend.key_from_url(&url).unwrap(), "blobs/sha256:abc");
    }

    #[tokio::test]
    async fn test_key_from_url_rejects_other_prefix() {
        let backend = make_backend(Some("registry"), true).await;
        let url = Url::parse("http://s3.test/test-bucket/other/blobs/x").unwrap();
        assert!(matches!(
            backend.key_from_url(&url),
            Err(StorageError::InvalidUrl(_))
        ));

        let url = Url::parse("http://s3.test/other-bucket/registry/blobs/x").unwrap();
        assert!(backend.key_from_url(&url).is_err());
    }

    #[tokio::test]
    async fn test_presign_rejects_excessive_ttl() {
        let backend = make_backend(None, true).await;
        let err = backend
            .presign_put("blobs/x", Duration::from_secs(8 * 24 * 60 * 60))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Presign(_)));
    }

    #[tokio::test]
    async fn test_s3_new_requires_complete_credentials() {
        let err = S3Backend::new(
            "bucket",
            None,
            Some("us-east-1".to_string()),
            None,
            Some("access".to_string()),
            None,
            false,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, StorageError::Config(_)));
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("minio:9000"), "http://minio:9000");
        assert_eq!(normalize_endpoint("HTTPS://s3.test"), "HTTPS://s3.test");
    }
}
