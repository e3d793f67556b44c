//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest validity S3 accepts for a presigned URL (7 days).
pub const MAX_URL_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    /// SECURITY: When enabled, ensure this endpoint is network-restricted
    /// to authorized Prometheus scraper IPs only at the infrastructure level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
    /// Maximum accepted request body in bytes (default: 10 MiB).
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
    /// Deadline for a single push round in seconds (default: 60).
    #[serde(default = "default_push_timeout_secs")]
    pub push_timeout_secs: u64,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_max_body_size() -> usize {
    10 * 1024 * 1024
}

fn default_push_timeout_secs() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            metrics_enabled: default_metrics_enabled(),
            max_body_size: default_max_body_size(),
            push_timeout_secs: default_push_timeout_secs(),
        }
    }
}

impl ServerConfig {
    /// Get the push deadline as a Duration.
    pub fn push_timeout(&self) -> Duration {
        Duration::from_secs(self.push_timeout_secs)
    }
}

/// Push planning policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PushConfig {
    /// Part size for multipart uploads in bytes (default: 50 MiB).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    /// Blobs at least this large are uploaded in parts (default: 5 MiB, the S3 floor).
    #[serde(default = "default_min_multipart_size")]
    pub min_multipart_size: u64,
    /// Validity of issued upload URLs in seconds (default: 15 minutes).
    #[serde(default = "default_url_ttl_secs")]
    pub url_ttl_secs: u64,
    /// Maximum concurrent store operations per push (default: 8).
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_chunk_size() -> u64 {
    crate::DEFAULT_CHUNK_SIZE
}

fn default_min_multipart_size() -> u64 {
    crate::MIN_MULTIPART_SIZE
}

fn default_url_ttl_secs() -> u64 {
    15 * 60
}

fn default_max_concurrency() -> usize {
    8
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            min_multipart_size: default_min_multipart_size(),
            url_ttl_secs: default_url_ttl_secs(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl PushConfig {
    /// Get the URL validity window as a Duration.
    pub fn url_ttl(&self) -> Duration {
        Duration::from_secs(self.url_ttl_secs)
    }

    /// Validate push policy invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_multipart_size == 0 {
            return Err("push.min_multipart_size must be greater than 0".to_string());
        }
        // Every part but the last must meet the provider floor.
        if self.chunk_size < self.min_multipart_size {
            return Err(format!(
                "push.chunk_size ({}) must be at least push.min_multipart_size ({})",
                self.chunk_size, self.min_multipart_size
            ));
        }
        if self.url_ttl_secs == 0 || self.url_ttl_secs > MAX_URL_TTL_SECS {
            return Err(format!(
                "push.url_ttl_secs must be between 1 and {MAX_URL_TTL_SECS}, got {}",
                self.url_ttl_secs
            ));
        }
        if self.max_concurrency == 0 {
            return Err("push.max_concurrency must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-process storage (testing and local development only).
    Memory {
        /// Base URL embedded in issued upload URLs.
        #[serde(default = "default_memory_base_url")]
        base_url: String,
    },
    /// S3-compatible storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
        /// AWS access key ID. Falls back to the ambient AWS credential chain if not set.
        /// WARNING: Prefer env vars or IAM roles over storing secrets in config files.
        access_key_id: Option<String>,
        /// AWS secret access key.
        /// WARNING: Prefer env vars or IAM roles over storing secrets in config files.
        secret_access_key: Option<String>,
        /// Force path-style URLs (`endpoint/bucket/key` instead of `bucket.endpoint/key`).
        /// Required for MinIO and some S3-compatible services.
        #[serde(default)]
        force_path_style: bool,
    },
}

fn default_memory_base_url() -> String {
    "http://memory.invalid".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Memory {
            base_url: default_memory_base_url(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                bucket,
                access_key_id,
                secret_access_key,
                ..
            } => {
                if bucket.is_empty() {
                    return Err("s3 config requires a bucket".to_string());
                }
                match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                    (Some(_), Some(_)) | (None, None) => Ok(()),
                    _ => Err(
                        "s3 config requires both access_key_id and secret_access_key when either is set"
                            .to_string(),
                    ),
                }
            }
            StorageConfig::Memory { base_url } => {
                if base_url.starts_with("http://") || base_url.starts_with("https://") {
                    Ok(())
                } else {
                    Err(format!("memory base_url must be an http(s) URL, got {base_url:?}"))
                }
            }
        }
    }
}

/// Global transfer throttle configuration.
///
/// Limits the rate at which upload capacity is handed out across all
/// concurrent pushes, counted in MiB of issued requirements.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Enable the throttle (default: false).
    #[serde(default)]
    pub enabled: bool,
    /// Sustained MiB per second of issued upload capacity.
    #[serde(default = "default_mib_per_second")]
    pub mib_per_second: u32,
    /// Burst allowance in MiB.
    #[serde(default = "default_burst_mib")]
    pub burst_mib: u32,
}

fn default_mib_per_second() -> u32 {
    1024
}

fn default_burst_mib() -> u32 {
    256
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mib_per_second: default_mib_per_second(),
            burst_mib: default_burst_mib(),
        }
    }
}

impl ThrottleConfig {
    /// Validate throttle settings. Disabled throttles are always valid.
    pub fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }
        if self.mib_per_second == 0 {
            return Err("throttle.mib_per_second must be greater than 0".to_string());
        }
        if self.burst_mib == 0 {
            return Err("throttle.burst_mib must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Push planning policy.
    #[serde(default)]
    pub push: PushConfig,
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Transfer throttle configuration.
    #[serde(default)]
    pub throttle: ThrottleConfig,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses in-memory storage.
    pub fn for_testing() -> Self {
        Self::default()
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.push.validate()?;
        self.storage.validate()?;
        self.throttle.validate()?;
        Ok(())
    }
}
