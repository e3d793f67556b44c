//! Core domain types and shared logic for the Silo registry.
//!
//! This crate defines the data model used across the other crates:
//! - Content digests and package references
//! - Manifests and their layers
//! - Multipart chunk planning
//! - Push protocol request and response types
//! - Configuration

pub mod chunk;
pub mod config;
pub mod digest;
pub mod error;
pub mod manifest;
pub mod push;
pub mod reference;

pub use chunk::{ChunkPlan, Chunks, chunks};
pub use digest::Digest;
pub use error::{Error, Result};
pub use manifest::{Blob, Layer, Manifest};
pub use push::{CompletionRecord, PushRequest, PushResponse, UploadRequirement};
pub use reference::PackageRef;

/// Default multipart part size: 50 MiB
pub const DEFAULT_CHUNK_SIZE: u64 = 50 * 1024 * 1024;

/// Smallest blob uploaded in parts, and the smallest non-final part S3 accepts: 5 MiB
pub const MIN_MULTIPART_SIZE: u64 = 5 * 1024 * 1024;

/// Highest part number S3 accepts in a multipart upload.
pub const MAX_PART_NUMBER: u32 = 10_000;
