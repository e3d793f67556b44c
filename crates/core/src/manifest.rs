//! Manifest types.

use crate::digest::Digest;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// One content-addressed blob referenced by a manifest, as the client wrote it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Layer {
    /// Content address of the blob. Validated by [`Manifest::blobs`].
    pub digest: String,
    /// Size in bytes.
    pub size: u64,
    /// Media type and any other fields, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A decoded package manifest.
///
/// Only `layers` is interpreted. Everything else is opaque metadata, and the
/// bytes that get stored are always the caller's original bytes, never a
/// re-serialization of this struct.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub layers: Vec<Layer>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A validated, deduplicated layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    pub digest: Digest,
    pub size: u64,
}

impl Blob {
    /// Zero-length blobs never need an upload.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

impl Manifest {
    /// Decode a manifest from the raw bytes supplied by the caller.
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// Validate every layer digest and return the distinct blobs in manifest
    /// order. When a digest repeats, its first occurrence wins.
    pub fn blobs(&self) -> crate::Result<Vec<Blob>> {
        let mut seen = HashSet::with_capacity(self.layers.len());
        let mut blobs = Vec::with_capacity(self.layers.len());

        for (index, layer) in self.layers.iter().enumerate() {
            let digest =
                Digest::parse(&layer.digest).map_err(|e| crate::Error::InvalidLayer {
                    index,
                    digest: layer.digest.clone(),
                    reason: e.to_string(),
                })?;
            if seen.insert(digest.clone()) {
                blobs.push(Blob {
                    digest,
                    size: layer.size,
                });
            }
        }

        Ok(blobs)
    }
}
