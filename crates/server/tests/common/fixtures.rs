//! Test fixtures for generating test data.

use bytes::Bytes;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

pub const MIB: u64 = 1024 * 1024;

/// A complete reference every test can push to.
pub const REF: &str = "registry.test/library/app:1.0";

/// Manifest key [`REF`] commits to.
pub const MANIFEST_KEY: &str = "manifests/registry.test/library/app/1.0";

/// Generate deterministic test data based on a seed.
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    for chunk in data.chunks_mut(8) {
        // Simple LCG for deterministic data
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

/// `sha256:<hex>` digest of `data`.
pub fn digest_of(data: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(data)))
}

/// A manifest with one layer per `(digest, size)`.
#[allow(dead_code)]
pub fn manifest(layers: &[(&str, u64)]) -> Value {
    let layers: Vec<Value> = layers
        .iter()
        .map(|(digest, size)| {
            json!({
                "mediaType": "application/octet-stream",
                "digest": digest,
                "size": size,
            })
        })
        .collect();
    json!({ "schemaVersion": 2, "layers": layers })
}

/// A push body for [`REF`].
#[allow(dead_code)]
pub fn push_body(manifest: Value, completions: Vec<Value>) -> Value {
    json!({ "ref": REF, "manifest": manifest, "part_uploads": completions })
}
