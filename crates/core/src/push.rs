//! Push protocol wire types.

use crate::digest::Digest;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Body of `POST /v1/push`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PushRequest {
    /// Package reference, e.g. `registry.example/library/app:1.0`.
    #[serde(rename = "ref")]
    pub reference: String,
    /// The manifest exactly as the client wants it stored.
    pub manifest: Box<RawValue>,
    /// Proof of parts uploaded since the previous round.
    #[serde(default, rename = "part_uploads")]
    pub completions: Vec<CompletionRecord>,
}

impl PushRequest {
    /// The manifest's raw bytes, which are what gets committed.
    pub fn manifest_bytes(&self) -> &[u8] {
        self.manifest.get().as_bytes()
    }
}

/// A client report that one presigned PUT succeeded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    /// The URL from the requirement that was uploaded.
    pub url: String,
    /// ETag returned by the store for that PUT.
    #[serde(default)]
    pub etag: String,
}

/// A single upload the client must perform: PUT `size` bytes starting at
/// `offset` of the blob to `url`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRequirement {
    pub digest: Digest,
    pub offset: u64,
    pub size: u64,
    pub url: String,
}

/// Response to `POST /v1/push`.
///
/// Either `requirements` is non-empty and nothing was committed, or it is
/// empty and the manifest was committed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResponse {
    pub requirements: Vec<UploadRequirement>,
    pub committed: bool,
}

impl PushResponse {
    /// Response for a round that still needs uploads.
    pub fn awaiting(requirements: Vec<UploadRequirement>) -> Self {
        Self {
            requirements,
            committed: false,
        }
    }

    /// Response for a round that committed the manifest.
    pub fn committed() -> Self {
        Self {
            requirements: Vec::new(),
            committed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_request_keeps_manifest_bytes() {
        let body = br#"{"ref":"h/n/m:t","manifest":{"layers": [ ],"z":1}}"#;
        let req: PushRequest = serde_json::from_slice(body).unwrap();
        assert_eq!(req.reference, "h/n/m:t");
        assert_eq!(req.manifest_bytes(), br#"{"layers": [ ],"z":1}"#);
        assert!(req.completions.is_empty());
    }

    #[test]
    fn test_completion_record_etag_defaults_empty() {
        let body = br#"{"ref":"h/n/m:t","manifest":{},"part_uploads":[{"url":"http://x/y"}]}"#;
        let req: PushRequest = serde_json::from_slice(body).unwrap();
        assert_eq!(req.completions.len(), 1);
        assert_eq!(req.completions[0].etag, "");
    }

    #[test]
    fn test_push_response_shape() {
        let resp = PushResponse::committed();
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json, serde_json::json!({"requirements": [], "committed": true}));
    }
}
