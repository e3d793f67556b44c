//! Content digests.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Namespace under which blobs are stored.
pub const BLOB_PREFIX: &str = "blobs";

/// A content address of the form `<algorithm>:<encoded>`, e.g. `sha256:9f86d0…`.
///
/// The digest is used verbatim as the last component of a storage key, so
/// parsing rejects anything that could escape the blob namespace.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    /// Parse and validate a digest string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let (algorithm, encoded) = s
            .split_once(':')
            .ok_or_else(|| crate::Error::InvalidDigest(format!("missing algorithm in {s:?}")))?;

        if algorithm.is_empty() {
            return Err(crate::Error::InvalidDigest(format!(
                "empty algorithm in {s:?}"
            )));
        }
        let algorithm_ok = algorithm
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '.' | '_' | '-'));
        let starts_ok = algorithm
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric());
        if !algorithm_ok || !starts_ok {
            return Err(crate::Error::InvalidDigest(format!(
                "invalid algorithm {algorithm:?}"
            )));
        }

        if encoded.is_empty() || !encoded.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(crate::Error::InvalidDigest(format!(
                "encoded portion must be non-empty alphanumeric in {s:?}"
            )));
        }

        Ok(Self(s.to_string()))
    }

    /// Get the digest string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The algorithm portion (before the colon).
    pub fn algorithm(&self) -> &str {
        self.0.split_once(':').map(|(a, _)| a).unwrap_or_default()
    }

    /// Get the object store key for the blob with this digest.
    pub fn to_object_key(&self) -> String {
        format!("{BLOB_PREFIX}/{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Digest::parse(&s).map_err(serde::de::Error::custom)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
