//! Blob deduplication against the store.

use silo_core::Digest;
use silo_storage::{ObjectStore, StorageError, StorageResult};
use tracing::instrument;

/// Whether the blob for `digest` is already stored at its canonical key.
///
/// A store "not found" is a plain `false`; every other failure propagates.
#[instrument(skip(store), fields(digest = %digest))]
pub async fn blob_exists(store: &dyn ObjectStore, digest: &Digest) -> StorageResult<bool> {
    match store.exists(&digest.to_object_key()).await {
        Ok(found) => Ok(found),
        Err(StorageError::NotFound(_)) => Ok(false),
        Err(e) => Err(e),
    }
}
