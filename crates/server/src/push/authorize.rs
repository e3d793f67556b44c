//! Upload URL issuance for missing blobs.

use super::store_slot;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::throttle::TransferThrottle;
use futures::{StreamExt, TryStreamExt, stream};
use silo_core::config::PushConfig;
use silo_core::{Blob, MAX_PART_NUMBER, UploadRequirement, chunks};
use silo_storage::ObjectStore;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::instrument;

/// Turns a missing blob into the uploads a client must perform.
#[derive(Clone)]
pub struct UploadAuthorizer {
    store: Arc<dyn ObjectStore>,
    policy: PushConfig,
    throttle: TransferThrottle,
}

impl UploadAuthorizer {
    pub fn new(store: Arc<dyn ObjectStore>, policy: PushConfig, throttle: TransferThrottle) -> Self {
        Self {
            store,
            policy,
            throttle,
        }
    }

    /// Issue the requirements for one missing, non-empty blob.
    ///
    /// Small blobs get one whole-object URL. Anything at or above the
    /// multipart floor gets a fresh multipart session and one URL per part.
    /// Each store call holds a permit from `slots`, which the caller shares
    /// across the whole round.
    #[instrument(skip(self, blob, slots), fields(digest = %blob.digest, size = blob.size))]
    pub async fn authorize(
        &self,
        blob: &Blob,
        slots: &Semaphore,
    ) -> ApiResult<Vec<UploadRequirement>> {
        let key = blob.digest.to_object_key();

        if blob.size < self.policy.min_multipart_size {
            self.throttle.admit(blob.size).await;
            let url = {
                let _slot = store_slot(slots).await?;
                self.store.presign_put(&key, self.policy.url_ttl()).await?
            };
            return Ok(vec![UploadRequirement {
                digest: blob.digest.clone(),
                offset: 0,
                size: blob.size,
                url: url.into(),
            }]);
        }

        let plan = chunks(blob.size, self.policy.chunk_size);
        if plan.len() > MAX_PART_NUMBER as usize {
            return Err(ApiError::invalid(
                "manifest.layers",
                Some(blob.digest.as_str()),
                format!(
                    "a blob of {} bytes needs {} parts of {} bytes, more than the {MAX_PART_NUMBER} allowed",
                    blob.size,
                    plan.len(),
                    self.policy.chunk_size
                ),
            ));
        }

        let upload_id = {
            let _slot = store_slot(slots).await?;
            self.store.create_multipart(&key).await?
        };
        metrics::MULTIPART_SESSIONS_OPENED.inc();
        tracing::debug!(upload_id = %upload_id, parts = plan.len(), "multipart session opened");

        let key = key.as_str();
        let upload_id = upload_id.as_str();
        stream::iter(plan)
            .map(|part| async move {
                self.throttle.admit(part.len).await;
                let _slot = store_slot(slots).await?;
                let url = self
                    .store
                    .presign_upload_part(key, upload_id, part.part_number, self.policy.url_ttl())
                    .await?;
                Ok::<_, ApiError>(UploadRequirement {
                    digest: blob.digest.clone(),
                    offset: part.offset,
                    size: part.len,
                    url: url.into(),
                })
            })
            .buffered(self.policy.max_concurrency.max(1))
            .try_collect()
            .await
    }
}
