//! The push round: validate, reconcile, plan, commit.

use super::authorize::UploadAuthorizer;
use super::existence::blob_exists;
use super::reconcile::reconcile_completions;
use super::store_slot;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::throttle::TransferThrottle;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt, stream};
use silo_core::config::PushConfig;
use silo_core::{Blob, Manifest, PackageRef, PushRequest, PushResponse, UploadRequirement};
use silo_storage::ObjectStore;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::instrument;

/// Decode a push request body.
pub fn decode_request(body: &[u8]) -> ApiResult<PushRequest> {
    if body.is_empty() {
        return Err(ApiError::missing("body"));
    }
    serde_json::from_slice(body).map_err(|e| ApiError::invalid("body", None, e.to_string()))
}

/// A push round after input validation.
struct ValidatedPush<'a> {
    reference: PackageRef,
    manifest_bytes: &'a [u8],
    blobs: Vec<Blob>,
}

/// Drives one push round against the store.
///
/// Holds no state between rounds: everything a round needs is in the request
/// or in the store, so any replica can serve any round of a push.
#[derive(Clone)]
pub struct PushCoordinator {
    store: Arc<dyn ObjectStore>,
    policy: PushConfig,
    authorizer: UploadAuthorizer,
}

impl PushCoordinator {
    pub fn new(store: Arc<dyn ObjectStore>, policy: PushConfig, throttle: TransferThrottle) -> Self {
        let authorizer = UploadAuthorizer::new(store.clone(), policy.clone(), throttle);
        Self {
            store,
            policy,
            authorizer,
        }
    }

    /// Run one push round.
    ///
    /// Returns either the uploads still outstanding (nothing committed) or an
    /// empty list with the manifest committed.
    #[instrument(skip_all, fields(reference = %request.reference, completions = request.completions.len()))]
    pub async fn push(&self, request: &PushRequest) -> ApiResult<PushResponse> {
        let push = Self::validate(request)?;
        tracing::debug!(layers = push.blobs.len(), "push validated");

        // Completions first, so blobs finished this round count as present.
        let completed =
            reconcile_completions(self.store.as_ref(), &request.completions, self.concurrency())
                .await?;
        if completed > 0 {
            tracing::info!(sessions = completed, "multipart uploads completed");
        }

        let requirements = self.plan(push.blobs).await?;
        if !requirements.is_empty() {
            tracing::info!(requirements = requirements.len(), "push awaiting uploads");
            return Ok(PushResponse::awaiting(requirements));
        }

        let key = push.reference.to_manifest_key();
        self.store
            .put(&key, Bytes::copy_from_slice(push.manifest_bytes))
            .await?;
        metrics::MANIFESTS_COMMITTED.inc();
        tracing::info!(key = %key, "manifest committed");

        Ok(PushResponse::committed())
    }

    fn validate(request: &PushRequest) -> ApiResult<ValidatedPush<'_>> {
        let invalid_ref = |e: silo_core::Error| {
            ApiError::invalid("ref", Some(&request.reference), e.to_string())
        };
        let reference = PackageRef::parse(&request.reference).map_err(invalid_ref)?;
        reference.require_complete().map_err(invalid_ref)?;

        let manifest_bytes = request.manifest_bytes();
        let manifest = Manifest::from_slice(manifest_bytes)
            .map_err(|e| ApiError::invalid("manifest", None, e.to_string()))?;
        let blobs = manifest.blobs()?;

        Ok(ValidatedPush {
            reference,
            manifest_bytes,
            blobs,
        })
    }

    /// Check every non-empty blob and issue uploads for the missing ones.
    async fn plan(&self, blobs: Vec<Blob>) -> ApiResult<Vec<UploadRequirement>> {
        let slots = Semaphore::new(self.concurrency());
        let slots = &slots;

        let per_blob: Vec<Vec<UploadRequirement>> = stream::iter(blobs)
            .filter(|blob| std::future::ready(!blob.is_empty()))
            .map(|blob| async move {
                let exists = {
                    let _slot = store_slot(slots).await?;
                    blob_exists(self.store.as_ref(), &blob.digest).await?
                };
                if exists {
                    metrics::BLOBS_DEDUPLICATED.inc();
                    return Ok(Vec::new());
                }
                let requirements = self.authorizer.authorize(&blob, slots).await?;
                metrics::BLOBS_REQUIRED.inc();
                Ok::<_, ApiError>(requirements)
            })
            .buffer_unordered(self.concurrency())
            .try_collect()
            .await?;

        let mut requirements: Vec<UploadRequirement> = per_blob.into_iter().flatten().collect();
        requirements.sort_by(|a, b| {
            a.digest
                .as_str()
                .cmp(b.digest.as_str())
                .then(a.offset.cmp(&b.offset))
        });
        Ok(requirements)
    }

    fn concurrency(&self) -> usize {
        self.policy.max_concurrency.max(1)
    }
}
