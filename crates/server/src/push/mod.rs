//! The push protocol.
//!
//! A push is a sequence of stateless rounds. Each round reconciles the
//! multipart uploads the client reports as finished, checks which layers the
//! store still lacks, and either hands back upload URLs for those or commits
//! the manifest.

pub mod authorize;
pub mod coordinator;
pub mod existence;
pub mod reconcile;

use crate::error::{ApiError, ApiResult};
use tokio::sync::{Semaphore, SemaphorePermit};

pub use authorize::UploadAuthorizer;
pub use coordinator::{PushCoordinator, decode_request};
pub use existence::blob_exists;
pub use reconcile::{PartLocator, SessionParts, group_completions, reconcile_completions};

/// Take one of a round's store-call slots.
///
/// Every store call made while planning a round holds a permit, so the
/// round never has more than `push.max_concurrency` calls in flight.
pub(crate) async fn store_slot(slots: &Semaphore) -> ApiResult<SemaphorePermit<'_>> {
    slots
        .acquire()
        .await
        .map_err(|_| ApiError::Internal("store call slots closed".to_string()))
}
