//! Store wrapper that records calls and can inject failures.

use async_trait::async_trait;
use bytes::Bytes;
use silo_storage::{CompletedPart, MemoryBackend, ObjectStore, StorageError, StorageResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use url::Url;

/// Per-operation call counts.
#[derive(Debug, Default)]
pub struct CallCounts {
    pub exists: AtomicUsize,
    pub put: AtomicUsize,
    pub presign_put: AtomicUsize,
    pub create_multipart: AtomicUsize,
    pub presign_upload_part: AtomicUsize,
    pub complete_multipart: AtomicUsize,
}

/// Wraps a [`MemoryBackend`], counting every trait call.
#[derive(Debug)]
pub struct CountingStore {
    inner: Arc<MemoryBackend>,
    pub calls: CallCounts,
    /// Make every presign fail with a transport error.
    pub fail_presign: AtomicBool,
    /// Delay each existence check by this many milliseconds.
    pub exists_delay_ms: AtomicU64,
    /// Delay every other store call by this many milliseconds.
    pub call_delay_ms: AtomicU64,
    /// Make every existence check fail with a transport error.
    pub fail_exists: AtomicBool,
    /// Make every existence check report the store's not-found error.
    pub exists_not_found: AtomicBool,
    /// Make every multipart completion fail with a transport error.
    pub fail_complete: AtomicBool,
    in_flight: AtomicUsize,
    /// Most store calls ever in flight at once.
    pub peak_in_flight: AtomicUsize,
}

/// Counts a call as in flight until dropped.
struct InFlight<'a>(&'a CountingStore);

impl<'a> InFlight<'a> {
    fn enter(store: &'a CountingStore) -> Self {
        let now = store.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        store.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(store)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[allow(dead_code)]
impl CountingStore {
    pub fn new(inner: Arc<MemoryBackend>) -> Self {
        Self {
            inner,
            calls: CallCounts::default(),
            fail_presign: AtomicBool::new(false),
            exists_delay_ms: AtomicU64::new(0),
            call_delay_ms: AtomicU64::new(0),
            fail_exists: AtomicBool::new(false),
            exists_not_found: AtomicBool::new(false),
            fail_complete: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn injected(flag: &AtomicBool, what: &str) -> StorageResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other(format!(
                "injected {what} failure"
            ))));
        }
        Ok(())
    }

    async fn delay(millis: &AtomicU64) {
        let delay = millis.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
}

#[async_trait]
impl ObjectStore for CountingStore {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.calls.exists.fetch_add(1, Ordering::SeqCst);
        let _gauge = InFlight::enter(self);
        Self::delay(&self.exists_delay_ms).await;
        Self::injected(&self.fail_exists, "exists")?;
        if self.exists_not_found.load(Ordering::SeqCst) {
            return Err(StorageError::NotFound(key.to_string()));
        }
        self.inner.exists(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.calls.put.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, data).await
    }

    async fn presign_put(&self, key: &str, expires_in: Duration) -> StorageResult<Url> {
        self.calls.presign_put.fetch_add(1, Ordering::SeqCst);
        let _gauge = InFlight::enter(self);
        Self::delay(&self.call_delay_ms).await;
        Self::injected(&self.fail_presign, "presign")?;
        self.inner.presign_put(key, expires_in).await
    }

    async fn create_multipart(&self, key: &str) -> StorageResult<String> {
        self.calls.create_multipart.fetch_add(1, Ordering::SeqCst);
        let _gauge = InFlight::enter(self);
        Self::delay(&self.call_delay_ms).await;
        self.inner.create_multipart(key).await
    }

    async fn presign_upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        expires_in: Duration,
    ) -> StorageResult<Url> {
        self.calls.presign_upload_part.fetch_add(1, Ordering::SeqCst);
        let _gauge = InFlight::enter(self);
        Self::delay(&self.call_delay_ms).await;
        Self::injected(&self.fail_presign, "presign")?;
        self.inner
            .presign_upload_part(key, upload_id, part_number, expires_in)
            .await
    }

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StorageResult<()> {
        self.calls.complete_multipart.fetch_add(1, Ordering::SeqCst);
        let _gauge = InFlight::enter(self);
        Self::delay(&self.call_delay_ms).await;
        Self::injected(&self.fail_complete, "complete")?;
        self.inner.complete_multipart(key, upload_id, parts).await
    }

    fn key_from_url(&self, url: &Url) -> StorageResult<String> {
        self.inner.key_from_url(url)
    }

    fn backend_name(&self) -> &'static str {
        "counting"
    }
}
