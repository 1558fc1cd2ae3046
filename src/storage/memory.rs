use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::{BlobError, BlobStore};

const BASE_URL: &str = "https://blobs.local";

/// In-memory object store. Presigned URLs are fake but deterministic, and
/// deletes are recorded so callers can assert on them.
#[derive(Default)]
pub struct MemoryBlobStore {
    deleted: RwLock<Vec<String>>,
    fail_deletes: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys deleted so far, in call order
    pub async fn deleted_keys(&self) -> Vec<String> {
        self.deleted.read().await.clone()
    }

    /// Make subsequent deletes fail with an upstream error
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn presign_put(&self, key: &str, content_type: &str) -> Result<String, BlobError> {
        Ok(format!("{}/{}?method=PUT&content-type={}", BASE_URL, key, content_type))
    }

    async fn presign_get(&self, key: &str) -> Result<String, BlobError> {
        Ok(format!("{}/{}?method=GET", BASE_URL, key))
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BlobError::Upstream(format!("delete of {} refused", key)));
        }
        self.deleted.write().await.push(key.to_string());
        Ok(())
    }
}
