//! Best-effort persistence of the pending attachment.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use keepsake_core::chat::{BlobRecord, BlobStore, FileRepository, PendingFile};

/// Record key of the single attachment slot.
pub const PROFILE_RECORD_KEY: &str = "profile";

/// `FileRepository` holding exactly one attachment in a [`BlobStore`].
///
/// Errors are logged and swallowed. Losing the attachment only means the
/// user is asked to pick the file again.
#[derive(Clone)]
pub struct DurableFileStore {
    store: Arc<dyn BlobStore>,
}

impl DurableFileStore {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl FileRepository for DurableFileStore {
    async fn put(&self, file: &PendingFile) {
        let record = BlobRecord {
            file: file.clone(),
            saved_at: Utc::now().timestamp_millis(),
        };

        match self.store.put(PROFILE_RECORD_KEY, &record).await {
            Ok(()) => tracing::debug!(
                "[DurableFileStore] Stored '{}' ({} bytes)",
                file.name(),
                file.bytes.len()
            ),
            Err(e) => tracing::warn!("[DurableFileStore] Failed to store attachment: {}", e),
        }
    }

    async fn get(&self) -> Option<PendingFile> {
        match self.store.get(PROFILE_RECORD_KEY).await {
            Ok(record) => record.map(|record| record.file),
            Err(e) => {
                tracing::warn!("[DurableFileStore] Failed to read attachment: {}", e);
                None
            }
        }
    }

    async fn delete(&self) {
        if let Err(e) = self.store.delete(PROFILE_RECORD_KEY).await {
            tracing::warn!("[DurableFileStore] Failed to delete attachment: {}", e);
        }
    }
}
