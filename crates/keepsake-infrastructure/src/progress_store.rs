//! Best-effort snapshot persistence over a string store.

use std::sync::Arc;

use keepsake_core::chat::{KeyValueStore, PROGRESS_STORAGE_KEY, PersistedProgress, ProgressRepository};

/// `ProgressRepository` backed by any [`KeyValueStore`].
///
/// Every failure is logged and swallowed: a missing, unreadable or
/// outdated entry loads as `None`, and a failed write leaves the session
/// running in memory only.
#[derive(Clone)]
pub struct ProgressStore {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl ProgressStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            key: PROGRESS_STORAGE_KEY.to_string(),
        }
    }
}

impl ProgressRepository for ProgressStore {
    fn load(&self) -> Option<PersistedProgress> {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("[ProgressStore] Failed to read snapshot: {}", e);
                return None;
            }
        };

        let decoded = PersistedProgress::decode(&raw);
        if decoded.is_none() {
            tracing::warn!("[ProgressStore] Discarding invalid or outdated snapshot");
        }
        decoded
    }

    fn save(&self, progress: &PersistedProgress) {
        let json = match progress.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("[ProgressStore] Failed to encode snapshot: {}", e);
                return;
            }
        };

        if let Err(e) = self.store.set(&self.key, &json) {
            tracing::warn!("[ProgressStore] Failed to save snapshot: {}", e);
        }
    }

    fn clear(&self) {
        if let Err(e) = self.store.remove(&self.key) {
            tracing::warn!("[ProgressStore] Failed to clear snapshot: {}", e);
        }
    }
}
