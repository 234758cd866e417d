//! Storage interfaces used by the onboarding flow.
//!
//! Two layers are defined. The raw stores (`KeyValueStore`, `BlobStore`)
//! report every failure. The repositories (`ProgressRepository`,
//! `FileRepository`) are what the session talks to; they are best-effort
//! and never fail, because losing persisted progress must not stop an
//! in-memory session.

use async_trait::async_trait;

use crate::error::Result;

use super::progress::PersistedProgress;
use super::submission::PendingFile;

/// Synchronous, string-only, size-limited key/value store scoped to one
/// installation.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// A stored binary record together with its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRecord {
    pub file: PendingFile,
    /// Milliseconds since the Unix epoch.
    pub saved_at: i64,
}

/// Asynchronous store able to hold binary blobs under fixed keys.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, record: &BlobRecord) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<BlobRecord>>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Best-effort persistence of the conversation snapshot.
pub trait ProgressRepository: Send + Sync {
    /// Returns the stored snapshot, or `None` when it is missing or invalid.
    fn load(&self) -> Option<PersistedProgress>;

    /// Overwrites the stored snapshot. Failures are ignored.
    fn save(&self, progress: &PersistedProgress);

    /// Removes the stored snapshot. Failures are ignored.
    fn clear(&self);
}

/// Best-effort persistence of the single pending attachment.
#[async_trait]
pub trait FileRepository: Send + Sync {
    /// Stores `file`, replacing any previous one. Failures are ignored.
    async fn put(&self, file: &PendingFile);

    /// Returns the stored file, or `None` when missing or unreadable.
    async fn get(&self) -> Option<PendingFile>;

    /// Removes the stored file. Failures are ignored.
    async fn delete(&self);
}
