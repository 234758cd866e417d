//! Directory-backed binary blob store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use keepsake_core::chat::{BlobRecord, BlobStore, PendingFile};
use keepsake_core::error::{KeepsakeError, Result};
use serde::{Deserialize, Serialize};
use tokio::task;

use super::atomic_file::AtomicFile;

/// Database directory name.
pub const BLOB_DATABASE: &str = "chatProfileFileDB";

/// Object store directory name inside the database.
pub const BLOB_OBJECT_STORE: &str = "files";

/// Metadata written next to each blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlobMetaDto {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    mime_type: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    last_modified: i64,
    #[serde(default)]
    saved_at: i64,
}

/// Binary store laid out as one object store directory.
///
/// Directory structure:
/// ```text
/// base_dir/
/// └── chatProfileFileDB/
///     └── files/
///         ├── profile.bin    # raw bytes
///         └── profile.json   # {name, type, size, lastModified, savedAt}
/// ```
///
/// A record exists only when both files are present and the metadata size
/// matches the content. A write first retires the old metadata, then
/// writes content and finally the new metadata, so a crash part way through
/// leaves no record rather than old metadata paired with new bytes.
#[derive(Debug, Clone)]
pub struct DirBlobStore {
    root: PathBuf,
}

impl DirBlobStore {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            root: base_dir
                .as_ref()
                .join(BLOB_DATABASE)
                .join(BLOB_OBJECT_STORE),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn files(&self, key: &str) -> (AtomicFile, AtomicFile) {
        (
            AtomicFile::new(self.root.join(format!("{}.bin", key))),
            AtomicFile::new(self.root.join(format!("{}.json", key))),
        )
    }

    fn put_sync(content: AtomicFile, meta: AtomicFile, record: BlobRecord) -> Result<()> {
        let dto = BlobMetaDto {
            name: record.file.meta.name.clone(),
            mime_type: record.file.meta.mime_type.clone(),
            size: record.file.bytes.len() as u64,
            last_modified: record.file.meta.last_modified,
            saved_at: record.saved_at,
        };
        let meta_json = serde_json::to_vec_pretty(&dto)?;

        meta.remove()?;
        content.write(&record.file.bytes)?;
        meta.write(&meta_json)?;
        Ok(())
    }

    fn get_sync(content: AtomicFile, meta: AtomicFile) -> Result<Option<BlobRecord>> {
        let Some(meta_json) = meta.read()? else {
            return Ok(None);
        };
        let Some(bytes) = content.read()? else {
            return Ok(None);
        };

        let dto: BlobMetaDto = serde_json::from_slice(&meta_json)?;
        if dto.size != bytes.len() as u64 {
            tracing::warn!(
                "[DirBlobStore] Size mismatch for {} ({} != {}), ignoring record",
                content.path().display(),
                dto.size,
                bytes.len()
            );
            return Ok(None);
        }
        Ok(Some(BlobRecord {
            file: PendingFile::new(dto.name, dto.mime_type, dto.last_modified, bytes),
            saved_at: dto.saved_at,
        }))
    }

    fn delete_sync(content: AtomicFile, meta: AtomicFile) -> Result<()> {
        meta.remove()?;
        content.remove()?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for DirBlobStore {
    async fn put(&self, key: &str, record: &BlobRecord) -> Result<()> {
        let (content, meta) = self.files(key);
        let record = record.clone();

        task::spawn_blocking(move || Self::put_sync(content, meta, record))
            .await
            .map_err(|e| KeepsakeError::io(format!("Failed to spawn blocking task: {}", e)))?
    }

    async fn get(&self, key: &str) -> Result<Option<BlobRecord>> {
        let (content, meta) = self.files(key);

        task::spawn_blocking(move || Self::get_sync(content, meta))
            .await
            .map_err(|e| KeepsakeError::io(format!("Failed to spawn blocking task: {}", e)))?
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let (content, meta) = self.files(key);

        task::spawn_blocking(move || Self::delete_sync(content, meta))
            .await
            .map_err(|e| KeepsakeError::io(format!("Failed to spawn blocking task: {}", e)))?
    }
}
