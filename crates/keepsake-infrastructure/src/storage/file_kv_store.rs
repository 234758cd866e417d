//! Directory-backed string key/value store.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use keepsake_core::chat::KeyValueStore;
use keepsake_core::error::{KeepsakeError, Result};

use super::atomic_file::AtomicFile;

const ENTRY_EXTENSION: &str = "kv";

/// String store with one file per key under a single directory.
///
/// Mirrors browser local storage: synchronous, strings only, and bounded by
/// an optional total quota across all keys.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
    quota_bytes: Option<usize>,
}

impl FileKeyValueStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            quota_bytes: None,
        }
    }

    /// Limits the combined size of keys and values.
    pub fn with_quota(mut self, quota_bytes: usize) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }

    fn entry(&self, key: &str) -> AtomicFile {
        AtomicFile::new(
            self.dir
                .join(format!("{}.{}", file_stem(key), ENTRY_EXTENSION)),
        )
    }

    /// Bytes used by every entry except `excluded`.
    fn usage_excluding(&self, excluded: &AtomicFile) -> Result<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut total = 0usize;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path == excluded.path()
                || path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION)
            {
                continue;
            }
            let stem_len = path.file_stem().map(|s| s.len()).unwrap_or(0);
            total += stem_len + entry.metadata()?.len() as usize;
        }
        Ok(total)
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entry(key).read_to_string()?)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let entry = self.entry(key);

        if let Some(limit) = self.quota_bytes {
            let needed = self.usage_excluding(&entry)? + key.len() + value.len();
            if needed > limit {
                return Err(KeepsakeError::QuotaExceeded { needed, limit });
            }
        }

        Ok(entry.write(value.as_bytes())?)
    }

    fn remove(&self, key: &str) -> Result<()> {
        Ok(self.entry(key).remove()?)
    }
}

/// Maps an arbitrary key onto a safe file stem.
fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
