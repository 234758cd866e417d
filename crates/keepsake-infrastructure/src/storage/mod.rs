//! Raw storage backends.
//!
//! - `atomic_file`: all-or-nothing file replacement with locking
//! - `file_kv_store`: string store with one file per key
//! - `dir_blob_store`: binary store with a content file and a metadata file
//! - `memory`: in-memory twins of both stores

pub mod atomic_file;
pub mod dir_blob_store;
pub mod file_kv_store;
pub mod memory;

pub use atomic_file::{AtomicFile, AtomicFileError};
pub use dir_blob_store::DirBlobStore;
pub use file_kv_store::FileKeyValueStore;
pub use memory::{MemoryBlobStore, MemoryKeyValueStore};
