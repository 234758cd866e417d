pub mod config_service;
pub mod durable_file_store;
pub mod paths;
pub mod progress_store;
pub mod storage;

pub use crate::config_service::{AppConfig, ConfigService};
pub use crate::durable_file_store::DurableFileStore;
pub use crate::paths::KeepsakePaths;
pub use crate::progress_store::ProgressStore;
