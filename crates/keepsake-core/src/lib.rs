//! Domain layer for the Keepsake onboarding conversation.
//!
//! Nothing in this crate performs I/O. Storage and network access are
//! expressed as traits and implemented by the infrastructure and
//! interaction crates.

pub mod auth;
pub mod chat;
pub mod error;

// Re-export common error type
pub use error::KeepsakeError;
