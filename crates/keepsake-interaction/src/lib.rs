//! Backend access for the onboarding conversation.

pub mod memorial_api_client;

pub use memorial_api_client::MemorialApiClient;
