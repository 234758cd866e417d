//! Backend capabilities consumed by the onboarding flow.

use async_trait::async_trait;

use crate::error::Result;

use super::submission::{SubmissionPayload, SubmitAck};

/// The backend REST API as seen by the chat flow.
///
/// Implementations perform exactly one HTTP request per call and convert
/// transport failures, non-2xx statuses and backend-reported failures into
/// [`crate::error::KeepsakeError`].
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// `GET /api/chat/questions`, flattened into the ordered prompt list.
    async fn fetch_questions(&self) -> Result<Vec<String>>;

    /// `POST /api/chat/submit` with a bearer credential.
    async fn submit_chat(&self, access_token: &str, payload: &SubmissionPayload) -> Result<SubmitAck>;

    /// `GET /api/memorial/view`: whether the user already owns a memorial.
    async fn has_memorial(&self, access_token: &str) -> Result<bool>;
}
