//! Conversation message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single entry in the onboarding transcript.
///
/// Messages are immutable once created and the transcript is append-only
/// while a session is active. The timestamp serializes as RFC 3339
/// (ISO 8601) and is parsed back into a native `DateTime` on restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    /// Unique message identifier.
    pub id: String,
    /// Message body.
    pub text: String,
    /// True for user echoes, false for prompts and notices.
    pub is_from_user: bool,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    /// Creates a message authored by the assistant (prompt or notice).
    pub fn bot(text: impl Into<String>) -> Self {
        Self::new(text, false)
    }

    /// Creates a message echoing what the user entered.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(text, true)
    }

    fn new(text: impl Into<String>, is_from_user: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            is_from_user,
            timestamp: Utc::now(),
        }
    }
}
