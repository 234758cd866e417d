//! Pending attachment and the submission payload.

use serde::{Deserialize, Serialize};

use super::progress::{CollectedAnswers, FileMeta};

/// The single binary attachment waiting to be submitted.
#[derive(Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub meta: FileMeta,
    pub bytes: Vec<u8>,
}

impl PendingFile {
    /// Builds a pending file, deriving `byte_size` from the content.
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        last_modified: i64,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            meta: FileMeta {
                name: name.into(),
                mime_type: mime_type.into(),
                byte_size: bytes.len() as u64,
                last_modified,
            },
            bytes,
        }
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }
}

impl std::fmt::Debug for PendingFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingFile")
            .field("meta", &self.meta)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

/// Multipart body for `POST /api/chat/submit`.
///
/// Built only at submission time and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionPayload {
    pub name: String,
    pub birth_start: String,
    /// Free-text answers joined with a blank line.
    pub prompts: String,
    pub profile: PendingFile,
    /// Sent as `Idempotency-Key` when present.
    pub idempotency_key: Option<String>,
}

impl SubmissionPayload {
    pub fn build(
        answers: &CollectedAnswers,
        profile: PendingFile,
        idempotency_key: Option<String>,
    ) -> Self {
        Self {
            name: answers.name.clone(),
            birth_start: answers.birth_date.clone(),
            prompts: answers.joined_freeform(),
            profile,
            idempotency_key,
        }
    }
}

/// Backend acknowledgement of a successful submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmitAck {
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}
