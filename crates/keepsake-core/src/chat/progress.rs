//! Persisted conversation snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::message::ConversationMessage;

/// Schema version written into every snapshot.
///
/// A snapshot carrying any other version is discarded wholesale.
pub const PROGRESS_SCHEMA_VERSION: u32 = 2;

/// Key under which the snapshot lives in the string store.
pub const PROGRESS_STORAGE_KEY: &str = "chatProgressV2";

/// Separator placed between free-text answers in the submitted payload.
pub const ANSWER_SEPARATOR: &str = "\n\n";

/// Metadata of the pending profile attachment.
///
/// Kept in the snapshot so a reload knows a file should be restored from
/// the durable file store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub name: String,
    pub mime_type: String,
    pub byte_size: u64,
    /// Milliseconds since the Unix epoch.
    pub last_modified: i64,
}

/// Answers collected so far, one typed field per input kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedAnswers {
    pub name: String,
    pub birth_date: String,
    pub freeform: Vec<String>,
}

impl CollectedAnswers {
    /// Free-text answers joined with a blank line.
    pub fn joined_freeform(&self) -> String {
        self.freeform.join(ANSWER_SEPARATOR)
    }
}

/// Versioned snapshot of an onboarding session.
///
/// Written after every transition and read once when a session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedProgress {
    pub version: u32,
    pub messages: Vec<ConversationMessage>,
    /// Negative, fractional or null values are read leniently; the index is
    /// clamped to the question count on restore.
    #[serde(default, deserialize_with = "lenient_index")]
    pub current_step_index: usize,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_complete: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub collected_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub collected_birth_date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub collected_freeform_answers: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub submit_pending: bool,
    #[serde(default)]
    pub file_meta: Option<FileMeta>,
    /// Idempotency key of the answer set being submitted, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_key: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub saved_at: DateTime<Utc>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Reads any JSON value as a step index. Anything that is not a positive
/// number becomes 0.
fn lenient_index<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let index = match Value::deserialize(deserializer)? {
        Value::Number(n) => match n.as_u64() {
            Some(v) => usize::try_from(v).unwrap_or(usize::MAX),
            None => n.as_f64().filter(|v| *v > 0.0).map_or(0, |v| v as usize),
        },
        _ => 0,
    };
    Ok(index)
}

impl PersistedProgress {
    /// Answers stored in the snapshot.
    pub fn answers(&self) -> CollectedAnswers {
        CollectedAnswers {
            name: self.collected_name.clone(),
            birth_date: self.collected_birth_date.clone(),
            freeform: self.collected_freeform_answers.clone(),
        }
    }

    /// Serializes the snapshot for the string store.
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes a raw stored entry, rejecting anything that is not a valid
    /// snapshot of the current schema.
    ///
    /// Returns `None` when the text is not JSON, the version differs from
    /// [`PROGRESS_SCHEMA_VERSION`], `messages` is not an array, or the
    /// remaining fields do not deserialize. Never panics.
    pub fn decode(raw: &str) -> Option<Self> {
        if raw.trim().is_empty() {
            return None;
        }

        let value: Value = serde_json::from_str(raw).ok()?;
        let object = value.as_object()?;

        if object.get("version").and_then(Value::as_u64) != Some(u64::from(PROGRESS_SCHEMA_VERSION))
        {
            return None;
        }
        if !object.get("messages").is_some_and(Value::is_array) {
            return None;
        }

        serde_json::from_value(value).ok()
    }
}
