//! Question sequence, positional classification and progress helpers.
//!
//! Every value in this module is derived from `(step_index, question_count)`
//! and never stored, so a change in sequence length between sessions cannot
//! desynchronize an input kind from its index.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Format produced by a native date picker.
pub const BIRTH_DATE_FORMAT: &str = "%Y-%m-%d";

/// The kind of input the active step expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// First step: the subject's name.
    Name,
    /// Second step: birth date in `YYYY-MM-DD`.
    BirthDate,
    /// Any middle step: free text.
    Freeform,
    /// Final step: the profile attachment.
    File,
}

impl InputKind {
    /// Classifies a step by position.
    ///
    /// Rules are applied in order: index 0 is the name, index 1 the birth
    /// date, the last index the file upload, everything else free text. For
    /// sequences of length one or two the earlier rules win, so those
    /// sequences have no file step at all.
    pub fn classify(step_index: usize, question_count: usize) -> Self {
        match step_index {
            0 => InputKind::Name,
            1 => InputKind::BirthDate,
            i if question_count > 0 && i == question_count - 1 => InputKind::File,
            _ => InputKind::Freeform,
        }
    }

    /// Whether a typed draft satisfies this kind's commit constraint.
    ///
    /// File steps never accept typed text; see [`can_commit`].
    pub fn accepts_text(&self, draft: &str) -> bool {
        match self {
            InputKind::Name | InputKind::Freeform => !draft.trim().is_empty(),
            InputKind::BirthDate => is_valid_birth_date(draft),
            InputKind::File => false,
        }
    }
}

/// Whether the primary commit action should be enabled.
pub fn can_commit(kind: InputKind, draft: &str, has_file: bool) -> bool {
    match kind {
        InputKind::File => has_file,
        other => other.accepts_text(draft),
    }
}

/// True when `value` is a non-empty date in the picker's native format.
pub fn is_valid_birth_date(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && NaiveDate::parse_from_str(value, BIRTH_DATE_FORMAT).is_ok()
}

/// Index of the last step, if any.
pub fn last_step(question_count: usize) -> Option<usize> {
    question_count.checked_sub(1)
}

/// Clamps a restored step index into `[0, question_count - 1]`.
///
/// An empty sequence clamps to 0.
pub fn clamp_step(step_index: usize, question_count: usize) -> usize {
    step_index.min(question_count.saturating_sub(1))
}

/// Denominator used by the progress indicator (never zero).
pub fn total_steps(question_count: usize) -> usize {
    question_count.max(1)
}

/// One-based step number shown to the user.
pub fn step_number(step_index: usize, question_count: usize) -> usize {
    (step_index + 1).min(total_steps(question_count))
}

/// Completion percentage for the progress bar.
///
/// The current step counts as done once the user has answered anything.
pub fn progress_percent(step_index: usize, question_count: usize, has_user_message: bool) -> f64 {
    let answered = step_index + usize::from(has_user_message);
    (answered as f64 / total_steps(question_count) as f64) * 100.0
}

/// Question payload as delivered by `GET /api/chat/questions`.
///
/// Fields are kept as raw JSON so a wrongly typed entry drops only itself.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionSet {
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub birth_start: Option<Value>,
    #[serde(default)]
    pub questions: Option<Value>,
    #[serde(default)]
    pub profile: Option<Value>,
}

impl QuestionSet {
    /// Flattens the payload into the ordered prompt sequence:
    /// name, birth date, each free question, profile.
    pub fn into_prompts(self) -> Vec<String> {
        let mut prompts = Vec::new();

        if let Some(name) = self.name.as_ref().and_then(trimmed_text) {
            prompts.push(name);
        }
        if let Some(birth) = self.birth_start.as_ref().and_then(trimmed_text) {
            prompts.push(birth);
        }
        if let Some(Value::Array(items)) = &self.questions {
            prompts.extend(items.iter().filter_map(trimmed_text));
        }
        if let Some(profile) = self.profile.as_ref().and_then(trimmed_text) {
            prompts.push(profile);
        }

        prompts
    }
}

fn trimmed_text(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
