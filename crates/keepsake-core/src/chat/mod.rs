//! Conversational onboarding domain.
//!
//! # Module Structure
//!
//! - `message`: transcript entries (`ConversationMessage`)
//! - `question`: positional input classification and progress helpers
//! - `progress`: the versioned snapshot (`PersistedProgress`)
//! - `state`: the explicit state machine (`ChatMachine`, `ChatState`)
//! - `submission`: pending attachment and submit payload
//! - `repository`: storage interfaces
//! - `api`: backend interface
//! - `notice`: fixed assistant texts

pub mod api;
mod message;
pub mod notice;
mod progress;
mod question;
mod repository;
mod state;
mod submission;

pub use api::ChatApi;
pub use message::ConversationMessage;
pub use progress::{
    ANSWER_SEPARATOR, CollectedAnswers, FileMeta, PROGRESS_SCHEMA_VERSION, PROGRESS_STORAGE_KEY,
    PersistedProgress,
};
pub use question::{
    BIRTH_DATE_FORMAT, InputKind, QuestionSet, can_commit, clamp_step, is_valid_birth_date,
    last_step, progress_percent, step_number, total_steps,
};
pub use repository::{BlobRecord, BlobStore, FileRepository, KeyValueStore, ProgressRepository};
pub use state::{AnswerOutcome, ChatMachine, ChatState, ChatView, SubmissionTicket};
pub use submission::{PendingFile, SubmissionPayload, SubmitAck};
