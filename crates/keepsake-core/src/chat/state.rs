//! The conversation state machine.
//!
//! `ChatMachine` is synchronous and free of I/O. The session layer feeds it
//! events (questions loaded, answers, file selection, submission results)
//! and persists [`ChatMachine::snapshot`] after every transition.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::KeepsakeError;

use super::message::ConversationMessage;
use super::notice;
use super::progress::{CollectedAnswers, FileMeta, PROGRESS_SCHEMA_VERSION, PersistedProgress};
use super::question::{self, InputKind};

/// Where the conversation currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    /// Questions not fetched yet, or the fetched sequence was empty.
    Loading,
    /// Waiting for the answer to step `step`.
    Active { step: usize },
    /// Final answer given, waiting for a credential. Survives reloads.
    AwaitingAuth,
    /// A submission request is in flight. `resumed` is true when it was
    /// started from `AwaitingAuth`.
    Submitting { resumed: bool },
    /// Submission acknowledged. Terminal.
    Complete,
}

/// Result of feeding one user action into the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// The answer was recorded and the prompt for `step` appended.
    Advanced { step: usize },
    /// The final step was committed; the caller must submit or defer.
    ReadyToSubmit,
    /// Nothing changed: wrong state, wrong input kind or invalid input.
    Ignored,
}

/// Data captured when a submission starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionTicket {
    pub answers: CollectedAnswers,
    pub file_meta: Option<FileMeta>,
    pub submission_key: String,
    pub resumed: bool,
}

/// Everything the presentation layer needs to render the active step.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatView {
    pub current_prompt: Option<String>,
    pub input_kind: Option<InputKind>,
    /// True when no commit action may be taken.
    pub disabled: bool,
    pub is_loading: bool,
    /// Questions were fetched but the sequence is empty.
    pub is_blocked: bool,
    pub is_complete: bool,
    pub awaiting_auth: bool,
    pub is_submitting: bool,
    pub has_file: bool,
    pub step_number: usize,
    pub total_steps: usize,
    pub progress_percent: f64,
}

/// Explicit state machine for the onboarding conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMachine {
    questions: Vec<String>,
    questions_loaded: bool,
    state: ChatState,
    messages: Vec<ConversationMessage>,
    answers: CollectedAnswers,
    file_meta: Option<FileMeta>,
    submission_key: Option<String>,
}

impl Default for ChatMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatMachine {
    /// A machine waiting for questions.
    pub fn new() -> Self {
        Self {
            questions: Vec::new(),
            questions_loaded: false,
            state: ChatState::Loading,
            messages: Vec::new(),
            answers: CollectedAnswers::default(),
            file_meta: None,
            submission_key: None,
        }
    }

    /// Starts a fresh conversation, emitting the first prompt.
    ///
    /// An empty sequence leaves the machine in `Loading` with no messages.
    pub fn started(questions: Vec<String>) -> Self {
        let mut machine = Self {
            questions,
            questions_loaded: true,
            ..Self::new()
        };

        if let Some(first) = machine.questions.first().cloned() {
            machine.messages.push(ConversationMessage::bot(first));
            machine.state = ChatState::Active { step: 0 };
        }

        machine
    }

    /// Rebuilds a conversation from a snapshot without emitting anything.
    ///
    /// The step index is clamped to the current sequence length. The result
    /// depends only on the inputs, so restoring the same snapshot twice
    /// yields equal machines.
    pub fn restored(questions: Vec<String>, snapshot: &PersistedProgress) -> Self {
        let state = if snapshot.is_complete {
            ChatState::Complete
        } else if snapshot.submit_pending {
            ChatState::AwaitingAuth
        } else if questions.is_empty() {
            ChatState::Loading
        } else {
            ChatState::Active {
                step: question::clamp_step(snapshot.current_step_index, questions.len()),
            }
        };

        Self {
            questions,
            questions_loaded: true,
            state,
            messages: snapshot.messages.clone(),
            answers: snapshot.answers(),
            file_meta: snapshot.file_meta.clone(),
            submission_key: snapshot.submission_key.clone(),
        }
    }

    // ============================================================================
    // Accessors
    // ============================================================================

    pub fn state(&self) -> ChatState {
        self.state
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn answers(&self) -> &CollectedAnswers {
        &self.answers
    }

    pub fn file_meta(&self) -> Option<&FileMeta> {
        self.file_meta.as_ref()
    }

    pub fn submission_key(&self) -> Option<&str> {
        self.submission_key.as_deref()
    }

    pub fn is_complete(&self) -> bool {
        self.state == ChatState::Complete
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.state, ChatState::Submitting { .. })
    }

    pub fn is_awaiting_auth(&self) -> bool {
        self.state == ChatState::AwaitingAuth
    }

    /// Questions arrived but there is nothing to ask.
    pub fn is_blocked(&self) -> bool {
        self.questions_loaded && self.questions.is_empty() && self.state == ChatState::Loading
    }

    fn last_step(&self) -> Option<usize> {
        question::last_step(self.questions.len())
    }

    /// Step the conversation is positioned on, if any.
    pub fn current_step(&self) -> Option<usize> {
        match self.state {
            ChatState::Loading => None,
            ChatState::Active { step } => Some(step),
            ChatState::AwaitingAuth | ChatState::Submitting { .. } | ChatState::Complete => {
                self.last_step()
            }
        }
    }

    /// Input kind of the active step, recomputed from the current length.
    pub fn input_kind(&self) -> Option<InputKind> {
        match self.state {
            ChatState::Active { step } => Some(InputKind::classify(step, self.questions.len())),
            _ => None,
        }
    }

    pub fn current_prompt(&self) -> Option<&str> {
        self.current_step()
            .and_then(|step| self.questions.get(step))
            .map(String::as_str)
    }

    /// True when a submission may be attempted: the final step is active,
    /// or a committed answer set is waiting for a credential.
    pub fn can_submit(&self) -> bool {
        self.is_awaiting_auth() || self.is_final_active_step().is_some()
    }

    fn is_final_active_step(&self) -> Option<usize> {
        match self.state {
            ChatState::Active { step } if Some(step) == self.last_step() => Some(step),
            _ => None,
        }
    }

    // ============================================================================
    // Transitions
    // ============================================================================

    /// Records a typed answer for the active step.
    pub fn answer_text(&mut self, text: &str) -> AnswerOutcome {
        let ChatState::Active { step } = self.state else {
            return AnswerOutcome::Ignored;
        };

        let kind = InputKind::classify(step, self.questions.len());
        if !kind.accepts_text(text) {
            return AnswerOutcome::Ignored;
        }

        let text = text.trim().to_string();
        match kind {
            InputKind::Name => self.answers.name = text.clone(),
            InputKind::BirthDate => self.answers.birth_date = text.clone(),
            InputKind::Freeform => self.answers.freeform.push(text.clone()),
            InputKind::File => return AnswerOutcome::Ignored,
        }
        self.messages.push(ConversationMessage::user(text));

        self.advance_from(step)
    }

    /// Replaces or clears the attachment. Only the file step accepts it.
    pub fn select_file(&mut self, meta: Option<FileMeta>) -> bool {
        if self.input_kind() != Some(InputKind::File) {
            return false;
        }
        self.file_meta = meta;
        true
    }

    /// Commits the file step with the currently selected attachment.
    pub fn confirm_file(&mut self) -> AnswerOutcome {
        let ChatState::Active { step } = self.state else {
            return AnswerOutcome::Ignored;
        };
        if InputKind::classify(step, self.questions.len()) != InputKind::File {
            return AnswerOutcome::Ignored;
        }
        let Some(meta) = &self.file_meta else {
            return AnswerOutcome::Ignored;
        };

        let echo = notice::file_uploaded(&meta.name);
        self.messages.push(ConversationMessage::user(echo));
        self.advance_from(step)
    }

    fn advance_from(&mut self, step: usize) -> AnswerOutcome {
        let next = step + 1;
        match self.questions.get(next) {
            Some(prompt) => {
                self.messages.push(ConversationMessage::bot(prompt.clone()));
                self.state = ChatState::Active { step: next };
                AnswerOutcome::Advanced { step: next }
            }
            None => {
                if self.submission_key.is_none() {
                    self.submission_key = Some(Uuid::new_v4().to_string());
                }
                AnswerOutcome::ReadyToSubmit
            }
        }
    }

    /// Parks a committed final step until a credential appears.
    ///
    /// Returns false (and appends nothing) when already waiting.
    pub fn defer_for_auth(&mut self) -> bool {
        if self.is_final_active_step().is_none() {
            return false;
        }
        self.state = ChatState::AwaitingAuth;
        self.messages.push(ConversationMessage::bot(notice::LOGIN_REQUIRED));
        true
    }

    /// Sends the conversation back to the file step because no attachment
    /// is available.
    pub fn report_missing_file(&mut self) -> bool {
        let Some(last) = self.last_step() else {
            return false;
        };
        match self.state {
            ChatState::Active { step } if step == last => {}
            ChatState::AwaitingAuth => self.state = ChatState::Active { step: last },
            _ => return false,
        }
        self.messages.push(ConversationMessage::bot(notice::FILE_MISSING));
        true
    }

    /// Enters `Submitting` and returns what must be sent.
    ///
    /// Returns `None` unless the machine sits on the final step or in
    /// `AwaitingAuth`; in particular a second call while a submission is
    /// in flight, or after completion, does nothing.
    pub fn begin_submission(&mut self) -> Option<SubmissionTicket> {
        let resumed = match self.state {
            ChatState::AwaitingAuth => true,
            ChatState::Active { .. } if self.is_final_active_step().is_some() => false,
            _ => return None,
        };

        let submission_key = self
            .submission_key
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .clone();

        self.state = ChatState::Submitting { resumed };
        Some(SubmissionTicket {
            answers: self.answers.clone(),
            file_meta: self.file_meta.clone(),
            submission_key,
            resumed,
        })
    }

    /// `Submitting -> Complete`.
    pub fn complete_submission(&mut self) -> bool {
        if !self.is_submitting() {
            return false;
        }
        self.state = ChatState::Complete;
        self.file_meta = None;
        self.submission_key = None;
        self.messages.push(ConversationMessage::bot(notice::SUBMIT_COMPLETE));
        true
    }

    /// Applies a failed submission and returns the resulting state.
    ///
    /// A rejected credential parks the conversation in `AwaitingAuth`; any
    /// other error returns to the final step so the user can retry.
    pub fn fail_submission(&mut self, error: &KeepsakeError) -> ChatState {
        if !self.is_submitting() {
            return self.state;
        }

        if error.is_auth_error() {
            self.state = ChatState::AwaitingAuth;
            self.messages.push(ConversationMessage::bot(notice::LOGIN_REQUIRED));
            return self.state;
        }

        let last = self.last_step().unwrap_or(0);
        self.state = ChatState::Active { step: last };
        let text = if error.is_validation() {
            notice::FILE_MISSING.to_string()
        } else {
            notice::submit_failed(&error.display_message())
        };
        self.messages.push(ConversationMessage::bot(text));
        self.state
    }

    // ============================================================================
    // Projections
    // ============================================================================

    /// Snapshot of the state after the latest transition.
    ///
    /// An in-flight submission is recorded as the state it started from.
    pub fn snapshot(&self, saved_at: DateTime<Utc>) -> PersistedProgress {
        let current_step_index = match self.state {
            ChatState::Active { step } => step,
            _ => self.current_step().unwrap_or(0),
        };

        PersistedProgress {
            version: PROGRESS_SCHEMA_VERSION,
            messages: self.messages.clone(),
            current_step_index,
            is_complete: self.is_complete(),
            collected_name: self.answers.name.clone(),
            collected_birth_date: self.answers.birth_date.clone(),
            collected_freeform_answers: self.answers.freeform.clone(),
            submit_pending: matches!(
                self.state,
                ChatState::AwaitingAuth | ChatState::Submitting { resumed: true }
            ),
            file_meta: self.file_meta.clone(),
            submission_key: self.submission_key.clone(),
            saved_at,
        }
    }

    /// Render model for the presentation layer.
    pub fn view(&self) -> ChatView {
        let count = self.questions.len();
        let index = self.current_step().unwrap_or(0);
        let has_user_message = self.messages.iter().any(|m| m.is_from_user);

        ChatView {
            current_prompt: self.current_prompt().map(str::to_string),
            input_kind: self.input_kind(),
            disabled: !matches!(self.state, ChatState::Active { .. }),
            is_loading: self.state == ChatState::Loading && !self.questions_loaded,
            is_blocked: self.is_blocked(),
            is_complete: self.is_complete(),
            awaiting_auth: self.is_awaiting_auth(),
            is_submitting: self.is_submitting(),
            has_file: self.file_meta.is_some(),
            step_number: question::step_number(index, count),
            total_steps: question::total_steps(count),
            progress_percent: question::progress_percent(index, count, has_user_message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn questions() -> Vec<String> {
        ["이름?", "생일?", "질문1", "파일"]
            .iter()
            .map(|q| q.to_string())
            .collect()
    }

    fn photo() -> FileMeta {
        FileMeta {
            name: "memorial.jpg".into(),
            mime_type: "image/jpeg".into(),
            byte_size: 3,
            last_modified: 1_700_000_000_000,
        }
    }

    fn at_final_step() -> ChatMachine {
        let mut machine = ChatMachine::started(questions());
        machine.answer_text("홍길동");
        machine.answer_text("1990-01-01");
        machine.answer_text("좋은 기억입니다");
        machine
    }

    #[test]
    fn test_started_emits_first_prompt() {
        let machine = ChatMachine::started(questions());
        assert_eq!(machine.state(), ChatState::Active { step: 0 });
        assert_eq!(machine.messages().len(), 1);
        assert_eq!(machine.messages()[0].text, "이름?");
        assert!(!machine.messages()[0].is_from_user);
    }

    #[test]
    fn test_started_with_no_questions_stays_blocked() {
        let machine = ChatMachine::started(Vec::new());
        assert_eq!(machine.state(), ChatState::Loading);
        assert!(machine.messages().is_empty());
        assert!(machine.is_blocked());
        assert!(machine.view().disabled);
    }

    #[test]
    fn test_answers_are_recorded_by_position() {
        let machine = at_final_step();

        assert_eq!(machine.state(), ChatState::Active { step: 3 });
        assert_eq!(machine.answers().name, "홍길동");
        assert_eq!(machine.answers().birth_date, "1990-01-01");
        assert_eq!(machine.answers().freeform, vec!["좋은 기억입니다"]);
        // prompt + 3 * (echo + prompt)
        assert_eq!(machine.messages().len(), 7);
        assert_eq!(machine.input_kind(), Some(InputKind::File));
    }

    #[test]
    fn test_invalid_answers_are_ignored() {
        let mut machine = ChatMachine::started(questions());
        assert_eq!(machine.answer_text("   "), AnswerOutcome::Ignored);
        assert_eq!(machine.messages().len(), 1);

        machine.answer_text("홍길동");
        assert_eq!(machine.answer_text("01/01/1990"), AnswerOutcome::Ignored);
        assert_eq!(machine.state(), ChatState::Active { step: 1 });
    }

    #[test]
    fn test_file_step_requires_selection() {
        let mut machine = at_final_step();
        assert_eq!(machine.answer_text("memorial.jpg"), AnswerOutcome::Ignored);
        assert_eq!(machine.confirm_file(), AnswerOutcome::Ignored);

        assert!(machine.select_file(Some(photo())));
        assert_eq!(machine.confirm_file(), AnswerOutcome::ReadyToSubmit);
        let echo = machine.messages().last().unwrap();
        assert!(echo.is_from_user);
        assert_eq!(echo.text, "파일을 업로드했습니다: memorial.jpg");
        assert!(machine.submission_key().is_some());
    }

    #[test]
    fn test_select_file_rejected_outside_file_step() {
        let mut machine = ChatMachine::started(questions());
        assert!(!machine.select_file(Some(photo())));
        assert!(machine.file_meta().is_none());
    }

    #[test]
    fn test_defer_then_resume_submission() {
        let mut machine = at_final_step();
        machine.select_file(Some(photo()));
        machine.confirm_file();

        assert!(machine.defer_for_auth());
        assert!(!machine.defer_for_auth());
        assert_eq!(machine.state(), ChatState::AwaitingAuth);
        assert!(machine.snapshot(Utc::now()).submit_pending);

        let ticket = machine.begin_submission().unwrap();
        assert!(ticket.resumed);
        assert_eq!(ticket.file_meta, Some(photo()));
        assert!(machine.snapshot(Utc::now()).submit_pending);

        assert!(machine.complete_submission());
        assert!(machine.is_complete());
        assert!(machine.file_meta().is_none());
        assert!(!machine.snapshot(Utc::now()).submit_pending);
    }

    #[test]
    fn test_begin_submission_is_guarded() {
        let mut machine = at_final_step();
        machine.select_file(Some(photo()));
        machine.confirm_file();

        assert!(machine.can_submit());
        assert!(machine.begin_submission().is_some());
        assert!(!machine.can_submit());
        assert!(machine.begin_submission().is_none());

        machine.complete_submission();
        assert!(machine.begin_submission().is_none());
        assert_eq!(machine.answer_text("more"), AnswerOutcome::Ignored);
    }

    #[test]
    fn test_begin_submission_requires_final_step() {
        let mut machine = ChatMachine::started(questions());
        assert!(!machine.can_submit());
        assert!(machine.begin_submission().is_none());
        assert_eq!(machine.state(), ChatState::Active { step: 0 });
    }

    #[test]
    fn test_submission_key_is_stable_across_retries() {
        let mut machine = at_final_step();
        machine.select_file(Some(photo()));
        machine.confirm_file();

        let first = machine.begin_submission().unwrap().submission_key;
        machine.fail_submission(&KeepsakeError::http(500, "boom"));
        machine.confirm_file();
        let second = machine.begin_submission().unwrap().submission_key;
        assert_eq!(first, second);
    }

    #[test]
    fn test_auth_failure_parks_in_awaiting_auth() {
        let mut machine = at_final_step();
        machine.select_file(Some(photo()));
        machine.confirm_file();
        machine.begin_submission();

        let state = machine.fail_submission(&KeepsakeError::http(401, "expired"));
        assert_eq!(state, ChatState::AwaitingAuth);
        assert_eq!(machine.messages().last().unwrap().text, notice::LOGIN_REQUIRED);
    }

    #[test]
    fn test_other_failure_returns_to_final_step() {
        let mut machine = at_final_step();
        machine.select_file(Some(photo()));
        machine.confirm_file();
        machine.begin_submission();

        let state = machine.fail_submission(&KeepsakeError::http(500, "server error"));
        assert_eq!(state, ChatState::Active { step: 3 });
        assert!(machine.messages().last().unwrap().text.contains("(500 server error)"));
        // Data survives for a retry without re-answering.
        assert_eq!(machine.answers().name, "홍길동");
        assert_eq!(machine.file_meta(), Some(&photo()));
    }

    #[test]
    fn test_missing_file_from_awaiting_auth_reopens_file_step() {
        let mut machine = at_final_step();
        machine.select_file(Some(photo()));
        machine.confirm_file();
        machine.defer_for_auth();
        machine.file_meta = None;

        assert!(machine.report_missing_file());
        assert_eq!(machine.state(), ChatState::Active { step: 3 });
        assert_eq!(machine.messages().last().unwrap().text, notice::FILE_MISSING);
    }

    #[test]
    fn test_single_question_sequence_submits_after_name() {
        let mut machine = ChatMachine::started(vec!["이름?".into()]);
        assert_eq!(machine.input_kind(), Some(InputKind::Name));
        assert_eq!(machine.answer_text("홍길동"), AnswerOutcome::ReadyToSubmit);
        assert_eq!(machine.answers().name, "홍길동");
        assert!(machine.begin_submission().is_some());
    }

    #[test]
    fn test_restore_skips_first_prompt_and_clamps() {
        let mut machine = at_final_step();
        machine.select_file(Some(photo()));
        let snapshot = machine.snapshot(Utc::now());
        assert_eq!(snapshot.current_step_index, 3);

        let shorter: Vec<String> = questions().into_iter().take(2).collect();
        let restored = ChatMachine::restored(shorter, &snapshot);
        assert_eq!(restored.state(), ChatState::Active { step: 1 });
        assert_eq!(restored.messages(), machine.messages());
    }

    #[test]
    fn test_restore_flags_take_precedence() {
        let mut snapshot = ChatMachine::started(questions()).snapshot(Utc::now());
        snapshot.submit_pending = true;
        assert_eq!(
            ChatMachine::restored(questions(), &snapshot).state(),
            ChatState::AwaitingAuth
        );

        snapshot.is_complete = true;
        assert_eq!(
            ChatMachine::restored(questions(), &snapshot).state(),
            ChatState::Complete
        );
    }

    #[test]
    fn test_restore_is_idempotent() {
        let snapshot = at_final_step().snapshot(Utc::now());
        let once = ChatMachine::restored(questions(), &snapshot);
        let twice = ChatMachine::restored(questions(), &snapshot);
        assert_eq!(once, twice);

        let again = ChatMachine::restored(questions(), &once.snapshot(snapshot.saved_at));
        assert_eq!(again, once);
    }

    #[test]
    fn test_view_reports_progress() {
        let machine = at_final_step();
        let view = machine.view();
        assert_eq!(view.step_number, 4);
        assert_eq!(view.total_steps, 4);
        assert_eq!(view.progress_percent, 100.0);
        assert_eq!(view.current_prompt.as_deref(), Some("파일"));
        assert!(!view.disabled);
        assert!(!view.has_file);
    }

    proptest! {
        #[test]
        fn prop_restored_index_is_clamped(index in 0usize..1_000, count in 1usize..50) {
            let mut snapshot = ChatMachine::started(vec!["q".into()]).snapshot(Utc::now());
            snapshot.current_step_index = index;
            let qs: Vec<String> = (0..count).map(|i| format!("q{i}")).collect();

            let first = ChatMachine::restored(qs.clone(), &snapshot);
            let second = ChatMachine::restored(qs, &snapshot);

            let step = first.current_step().unwrap();
            prop_assert!(step <= count - 1);
            prop_assert_eq!(first, second);
        }
    }
}
