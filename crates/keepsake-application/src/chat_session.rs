//! Session controller for the onboarding conversation.
//!
//! `ChatSession` owns a [`ChatMachine`] and wires it to persistence, the
//! backend and the authentication state. Every transition is applied under
//! one lock and followed by a snapshot write before the lock is released,
//! so a reload never observes a state between two transitions.
//!
//! Network calls run without the lock held. Duplicate triggers are absorbed
//! by the machine itself: once it is `Submitting`, further submit attempts
//! are no-ops.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use keepsake_core::auth::AuthState;
use keepsake_core::chat::{
    AnswerOutcome, ChatApi, ChatMachine, ChatState, ChatView, ConversationMessage, FileRepository,
    PendingFile, ProgressRepository,
};
use keepsake_core::error::KeepsakeError;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::question_provider::QuestionProvider;
use crate::submission_coordinator::SubmissionCoordinator;

/// Session tuning.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Pause after an assistant prompt is appended. Presentation only.
    pub typing_delay: Duration,
}

/// How [`ChatSession::start`] resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// No usable snapshot; the first prompt was emitted.
    Fresh,
    /// Continued from a stored snapshot.
    Restored,
    /// The question sequence is empty.
    Blocked,
    /// The user already owns a memorial; stored progress was discarded.
    AlreadyRegistered,
    /// The session was shut down before start finished.
    Cancelled,
}

/// Result of one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Completed,
    /// No credential; parked in `AwaitingAuth`.
    Deferred,
    /// No attachment; sent back to the file step.
    MissingFile,
    /// The backend rejected the credential; parked in `AwaitingAuth`.
    AuthRejected,
    /// Any other failure; the final step is open for a retry.
    Failed(KeepsakeError),
    /// Nothing to submit, or a submission is already in flight.
    Ignored,
    Cancelled,
}

/// Result of one user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Advanced { step: usize },
    Submitted(SubmitOutcome),
    Ignored,
}

/// Reaction to an authentication change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthReaction {
    Ignored,
    AlreadyRegistered,
    Resumed(SubmitOutcome),
}

struct SessionInner {
    machine: ChatMachine,
    pending_file: Option<PendingFile>,
    /// Credential the backend last rejected; never auto-retried.
    rejected_token: Option<String>,
    memorial_checked: bool,
    checking_memorial: bool,
    already_registered: bool,
}

impl SessionInner {
    fn is_inert(&self) -> bool {
        self.already_registered || self.checking_memorial
    }
}

/// One onboarding conversation.
pub struct ChatSession {
    inner: Mutex<SessionInner>,
    progress: Arc<dyn ProgressRepository>,
    files: Arc<dyn FileRepository>,
    api: Arc<dyn ChatApi>,
    questions: QuestionProvider,
    coordinator: SubmissionCoordinator,
    auth: watch::Receiver<AuthState>,
    config: SessionConfig,
    cancel: CancellationToken,
}

impl ChatSession {
    pub fn new(
        api: Arc<dyn ChatApi>,
        progress: Arc<dyn ProgressRepository>,
        files: Arc<dyn FileRepository>,
        auth: watch::Receiver<AuthState>,
        config: SessionConfig,
    ) -> Self {
        Self {
            inner: Mutex::new(SessionInner {
                machine: ChatMachine::new(),
                pending_file: None,
                rejected_token: None,
                memorial_checked: false,
                checking_memorial: false,
                already_registered: false,
            }),
            progress,
            files,
            questions: QuestionProvider::new(api.clone()),
            coordinator: SubmissionCoordinator::new(api.clone()),
            api,
            auth,
            config,
            cancel: CancellationToken::new(),
        }
    }

    fn credential(&self) -> Option<String> {
        self.auth.borrow().credential().map(str::to_string)
    }

    /// Writes the snapshot of the current state.
    ///
    /// Skipped while nothing has been asked yet, after shutdown, and once
    /// the session learned the user is already registered.
    fn persist(&self, inner: &SessionInner) {
        if self.cancel.is_cancelled()
            || inner.already_registered
            || inner.machine.state() == ChatState::Loading
        {
            return;
        }
        self.progress.save(&inner.machine.snapshot(Utc::now()));
    }

    async fn typing_pause(&self) {
        if self.config.typing_delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(self.config.typing_delay) => {}
        }
    }

    // ============================================================================
    // Lifecycle
    // ============================================================================

    /// Loads questions and restores or starts the conversation.
    ///
    /// The restore decision is made before any first prompt is emitted.
    pub async fn start(&self) -> StartOutcome {
        if let Some(token) = self.credential()
            && self.check_memorial(&token).await
        {
            return StartOutcome::AlreadyRegistered;
        }

        let questions = tokio::select! {
            _ = self.cancel.cancelled() => return StartOutcome::Cancelled,
            questions = self.questions.fetch() => questions,
        };

        let mut inner = self.inner.lock().await;
        if self.cancel.is_cancelled() {
            return StartOutcome::Cancelled;
        }
        if inner.already_registered {
            return StartOutcome::AlreadyRegistered;
        }

        let snapshot = self
            .progress
            .load()
            .filter(|snapshot| snapshot.is_complete || !questions.is_empty());

        let outcome = match snapshot {
            Some(snapshot) => {
                inner.machine = ChatMachine::restored(questions, &snapshot);
                self.restore_file(&mut inner).await;
                tracing::info!(
                    "[ChatSession] Restored conversation at {:?}",
                    inner.machine.state()
                );
                StartOutcome::Restored
            }
            None => {
                inner.machine = ChatMachine::started(questions);
                if inner.machine.is_blocked() {
                    tracing::warn!("[ChatSession] No questions available, conversation blocked");
                    StartOutcome::Blocked
                } else {
                    StartOutcome::Fresh
                }
            }
        };
        self.persist(&inner);

        let resume = inner.machine.is_awaiting_auth() && self.credential().is_some();
        drop(inner);

        if resume {
            tracing::info!("[ChatSession] Credential present, resuming pending submission");
            self.submit().await;
        }
        outcome
    }

    /// Reloads the attachment referenced by a restored snapshot.
    async fn restore_file(&self, inner: &mut SessionInner) {
        let Some(meta) = inner.machine.file_meta().cloned() else {
            return;
        };

        match self.files.get().await {
            Some(file) if file.meta.name == meta.name => {
                tracing::debug!("[ChatSession] Restored attachment '{}'", file.name());
                inner.pending_file = Some(file);
            }
            _ => {
                tracing::warn!(
                    "[ChatSession] Attachment '{}' could not be restored",
                    meta.name
                );
                if inner.machine.is_awaiting_auth() {
                    inner.machine.report_missing_file();
                }
                inner.machine.select_file(None);
            }
        }
    }

    /// Asks the backend whether the user already owns a memorial.
    ///
    /// Runs at most once per session. On a positive answer all stored
    /// progress is discarded and the session becomes inert. Failures are
    /// treated as "not registered".
    async fn check_memorial(&self, token: &str) -> bool {
        {
            let mut inner = self.inner.lock().await;
            if inner.memorial_checked {
                return inner.already_registered;
            }
            inner.memorial_checked = true;
            inner.checking_memorial = true;
        }

        let result = tokio::select! {
            _ = self.cancel.cancelled() => return false,
            result = self.api.has_memorial(token) => result,
        };

        let mut inner = self.inner.lock().await;
        inner.checking_memorial = false;
        match result {
            Ok(true) => {
                tracing::info!("[ChatSession] Memorial already exists, discarding progress");
                inner.already_registered = true;
                inner.pending_file = None;
                self.progress.clear();
                self.files.delete().await;
                true
            }
            Ok(false) => false,
            Err(e) => {
                tracing::warn!("[ChatSession] Memorial check failed: {}", e);
                false
            }
        }
    }

    /// Stops the session. Results of calls still in flight are discarded.
    pub fn shutdown(&self) {
        tracing::debug!("[ChatSession] Shutting down");
        self.cancel.cancel();
    }

    // ============================================================================
    // User input
    // ============================================================================

    /// Commits a typed answer for the active step.
    pub async fn send_answer(&self, text: &str) -> TurnOutcome {
        if self.cancel.is_cancelled() {
            return TurnOutcome::Ignored;
        }

        let outcome = {
            let mut inner = self.inner.lock().await;
            if inner.is_inert() {
                return TurnOutcome::Ignored;
            }
            let outcome = inner.machine.answer_text(text);
            if outcome != AnswerOutcome::Ignored {
                self.persist(&inner);
            }
            outcome
        };

        self.follow_up(outcome).await
    }

    /// Replaces or clears the attachment of the file step.
    pub async fn select_file(&self, file: Option<PendingFile>) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        let mut inner = self.inner.lock().await;
        if inner.is_inert() {
            return false;
        }
        if !inner.machine.select_file(file.as_ref().map(|f| f.meta.clone())) {
            return false;
        }

        inner.pending_file = file.clone();
        self.persist(&inner);
        match &file {
            Some(file) => self.files.put(file).await,
            None => self.files.delete().await,
        }
        true
    }

    /// Commits the file step with the selected attachment.
    pub async fn confirm_file(&self) -> TurnOutcome {
        if self.cancel.is_cancelled() {
            return TurnOutcome::Ignored;
        }

        let outcome = {
            let mut inner = self.inner.lock().await;
            if inner.is_inert() {
                return TurnOutcome::Ignored;
            }
            let outcome = inner.machine.confirm_file();
            if outcome != AnswerOutcome::Ignored {
                self.persist(&inner);
            }
            outcome
        };

        self.follow_up(outcome).await
    }

    async fn follow_up(&self, outcome: AnswerOutcome) -> TurnOutcome {
        match outcome {
            AnswerOutcome::Advanced { step } => {
                self.typing_pause().await;
                TurnOutcome::Advanced { step }
            }
            AnswerOutcome::ReadyToSubmit => TurnOutcome::Submitted(self.submit().await),
            AnswerOutcome::Ignored => TurnOutcome::Ignored,
        }
    }

    // ============================================================================
    // Submission
    // ============================================================================

    /// Attempts to submit the collected answers.
    ///
    /// Missing attachment and missing credential are resolved locally
    /// without a network call. At most one request is in flight at a time.
    pub async fn submit(&self) -> SubmitOutcome {
        if self.cancel.is_cancelled() {
            return SubmitOutcome::Ignored;
        }
        let credential = self.credential();

        let (ticket, file, token) = {
            let mut inner = self.inner.lock().await;
            if inner.is_inert() || !inner.machine.can_submit() {
                return SubmitOutcome::Ignored;
            }

            let Some(file) = inner.pending_file.clone() else {
                inner.machine.report_missing_file();
                self.persist(&inner);
                tracing::info!("[ChatSession] Submission blocked: no attachment");
                return SubmitOutcome::MissingFile;
            };

            let Some(token) = credential else {
                if inner.machine.defer_for_auth() {
                    self.persist(&inner);
                    tracing::info!("[ChatSession] Submission deferred until sign-in");
                }
                return SubmitOutcome::Deferred;
            };

            let Some(ticket) = inner.machine.begin_submission() else {
                return SubmitOutcome::Ignored;
            };
            self.persist(&inner);
            (ticket, file, token)
        };

        let result = tokio::select! {
            _ = self.cancel.cancelled() => return SubmitOutcome::Cancelled,
            result = self.coordinator.submit(&token, &ticket, Some(&file)) => result,
        };
        if self.cancel.is_cancelled() {
            return SubmitOutcome::Cancelled;
        }

        let mut inner = self.inner.lock().await;
        match result {
            Ok(_) => {
                inner.machine.complete_submission();
                inner.pending_file = None;
                inner.rejected_token = None;
                self.persist(&inner);
                self.files.delete().await;
                tracing::info!("[ChatSession] Submission completed");
                SubmitOutcome::Completed
            }
            Err(e) => {
                tracing::warn!("[ChatSession] Submission failed: {}", e);
                inner.machine.fail_submission(&e);
                self.persist(&inner);
                if e.is_auth_error() {
                    inner.rejected_token = Some(token);
                    SubmitOutcome::AuthRejected
                } else if e.is_validation() {
                    SubmitOutcome::MissingFile
                } else {
                    SubmitOutcome::Failed(e)
                }
            }
        }
    }

    /// Reacts to the current authentication state.
    ///
    /// On the first credential seen the memorial check runs. A conversation
    /// parked in `AwaitingAuth` is then resumed, unless the credential is
    /// the one the backend already rejected and no sign-out happened since.
    pub async fn on_auth_changed(&self) -> AuthReaction {
        if self.cancel.is_cancelled() {
            return AuthReaction::Ignored;
        }
        let Some(token) = self.credential() else {
            // Signing out re-arms auto-resume for any credential.
            self.inner.lock().await.rejected_token = None;
            return AuthReaction::Ignored;
        };

        if self.check_memorial(&token).await {
            return AuthReaction::AlreadyRegistered;
        }

        {
            let inner = self.inner.lock().await;
            if !inner.machine.is_awaiting_auth() || inner.pending_file.is_none() {
                return AuthReaction::Ignored;
            }
            if inner.rejected_token.as_deref() == Some(token.as_str()) {
                tracing::debug!("[ChatSession] Credential was rejected before, not resuming");
                return AuthReaction::Ignored;
            }
        }

        tracing::info!("[ChatSession] Credential available, resuming submission");
        AuthReaction::Resumed(self.submit().await)
    }

    /// Follows authentication changes until shutdown.
    pub fn watch_auth(self: &Arc<Self>) -> JoinHandle<()> {
        let session = Arc::clone(self);
        let mut receiver = self.auth.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = session.cancel.cancelled() => break,
                    changed = receiver.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let reaction = session.on_auth_changed().await;
                        tracing::debug!("[ChatSession] Auth change handled: {:?}", reaction);
                    }
                }
            }
        })
    }

    // ============================================================================
    // Projections
    // ============================================================================

    pub async fn view(&self) -> ChatView {
        let inner = self.inner.lock().await;
        let mut view = inner.machine.view();
        if inner.is_inert() {
            view.disabled = true;
        }
        view
    }

    pub async fn state(&self) -> ChatState {
        self.inner.lock().await.machine.state()
    }

    pub async fn transcript(&self) -> Vec<ConversationMessage> {
        self.inner.lock().await.machine.messages().to_vec()
    }

    pub async fn pending_file_name(&self) -> Option<String> {
        self.inner
            .lock()
            .await
            .pending_file
            .as_ref()
            .map(|file| file.name().to_string())
    }

    pub async fn is_already_registered(&self) -> bool {
        self.inner.lock().await.already_registered
    }
}
