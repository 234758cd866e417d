#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use keepsake_application::{AuthChannel, ChatSession, SessionConfig};
use keepsake_core::chat::{
    ChatApi, ChatState, KeyValueStore, PROGRESS_STORAGE_KEY, PendingFile, PersistedProgress,
    SubmissionPayload, SubmitAck,
};
use keepsake_core::error::{KeepsakeError, Result};
use keepsake_infrastructure::storage::{MemoryBlobStore, MemoryKeyValueStore};
use keepsake_infrastructure::{DurableFileStore, ProgressStore};
use tokio::sync::Notify;

pub fn questions() -> Vec<String> {
    ["이름?", "생일?", "질문1", "파일"]
        .iter()
        .map(|q| q.to_string())
        .collect()
}

pub fn photo() -> PendingFile {
    PendingFile::new("memorial.jpg", "image/jpeg", 1_700_000_000_000, b"\xFF\xD8\xFF".to_vec())
}

/// Holds a submission in flight until released.
#[derive(Default)]
pub struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// Scripted backend.
pub struct MockChatApi {
    questions: Mutex<Result<Vec<String>>>,
    submit_results: Mutex<VecDeque<Result<SubmitAck>>>,
    memorial: Mutex<Result<bool>>,
    submissions: Mutex<Vec<(String, SubmissionPayload)>>,
    memorial_calls: AtomicUsize,
    gate: Option<Arc<Gate>>,
}

impl MockChatApi {
    pub fn new(questions: Vec<String>) -> Self {
        Self {
            questions: Mutex::new(Ok(questions)),
            submit_results: Mutex::new(VecDeque::new()),
            memorial: Mutex::new(Ok(false)),
            submissions: Mutex::new(Vec::new()),
            memorial_calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn failing_questions(error: KeepsakeError) -> Self {
        let api = Self::new(Vec::new());
        *api.questions.lock().unwrap() = Err(error);
        api
    }

    pub fn with_gate(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_memorial(self, result: Result<bool>) -> Self {
        *self.memorial.lock().unwrap() = result;
        self
    }

    /// Queues the result of the next submission. Unscripted calls succeed.
    pub fn push_submit_result(&self, result: Result<SubmitAck>) {
        self.submit_results.lock().unwrap().push_back(result);
    }

    pub fn submissions(&self) -> Vec<(String, SubmissionPayload)> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn submit_calls(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    pub fn memorial_calls(&self) -> usize {
        self.memorial_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatApi for MockChatApi {
    async fn fetch_questions(&self) -> Result<Vec<String>> {
        self.questions.lock().unwrap().clone()
    }

    async fn submit_chat(&self, access_token: &str, payload: &SubmissionPayload) -> Result<SubmitAck> {
        self.submissions
            .lock()
            .unwrap()
            .push((access_token.to_string(), payload.clone()));

        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        self.submit_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(SubmitAck {
                    result: Some("success".into()),
                    ..SubmitAck::default()
                })
            })
    }

    async fn has_memorial(&self, _access_token: &str) -> Result<bool> {
        self.memorial_calls.fetch_add(1, Ordering::SeqCst);
        self.memorial.lock().unwrap().clone()
    }
}

/// Stores and auth shared by every session built from it, so building a
/// second session simulates a page reload.
pub struct Harness {
    pub api: Arc<MockChatApi>,
    pub kv: Arc<MemoryKeyValueStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub auth: AuthChannel,
}

impl Harness {
    pub fn new(api: MockChatApi) -> Self {
        Self {
            api: Arc::new(api),
            kv: Arc::new(MemoryKeyValueStore::new()),
            blobs: Arc::new(MemoryBlobStore::new()),
            auth: AuthChannel::default(),
        }
    }

    pub fn session(&self) -> ChatSession {
        self.session_with(SessionConfig::default())
    }

    pub fn session_with(&self, config: SessionConfig) -> ChatSession {
        ChatSession::new(
            self.api.clone(),
            Arc::new(ProgressStore::new(self.kv.clone())),
            Arc::new(DurableFileStore::new(self.blobs.clone())),
            self.auth.subscribe(),
            config,
        )
    }

    pub fn stored_progress(&self) -> Option<PersistedProgress> {
        self.kv
            .get(PROGRESS_STORAGE_KEY)
            .unwrap()
            .and_then(|raw| PersistedProgress::decode(&raw))
    }

    pub fn has_stored_file(&self) -> bool {
        self.blobs.contains("profile")
    }
}

/// Answers every step up to the file step.
pub async fn answer_until_file_step(session: &ChatSession) {
    session.send_answer("홍길동").await;
    session.send_answer("1990-01-01").await;
    session.send_answer("좋은 기억입니다").await;
}

pub async fn wait_for_state(session: &ChatSession, expected: ChatState) -> bool {
    for _ in 0..200 {
        if session.state().await == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}
