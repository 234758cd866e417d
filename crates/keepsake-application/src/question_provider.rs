//! Question sequence loading.

use std::sync::Arc;

use keepsake_core::chat::ChatApi;

/// Fetches the prompt sequence once per session.
///
/// Never fails: any error degrades to an empty sequence, which leaves the
/// conversation blocked instead of crashing it.
#[derive(Clone)]
pub struct QuestionProvider {
    api: Arc<dyn ChatApi>,
}

impl QuestionProvider {
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        Self { api }
    }

    pub async fn fetch(&self) -> Vec<String> {
        match self.api.fetch_questions().await {
            Ok(questions) => {
                tracing::info!("[QuestionProvider] Loaded {} questions", questions.len());
                questions
            }
            Err(e) => {
                tracing::warn!("[QuestionProvider] Failed to load questions: {}", e);
                Vec::new()
            }
        }
    }
}
