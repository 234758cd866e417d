//! Submission of a completed answer set.

use std::sync::Arc;

use keepsake_core::chat::{ChatApi, PendingFile, SubmissionPayload, SubmissionTicket, SubmitAck};
use keepsake_core::error::{KeepsakeError, Result};

/// Turns a [`SubmissionTicket`] into exactly one backend call.
///
/// The caller decides whether a credential is available; the coordinator
/// only refuses to go to the network without an attachment.
#[derive(Clone)]
pub struct SubmissionCoordinator {
    api: Arc<dyn ChatApi>,
}

impl SubmissionCoordinator {
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        Self { api }
    }

    pub async fn submit(
        &self,
        access_token: &str,
        ticket: &SubmissionTicket,
        file: Option<&PendingFile>,
    ) -> Result<SubmitAck> {
        let Some(file) = file else {
            return Err(KeepsakeError::validation("no attachment selected"));
        };

        let payload = SubmissionPayload::build(
            &ticket.answers,
            file.clone(),
            Some(ticket.submission_key.clone()),
        );

        tracing::debug!(
            "[SubmissionCoordinator] Submitting key={} resumed={}",
            ticket.submission_key,
            ticket.resumed
        );
        self.api.submit_chat(access_token, &payload).await
    }
}
