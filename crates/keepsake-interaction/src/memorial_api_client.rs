//! REST client for the memorial backend.
//!
//! Covers the three endpoints used by the onboarding conversation:
//! - `GET /api/chat/questions`
//! - `POST /api/chat/submit` (multipart, bearer credential)
//! - `GET /api/memorial/view` (bearer credential)

use std::time::Duration;

use async_trait::async_trait;
use keepsake_core::chat::{ChatApi, QuestionSet, SubmissionPayload, SubmitAck};
use keepsake_core::error::{KeepsakeError, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

const QUESTIONS_PATH: &str = "/api/chat/questions";
const SUBMIT_PATH: &str = "/api/chat/submit";
const MEMORIAL_VIEW_PATH: &str = "/api/memorial/view";

/// Header carrying the per-answer-set submission key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

const SUCCESS_RESULT: &str = "success";
const FALLBACK_MIME: &str = "application/octet-stream";

/// Common `{result, message, data}` envelope of backend responses.
#[derive(Debug, Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
struct ApiEnvelope<T> {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    /// A missing `result` counts as success; any other value is a failure.
    fn is_failure(&self) -> bool {
        self.result
            .as_deref()
            .is_some_and(|result| result != SUCCESS_RESULT)
    }

    fn failure_message(&self) -> String {
        self.message
            .clone()
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| format!("result: {}", self.result.as_deref().unwrap_or("unknown")))
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// [`ChatApi`] implementation over HTTP.
#[derive(Clone)]
pub struct MemorialApiClient {
    client: Client,
    base_url: String,
}

impl MemorialApiClient {
    /// Creates a client for `base_url` with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KeepsakeError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Reads the body of a response, turning non-2xx statuses into errors.
    async fn read_body(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let body = response.text().await.map_err(network_error)?;

        if !status.is_success() {
            return Err(map_http_error(status, body));
        }
        Ok(body)
    }
}

#[async_trait]
impl ChatApi for MemorialApiClient {
    async fn fetch_questions(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.endpoint(QUESTIONS_PATH))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(network_error)?;

        let body = Self::read_body(response).await?;
        let questions = parse_questions(&body)?;
        tracing::debug!("[MemorialApiClient] Fetched {} questions", questions.len());
        Ok(questions)
    }

    async fn submit_chat(&self, access_token: &str, payload: &SubmissionPayload) -> Result<SubmitAck> {
        let form = build_submit_form(payload)?;

        let mut request = self
            .client
            .post(self.endpoint(SUBMIT_PATH))
            .bearer_auth(access_token)
            .multipart(form);
        if let Some(key) = &payload.idempotency_key {
            request = request.header(IDEMPOTENCY_KEY_HEADER, key.as_str());
        }

        tracing::info!(
            "[MemorialApiClient] Submitting answers with '{}' ({} bytes)",
            payload.profile.name(),
            payload.profile.bytes.len()
        );

        let response = request.send().await.map_err(network_error)?;
        let body = Self::read_body(response).await?;
        parse_submit_ack(&body)
    }

    async fn has_memorial(&self, access_token: &str) -> Result<bool> {
        let response = self
            .client
            .get(self.endpoint(MEMORIAL_VIEW_PATH))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(network_error)?;

        let body = Self::read_body(response).await?;
        parse_memorial_view(&body)
    }
}

fn network_error(e: reqwest::Error) -> KeepsakeError {
    if e.is_timeout() {
        KeepsakeError::network(format!("request timed out: {}", e))
    } else {
        KeepsakeError::network(e.to_string())
    }
}

/// Maps a non-2xx response onto [`KeepsakeError::Http`], preferring the
/// backend's `message` field over the raw body.
fn map_http_error(status: StatusCode, body: String) -> KeepsakeError {
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|error| error.message)
        .unwrap_or_else(|_| body.trim().to_string());

    KeepsakeError::http(status.as_u16(), message)
}

fn build_submit_form(payload: &SubmissionPayload) -> Result<Form> {
    let meta = &payload.profile.meta;
    let mime = if meta.mime_type.trim().is_empty() {
        FALLBACK_MIME
    } else {
        meta.mime_type.as_str()
    };

    let profile = Part::bytes(payload.profile.bytes.clone())
        .file_name(meta.name.clone())
        .mime_str(mime)
        .or_else(|_| {
            Part::bytes(payload.profile.bytes.clone())
                .file_name(meta.name.clone())
                .mime_str(FALLBACK_MIME)
        })
        .map_err(|e| KeepsakeError::validation(format!("Invalid attachment type: {}", e)))?;

    Ok(Form::new()
        .text("name", payload.name.clone())
        .text("birth_start", payload.birth_start.clone())
        .text("prompts", payload.prompts.clone())
        .part("profile", profile))
}

fn parse_envelope<T: DeserializeOwned>(body: &str) -> Result<ApiEnvelope<T>> {
    serde_json::from_str(body).map_err(KeepsakeError::from)
}

/// Decodes the questions response into the ordered prompt list.
fn parse_questions(body: &str) -> Result<Vec<String>> {
    let envelope: ApiEnvelope<QuestionSet> = parse_envelope(body)?;
    if envelope.is_failure() {
        return Err(KeepsakeError::api(envelope.failure_message()));
    }
    Ok(envelope.data.unwrap_or_default().into_prompts())
}

/// True when the backend reports an existing memorial.
fn parse_memorial_view(body: &str) -> Result<bool> {
    let envelope: ApiEnvelope<serde_json::Value> = parse_envelope(body)?;
    Ok(envelope.result.as_deref() == Some(SUCCESS_RESULT)
        && envelope.data.is_some_and(|data| !data.is_null()))
}

fn parse_submit_ack(body: &str) -> Result<SubmitAck> {
    if body.trim().is_empty() {
        return Ok(SubmitAck::default());
    }

    let envelope: ApiEnvelope<serde_json::Value> = parse_envelope(body)?;
    if envelope.is_failure() {
        return Err(KeepsakeError::api(envelope.failure_message()));
    }
    Ok(SubmitAck {
        result: envelope.result,
        message: envelope.message,
        data: envelope.data,
    })
}
