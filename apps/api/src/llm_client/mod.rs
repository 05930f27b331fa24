/// LLM Client: the single point of entry for all model calls in the screener.
///
/// ARCHITECTURAL RULE: No other module may call the Gemini API directly.
/// All model interactions go through `BackendRouter`, which owns a `ModelClient`.
///
/// Layout:
/// - `backends`: the static fallback chain and generation parameters
/// - `retry`:    generic exponential-backoff executor
/// - `router`:   priority-ordered fallback across backends
/// - `metrics`:  in-memory per-backend usage counters
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

pub mod backends;
pub mod metrics;
pub mod prompts;
pub mod retry;
pub mod router;
#[cfg(test)]
pub mod testing;

use backends::{GenerationConfig, SAFETY_CATEGORIES, SAFETY_THRESHOLD};
use retry::Retryable;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// HTTP statuses that indicate a transient upstream condition.
const RETRYABLE_STATUS_CODES: &[u16] = &[408, 429, 500, 502, 503, 504];

/// Lower-cased fragments that mark an upstream message as transient.
const RETRYABLE_MESSAGES: &[&str] = &[
    "rate limit",
    "quota",
    "timeout",
    "timed out",
    "unavailable",
    "internal error",
    "resource exhausted",
    "deadline exceeded",
];

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Model {backend} timed out after {timeout_ms}ms")]
    Timeout { backend: String, timeout_ms: u64 },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("Model {backend} failed after {attempts} attempts: {last}")]
    RetryExhausted {
        backend: String,
        attempts: u32,
        last: Box<LlmError>,
    },

    #[error("All models failed. Last error: {last}. Chain: {}", .chain.join(" -> "))]
    AllBackendsExhausted { chain: Vec<String>, last: Box<LlmError> },
}

impl LlmError {
    /// Transient errors are retried on the same backend; everything else
    /// moves straight on to the next backend in the chain.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Network(_) | LlmError::Timeout { .. } => true,
            LlmError::Api { status, message } => {
                RETRYABLE_STATUS_CODES.contains(status) || mentions_transient_condition(message)
            }
            LlmError::InvalidResponse(message) => mentions_transient_condition(message),
            LlmError::EmptyContent
            | LlmError::RetryExhausted { .. }
            | LlmError::AllBackendsExhausted { .. } => false,
        }
    }
}

impl Retryable for LlmError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LlmError::InvalidResponse(err.to_string())
        } else {
            // connect resets, DNS failures and client-side timeouts
            LlmError::Network(err.to_string())
        }
    }
}

/// Upstream status strings come as `RESOURCE_EXHAUSTED`, free text as "Resource exhausted".
fn mentions_transient_condition(message: &str) -> bool {
    let normalized = message.to_lowercase().replace('_', " ");
    RETRYABLE_MESSAGES
        .iter()
        .any(|fragment| normalized.contains(fragment))
}

// ────────────────────────────────────────────────────────────────────────────
// Conversation history + reply types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        }
    }
}

/// One entry of the structured history sent alongside a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

/// Raw output of a single backend call.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelReply {
    pub text: String,
    pub finish_reason: String,
    pub tokens_used: u32,
}

/// The upstream model service. Injected into `BackendRouter` so tests can
/// substitute a scripted fake.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn send(
        &self,
        backend: &str,
        prompt: &str,
        history: &[ChatTurn],
    ) -> Result<ModelReply, LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Gemini wire format
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: &'a GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<ResponseCandidate>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseCandidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    pub total_token_count: Option<u32>,
}

impl GenerateContentResponse {
    /// Concatenates the text parts of the first candidate.
    pub fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    pub fn finish_reason(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.finish_reason.clone())
            .unwrap_or_else(|| "STOP".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
    status: Option<String>,
}

/// Rough token estimate (~4 chars per token for English) used when the
/// upstream omits usage metadata.
pub fn estimate_tokens(text: &str) -> u32 {
    (text.chars().count() as u32).div_ceil(4)
}

/// Gemini `generateContent` client. Stateless apart from the HTTP pool;
/// timeouts and retries are owned by the router.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    generation: GenerationConfig,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| LlmError::Network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: GEMINI_API_URL.to_string(),
            generation: GenerationConfig::default(),
        })
    }

    fn endpoint(&self, backend: &str) -> String {
        format!("{}/{}:generateContent", self.base_url, backend)
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn send(
        &self,
        backend: &str,
        prompt: &str,
        history: &[ChatTurn],
    ) -> Result<ModelReply, LlmError> {
        let started = std::time::Instant::now();
        info!(
            "Sending to {backend} | Prompt length: {} chars | History: {} entries",
            prompt.len(),
            history.len()
        );

        let mut contents: Vec<Content<'_>> = history
            .iter()
            .map(|turn| Content {
                role: turn.role.as_str(),
                parts: vec![Part { text: &turn.text }],
            })
            .collect();
        contents.push(Content {
            role: ChatRole::User.as_str(),
            parts: vec![Part { text: prompt }],
        });

        let request_body = GenerateContentRequest {
            contents,
            generation_config: &self.generation,
            safety_settings: SAFETY_CATEGORIES
                .iter()
                .map(|category| SafetySetting {
                    category,
                    threshold: SAFETY_THRESHOLD,
                })
                .collect(),
        };

        let response = self
            .client
            .post(self.endpoint(backend))
            .query(&[("key", self.api_key.as_str())])
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiError>(&body)
                .map(|e| match e.error.status {
                    Some(code) => format!("{code}: {}", e.error.message),
                    None => e.error.message,
                })
                .unwrap_or(body);
            if status.as_u16() == 401 || status.as_u16() == 403 {
                error!("Credential problem talking to {backend} - check GEMINI_API_KEY");
            }
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let text = parsed.text().ok_or(LlmError::EmptyContent)?;
        let tokens_used = parsed
            .usage_metadata
            .as_ref()
            .and_then(|u| u.total_token_count)
            .unwrap_or_else(|| estimate_tokens(prompt) + estimate_tokens(&text));
        let finish_reason = parsed.finish_reason();

        debug!(
            "{backend} responded in {}ms ({tokens_used} tokens, finish: {finish_reason})",
            started.elapsed().as_millis()
        );

        Ok(ModelReply {
            text,
            finish_reason,
            tokens_used,
        })
    }
}
