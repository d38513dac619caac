/// Generative backend: the single point of entry for all model-provider calls.
///
/// The analysis layer only sees [`GenerativeBackend`]. [`OpenAiClient`] implements it on top of
/// the chat-completions API with forced function calling, so the structured payload comes back
/// as the arguments of one function call rather than free text.
///
/// Retries live in the caller (`analysis::retry`); one `call` is exactly one HTTP request.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

#[cfg(test)]
pub(crate) mod fake;
pub mod prompts;
pub mod schemas;

pub use schemas::ResponseShape;

const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Response contained no call to function '{0}'")]
    MissingFunctionCall(&'static str),

    #[error("Backend call timed out after {0}s")]
    Timeout(u64),
}

/// Token counters reported by the provider for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// One structured request: instructions, content, and the shape the answer must take.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub system: &'static str,
    pub user_content: String,
    pub shape: ResponseShape,
}

impl BackendRequest {
    pub fn resume_analysis(resume_text: &str) -> Self {
        Self {
            system: prompts::RESUME_ANALYSIS_SYSTEM,
            user_content: resume_text.to_string(),
            shape: ResponseShape::ResumeAnalysis,
        }
    }

    pub fn job_match(resume_text: &str, job_description: &str) -> Self {
        Self {
            system: prompts::JOB_MATCH_SYSTEM,
            user_content: prompts::job_match_user_content(resume_text, job_description),
            shape: ResponseShape::JobMatch,
        }
    }
}

/// Parsed payload (untrusted until validated) plus usage counters.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub payload: Value,
    pub usage: Usage,
}

#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn call(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError>;

    /// Model identifier, for logs.
    fn model(&self) -> &str;
}

// ────────────────────────────────────────────────────────────────────────────
// OpenAI adapter
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
    tools: [Value; 1],
    tool_choice: Value,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
    completions_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, model: String, base_url: &str) -> Result<Self, BackendError> {
        Ok(Self {
            client: Client::builder().timeout(HTTP_TIMEOUT).build()?,
            api_key,
            model,
            completions_url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        })
    }

    fn request_body<'a>(&'a self, request: &'a BackendRequest) -> ChatRequest<'a> {
        let name = request.shape.function_name();
        ChatRequest {
            model: &self.model,
            temperature: 0.0,
            messages: [
                ChatMessage {
                    role: "system",
                    content: request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_content,
                },
            ],
            tools: [json!({
                "type": "function",
                "function": request.shape.function_definition(),
            })],
            tool_choice: json!({"type": "function", "function": {"name": name}}),
        }
    }
}

#[async_trait]
impl GenerativeBackend for OpenAiClient {
    async fn call(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError> {
        let response = self
            .client
            .post(&self.completions_url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OpenAiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let chat: ChatResponse = response.json().await?;
        let parsed = into_backend_response(chat, request.shape.function_name())?;

        debug!(
            "Backend call succeeded: shape={:?}, prompt_tokens={}, completion_tokens={}",
            request.shape, parsed.usage.prompt_tokens, parsed.usage.completion_tokens
        );
        Ok(parsed)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Pulls the arguments of the expected function call out of a completion.
fn into_backend_response(
    chat: ChatResponse,
    function: &'static str,
) -> Result<BackendResponse, BackendError> {
    let arguments = chat
        .choices
        .into_iter()
        .flat_map(|c| c.message.tool_calls.unwrap_or_default())
        .find(|call| call.function.name == function)
        .map(|call| call.function.arguments)
        .ok_or(BackendError::MissingFunctionCall(function))?;

    Ok(BackendResponse {
        payload: serde_json::from_str(&arguments)?,
        usage: chat.usage,
    })
}
