//! LLM provider integrations.
//!
//! Supports Anthropic, OpenAI, OpenRouter and Cerebras. Each provider
//! implements [`SummaryProvider`], and [`create_provider`] builds the
//! appropriate one from resolved settings.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;

use super::SummarizeError;

/// Timeout for establishing a connection (30 seconds).
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the entire request including response (120 seconds).
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const MAX_TOKENS: u32 = 1024;

const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const CEREBRAS_URL: &str = "https://api.cerebras.ai/v1/chat/completions";

// ==================== Types ====================

/// Supported LLM provider kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryProviderKind {
    Anthropic,
    OpenAI,
    OpenRouter,
    Cerebras,
}

impl fmt::Display for SummaryProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryProviderKind::Anthropic => write!(f, "anthropic"),
            SummaryProviderKind::OpenAI => write!(f, "openai"),
            SummaryProviderKind::OpenRouter => write!(f, "openrouter"),
            SummaryProviderKind::Cerebras => write!(f, "cerebras"),
        }
    }
}

impl FromStr for SummaryProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" => Ok(SummaryProviderKind::Anthropic),
            "openai" => Ok(SummaryProviderKind::OpenAI),
            "openrouter" => Ok(SummaryProviderKind::OpenRouter),
            "cerebras" => Ok(SummaryProviderKind::Cerebras),
            other => Err(format!(
                "Unknown AI provider: '{other}'. Expected one of: anthropic, openai, openrouter, cerebras"
            )),
        }
    }
}

// ==================== Trait ====================

/// An LLM that turns a system prompt plus user content into text.
pub trait SummaryProvider {
    /// Sends one completion request and returns the generated text.
    fn complete(&self, system_prompt: &str, user_content: &str) -> Result<String, SummarizeError>;
}

// ==================== Anthropic ====================

/// Anthropic Messages API provider.
pub(crate) struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
}

impl AnthropicProvider {
    pub(crate) fn new(client: Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
        }
    }

    fn build_request_body(&self, system_prompt: &str, user_content: &str) -> Value {
        serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "system": system_prompt,
            "messages": [
                { "role": "user", "content": user_content }
            ]
        })
    }
}

impl SummaryProvider for AnthropicProvider {
    fn complete(&self, system_prompt: &str, user_content: &str) -> Result<String, SummarizeError> {
        let request = self
            .client
            .post(ANTHROPIC_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&self.build_request_body(system_prompt, user_content));

        let json = send_json(request)?;
        parse_anthropic_response(&json)
    }
}

// ==================== Chat Completions ====================

/// Provider for any OpenAI-compatible Chat Completions endpoint.
///
/// OpenAI, OpenRouter and Cerebras differ only in URL and headers.
pub(crate) struct ChatCompletionsProvider {
    client: Client,
    url: &'static str,
    api_key: String,
    model: String,
    referer: Option<&'static str>,
}

impl ChatCompletionsProvider {
    pub(crate) fn new(client: Client, kind: SummaryProviderKind, api_key: String, model: String) -> Self {
        let (url, referer) = match kind {
            SummaryProviderKind::OpenRouter => {
                (OPENROUTER_URL, Some("https://github.com/flow-guardian/flow-guardian"))
            }
            SummaryProviderKind::Cerebras => (CEREBRAS_URL, None),
            _ => (OPENAI_URL, None),
        };
        Self {
            client,
            url,
            api_key,
            model,
            referer,
        }
    }

    fn build_request_body(&self, system_prompt: &str, user_content: &str) -> Value {
        serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_content }
            ]
        })
    }
}

impl SummaryProvider for ChatCompletionsProvider {
    fn complete(&self, system_prompt: &str, user_content: &str) -> Result<String, SummarizeError> {
        let mut request = self
            .client
            .post(self.url)
            .bearer_auth(&self.api_key)
            .json(&self.build_request_body(system_prompt, user_content));
        if let Some(referer) = self.referer {
            request = request.header("HTTP-Referer", referer);
        }

        let json = send_json(request)?;
        parse_openai_response(&json)
    }
}

// ==================== Shared Helpers ====================

/// Sends a request and decodes a successful JSON body.
fn send_json(request: RequestBuilder) -> Result<Value, SummarizeError> {
    let response = request
        .send()
        .map_err(|e| SummarizeError::RequestFailed(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(SummarizeError::HttpError {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json()
        .map_err(|e| SummarizeError::ParseError(e.to_string()))
}

/// Extracts `content[0].text` from an Anthropic response.
fn parse_anthropic_response(json: &Value) -> Result<String, SummarizeError> {
    json.get("content")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|item| item.get("text"))
        .and_then(|t| t.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            SummarizeError::ParseError("Missing content[0].text in Anthropic response".to_string())
        })
}

/// Extracts `choices[0].message.content` from a Chat Completions response.
fn parse_openai_response(json: &Value) -> Result<String, SummarizeError> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|msg| msg.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            SummarizeError::ParseError("Missing choices[0].message.content in response".to_string())
        })
}

// ==================== Factory ====================

/// Returns the default model for the given provider kind.
pub fn default_model(kind: SummaryProviderKind) -> &'static str {
    match kind {
        SummaryProviderKind::Anthropic => "claude-haiku-4-5",
        SummaryProviderKind::OpenAI => "gpt-4o-mini",
        SummaryProviderKind::OpenRouter => "meta-llama/llama-3.1-8b-instruct:free",
        SummaryProviderKind::Cerebras => "llama3.1-8b",
    }
}

/// Creates a provider for the given kind.
///
/// If `model` is `None`, uses the default model for the provider kind.
///
/// # Errors
///
/// Returns `RequestFailed` if the HTTP client cannot be constructed.
pub fn create_provider(
    kind: SummaryProviderKind,
    api_key: String,
    model: Option<String>,
) -> Result<Box<dyn SummaryProvider>, SummarizeError> {
    let client = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| SummarizeError::RequestFailed(format!("Failed to build HTTP client: {e}")))?;

    let model = model.unwrap_or_else(|| default_model(kind).to_string());

    Ok(match kind {
        SummaryProviderKind::Anthropic => Box::new(AnthropicProvider::new(client, api_key, model)),
        _ => Box::new(ChatCompletionsProvider::new(client, kind, api_key, model)),
    })
}
