//! The session assistant.
//!
//! An assistant turns raw work state into a structured session context and
//! writes welcome-back messages for restored sessions. [`LlmAssistant`]
//! talks to an LLM provider (Anthropic, OpenAI, OpenRouter or Cerebras);
//! [`OfflineAssistant`] is used when none is configured, and every caller
//! has a deterministic fallback for its `Unavailable` answer.
//!
//! # Usage
//!
//! [`assistant_from_settings`] picks the implementation once at startup.
//! Settings come from `config.json` with environment variable overrides.

pub mod prompt;
pub mod provider;

use std::env;

use serde::Deserialize;

use crate::capture::GitState;
use crate::config::Settings;
use crate::restore::Changes;
use crate::storage::Session;

pub use provider::{create_provider, default_model, SummaryProvider, SummaryProviderKind};

/// Structured context inferred from the current work state.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub hypothesis: Option<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
    #[serde(default)]
    pub decisions: Vec<String>,
    #[serde(default)]
    pub learnings: Vec<String>,
}

/// Something that can analyse work state and welcome a developer back.
pub trait SessionAssistant {
    /// Infers a session context from the repository state and an optional
    /// note from the developer.
    fn analyze(&self, git_state: &GitState, message: Option<&str>) -> Result<Analysis, SummarizeError>;

    /// Writes a welcome-back message for `session`.
    fn restoration_message(&self, session: &Session, changes: &Changes) -> Result<String, SummarizeError>;
}

/// Resolved AI configuration from settings and environment variables.
#[derive(Debug, Clone)]
pub struct SummaryConfig {
    pub kind: SummaryProviderKind,
    pub api_key: String,
    /// Optional model override (uses provider default if None).
    pub model: Option<String>,
}

/// Resolves the AI configuration.
///
/// Environment variables take precedence over settings:
/// - `FLOW_AI_PROVIDER` overrides `settings.ai_provider`
/// - `FLOW_AI_API_KEY` overrides `settings.ai_api_key`
/// - `FLOW_AI_MODEL` overrides `settings.ai_model`
///
/// Returns `NotConfigured` if no provider or API key is set.
pub fn resolve_config(settings: &Settings) -> Result<SummaryConfig, SummarizeError> {
    let provider = env_override("FLOW_AI_PROVIDER", settings.ai_provider.as_deref())
        .ok_or(SummarizeError::NotConfigured)?;

    let kind: SummaryProviderKind = provider.parse().map_err(|e: String| {
        tracing::warn!("{e}");
        SummarizeError::NotConfigured
    })?;

    let api_key = env_override("FLOW_AI_API_KEY", settings.ai_api_key.as_deref())
        .ok_or(SummarizeError::NotConfigured)?;

    let model = env_override("FLOW_AI_MODEL", settings.ai_model.as_deref());

    Ok(SummaryConfig {
        kind,
        api_key,
        model,
    })
}

/// Environment value if set and non-empty, else the configured one.
fn env_override(var: &str, configured: Option<&str>) -> Option<String> {
    env::var(var)
        .ok()
        .or_else(|| configured.map(|s| s.to_string()))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Builds the assistant for this process.
///
/// Falls back to [`OfflineAssistant`] when AI is not configured or the
/// provider cannot be constructed.
pub fn assistant_from_settings(settings: &Settings) -> Box<dyn SessionAssistant> {
    let config = match resolve_config(settings) {
        Ok(config) => config,
        Err(e) => {
            tracing::debug!("Using offline assistant: {e}");
            return Box::new(OfflineAssistant);
        }
    };

    match create_provider(config.kind, config.api_key, config.model) {
        Ok(provider) => {
            tracing::debug!("Using {} assistant", config.kind);
            Box::new(LlmAssistant::new(provider))
        }
        Err(e) => {
            tracing::warn!("Could not set up {} assistant: {e}", config.kind);
            Box::new(OfflineAssistant)
        }
    }
}

/// Assistant backed by an LLM provider.
pub struct LlmAssistant {
    provider: Box<dyn SummaryProvider>,
}

impl LlmAssistant {
    pub fn new(provider: Box<dyn SummaryProvider>) -> Self {
        Self { provider }
    }
}

impl SessionAssistant for LlmAssistant {
    fn analyze(&self, git_state: &GitState, message: Option<&str>) -> Result<Analysis, SummarizeError> {
        let input = prompt::format_analysis_input(git_state, message);
        let reply = self.provider.complete(prompt::analysis_system_prompt(), &input)?;
        parse_analysis(&reply)
    }

    fn restoration_message(&self, session: &Session, changes: &Changes) -> Result<String, SummarizeError> {
        let input = prompt::format_restoration_input(session, changes);
        let reply = self
            .provider
            .complete(prompt::restoration_system_prompt(), &input)?;
        let reply = normalize_whitespace(&reply);
        if reply.is_empty() {
            return Err(SummarizeError::ParseError("Empty restoration message".to_string()));
        }
        Ok(reply)
    }
}

/// Assistant used when no AI provider is configured. Every call is
/// `Unavailable`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineAssistant;

impl SessionAssistant for OfflineAssistant {
    fn analyze(&self, _git_state: &GitState, _message: Option<&str>) -> Result<Analysis, SummarizeError> {
        Err(SummarizeError::Unavailable)
    }

    fn restoration_message(&self, _session: &Session, _changes: &Changes) -> Result<String, SummarizeError> {
        Err(SummarizeError::Unavailable)
    }
}

/// Parses an analysis reply.
///
/// Accepts a bare JSON object, one wrapped in a Markdown code fence, or
/// one surrounded by prose.
pub fn parse_analysis(reply: &str) -> Result<Analysis, SummarizeError> {
    let body = strip_code_fence(reply.trim());
    let json = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => {
            return Err(SummarizeError::ParseError(
                "No JSON object in analysis response".to_string(),
            ))
        }
    };

    let analysis: Analysis =
        serde_json::from_str(json).map_err(|e| SummarizeError::ParseError(e.to_string()))?;

    if analysis.summary.trim().is_empty() {
        return Err(SummarizeError::ParseError(
            "Analysis response has no summary".to_string(),
        ));
    }
    Ok(analysis)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Trims the text and collapses runs of 3+ newlines down to 2.
fn normalize_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut consecutive_newlines = 0u32;

    for ch in text.trim().chars() {
        if ch == '\n' {
            consecutive_newlines += 1;
            if consecutive_newlines <= 2 {
                result.push(ch);
            }
        } else {
            consecutive_newlines = 0;
            result.push(ch);
        }
    }

    result
}

/// Errors that can occur while talking to the assistant.
#[derive(Debug, thiserror::Error)]
pub enum SummarizeError {
    /// No AI provider is configured.
    #[error("AI provider not configured. Set FLOW_AI_PROVIDER and FLOW_AI_API_KEY, or settings.ai_provider and settings.ai_api_key.")]
    NotConfigured,

    /// The assistant is offline.
    #[error("AI assistant unavailable")]
    Unavailable,

    /// Network or connection error when calling the provider API.
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The provider API returned a non-success HTTP status code.
    #[error("HTTP error ({status}): {body}")]
    HttpError { status: u16, body: String },

    /// Failed to parse the provider API response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

/// Assistant returning canned answers, for tests elsewhere in the crate.
#[cfg(test)]
pub(crate) struct ScriptedAssistant {
    pub analysis: Option<Analysis>,
    pub message: Option<String>,
}

#[cfg(test)]
impl ScriptedAssistant {
    pub fn analyzing(analysis: Analysis) -> Self {
        Self {
            analysis: Some(analysis),
            message: None,
        }
    }

    pub fn restoring(message: &str) -> Self {
        Self {
            analysis: None,
            message: Some(message.to_string()),
        }
    }
}

#[cfg(test)]
impl SessionAssistant for ScriptedAssistant {
    fn analyze(&self, _git_state: &GitState, _message: Option<&str>) -> Result<Analysis, SummarizeError> {
        self.analysis.clone().ok_or(SummarizeError::Unavailable)
    }

    fn restoration_message(&self, _session: &Session, _changes: &Changes) -> Result<String, SummarizeError> {
        self.message.clone().ok_or(SummarizeError::Unavailable)
    }
}
