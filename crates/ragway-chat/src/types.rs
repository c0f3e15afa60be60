//! Provider identities, completions and provider errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// LLM provider identifier. The set is fixed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenRouter,
    OpenAI,
    Gemini,
    DeepSeek,
}

impl Provider {
    /// Registry order; also the order used to pick a default provider.
    pub const ALL: [Provider; 4] = [
        Provider::OpenRouter,
        Provider::OpenAI,
        Provider::Gemini,
        Provider::DeepSeek,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenRouter => "openrouter",
            Provider::OpenAI => "openai",
            Provider::Gemini => "gemini",
            Provider::DeepSeek => "deepseek",
        }
    }

    /// Exact, case-sensitive match against the registered names.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }

    /// Environment variable holding this provider's API key.
    pub fn credential_env_var(&self) -> &'static str {
        match self {
            Provider::OpenRouter => "OPENROUTER_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::Gemini => "GOOGLE_GEMINI_API_KEY",
            Provider::DeepSeek => "DEEPSEEK_API_KEY",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of work a caller wants a provider recommendation for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    #[default]
    General,
    Coding,
    Creative,
    Analysis,
    Legal,
}

impl TaskType {
    pub const ALL: [TaskType; 5] = [
        TaskType::General,
        TaskType::Coding,
        TaskType::Creative,
        TaskType::Analysis,
        TaskType::Legal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::General => "general",
            TaskType::Coding => "coding",
            TaskType::Creative => "creative",
            TaskType::Analysis => "analysis",
            TaskType::Legal => "legal",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// Providers best suited to this task, most preferred first.
    pub fn preference(&self) -> [Provider; 4] {
        use Provider::*;
        match self {
            TaskType::General => [OpenAI, DeepSeek, OpenRouter, Gemini],
            TaskType::Coding => [DeepSeek, OpenRouter, OpenAI, Gemini],
            TaskType::Creative => [OpenAI, Gemini, OpenRouter, DeepSeek],
            TaskType::Analysis | TaskType::Legal => [OpenAI, DeepSeek, Gemini, OpenRouter],
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text returned by a provider call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Completion {
    pub text: String,
    #[serde(rename = "tokenCount", skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u64>,
}

impl Completion {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            token_count: None,
        }
    }
}

/// Failure of a single provider call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider call timed out")]
    Timeout,

    #[error("provider rate limit exceeded")]
    RateLimited,

    #[error("provider rejected credentials")]
    Unauthorized,

    #[error("provider error (status {code:?}): {message}")]
    Unknown { code: Option<u16>, message: String },
}

impl ProviderError {
    /// Map a non-success HTTP status to an error.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => ProviderError::Unauthorized,
            408 => ProviderError::Timeout,
            429 => ProviderError::RateLimited,
            _ => ProviderError::Unknown {
                code: Some(status),
                message: truncate(body, 300),
            },
        }
    }

    /// Stable machine-readable tag.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Timeout => "timeout",
            ProviderError::RateLimited => "rate_limited",
            ProviderError::Unauthorized => "unauthorized",
            ProviderError::Unknown { .. } => "unknown",
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
