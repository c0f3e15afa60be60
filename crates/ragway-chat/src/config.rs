//! LLM credentials and per-provider defaults.
//!
//! Read once at startup from `llm-config.json`; API keys missing from the
//! file fall back to the process environment.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::types::Provider;

pub const DEFAULT_OPENROUTER_MODEL: &str = "openai/gpt-4o-mini";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_DEEPSEEK_MODEL: &str = "deepseek-chat";

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Stored LLM configuration (`llm-config.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    #[serde(default)]
    pub openrouter_api_key: Option<String>,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    #[serde(default)]
    pub deepseek_api_key: Option<String>,
    #[serde(default = "default_openrouter_model")]
    pub openrouter_model: String,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    #[serde(default = "default_deepseek_model")]
    pub deepseek_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Base URL overrides keyed by provider name (proxies, test servers).
    #[serde(default)]
    pub base_urls: BTreeMap<String, String>,
}

fn default_openrouter_model() -> String {
    DEFAULT_OPENROUTER_MODEL.into()
}
fn default_openai_model() -> String {
    DEFAULT_OPENAI_MODEL.into()
}
fn default_gemini_model() -> String {
    DEFAULT_GEMINI_MODEL.into()
}
fn default_deepseek_model() -> String {
    DEFAULT_DEEPSEEK_MODEL.into()
}
fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}
fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            openrouter_api_key: None,
            openai_api_key: None,
            gemini_api_key: None,
            deepseek_api_key: None,
            openrouter_model: default_openrouter_model(),
            openai_model: default_openai_model(),
            gemini_model: default_gemini_model(),
            deepseek_model: default_deepseek_model(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            base_urls: BTreeMap::new(),
        }
    }
}

impl LLMConfig {
    /// Load config from file, falling back to env vars and defaults.
    pub fn load(config_path: &Path) -> Self {
        Self::load_with(config_path, |key| std::env::var(key).ok())
    }

    /// Like [`LLMConfig::load`] with an explicit variable source.
    pub fn load_with<F>(config_path: &Path, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: LLMConfig = match std::fs::read_to_string(config_path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                warn!("Ignoring malformed {}: {}", config_path.display(), e);
                LLMConfig::default()
            }),
            Err(_) => LLMConfig::default(),
        };

        for provider in Provider::ALL {
            let slot = config.api_key_slot(provider);
            if slot.as_deref().map_or(true, |k| k.trim().is_empty()) {
                *slot = lookup(provider.credential_env_var());
            }
            if slot.as_deref().is_some_and(|k| k.trim().is_empty()) {
                *slot = None;
            }
        }

        info!(
            "LLM config loaded, credentials present for: [{}]",
            Provider::ALL
                .iter()
                .filter(|p| config.api_key(**p).is_some())
                .map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        config
    }

    fn api_key_slot(&mut self, provider: Provider) -> &mut Option<String> {
        match provider {
            Provider::OpenRouter => &mut self.openrouter_api_key,
            Provider::OpenAI => &mut self.openai_api_key,
            Provider::Gemini => &mut self.gemini_api_key,
            Provider::DeepSeek => &mut self.deepseek_api_key,
        }
    }

    pub fn api_key(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::OpenRouter => self.openrouter_api_key.as_deref(),
            Provider::OpenAI => self.openai_api_key.as_deref(),
            Provider::Gemini => self.gemini_api_key.as_deref(),
            Provider::DeepSeek => self.deepseek_api_key.as_deref(),
        }
    }

    /// Configured default model (not yet validated against the whitelist).
    pub fn default_model(&self, provider: Provider) -> &str {
        match provider {
            Provider::OpenRouter => &self.openrouter_model,
            Provider::OpenAI => &self.openai_model,
            Provider::Gemini => &self.gemini_model,
            Provider::DeepSeek => &self.deepseek_model,
        }
    }

    pub fn base_url(&self, provider: Provider) -> Option<&str> {
        self.base_urls.get(provider.as_str()).map(String::as_str)
    }
}
