//! Provider registry and model validator.
//!
//! Built once at startup from [`LLMConfig`] and shared read-only. Validation
//! is a pure lookup: an unknown provider, a model outside the provider's
//! whitelist or a provider without credentials is rejected, never coerced.

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{
    LLMConfig, DEFAULT_DEEPSEEK_MODEL, DEFAULT_GEMINI_MODEL, DEFAULT_OPENAI_MODEL,
    DEFAULT_OPENROUTER_MODEL,
};
use crate::types::{Provider, TaskType};

/// Static metadata for a whitelisted model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: &'static str,
    pub provider: Provider,
    pub context_length: u32,
    pub cost_per_1k_tokens: f64,
    pub supports_vision: bool,
    pub supports_function_calling: bool,
}

const fn model(
    name: &'static str,
    provider: Provider,
    context_length: u32,
    cost_per_1k_tokens: f64,
    supports_vision: bool,
    supports_function_calling: bool,
) -> ModelInfo {
    ModelInfo {
        name,
        provider,
        context_length,
        cost_per_1k_tokens,
        supports_vision,
        supports_function_calling,
    }
}

/// Every model the gateway accepts, grouped by provider in whitelist order.
static CATALOGUE: &[ModelInfo] = &[
    model("openai/gpt-4o-mini", Provider::OpenRouter, 128_000, 0.00015, true, true),
    model("anthropic/claude-3.5-sonnet", Provider::OpenRouter, 200_000, 0.003, false, true),
    model("anthropic/claude-3-haiku", Provider::OpenRouter, 200_000, 0.00025, false, false),
    model("meta-llama/llama-3.1-405b-instruct", Provider::OpenRouter, 131_072, 0.005, false, true),
    model("mistralai/mistral-large", Provider::OpenRouter, 128_000, 0.008, false, true),
    model("google/gemma-2-27b-it", Provider::OpenRouter, 8_192, 0.0001, false, false),
    model("gpt-4o", Provider::OpenAI, 128_000, 0.005, true, true),
    model("gpt-4o-mini", Provider::OpenAI, 128_000, 0.00015, true, true),
    model("gpt-4-turbo", Provider::OpenAI, 128_000, 0.01, true, true),
    model("gpt-4", Provider::OpenAI, 8_192, 0.03, false, true),
    model("gpt-3.5-turbo", Provider::OpenAI, 16_385, 0.001, false, true),
    model("gemini-1.5-flash", Provider::Gemini, 1_000_000, 0.00035, true, true),
    model("gemini-1.5-pro", Provider::Gemini, 2_000_000, 0.00125, true, true),
    model("gemini-pro", Provider::Gemini, 32_768, 0.0005, false, true),
    model("gemini-pro-vision", Provider::Gemini, 16_384, 0.00025, true, false),
    model("deepseek-chat", Provider::DeepSeek, 32_768, 0.0001, false, true),
    model("deepseek-coder", Provider::DeepSeek, 16_384, 0.0001, false, true),
    model("deepseek-math", Provider::DeepSeek, 4_096, 0.0001, false, false),
];

/// Rejections raised before any provider is contacted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),

    #[error("model '{model}' is not allowed for provider '{provider}' (allowed: {})", allowed.join(", "))]
    ModelNotAllowed {
        provider: Provider,
        model: String,
        allowed: Vec<String>,
    },

    #[error("no credentials configured for provider '{0}'")]
    MissingCredentials(Provider),

    #[error("no provider has credentials configured")]
    NoProviderConfigured,

    #[error("fan-out requires at least one provider")]
    NoProviders,

    #[error("provider '{0}' listed more than once")]
    DuplicateProvider(Provider),

    #[error("single mode accepts at most one provider, got {0}")]
    TooManyTargets(usize),
}

impl ConfigurationError {
    /// Stable machine-readable tag.
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigurationError::UnknownProvider(_) => "unknown_provider",
            ConfigurationError::ModelNotAllowed { .. } => "model_not_allowed",
            ConfigurationError::MissingCredentials(_) => "missing_credentials",
            ConfigurationError::NoProviderConfigured => "no_provider_configured",
            ConfigurationError::NoProviders => "no_providers",
            ConfigurationError::DuplicateProvider(_) => "duplicate_provider",
            ConfigurationError::TooManyTargets(_) => "too_many_targets",
        }
    }
}

/// Registry view of one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub provider: Provider,
    pub allowed_models: Vec<String>,
    pub default_model: String,
    pub has_credentials: bool,
}

impl ProviderConfig {
    pub fn allows(&self, model: &str) -> bool {
        self.allowed_models.iter().any(|m| m == model)
    }
}

/// A provider/model pair that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResolvedTarget {
    pub provider: Provider,
    pub model: String,
}

impl std::fmt::Display for ResolvedTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<ProviderConfig>,
}

impl ProviderRegistry {
    pub fn from_config(config: &LLMConfig) -> Self {
        let providers = Provider::ALL
            .into_iter()
            .map(|provider| {
                let mut entry = builtin(provider, config.api_key(provider).is_some());
                let configured = config.default_model(provider);
                if entry.allows(configured) {
                    entry.default_model = configured.to_string();
                } else {
                    warn!(
                        "Configured default model '{}' is not allowed for {}, using '{}'",
                        configured, provider, entry.default_model
                    );
                }
                entry
            })
            .collect::<Vec<_>>();

        let registry = Self { providers };
        info!(
            "Provider registry ready, enabled: {:?}",
            registry.enabled_providers()
        );
        registry
    }

    /// Registry with built-in defaults where only `credentialed` have keys.
    pub fn with_credentials(credentialed: &[Provider]) -> Self {
        Self {
            providers: Provider::ALL
                .into_iter()
                .map(|p| builtin(p, credentialed.contains(&p)))
                .collect(),
        }
    }

    pub fn get(&self, provider: Provider) -> Option<&ProviderConfig> {
        self.providers.iter().find(|c| c.provider == provider)
    }

    /// Check a provider/model pair.
    ///
    /// The whitelist is checked before credentials so a bad model name is
    /// reported even on a provider that has no key.
    pub fn validate(&self, provider: &str, model: &str) -> Result<ResolvedTarget, ConfigurationError> {
        let config = Provider::parse(provider)
            .and_then(|p| self.get(p))
            .ok_or_else(|| ConfigurationError::UnknownProvider(provider.to_string()))?;

        if !config.allows(model) {
            return Err(ConfigurationError::ModelNotAllowed {
                provider: config.provider,
                model: model.to_string(),
                allowed: config.allowed_models.clone(),
            });
        }
        if !config.has_credentials {
            return Err(ConfigurationError::MissingCredentials(config.provider));
        }

        Ok(ResolvedTarget {
            provider: config.provider,
            model: model.to_string(),
        })
    }

    /// Validate a target, substituting the provider's default model when
    /// none is given.
    pub fn resolve(
        &self,
        provider: &str,
        model: Option<&str>,
    ) -> Result<ResolvedTarget, ConfigurationError> {
        match model {
            Some(model) => self.validate(provider, model),
            None => {
                let config = Provider::parse(provider)
                    .and_then(|p| self.get(p))
                    .ok_or_else(|| ConfigurationError::UnknownProvider(provider.to_string()))?;
                self.validate(provider, &config.default_model)
            }
        }
    }

    /// First credentialed provider in registry order, with its default model.
    pub fn default_target(&self) -> Result<ResolvedTarget, ConfigurationError> {
        self.providers
            .iter()
            .find(|c| c.has_credentials)
            .map(|c| ResolvedTarget {
                provider: c.provider,
                model: c.default_model.clone(),
            })
            .ok_or(ConfigurationError::NoProviderConfigured)
    }

    /// Most preferred credentialed provider for `task`, with its default model.
    pub fn recommend(&self, task: TaskType) -> Result<ResolvedTarget, ConfigurationError> {
        task.preference()
            .into_iter()
            .filter_map(|p| self.get(p))
            .find(|c| c.has_credentials)
            .map(|c| ResolvedTarget {
                provider: c.provider,
                model: c.default_model.clone(),
            })
            .ok_or(ConfigurationError::NoProviderConfigured)
    }

    pub fn enabled_providers(&self) -> Vec<Provider> {
        self.providers
            .iter()
            .filter(|c| c.has_credentials)
            .map(|c| c.provider)
            .collect()
    }

    pub fn providers(&self) -> &[ProviderConfig] {
        &self.providers
    }

    pub fn models(&self, provider: Provider) -> Vec<&'static ModelInfo> {
        CATALOGUE.iter().filter(|m| m.provider == provider).collect()
    }

    pub fn catalogue(&self) -> &'static [ModelInfo] {
        CATALOGUE
    }
}

fn builtin(provider: Provider, has_credentials: bool) -> ProviderConfig {
    let allowed_models: Vec<String> = CATALOGUE
        .iter()
        .filter(|m| m.provider == provider)
        .map(|m| m.name.to_string())
        .collect();
    let default_model = match provider {
        Provider::OpenRouter => DEFAULT_OPENROUTER_MODEL,
        Provider::OpenAI => DEFAULT_OPENAI_MODEL,
        Provider::Gemini => DEFAULT_GEMINI_MODEL,
        Provider::DeepSeek => DEFAULT_DEEPSEEK_MODEL,
    }
    .to_string();
    ProviderConfig {
        provider,
        allowed_models,
        default_model,
        has_credentials,
    }
}
