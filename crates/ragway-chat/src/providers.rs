//! Non-streaming chat clients for the registered providers.
//!
//! OpenAI, OpenRouter and DeepSeek share the chat-completions wire format.
//! Gemini uses `generateContent`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::LLMConfig;
use crate::registry::ProviderRegistry;
use crate::types::{Completion, Provider, ProviderError};
use ragway_core::{ChatMessage, Role};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const OPENROUTER_REFERER: &str = "http://localhost:3000";
const OPENROUTER_TITLE: &str = "Ragway Gateway";

/// One provider's chat endpoint.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// Send one chat request and wait for the full completion.
    async fn send(
        &self,
        model: &str,
        messages: &[ChatMessage],
        timeout: Duration,
    ) -> Result<Completion, ProviderError>;
}

/// Generation parameters applied to every call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientSettings {
    pub temperature: f64,
    pub max_tokens: u32,
}

impl From<&LLMConfig> for ClientSettings {
    fn from(config: &LLMConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

// ---------------------------------------------------------------------------
// Chat completions (OpenAI, OpenRouter, DeepSeek)
// ---------------------------------------------------------------------------

pub struct OpenAiCompatClient {
    http: Client,
    provider: Provider,
    base_url: String,
    api_key: String,
    settings: ClientSettings,
}

impl OpenAiCompatClient {
    pub fn new(
        http: Client,
        provider: Provider,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        settings: ClientSettings,
    ) -> Self {
        Self {
            http,
            provider,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            settings,
        }
    }

    fn request(&self, model: &str, messages: &[ChatMessage]) -> RequestBuilder {
        let body = json!({
            "model": model,
            "messages": messages,
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
        });

        let mut request = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body);

        if self.provider == Provider::OpenRouter {
            request = request
                .header("HTTP-Referer", OPENROUTER_REFERER)
                .header("X-Title", OPENROUTER_TITLE);
        }
        request
    }
}

#[async_trait]
impl ProviderClient for OpenAiCompatClient {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn send(
        &self,
        model: &str,
        messages: &[ChatMessage],
        timeout: Duration,
    ) -> Result<Completion, ProviderError> {
        debug!("POST {}/chat/completions model={}", self.base_url, model);
        let parsed = execute(self.request(model, messages).timeout(timeout)).await?;

        let text = parsed["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| malformed(self.provider, "missing choices[0].message.content"))?;

        Ok(Completion {
            text: text.to_string(),
            token_count: parsed["usage"]["total_tokens"].as_u64(),
        })
    }
}

// ---------------------------------------------------------------------------
// Gemini
// ---------------------------------------------------------------------------

pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: String,
    settings: ClientSettings,
}

impl GeminiClient {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        settings: ClientSettings,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            settings,
        }
    }

    /// System messages become `systemInstruction`; assistant turns use the
    /// `model` role.
    fn body(&self, messages: &[ChatMessage]) -> Value {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let contents: Vec<Value> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let role = if m.role == Role::Assistant { "model" } else { "user" };
                json!({ "role": role, "parts": [{ "text": m.content }] })
            })
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": self.settings.temperature,
                "maxOutputTokens": self.settings.max_tokens,
            },
        });
        if !system.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": system.join("\n\n") }] });
        }
        body
    }
}

#[async_trait]
impl ProviderClient for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn send(
        &self,
        model: &str,
        messages: &[ChatMessage],
        timeout: Duration,
    ) -> Result<Completion, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        debug!("POST {}", url);

        let request = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.body(messages))
            .timeout(timeout);
        let parsed = execute(request).await?;

        let parts = parsed["candidates"][0]["content"]["parts"]
            .as_array()
            .ok_or_else(|| malformed(Provider::Gemini, "missing candidates[0].content.parts"))?;
        let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();

        Ok(Completion {
            text,
            token_count: parsed["usageMetadata"]["totalTokenCount"].as_u64(),
        })
    }
}

// ---------------------------------------------------------------------------
// Shared plumbing
// ---------------------------------------------------------------------------

async fn execute(request: RequestBuilder) -> Result<Value, ProviderError> {
    let response = request.send().await.map_err(transport_error)?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::from_status(status.as_u16(), &body));
    }

    response.json::<Value>().await.map_err(|e| {
        if e.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Unknown {
                code: Some(status.as_u16()),
                message: format!("invalid response body: {}", e),
            }
        }
    })
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Unknown {
            code: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

fn malformed(provider: Provider, what: &str) -> ProviderError {
    warn!("Malformed {} response: {}", provider, what);
    ProviderError::Unknown {
        code: None,
        message: format!("malformed {} response: {}", provider, what),
    }
}

/// One client per credentialed provider, sharing a connection pool.
pub fn build_clients(
    config: &LLMConfig,
    registry: &ProviderRegistry,
) -> HashMap<Provider, Arc<dyn ProviderClient>> {
    let http = Client::new();
    let settings = ClientSettings::from(config);
    let mut clients: HashMap<Provider, Arc<dyn ProviderClient>> = HashMap::new();

    for provider in registry.enabled_providers() {
        let Some(api_key) = config.api_key(provider) else {
            continue;
        };
        let base_url = config.base_url(provider).unwrap_or(match provider {
            Provider::OpenRouter => OPENROUTER_BASE_URL,
            Provider::OpenAI => OPENAI_BASE_URL,
            Provider::Gemini => GEMINI_BASE_URL,
            Provider::DeepSeek => DEEPSEEK_BASE_URL,
        });

        let client: Arc<dyn ProviderClient> = match provider {
            Provider::Gemini => Arc::new(GeminiClient::new(http.clone(), base_url, api_key, settings)),
            _ => Arc::new(OpenAiCompatClient::new(
                http.clone(),
                provider,
                base_url,
                api_key,
                settings,
            )),
        };
        clients.insert(provider, client);
    }
    clients
}
