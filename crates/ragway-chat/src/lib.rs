//! Provider-facing side of the gateway.
//!
//! The registry is the single source of truth for which providers exist,
//! which models each one accepts and whether credentials are present.
//! Provider clients speak each vendor's non-streaming chat API.

pub mod config;
pub mod providers;
pub mod registry;
pub mod types;

pub use config::LLMConfig;
pub use providers::{build_clients, ClientSettings, GeminiClient, OpenAiCompatClient, ProviderClient};
pub use registry::{ConfigurationError, ModelInfo, ProviderConfig, ProviderRegistry, ResolvedTarget};
pub use types::*;
