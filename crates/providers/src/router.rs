//! Provider router: selects the LLM backend named by config.
//!
//! Every backend this crate ships speaks the OpenAI-compatible protocol and
//! supports native tool calling, so the router always yields
//! [`LanguageModel::ToolCalling`].

use std::collections::HashMap;
use std::sync::Arc;

use codeact_config::AppConfig;
use codeact_core::error::ProviderError;
use codeact_core::provider::{LanguageModel, ToolCallingProvider};
use tracing::debug;

use crate::openai_compat::OpenAiCompatProvider;

/// Registry of named providers with a default.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn ToolCallingProvider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn ToolCallingProvider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolCallingProvider>> {
        self.providers.get(name).cloned()
    }

    /// The default provider as a language model.
    pub fn default_model(&self) -> Result<LanguageModel, ProviderError> {
        self.get(&self.default_provider)
            .map(LanguageModel::ToolCalling)
            .ok_or_else(|| ProviderError::NotConfigured(self.default_provider.clone()))
    }

    /// List all registered provider names.
    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

/// Build the router from configuration.
pub fn build_router(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for (name, provider_config) in &config.providers {
        let api_key = provider_config
            .api_key
            .clone()
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();

        let base_url = provider_config
            .api_url
            .clone()
            .unwrap_or_else(|| default_base_url(name));

        debug!(provider = %name, base_url = %base_url, "Registering provider");
        router.register(name.clone(), Arc::new(OpenAiCompatProvider::new(name, &base_url, &api_key)));
    }

    // Ensure the default provider exists (even if not explicitly configured)
    if router.get(&config.default_provider).is_none() {
        let api_key = config.api_key.clone().unwrap_or_default();
        let base_url = default_base_url(&config.default_provider);
        router.register(
            config.default_provider.clone(),
            Arc::new(OpenAiCompatProvider::new(&config.default_provider, &base_url, &api_key)),
        );
    }

    router
}

/// Build the configured default language model.
pub fn build_from_config(config: &AppConfig) -> Result<LanguageModel, ProviderError> {
    build_router(config).default_model()
}

/// The model id to request: a per-provider override wins over the default.
pub fn model_for(config: &AppConfig) -> String {
    config
        .providers
        .get(&config.default_provider)
        .and_then(|p| p.default_model.clone())
        .unwrap_or_else(|| config.default_model.clone())
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "fireworks" => "https://api.fireworks.ai/inference/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
