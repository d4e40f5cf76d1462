//! Provider trait and factory for LLM providers

use async_trait::async_trait;

use crate::llm::{
    errors::{LlmError, LlmResult},
    ollama::OllamaProvider,
    types::{CompletionRequest, ProviderConfig, ProviderResponse},
};

/// Trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a single prompt and wait for the full completion
    async fn complete(&self, request: CompletionRequest) -> LlmResult<ProviderResponse>;

    /// Whether the model server answers at all
    async fn health_check(&self) -> bool;

    /// Models the server has available locally
    async fn list_models(&self) -> LlmResult<Vec<String>>;

    /// Get the provider name
    fn name(&self) -> &str;

    /// Get the model name
    fn model(&self) -> &str;

    /// Validate the configuration
    fn validate_config(&self) -> LlmResult<()>;
}

/// Factory for creating LLM providers
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create a new provider from configuration
    pub fn create_provider(config: ProviderConfig) -> LlmResult<Box<dyn LlmProvider>> {
        match config.provider_type.as_str() {
            "ollama" => {
                let provider = OllamaProvider::new(config)?;
                Ok(Box::new(provider))
            }
            _ => Err(LlmError::ConfigError(format!(
                "Unsupported provider type: {} (available: {})",
                config.provider_type,
                Self::available_providers().join(", ")
            ))),
        }
    }

    /// Get available provider types
    pub fn available_providers() -> Vec<&'static str> {
        vec!["ollama"]
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_creates_ollama() {
        let provider = ProviderFactory::create_provider(ProviderConfig::default()).unwrap();
        assert_eq!(provider.name(), "ollama");
        assert_eq!(provider.model(), "llama2");
    }

    #[test]
    fn test_factory_rejects_unknown_provider() {
        let config = ProviderConfig {
            provider_type: "openai".to_string(),
            ..Default::default()
        };
        let err = ProviderFactory::create_provider(config).err().unwrap();
        assert!(matches!(err, LlmError::ConfigError(_)));
        assert!(err.to_string().contains("openai"));
    }
}
