use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    errors::{LlmError, LlmResult},
    provider::LlmProvider,
    types::{CompletionRequest, FinishReason, ProviderConfig, ProviderResponse, TokenUsage},
};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Ollama API configuration
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    default_model: String,
    options: OllamaOptions,
}

/// Sampling options, sent under `options` in the request body
#[derive(Debug, Clone, Default, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

impl OllamaOptions {
    fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.num_predict.is_none() && self.top_p.is_none()
    }
}

/// Ollama generate request (for single prompts)
#[derive(Debug, Serialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "OllamaOptions::is_empty")]
    options: OllamaOptions,
}

/// Ollama response format for generate
#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    total_duration: Option<u64>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

/// Ollama models list response
#[derive(Debug, Deserialize)]
struct OllamaModelsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}

impl OllamaProvider {
    /// Create a new Ollama provider from configuration
    pub fn new(config: ProviderConfig) -> LlmResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let base_url = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            base_url,
            default_model: config.model,
            options: OllamaOptions {
                temperature: config.temperature,
                num_predict: config.max_tokens,
                top_p: config.top_p,
            },
        })
    }

    fn build_request(&self, request: CompletionRequest) -> OllamaGenerateRequest {
        OllamaGenerateRequest {
            model: self.default_model.clone(),
            prompt: request.prompt,
            stream: false,
            system: request.system,
            options: OllamaOptions {
                temperature: request.temperature.or(self.options.temperature),
                num_predict: request.max_tokens.or(self.options.num_predict),
                top_p: request.top_p.or(self.options.top_p),
            },
        }
    }

    fn into_provider_response(&self, response: OllamaGenerateResponse) -> ProviderResponse {
        let mut metadata = HashMap::new();

        if let Some(total_duration) = response.total_duration {
            metadata.insert("total_duration_ns".to_string(), serde_json::Value::from(total_duration));
        }
        if let Some(eval_count) = response.eval_count {
            metadata.insert("eval_count".to_string(), serde_json::Value::from(eval_count));
        }
        metadata.insert("model".to_string(), serde_json::Value::String(self.default_model.clone()));
        metadata.insert("provider".to_string(), serde_json::Value::String("ollama".to_string()));

        let finish_reason = match (response.done, response.done_reason.as_deref()) {
            (true, Some("length")) => Some(FinishReason::Length),
            (true, _) => Some(FinishReason::Stop),
            (false, _) => None,
        };

        ProviderResponse {
            usage: TokenUsage::new(
                response.prompt_eval_count.unwrap_or(0),
                response.eval_count.unwrap_or(0),
            ),
            finish_reason,
            metadata,
            ..ProviderResponse::text(response.response)
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn complete(&self, request: CompletionRequest) -> LlmResult<ProviderResponse> {
        let url = format!("{}/api/generate", self.base_url);

        debug!(url = %url, model = %self.default_model, "Sending Ollama generate request");

        let body = self.build_request(request);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(LlmError::from_request)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            return Err(LlmError::ApiError(format!(
                "Ollama API error {}: {}",
                status, error_text
            )));
        }

        let text = response.text().await.map_err(LlmError::from_request)?;
        let parsed: OllamaGenerateResponse = serde_json::from_str(&text)?;

        debug!(
            prompt_tokens = parsed.prompt_eval_count.unwrap_or(0),
            output_tokens = parsed.eval_count.unwrap_or(0),
            "Ollama generate finished"
        );

        Ok(self.into_provider_response(parsed))
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn list_models(&self) -> LlmResult<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        debug!("Fetching Ollama models from: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(LlmError::from_request)?;

        if !response.status().is_success() {
            return Err(LlmError::ApiError(format!(
                "Failed to fetch models: {}",
                response.status()
            )));
        }

        let models_response: OllamaModelsResponse =
            response.json().await.map_err(LlmError::from_request)?;

        Ok(models_response.models.into_iter().map(|m| m.name).collect())
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.default_model
    }

    fn validate_config(&self) -> LlmResult<()> {
        if self.default_model.trim().is_empty() {
            return Err(LlmError::ConfigError("Ollama model name is empty".to_string()));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(LlmError::ConfigError(format!(
                "Ollama base URL must start with http:// or https://, got {}",
                self.base_url
            )));
        }
        Ok(())
    }
}
