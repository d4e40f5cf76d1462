use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::app::DEFAULT_IMPORTANT_MARKER;
use crate::llm::ProviderConfig;
use crate::render::RendererKind;
use crate::sandbox::SandboxConfig;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for the chat database
    pub data_dir: PathBuf,

    /// Database file name, relative to `data_dir` unless absolute
    pub database_file: PathBuf,

    /// Address the HTTP server listens on
    pub bind_addr: String,

    /// Directory holding the frontend (index.html and assets)
    pub static_dir: PathBuf,

    /// AI provider type
    pub provider: String,

    /// Base URL for the model server
    pub base_url: Option<String>,

    /// Model to use
    pub model: String,

    /// Maximum tokens for responses
    pub max_tokens: Option<u32>,

    /// Temperature for sampling
    pub temperature: Option<f32>,

    /// Top-p for nucleus sampling
    pub top_p: Option<f32>,

    /// How long to wait for the model server
    #[serde(with = "crate::utils::duration_str")]
    pub request_timeout: Duration,

    /// How model output is turned into HTML
    pub renderer: RendererKind,

    /// pandoc executable
    pub pandoc_path: String,

    /// Marker that flags a line of model output as worth remembering
    pub important_marker: String,

    /// Code runner settings
    pub sandbox: SandboxConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            database_file: PathBuf::from("chat_database.db"),
            bind_addr: "127.0.0.1:5000".to_string(),
            static_dir: PathBuf::from("./templates"),
            provider: "ollama".to_string(),
            base_url: None,
            model: "llama2".to_string(),
            max_tokens: None,
            temperature: None,
            top_p: None,
            request_timeout: Duration::from_secs(300),
            renderer: RendererKind::Auto,
            pandoc_path: "pandoc".to_string(),
            important_marker: DEFAULT_IMPORTANT_MARKER.to_string(),
            sandbox: SandboxConfig::default(),
        }
    }
}

impl Config {
    /// Initialize configuration from various sources
    pub async fn init() -> Result<Self> {
        debug!("Initializing configuration");

        // File settings first, environment on top
        let mut config = Self::load_from_file().await?.unwrap_or_default();
        config.load_from_env()?;

        // Ensure data directory exists
        if !config.data_dir.exists() {
            std::fs::create_dir_all(&config.data_dir)?;
        }

        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(&mut self) -> Result<()> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an environment lookup. A value that does not
    /// parse is an error naming the variable.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("CODEPAL_PROVIDER") {
            self.provider = provider;
        }

        // Ollama's own variables, then ours
        if let Some(url) = lookup("OLLAMA_HOST").or_else(|| lookup("OLLAMA_BASE_URL")) {
            self.base_url = Some(normalize_ollama_host(&url));
        }

        if let Some(base_url) = lookup("CODEPAL_BASE_URL") {
            self.base_url = Some(base_url);
        }

        if let Some(model) = lookup("CODEPAL_MODEL") {
            self.model = model;
        }

        if let Some(max_tokens) = parse_env(&lookup, "CODEPAL_MAX_TOKENS")? {
            self.max_tokens = Some(max_tokens);
        }

        if let Some(temperature) = parse_env(&lookup, "CODEPAL_TEMPERATURE")? {
            self.temperature = Some(temperature);
        }

        if let Some(timeout) = duration_env(&lookup, "CODEPAL_REQUEST_TIMEOUT")? {
            self.request_timeout = timeout;
        }

        if let Some(data_dir) = lookup("CODEPAL_DATA_DIR") {
            self.data_dir = PathBuf::from(data_dir);
        }

        if let Some(database) = lookup("CODEPAL_DATABASE") {
            self.database_file = PathBuf::from(database);
        }

        if let Some(bind) = lookup("CODEPAL_BIND") {
            self.bind_addr = bind;
        }

        if let Some(static_dir) = lookup("CODEPAL_STATIC_DIR") {
            self.static_dir = PathBuf::from(static_dir);
        }

        if let Some(renderer) = parse_env(&lookup, "CODEPAL_RENDERER")? {
            self.renderer = renderer;
        }

        if let Some(pandoc) = lookup("CODEPAL_PANDOC") {
            self.pandoc_path = pandoc;
        }

        if let Some(timeout) = duration_env(&lookup, "CODEPAL_SANDBOX_TIMEOUT")? {
            self.sandbox.timeout = timeout;
        }

        Ok(())
    }

    /// Load configuration from codepal.json files
    pub async fn load_from_file() -> Result<Option<Self>> {
        // Configuration priority:
        // 1. ./.codepal.json
        // 2. ./codepal.json
        // 3. $CONFIG_DIR/codepal/codepal.json
        let mut config_paths = vec![
            PathBuf::from("./.codepal.json"),
            PathBuf::from("./codepal.json"),
        ];

        if let Some(config_dir) = dirs::config_dir() {
            config_paths.push(config_dir.join("codepal").join("codepal.json"));
        }

        for path in config_paths {
            if path.exists() {
                debug!("Loading configuration from: {}", path.display());
                let content = tokio::fs::read_to_string(&path).await?;
                let config: Self = serde_json::from_str(&content)
                    .map_err(|e| anyhow::anyhow!("Invalid config file {}: {}", path.display(), e))?;
                return Ok(Some(config));
            }
        }

        Ok(None)
    }

    /// Full path of the SQLite database
    pub fn database_path(&self) -> PathBuf {
        if self.database_file.is_absolute() {
            self.database_file.clone()
        } else {
            self.data_dir.join(&self.database_file)
        }
    }

    /// Settings handed to the provider factory
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            provider_type: self.provider.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            request_timeout: self.request_timeout,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(anyhow::anyhow!("Model is required"));
        }

        if let Some(max_tokens) = self.max_tokens {
            if max_tokens == 0 {
                return Err(anyhow::anyhow!("max_tokens must be greater than 0"));
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(anyhow::anyhow!("temperature must be between 0.0 and 2.0"));
            }
        }

        if let Some(top_p) = self.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Err(anyhow::anyhow!("top_p must be between 0.0 and 1.0"));
            }
        }

        if self.important_marker.trim().is_empty() {
            return Err(anyhow::anyhow!("important_marker must not be empty"));
        }

        if self.sandbox.timeout.is_zero() {
            return Err(anyhow::anyhow!("sandbox timeout must be greater than 0"));
        }

        let default_language = &self.sandbox.default_language;
        if !self
            .sandbox
            .runtimes
            .keys()
            .any(|name| name.eq_ignore_ascii_case(default_language))
        {
            return Err(anyhow::anyhow!(
                "sandbox default language '{}' has no runtime configured",
                default_language
            ));
        }

        Ok(())
    }
}

fn parse_env<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid {} value '{}': {}", key, value, e))
        })
        .transpose()
}

fn duration_env<F>(lookup: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| {
            humantime::parse_duration(value.trim())
                .map_err(|e| anyhow::anyhow!("Invalid {} value '{}': {}", key, value, e))
        })
        .transpose()
}

/// `OLLAMA_HOST` is often given without a scheme ("0.0.0.0:11434")
fn normalize_ollama_host(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}
