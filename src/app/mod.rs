//! Core application logic and orchestration
//!
//! [`ChatService`] ties the chat store, the model provider, the response
//! renderer and the code runner together. Both the HTTP server and the
//! one-shot CLI go through it.

mod facts;
pub mod prompt;

pub use facts::extract_important_info;
pub use prompt::{PromptBuilder, DEFAULT_IMPORTANT_MARKER};

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::Config,
    llm::{CompletionRequest, LlmError, LlmProvider, MessageRole, ProviderFactory},
    render::{create_renderer, CodeWidgets, RenderError, ResponseRenderer},
    sandbox::{RunOutcome, SandboxError, SandboxRunner},
    session::{
        now_timestamp, ChatMessage, ChatRow, ChatSession, ClearScope, Database, StoreError,
        NEW_CHAT_TITLE,
    },
    utils::text::html,
};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error("Invalid clear option specified")]
    InvalidClearOption,
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Outcome of one chat turn
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    /// Rendered HTML
    pub response: String,
    /// The model's markdown, as stored
    #[serde(skip)]
    pub raw: String,
    /// Every fact known for the chat after this turn
    pub important_info: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatHistory {
    pub history: Vec<ChatMessage>,
    pub important_info: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub provider: String,
    pub model: String,
    pub model_reachable: bool,
}

/// Main application structure
pub struct ChatService {
    db: Arc<Database>,
    provider: Arc<dyn LlmProvider>,
    renderer: ResponseRenderer,
    sandbox: SandboxRunner,
    prompts: PromptBuilder,
}

impl ChatService {
    pub fn new(
        db: Arc<Database>,
        provider: Arc<dyn LlmProvider>,
        renderer: ResponseRenderer,
        sandbox: SandboxRunner,
        prompts: PromptBuilder,
    ) -> Self {
        Self {
            db,
            provider,
            renderer,
            sandbox,
            prompts,
        }
    }

    /// Wire everything up from configuration
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        debug!("Creating chat service");
        config.validate()?;

        let db_path = config.database_path();
        let db = Arc::new(Database::new(&db_path)?);
        info!("Using chat database at {}", db_path.display());

        let provider: Arc<dyn LlmProvider> =
            Arc::from(ProviderFactory::create_provider(config.provider_config())?);
        provider.validate_config()?;

        let sandbox = SandboxRunner::new(config.sandbox.clone());
        let widgets = CodeWidgets::new(sandbox.runnable_languages());
        let renderer = ResponseRenderer::new(
            create_renderer(config.renderer, &config.pandoc_path),
            widgets,
        );

        info!(
            provider = provider.name(),
            model = provider.model(),
            renderer = renderer.renderer_name(),
            "Chat service ready"
        );

        Ok(Self::new(
            db,
            provider,
            renderer,
            sandbox,
            PromptBuilder::new(config.important_marker.clone()),
        ))
    }

    pub async fn list_chats(&self) -> ServiceResult<Vec<ChatRow>> {
        Ok(self.db.list_chats().await?)
    }

    pub async fn get_chat(&self, session_id: &str) -> ServiceResult<Option<ChatRow>> {
        Ok(self.db.get_chat(session_id).await?)
    }

    /// Start an empty chat
    pub async fn new_chat(&self) -> ServiceResult<ChatRow> {
        let id = Uuid::new_v4().to_string();
        let chat = self
            .db
            .create_chat(&id, NEW_CHAT_TITLE, &now_timestamp())
            .await?;
        info!(chat_id = %id, "Created chat");
        Ok(chat)
    }

    /// Remove a chat and everything stored for it. Returns false when there
    /// was nothing to delete.
    pub async fn delete_chat(&self, session_id: &str) -> ServiceResult<bool> {
        let messages = self.db.get_message_count(session_id).await?;
        let deleted = self.db.delete_chat(session_id).await?;
        if deleted {
            info!(chat_id = %session_id, messages, "Deleted chat");
        }
        Ok(deleted)
    }

    /// Run one turn of the conversation
    pub async fn chat(&self, session_id: &str, message: &str) -> ServiceResult<ChatReply> {
        if self.db.ensure_chat(session_id).await? {
            debug!(chat_id = %session_id, "Created chat on first message");
        }

        let mut session = ChatSession::load(self.db.clone(), session_id).await?;
        session.add_message(MessageRole::User, message).await?;
        self.db.update_chat_metadata(session_id, message).await?;

        let memory = session.memory_variables();
        let prompt = self
            .prompts
            .build(message, &memory.chat_history, session.important_info());

        let response = self.provider.complete(CompletionRequest::new(prompt)).await?;
        let raw = response.content;
        debug!(
            chat_id = %session_id,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Model replied"
        );

        session.add_message(MessageRole::Assistant, &raw).await?;

        let facts = extract_important_info(&raw, self.prompts.marker());
        for fact in &facts {
            session.add_important_info(fact).await?;
        }
        if !facts.is_empty() {
            info!(chat_id = %session_id, count = facts.len(), "Stored important info");
        }

        // The turn is already stored, so a converter failure becomes the body
        let html = match self.renderer.render(&raw).await {
            Ok(html) => html,
            Err(RenderError::Io(e)) => return Err(RenderError::Io(e).into()),
            Err(e) => {
                warn!(
                    chat_id = %session_id,
                    renderer = self.renderer.renderer_name(),
                    "Rendering failed: {}",
                    e
                );
                html::escape(&e.to_string())
            }
        };

        Ok(ChatReply {
            response: html,
            raw,
            important_info: session.important_info().to_vec(),
        })
    }

    pub async fn chat_history(&self, session_id: &str) -> ServiceResult<ChatHistory> {
        let session = ChatSession::load(self.db.clone(), session_id).await?;
        Ok(ChatHistory {
            history: session.history().to_vec(),
            important_info: session.important_info().to_vec(),
        })
    }

    /// Clear part of a chat's memory. `option` is `all`, `chat` or
    /// `important`; the returned text confirms what was cleared.
    pub async fn clear_memory(&self, session_id: &str, option: &str) -> ServiceResult<&'static str> {
        let scope: ClearScope = option
            .parse()
            .map_err(|_| ServiceError::InvalidClearOption)?;

        let mut session = ChatSession::load(self.db.clone(), session_id).await?;
        let message = match scope {
            ClearScope::All => {
                session.clear_memory().await?;
                "All memory cleared successfully"
            }
            ClearScope::Chat => {
                session.clear_chat_history().await?;
                "Chat history cleared successfully"
            }
            ClearScope::Important => {
                session.clear_important_info().await?;
                "Important information cleared successfully"
            }
        };

        info!(chat_id = %session_id, scope = option, "Cleared memory");
        Ok(message)
    }

    /// Execute a snippet from a code widget
    pub async fn test_code(&self, code: &str, language: Option<&str>) -> ServiceResult<RunOutcome> {
        Ok(self.sandbox.run(code, language).await?)
    }

    pub async fn list_models(&self) -> ServiceResult<Vec<String>> {
        Ok(self.provider.list_models().await?)
    }

    pub async fn health(&self) -> HealthStatus {
        let model_reachable = self.provider.health_check().await;
        HealthStatus {
            status: if model_reachable { "ok" } else { "degraded" },
            provider: self.provider.name().to_string(),
            model: self.provider.model().to_string(),
            model_reachable,
        }
    }
}
