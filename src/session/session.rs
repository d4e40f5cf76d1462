//! In-memory view over one chat's persisted state

use std::sync::Arc;
use tracing::debug;

use crate::{
    llm::MessageRole,
    session::{now_timestamp, ChatMessage, ConversationBuffer, Database, StoreResult},
};

/// Prompt inputs derived from the conversation so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryVariables {
    pub chat_history: String,
}

/// A chat loaded from the store. Every mutation is written to the database
/// before the in-memory copies change.
pub struct ChatSession {
    pub session_id: String,
    db: Arc<Database>,
    history: Vec<ChatMessage>,
    memory: ConversationBuffer,
    important_info: Vec<String>,
}

impl ChatSession {
    /// Load a chat's messages and important info
    pub async fn load(db: Arc<Database>, session_id: impl Into<String>) -> StoreResult<Self> {
        let session_id = session_id.into();
        let history = db.get_messages(&session_id).await?;
        let important_info = db.get_important_info(&session_id).await?;

        let mut memory = ConversationBuffer::new();
        for message in &history {
            memory.add(message.role, message.content.clone());
        }

        debug!(
            session_id = %session_id,
            messages = history.len(),
            turns = memory.len(),
            facts = important_info.len(),
            "Loaded chat session"
        );

        Ok(Self {
            session_id,
            db,
            history,
            memory,
            important_info,
        })
    }

    /// Persist a message and mirror it into the history and buffer
    pub async fn add_message(&mut self, role: MessageRole, content: &str) -> StoreResult<()> {
        let timestamp = now_timestamp();
        self.db
            .insert_message(&self.session_id, role, content, &timestamp)
            .await?;

        self.history.push(ChatMessage {
            role,
            content: content.to_string(),
            timestamp,
        });
        self.memory.add(role, content);
        Ok(())
    }

    /// Persist one important fact
    pub async fn add_important_info(&mut self, content: &str) -> StoreResult<()> {
        self.db.insert_important_info(&self.session_id, content).await?;
        self.important_info.push(content.to_string());
        Ok(())
    }

    pub fn memory_variables(&self) -> MemoryVariables {
        MemoryVariables {
            chat_history: self.memory.buffer_string(),
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn important_info(&self) -> &[String] {
        &self.important_info
    }

    /// Drop messages and important info
    pub async fn clear_memory(&mut self) -> StoreResult<()> {
        self.db
            .clear(&self.session_id, crate::session::ClearScope::All)
            .await?;
        self.memory.clear();
        self.history.clear();
        self.important_info.clear();
        Ok(())
    }

    /// Drop messages only
    pub async fn clear_chat_history(&mut self) -> StoreResult<()> {
        self.db.delete_messages(&self.session_id).await?;
        self.history.clear();
        self.memory.clear();
        Ok(())
    }

    /// Drop important info only
    pub async fn clear_important_info(&mut self) -> StoreResult<()> {
        self.db.delete_important_info(&self.session_id).await?;
        self.important_info.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> Arc<Database> {
        let db = Arc::new(Database::in_memory().unwrap());
        db.ensure_chat("s").await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_add_and_reload() {
        let db = store().await;
        let mut session = ChatSession::load(db.clone(), "s").await.unwrap();
        session.add_message(MessageRole::User, "hi").await.unwrap();
        session.add_message(MessageRole::Assistant, "hello").await.unwrap();
        session.add_important_info("prefers rust").await.unwrap();

        let reloaded = ChatSession::load(db, "s").await.unwrap();
        assert_eq!(reloaded.history().len(), 2);
        assert_eq!(reloaded.history()[0].role, MessageRole::User);
        assert_eq!(reloaded.important_info(), ["prefers rust".to_string()]);
        assert_eq!(
            reloaded.memory_variables().chat_history,
            "Human: hi\nAI: hello"
        );
    }

    #[tokio::test]
    async fn test_clear_variants() {
        let db = store().await;
        let mut session = ChatSession::load(db.clone(), "s").await.unwrap();
        session.add_message(MessageRole::User, "hi").await.unwrap();
        session.add_important_info("fact").await.unwrap();

        session.clear_chat_history().await.unwrap();
        assert!(session.history().is_empty());
        assert_eq!(session.memory_variables().chat_history, "");
        assert_eq!(session.important_info().len(), 1);

        session.clear_important_info().await.unwrap();
        assert!(session.important_info().is_empty());

        session.add_message(MessageRole::User, "again").await.unwrap();
        session.add_important_info("fact 2").await.unwrap();
        session.clear_memory().await.unwrap();

        let reloaded = ChatSession::load(db, "s").await.unwrap();
        assert!(reloaded.history().is_empty());
        assert!(reloaded.important_info().is_empty());
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let db = store().await;
        db.ensure_chat("other").await.unwrap();
        let mut a = ChatSession::load(db.clone(), "s").await.unwrap();
        a.add_important_info("only in s").await.unwrap();

        let b = ChatSession::load(db, "other").await.unwrap();
        assert!(b.important_info().is_empty());
    }
}
