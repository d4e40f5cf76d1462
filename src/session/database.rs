//! Database layer for chat persistence

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::llm::MessageRole;
use crate::utils::text::string::truncate_chars;

/// Title given to chats before the first message arrives
pub const NEW_CHAT_TITLE: &str = "New Chat";

/// Characters of the last user message kept in a chat title
const TITLE_MAX_CHARS: usize = 30;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// What a memory clear removes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearScope {
    /// Messages and important info
    All,
    /// Messages only
    Chat,
    /// Important info only
    Important,
}

impl FromStr for ClearScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(ClearScope::All),
            "chat" => Ok(ClearScope::Chat),
            "important" => Ok(ClearScope::Important),
            other => Err(other.to_string()),
        }
    }
}

/// Database row representation of a chat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRow {
    pub id: String,
    pub title: Option<String>,
    pub date: Option<String>,
    pub last_message: Option<String>,
}

impl ChatRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ChatRow {
            id: row.get(0)?,
            title: row.get(1)?,
            date: row.get(2)?,
            last_message: row.get(3)?,
        })
    }
}

/// A persisted chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: String,
}

/// Current time in the format stored in `date` and `timestamp` columns.
/// Fixed-width so lexical order matches chronological order.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Chat title derived from the latest user message
pub fn title_from_message(message: &str) -> String {
    truncate_chars(message, TITLE_MAX_CHARS)
}

/// Database manager for chat persistence
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database file
    pub fn new<P: AsRef<Path>>(db_path: P) -> StoreResult<Self> {
        debug!("Opening chat database at {}", db_path.as_ref().display());
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn)
    }

    /// Database that lives only as long as the process
    pub fn in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::create_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create the necessary database tables
    fn create_tables(conn: &Connection) -> StoreResult<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS chats (
                id TEXT PRIMARY KEY,
                title TEXT,
                date TEXT,
                last_message TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id TEXT,
                role TEXT,
                content TEXT,
                timestamp TEXT,
                FOREIGN KEY (chat_id) REFERENCES chats (id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS important_info (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id TEXT,
                content TEXT,
                FOREIGN KEY (chat_id) REFERENCES chats (id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_messages_chat_id ON messages (chat_id)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_important_info_chat_id ON important_info (chat_id)",
            [],
        )?;

        conn.execute("CREATE INDEX IF NOT EXISTS idx_chats_date ON chats (date)", [])?;

        Ok(())
    }

    /// Insert a new chat
    pub async fn create_chat(&self, id: &str, title: &str, date: &str) -> StoreResult<ChatRow> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO chats (id, title, date, last_message) VALUES (?1, ?2, ?3, NULL)",
            params![id, title, date],
        )?;

        Ok(ChatRow {
            id: id.to_string(),
            title: Some(title.to_string()),
            date: Some(date.to_string()),
            last_message: None,
        })
    }

    /// Make sure a chat row exists so its messages satisfy the foreign key.
    /// Returns true when the row was created.
    pub async fn ensure_chat(&self, id: &str) -> StoreResult<bool> {
        let conn = self.conn.lock().await;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO chats (id, title, date, last_message) VALUES (?1, ?2, ?3, NULL)",
            params![id, NEW_CHAT_TITLE, now_timestamp()],
        )?;
        Ok(inserted > 0)
    }

    /// Retitle a chat after its latest user message
    pub async fn update_chat_metadata(&self, id: &str, last_message: &str) -> StoreResult<()> {
        let title = title_from_message(last_message);
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE chats SET title = ?1, last_message = ?2 WHERE id = ?3",
            params![title, last_message, id],
        )?;
        Ok(())
    }

    /// Get a chat by ID
    pub async fn get_chat(&self, id: &str) -> StoreResult<Option<ChatRow>> {
        let conn = self.conn.lock().await;
        let chat = conn
            .query_row(
                "SELECT id, title, date, last_message FROM chats WHERE id = ?1",
                [id],
                ChatRow::from_row,
            )
            .optional()?;
        Ok(chat)
    }

    /// List all chats, newest first
    pub async fn list_chats(&self) -> StoreResult<Vec<ChatRow>> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare("SELECT id, title, date, last_message FROM chats ORDER BY date DESC")?;
        let chats = stmt
            .query_map([], ChatRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(chats)
    }

    /// Delete a chat together with its messages and important info.
    /// Returns false when no such chat existed.
    pub async fn delete_chat(&self, id: &str) -> StoreResult<bool> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM messages WHERE chat_id = ?1", [id])?;
        tx.execute("DELETE FROM important_info WHERE chat_id = ?1", [id])?;
        let deleted = tx.execute("DELETE FROM chats WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    /// Insert a message
    pub async fn insert_message(
        &self,
        chat_id: &str,
        role: MessageRole,
        content: &str,
        timestamp: &str,
    ) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO messages (chat_id, role, content, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![chat_id, role.as_str(), content, timestamp],
        )?;
        Ok(())
    }

    /// Get messages for a chat, oldest first
    pub async fn get_messages(&self, chat_id: &str) -> StoreResult<Vec<ChatMessage>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT role, content, timestamp FROM messages
             WHERE chat_id = ?1 ORDER BY timestamp ASC, id ASC",
        )?;
        let messages = stmt
            .query_map([chat_id], |row| {
                let role: Option<String> = row.get(0)?;
                Ok(ChatMessage {
                    role: MessageRole::from_stored(role.as_deref().unwrap_or_default()),
                    content: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    timestamp: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(messages)
    }

    /// Record one important fact
    pub async fn insert_important_info(&self, chat_id: &str, content: &str) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO important_info (chat_id, content) VALUES (?1, ?2)",
            params![chat_id, content],
        )?;
        Ok(())
    }

    /// Important facts for a chat, in the order they were recorded
    pub async fn get_important_info(&self, chat_id: &str) -> StoreResult<Vec<String>> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare("SELECT content FROM important_info WHERE chat_id = ?1 ORDER BY id ASC")?;
        let info = stmt
            .query_map([chat_id], |row| {
                Ok(row.get::<_, Option<String>>(0)?.unwrap_or_default())
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(info)
    }

    /// Delete messages for a chat
    pub async fn delete_messages(&self, chat_id: &str) -> StoreResult<usize> {
        let conn = self.conn.lock().await;
        Ok(conn.execute("DELETE FROM messages WHERE chat_id = ?1", [chat_id])?)
    }

    /// Delete important info for a chat
    pub async fn delete_important_info(&self, chat_id: &str) -> StoreResult<usize> {
        let conn = self.conn.lock().await;
        Ok(conn.execute("DELETE FROM important_info WHERE chat_id = ?1", [chat_id])?)
    }

    /// Clear one or both kinds of memory in a single transaction
    pub async fn clear(&self, chat_id: &str, scope: ClearScope) -> StoreResult<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        if matches!(scope, ClearScope::All | ClearScope::Chat) {
            tx.execute("DELETE FROM messages WHERE chat_id = ?1", [chat_id])?;
        }
        if matches!(scope, ClearScope::All | ClearScope::Important) {
            tx.execute("DELETE FROM important_info WHERE chat_id = ?1", [chat_id])?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Get message count for a chat
    pub async fn get_message_count(&self, chat_id: &str) -> StoreResult<usize> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE chat_id = ?1",
            [chat_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded(id: &str) -> Database {
        let db = Database::in_memory().unwrap();
        db.create_chat(id, NEW_CHAT_TITLE, &now_timestamp()).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_create_and_get_chat() {
        let db = seeded("abc").await;
        let chat = db.get_chat("abc").await.unwrap().unwrap();
        assert_eq!(chat.title.as_deref(), Some("New Chat"));
        assert!(chat.last_message.is_none());
        assert!(db.get_chat("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_chats_newest_first() {
        let db = Database::in_memory().unwrap();
        db.create_chat("old", NEW_CHAT_TITLE, "2024-01-01T00:00:00.000000Z").await.unwrap();
        db.create_chat("new", NEW_CHAT_TITLE, "2024-06-01T00:00:00.000000Z").await.unwrap();

        let ids: Vec<String> = db.list_chats().await.unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_ensure_chat_is_idempotent() {
        let db = Database::in_memory().unwrap();
        assert!(db.ensure_chat("default").await.unwrap());
        assert!(!db.ensure_chat("default").await.unwrap());
        assert_eq!(db.list_chats().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_metadata_truncates_title() {
        let db = seeded("c").await;
        let long = "How do I reverse a linked list in place without recursion?";
        db.update_chat_metadata("c", long).await.unwrap();

        let chat = db.get_chat("c").await.unwrap().unwrap();
        assert_eq!(chat.title.as_deref(), Some("How do I reverse a linked list..."));
        assert_eq!(chat.last_message.as_deref(), Some(long));

        db.update_chat_metadata("c", "short").await.unwrap();
        let chat = db.get_chat("c").await.unwrap().unwrap();
        assert_eq!(chat.title.as_deref(), Some("short"));
    }

    #[test]
    fn test_title_boundary() {
        let exactly_thirty = "a".repeat(30);
        assert_eq!(title_from_message(&exactly_thirty), exactly_thirty);
        assert_eq!(title_from_message(&"a".repeat(31)), format!("{}...", "a".repeat(30)));
        assert_eq!(title_from_message(&"é".repeat(31)), format!("{}...", "é".repeat(30)));
    }

    #[tokio::test]
    async fn test_messages_in_order() {
        let db = seeded("c").await;
        db.insert_message("c", MessageRole::User, "hi", "2024-01-01T00:00:01.000000Z").await.unwrap();
        db.insert_message("c", MessageRole::Assistant, "hello", "2024-01-01T00:00:02.000000Z").await.unwrap();
        // same timestamp falls back to insertion order
        db.insert_message("c", MessageRole::User, "again", "2024-01-01T00:00:02.000000Z").await.unwrap();

        let messages = db.get_messages("c").await.unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hi", "hello", "again"]);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(db.get_message_count("c").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_foreign_key_enforced() {
        let db = Database::in_memory().unwrap();
        let result = db
            .insert_message("nope", MessageRole::User, "hi", &now_timestamp())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_clear_scopes() {
        let db = seeded("c").await;
        let ts = now_timestamp();
        for scope in [ClearScope::Chat, ClearScope::Important, ClearScope::All] {
            db.insert_message("c", MessageRole::User, "m", &ts).await.unwrap();
            db.insert_important_info("c", "fact").await.unwrap();

            db.clear("c", scope).await.unwrap();

            let messages = db.get_messages("c").await.unwrap();
            let info = db.get_important_info("c").await.unwrap();
            match scope {
                ClearScope::Chat => {
                    assert!(messages.is_empty());
                    assert_eq!(info, vec!["fact"]);
                }
                ClearScope::Important => {
                    assert!(!messages.is_empty());
                    assert!(info.is_empty());
                }
                ClearScope::All => {
                    assert!(messages.is_empty());
                    assert!(info.is_empty());
                }
            }
        }
    }

    #[tokio::test]
    async fn test_delete_chat_removes_rows() {
        let db = seeded("c").await;
        db.insert_message("c", MessageRole::User, "m", &now_timestamp()).await.unwrap();
        db.insert_important_info("c", "fact").await.unwrap();

        assert!(db.delete_chat("c").await.unwrap());
        assert!(db.get_chat("c").await.unwrap().is_none());
        assert!(db.get_messages("c").await.unwrap().is_empty());
        assert!(db.get_important_info("c").await.unwrap().is_empty());
        assert!(!db.delete_chat("c").await.unwrap());
    }

    #[test]
    fn test_clear_scope_parsing() {
        assert_eq!("all".parse::<ClearScope>(), Ok(ClearScope::All));
        assert_eq!("chat".parse::<ClearScope>(), Ok(ClearScope::Chat));
        assert_eq!("important".parse::<ClearScope>(), Ok(ClearScope::Important));
        assert_eq!("everything".parse::<ClearScope>(), Err("everything".to_string()));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat_database.db");
        {
            let db = Database::new(&path).unwrap();
            db.ensure_chat("c").await.unwrap();
            db.insert_important_info("c", "uses tabs").await.unwrap();
        }
        let db = Database::new(&path).unwrap();
        assert_eq!(db.get_important_info("c").await.unwrap(), vec!["uses tabs"]);
    }
}
