use crate::error::{CtxtrimError, Result};
use crate::message::{Message, Role, SUMMARY_MODEL, SUMMARY_PROVIDER};
use crate::orchestrator::MessageStore;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

pub mod types;
pub use types::ChatSummary;

/// Environment variable overriding the history database location
pub const HISTORY_DB_ENV: &str = "CTXTRIM_HISTORY_DB";

/// Raw message columns: (id, chat_id, role, content, image_path, provider, model, timestamp).
type MessageRow = (
    i64,
    i64,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
);

/// SQLite-backed message store
///
/// Each call opens its own connection, so the store is cheap to share
/// between commands and safe to use from async code.
pub struct SqliteStorage {
    db_path: PathBuf,
}

impl SqliteStorage {
    /// Create a new storage instance
    ///
    /// Uses `CTXTRIM_HISTORY_DB` when set, otherwise `history.db` in the
    /// user's data directory.
    pub fn new() -> Result<Self> {
        if let Ok(override_path) = std::env::var(HISTORY_DB_ENV) {
            return Self::new_with_path(override_path);
        }

        let proj_dirs = ProjectDirs::from("com", "ctxtrim", "ctxtrim")
            .ok_or_else(|| CtxtrimError::Storage("Could not determine data directory".into()))?;

        Self::new_with_path(proj_dirs.data_dir().join("history.db"))
    }

    /// Create a new storage instance that uses the specified database path
    ///
    /// # Examples
    ///
    /// ```
    /// use ctxtrim::storage::SqliteStorage;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let storage = SqliteStorage::new_with_path(dir.path().join("history.db")).unwrap();
    /// assert!(storage.list_chats().unwrap().is_empty());
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(|e| CtxtrimError::Storage(e.to_string()))?;
        }

        let storage = Self { db_path };
        storage.init()?;
        Ok(storage)
    }

    /// Path of the backing database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .context("Failed to open database")
            .map_err(|e| CtxtrimError::Storage(e.to_string()).into())
    }

    /// Initialize the database schema
    fn init(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id INTEGER NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                image_path TEXT,
                provider TEXT,
                model TEXT,
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_chat
                ON messages (chat_id, timestamp, id);",
        )
        .context("Failed to create tables")
        .map_err(|e| CtxtrimError::Storage(e.to_string()))?;

        Ok(())
    }

    /// Load a chat's messages ordered by timestamp, then id
    pub fn load_chat(&self, chat_id: i64) -> Result<Vec<Message>> {
        let conn = self.open()?;

        let mut stmt = conn
            .prepare(
                "SELECT id, chat_id, role, content, image_path, provider, model, timestamp
                FROM messages
                WHERE chat_id = ?
                ORDER BY timestamp ASC, id ASC",
            )
            .context("Failed to prepare statement")
            .map_err(|e| CtxtrimError::Storage(e.to_string()))?;

        let rows = stmt
            .query_map(params![chat_id], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                ))
            })
            .context("Failed to query messages")
            .map_err(|e| CtxtrimError::Storage(e.to_string()))?;

        let mut messages = Vec::new();
        for row in rows {
            let row: MessageRow = row
                .context("Failed to read message row")
                .map_err(|e| CtxtrimError::Storage(e.to_string()))?;
            messages.push(row_to_message(row)?);
        }

        Ok(messages)
    }

    /// Insert a message and return it with its assigned id
    ///
    /// Any id already on `message` is ignored; the database assigns a new one.
    pub fn insert_message(&self, message: Message) -> Result<Message> {
        let conn = self.open()?;
        insert_with(&conn, message)
    }

    /// Import a batch of messages in a single transaction
    ///
    /// Either every message is stored or none is.
    pub fn import_messages(&self, messages: Vec<Message>) -> Result<Vec<Message>> {
        let mut conn = self.open()?;

        let tx = conn
            .transaction()
            .context("Failed to start transaction")
            .map_err(|e| CtxtrimError::Storage(e.to_string()))?;

        let mut stored = Vec::with_capacity(messages.len());
        for message in messages {
            stored.push(insert_with(&tx, message)?);
        }

        tx.commit()
            .context("Failed to commit transaction")
            .map_err(|e| CtxtrimError::Storage(e.to_string()))?;

        tracing::info!(count = stored.len(), "Imported messages");
        Ok(stored)
    }

    /// Delete a message by id
    ///
    /// Deleting a missing id is not an error.
    pub fn remove_message(&self, id: i64) -> Result<()> {
        let conn = self.open()?;

        let affected = conn
            .execute("DELETE FROM messages WHERE id = ?", params![id])
            .context("Failed to delete message")
            .map_err(|e| CtxtrimError::Storage(e.to_string()))?;

        if affected == 0 {
            tracing::debug!(id, "Delete matched no message");
        }
        Ok(())
    }

    /// List every chat with message counts
    pub fn list_chats(&self) -> Result<Vec<ChatSummary>> {
        let conn = self.open()?;

        let mut stmt = conn
            .prepare(
                "SELECT chat_id,
                    COUNT(*),
                    SUM(CASE WHEN role = 'assistant' AND provider = ?1 AND model = ?2
                        THEN 1 ELSE 0 END),
                    MIN(timestamp),
                    MAX(timestamp)
                FROM messages
                GROUP BY chat_id
                ORDER BY chat_id ASC",
            )
            .context("Failed to prepare statement")
            .map_err(|e| CtxtrimError::Storage(e.to_string()))?;

        let rows = stmt
            .query_map(params![SUMMARY_PROVIDER, SUMMARY_MODEL], |row| {
                let chat_id: i64 = row.get(0)?;
                let message_count: i64 = row.get(1)?;
                let summary_count: i64 = row.get(2)?;
                let first: String = row.get(3)?;
                let last: String = row.get(4)?;
                Ok((chat_id, message_count, summary_count, first, last))
            })
            .context("Failed to query chats")
            .map_err(|e| CtxtrimError::Storage(e.to_string()))?;

        let mut chats = Vec::new();
        for row in rows {
            let (chat_id, message_count, summary_count, first, last) = row
                .context("Failed to read chat row")
                .map_err(|e| CtxtrimError::Storage(e.to_string()))?;
            chats.push(ChatSummary {
                chat_id,
                message_count: message_count as usize,
                summary_count: summary_count as usize,
                first_timestamp: parse_timestamp(&first)?,
                last_timestamp: parse_timestamp(&last)?,
            });
        }

        Ok(chats)
    }
}

#[async_trait]
impl MessageStore for SqliteStorage {
    async fn load_messages(&self, chat_id: i64) -> Result<Vec<Message>> {
        self.load_chat(chat_id)
    }

    async fn save_message(&self, message: Message) -> Result<Message> {
        self.insert_message(message)
    }

    async fn delete_message(&self, id: i64) -> Result<()> {
        self.remove_message(id)
    }
}

fn insert_with(conn: &Connection, message: Message) -> Result<Message> {
    conn.execute(
        "INSERT INTO messages (chat_id, role, content, image_path, provider, model, timestamp)
        VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            message.chat_id,
            message.role.as_str(),
            message.content,
            message.image_path,
            message.provider,
            message.model,
            format_timestamp(&message.timestamp),
        ],
    )
    .context("Failed to insert message")
    .map_err(|e| CtxtrimError::Storage(e.to_string()))?;

    Ok(message.with_id(conn.last_insert_rowid()))
}

/// Fixed-width UTC form so text ordering matches time ordering
fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CtxtrimError::Storage(format!("Invalid timestamp '{}': {}", value, e)).into())
}

fn row_to_message(row: MessageRow) -> Result<Message> {
    let (id, chat_id, role, content, image_path, provider, model, timestamp) = row;
    let role: Role = role.parse()?;

    Ok(Message {
        id: Some(id),
        chat_id,
        role,
        content,
        image_path,
        provider,
        model,
        timestamp: parse_timestamp(&timestamp)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::make_summary_message;
    use crate::test_utils::conversation;
    use chrono::{Duration, TimeZone};
    use serial_test::serial;
    use std::env;
    use tempfile::tempdir;

    /// Helper: create a temporary storage instance backed by a temp directory.
    ///
    /// Returns the `TempDir` too so the directory outlives the storage.
    fn create_test_storage() -> (SqliteStorage, tempfile::TempDir) {
        let dir = tempdir().expect("failed to create tempdir");
        let db_path = dir.path().join("history.db");
        let storage = SqliteStorage::new_with_path(db_path).expect("failed to create storage");
        (storage, dir)
    }

    #[test]
    fn test_sqlite_storage_init_creates_table() {
        let (storage, _dir) = create_test_storage();
        let conn = Connection::open(storage.db_path()).expect("open connection");
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='messages'",
                [],
                |r| r.get(0),
            )
            .expect("query row");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_init_is_idempotent() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("history.db");
        let first = SqliteStorage::new_with_path(&path).expect("first");
        first
            .insert_message(Message::user(1, "kept"))
            .expect("insert");

        let second = SqliteStorage::new_with_path(&path).expect("second");
        assert_eq!(second.load_chat(1).expect("load").len(), 1);
    }

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let (storage, _dir) = create_test_storage();
        let a = storage.insert_message(Message::user(1, "a")).unwrap();
        let b = storage.insert_message(Message::user(1, "b")).unwrap();
        assert!(a.id.is_some());
        assert!(b.id.unwrap() > a.id.unwrap());
    }

    #[test]
    fn test_insert_ignores_existing_id() {
        let (storage, _dir) = create_test_storage();
        let stored = storage
            .insert_message(Message::user(1, "a").with_id(999))
            .unwrap();
        assert_eq!(stored.id, Some(1));
    }

    #[test]
    fn test_load_chat_roundtrips_fields() {
        let (storage, _dir) = create_test_storage();
        let timestamp = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        let original = Message::assistant(7, "A **bold** reply")
            .with_provider_model("claude", "claude-3-5-haiku-20241022")
            .with_image("/tmp/shot.png")
            .with_timestamp(timestamp);

        let stored = storage.insert_message(original.clone()).unwrap();
        let loaded = storage.load_chat(7).unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0], stored);
        assert_eq!(loaded[0].timestamp, timestamp);
        assert_eq!(loaded[0].image_path.as_deref(), Some("/tmp/shot.png"));
    }

    #[test]
    fn test_load_chat_orders_by_timestamp_then_id() {
        let (storage, _dir) = create_test_storage();
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        storage
            .insert_message(Message::user(1, "late").with_timestamp(base + Duration::minutes(5)))
            .unwrap();
        storage
            .insert_message(Message::user(1, "early").with_timestamp(base))
            .unwrap();
        storage
            .insert_message(Message::user(1, "tie").with_timestamp(base))
            .unwrap();

        let contents: Vec<String> = storage
            .load_chat(1)
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["early", "tie", "late"]);
    }

    #[test]
    fn test_load_chat_filters_by_chat() {
        let (storage, _dir) = create_test_storage();
        storage.insert_message(Message::user(1, "one")).unwrap();
        storage.insert_message(Message::user(2, "two")).unwrap();

        let loaded = storage.load_chat(2).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].content, "two");
        assert!(storage.load_chat(3).unwrap().is_empty());
    }

    #[test]
    fn test_import_messages_assigns_ids_in_order() {
        let (storage, _dir) = create_test_storage();
        let stored = storage.import_messages(conversation(3, 5)).unwrap();

        assert_eq!(stored.len(), 6);
        let ids: Vec<i64> = stored.iter().filter_map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(storage.load_chat(1).unwrap(), stored);
    }

    #[test]
    fn test_remove_message_deletes_row() {
        let (storage, _dir) = create_test_storage();
        let stored = storage.import_messages(conversation(1, 5)).unwrap();

        storage.remove_message(stored[0].id.unwrap()).unwrap();
        let loaded = storage.load_chat(1).unwrap();
        assert_eq!(loaded, stored[1..].to_vec());
    }

    #[test]
    fn test_remove_message_is_idempotent() {
        let (storage, _dir) = create_test_storage();
        let stored = storage.insert_message(Message::user(1, "x")).unwrap();
        let id = stored.id.unwrap();

        storage.remove_message(id).expect("first delete failed");
        storage.remove_message(id).expect("second delete failed");
    }

    #[test]
    fn test_list_chats_counts_messages_and_summaries() {
        let (storage, _dir) = create_test_storage();
        let messages = conversation(2, 5);
        let first = messages[0].timestamp;
        let last = messages[3].timestamp;
        storage.import_messages(messages).unwrap();
        storage
            .insert_message(make_summary_message("Summary", 1, first))
            .unwrap();
        storage.insert_message(Message::user(9, "other")).unwrap();

        let chats = storage.list_chats().unwrap();
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].chat_id, 1);
        assert_eq!(chats[0].message_count, 5);
        assert_eq!(chats[0].summary_count, 1);
        assert_eq!(chats[0].first_timestamp, first);
        assert_eq!(chats[0].last_timestamp, last);
        assert_eq!(chats[1].chat_id, 9);
        assert_eq!(chats[1].summary_count, 0);
    }

    #[test]
    fn test_list_chats_returns_empty_for_new_db() {
        let (storage, _dir) = create_test_storage();
        assert!(storage.list_chats().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_role_in_database_is_storage_error() {
        let (storage, _dir) = create_test_storage();
        let conn = Connection::open(storage.db_path()).unwrap();
        conn.execute(
            "INSERT INTO messages (chat_id, role, content, timestamp)
            VALUES (1, 'system', 'x', '2025-01-01T00:00:00.000000Z')",
            [],
        )
        .unwrap();

        let err = storage.load_chat(1).unwrap_err();
        assert!(err.to_string().contains("system"));
    }

    #[tokio::test]
    async fn test_message_store_trait_roundtrip() {
        let (storage, _dir) = create_test_storage();
        let store: &dyn MessageStore = &storage;

        let saved = store.save_message(Message::user(4, "hi")).await.unwrap();
        assert_eq!(store.load_messages(4).await.unwrap(), vec![saved.clone()]);

        store.delete_message(saved.id.unwrap()).await.unwrap();
        assert!(store.load_messages(4).await.unwrap().is_empty());
    }

    #[test]
    #[serial]
    fn test_new_respects_env_override() {
        let dir = tempdir().expect("failed to create tempdir");
        let db_path = dir.path().join("nested").join("history.db");
        env::set_var(HISTORY_DB_ENV, db_path.to_string_lossy().to_string());

        let storage = SqliteStorage::new().expect("new failed with env override");
        assert_eq!(storage.db_path(), db_path.as_path());
        assert!(db_path.parent().unwrap().exists());

        env::remove_var(HISTORY_DB_ENV);
    }
}
