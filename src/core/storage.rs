//! Transcript persistence
//!
//! The transcript lives under a single key of a key/value store as one JSON
//! array. It is read once when the widget is created and rewritten in full
//! after every change.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::conversation::Transcript;

use super::store::TranscriptObserver;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Minimal string key/value store
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Key/value store backed by a SQLite database
pub struct SqliteKvStore {
    pool: SqlitePool,
}

impl SqliteKvStore {
    /// Open (or create) the database at `db_path`
    pub async fn new(db_path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create an in-memory database
    ///
    /// The database lives only as long as its single connection, so the
    /// pool never closes it for being idle or old.
    #[cfg(test)]
    pub async fn new_in_memory() -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO kv (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Process-local key/value store; nothing survives a restart
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Rehydrate the transcript stored under `key`
///
/// Falls back to the single-greeting transcript when nothing usable is
/// stored: a missing key, a read failure, a value that does not parse, or
/// an empty list.
pub async fn load_transcript(store: &dyn KvStore, key: &str, greeting: &str) -> Transcript {
    let raw = match store.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return Transcript::greeting(greeting),
        Err(e) => {
            tracing::warn!("Failed to read stored transcript: {}", e);
            return Transcript::greeting(greeting);
        }
    };

    match Transcript::from_json(&raw) {
        Ok(transcript) if !transcript.is_empty() => {
            tracing::debug!(messages = transcript.len(), "Restored transcript");
            transcript
        }
        Ok(_) => Transcript::greeting(greeting),
        Err(e) => {
            tracing::warn!("Discarding unparsable transcript: {}", e);
            Transcript::greeting(greeting)
        }
    }
}

/// Observer that writes every snapshot back to the key/value store
pub struct TranscriptPersister {
    store: Arc<dyn KvStore>,
    key: String,
}

impl TranscriptPersister {
    pub fn new(store: Arc<dyn KvStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }
}

#[async_trait]
impl TranscriptObserver for TranscriptPersister {
    async fn on_change(&self, transcript: &Transcript) {
        let json = match transcript.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to serialize transcript: {}", e);
                return;
            }
        };

        if let Err(e) = self.store.set(&self.key, &json).await {
            tracing::warn!("Failed to persist transcript: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::prompts_builtin::GREETING;
    use crate::conversation::{Message, Status};

    const KEY: &str = "chat-messages";

    fn sample() -> Transcript {
        let mut failed = Message::user("Hello");
        failed.status = Status::Failed;
        Transcript::new(vec![
            Message::assistant(GREETING),
            failed,
            Message::user("Anyone there?"),
        ])
    }

    #[tokio::test]
    async fn test_missing_key_loads_greeting() {
        let store = MemoryKvStore::new();
        let transcript = load_transcript(&store, KEY, GREETING).await;
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].text, GREETING);
    }

    #[tokio::test]
    async fn test_garbage_and_empty_values_load_greeting() {
        let store = MemoryKvStore::new();

        store.set(KEY, "{not json").await.unwrap();
        let transcript = load_transcript(&store, KEY, "Hi!").await;
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].text, "Hi!");

        store.set(KEY, "[]").await.unwrap();
        let transcript = load_transcript(&store, KEY, "Hi!").await;
        assert_eq!(transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_persister_round_trip() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let persister = TranscriptPersister::new(store.clone(), KEY);
        let transcript = sample();

        persister.on_change(&transcript).await;

        let reloaded = load_transcript(store.as_ref(), KEY, GREETING).await;
        assert_eq!(reloaded, transcript);
    }

    #[tokio::test]
    async fn test_sqlite_overwrites_value() {
        let store = SqliteKvStore::new_in_memory().await.unwrap();
        assert_eq!(store.get(KEY).await.unwrap(), None);

        store.set(KEY, "first").await.unwrap();
        store.set(KEY, "second").await.unwrap();
        assert_eq!(store.get(KEY).await.unwrap().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_sqlite_in_memory_connection_is_never_recycled() {
        let store = SqliteKvStore::new_in_memory().await.unwrap();

        let options = store.pool.options();
        assert_eq!(options.get_min_connections(), 1);
        assert_eq!(options.get_max_connections(), 1);
        assert_eq!(options.get_idle_timeout(), None);
        assert_eq!(options.get_max_lifetime(), None);

        store.set(KEY, "kept").await.unwrap();
        assert_eq!(store.pool.size(), 1);
        assert_eq!(store.get(KEY).await.unwrap().as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn test_sqlite_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("chat.db");
        let transcript = sample();

        {
            let store: Arc<dyn KvStore> = Arc::new(SqliteKvStore::new(&path).await.unwrap());
            TranscriptPersister::new(store, KEY)
                .on_change(&transcript)
                .await;
        }

        let reopened = SqliteKvStore::new(&path).await.unwrap();
        let reloaded = load_transcript(&reopened, KEY, GREETING).await;
        assert_eq!(reloaded, transcript);
    }
}
