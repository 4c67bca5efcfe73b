//! Chat session persistence

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{ChatSession, Message, UpsertOutcome};

use super::{format_timestamp, parse_timestamp, run_blocking};

/// SQLite-based session store
#[derive(Clone)]
pub struct SessionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SessionStore {
    /// Create or open the database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::database(format!("Failed to open session database: {}", e)))?;
        Self::with_connection(conn)
    }

    /// Create an in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::database(format!("Failed to open in-memory database: {}", e)))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;

            CREATE TABLE IF NOT EXISTS chat_sessions (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                messages TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| Error::database(format!("Failed to migrate session database: {}", e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an empty session with a fresh ID
    pub async fn create(&self) -> Result<ChatSession> {
        let conn = self.conn.clone();
        run_blocking(move || {
            let now = Utc::now();
            let session = ChatSession {
                id: Uuid::new_v4().to_string(),
                created_at: now,
                updated_at: now,
                messages: Vec::new(),
            };

            conn.lock().execute(
                "INSERT INTO chat_sessions (id, created_at, updated_at, messages) VALUES (?1, ?2, ?3, '[]')",
                params![session.id, format_timestamp(&now), format_timestamp(&now)],
            )?;

            tracing::debug!("Created session {}", session.id);
            Ok(session)
        })
        .await
    }

    /// Get a session by ID
    pub async fn get(&self, id: &str) -> Result<Option<ChatSession>> {
        let conn = self.conn.clone();
        let id = id.to_string();
        run_blocking(move || load_session(&conn.lock(), &id)).await
    }

    /// Delete a session; false if it did not exist
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.conn.clone();
        let id = id.to_string();
        run_blocking(move || {
            let count = conn
                .lock()
                .execute("DELETE FROM chat_sessions WHERE id = ?1", params![id])?;
            Ok(count > 0)
        })
        .await
    }

    /// Append one completed turn, creating the session if it does not exist.
    ///
    /// Messages are only ever appended. `updated_at` never moves backwards.
    pub async fn append_turn(
        &self,
        id: &str,
        user: Message,
        assistant: Message,
    ) -> Result<UpsertOutcome> {
        let conn = self.conn.clone();
        let id = id.to_string();
        run_blocking(move || {
            let mut conn = conn.lock();
            let tx = conn.transaction()?;
            let now = Utc::now();

            let existing: Option<(String, String)> = tx
                .query_row(
                    "SELECT updated_at, messages FROM chat_sessions WHERE id = ?1",
                    params![id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let outcome = match existing {
                Some((updated_at, raw)) => {
                    let mut messages: Vec<Message> = serde_json::from_str(&raw)?;
                    messages.push(user);
                    messages.push(assistant);

                    let updated_at = parse_timestamp(&updated_at)?.max(now);
                    tx.execute(
                        "UPDATE chat_sessions SET updated_at = ?2, messages = ?3 WHERE id = ?1",
                        params![id, format_timestamp(&updated_at), serde_json::to_string(&messages)?],
                    )?;
                    UpsertOutcome::Updated
                }
                None => {
                    let messages = vec![user, assistant];
                    tx.execute(
                        "INSERT INTO chat_sessions (id, created_at, updated_at, messages) VALUES (?1, ?2, ?2, ?3)",
                        params![id, format_timestamp(&now), serde_json::to_string(&messages)?],
                    )?;
                    UpsertOutcome::Created
                }
            };

            tx.commit()?;
            tracing::debug!("Appended turn to session {} ({:?})", id, outcome);
            Ok(outcome)
        })
        .await
    }
}

fn load_session(conn: &Connection, id: &str) -> Result<Option<ChatSession>> {
    let row = conn
        .query_row(
            "SELECT id, created_at, updated_at, messages FROM chat_sessions WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    parse_timestamp(&row.get::<_, String>(1)?)?,
                    parse_timestamp(&row.get::<_, String>(2)?)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((id, created_at, updated_at, raw)) => Ok(Some(ChatSession {
            id,
            created_at,
            updated_at,
            messages: serde_json::from_str(&raw)?,
        })),
        None => Ok(None),
    }
}
