use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use polyglot_core::types::{Message, MessageId, ScopeId};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, instrument};

use crate::db::init_db;
use crate::error::{Result, StorageError};

/// Append-only, scope-partitioned message log.
///
/// Thread-safe: the SQLite connection sits behind a `Mutex` and every
/// operation is a single statement, so the lock is held only for that
/// statement. Appends are serialised, which preserves per-scope arrival order.
///
/// A duplicate message id is upserted: the stored body and author name are
/// replaced, while scope, timestamp and arrival position stay as first seen.
pub struct MessageStore {
    db: Mutex<Connection>,
}

impl MessageStore {
    /// Wrap an open connection, creating the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Open (or create) a file-backed store in WAL mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::new(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    /// Store a message. Rejects empty scope, author or message ids.
    #[instrument(skip(self, msg), fields(scope_id = %msg.scope_id, message_id = %msg.id))]
    pub fn append(&self, msg: &Message) -> Result<()> {
        if msg.scope_id.as_str().trim().is_empty() {
            return Err(StorageError::InvalidScope);
        }
        if msg.author_id.as_str().trim().is_empty() {
            return Err(StorageError::InvalidAuthor);
        }
        if msg.id.as_str().trim().is_empty() {
            return Err(StorageError::InvalidId);
        }

        let db = self.conn();
        db.execute(
            "INSERT INTO messages (id, scope_id, author_id, author_name, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                body = excluded.body,
                author_name = excluded.author_name",
            params![
                msg.id.as_str(),
                msg.scope_id.as_str(),
                msg.author_id.as_str(),
                msg.author_name,
                msg.body,
                msg.created_at.timestamp_millis(),
            ],
        )?;
        debug!("message stored");
        Ok(())
    }

    /// Up to `limit` messages of `scope_id` with `created_at < before`,
    /// most recent first. An unknown scope yields an empty list.
    #[instrument(skip(self), fields(scope_id = %scope_id))]
    pub fn recent(
        &self,
        scope_id: &ScopeId,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Message>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let db = self.conn();
        let mut stmt = db.prepare_cached(
            "SELECT id, scope_id, author_id, author_name, body, created_at
             FROM messages
             WHERE scope_id = ?1 AND created_at < ?2
             ORDER BY created_at DESC, seq DESC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(
            params![scope_id.as_str(), before.timestamp_millis(), limit],
            row_to_message,
        )?;
        let msgs = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        debug!(count = msgs.len(), "recent messages loaded");
        Ok(msgs)
    }

    /// Look up a single message by id.
    pub fn get(&self, id: &MessageId) -> Result<Option<Message>> {
        let db = self.conn();
        let msg = db
            .query_row(
                "SELECT id, scope_id, author_id, author_name, body, created_at
                 FROM messages WHERE id = ?1",
                params![id.as_str()],
                row_to_message,
            )
            .optional()?;
        Ok(msg)
    }

    /// Delete every message with `created_at < older_than`, across all scopes.
    /// Returns the number of rows removed.
    pub fn expire(&self, older_than: DateTime<Utc>) -> Result<usize> {
        let db = self.conn();
        let n = db.execute(
            "DELETE FROM messages WHERE created_at < ?1",
            params![older_than.timestamp_millis()],
        )?;
        if n > 0 {
            info!(deleted = n, cutoff = %older_than.to_rfc3339(), "expired old messages");
        }
        Ok(n)
    }

    /// Total number of stored messages.
    pub fn count(&self) -> Result<usize> {
        let db = self.conn();
        let n: i64 = db.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or_default())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // Each statement is atomic; a poisoned guard still holds a consistent db.
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let millis: i64 = row.get(5)?;
    let created_at = DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(5, millis))?;
    Ok(Message {
        id: MessageId(row.get(0)?),
        scope_id: ScopeId(row.get(1)?),
        author_id: row.get::<_, String>(2)?.into(),
        author_name: row.get(3)?,
        body: row.get(4)?,
        created_at,
    })
}
