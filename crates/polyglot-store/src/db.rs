use rusqlite::{Connection, Result};

/// Initialise the message log schema. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    create_messages_table(conn)
}

/// `seq` records arrival order and breaks ties between equal timestamps.
/// `created_at` is stored as unix milliseconds.
fn create_messages_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS messages (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            id          TEXT    NOT NULL UNIQUE,
            scope_id    TEXT    NOT NULL,
            author_id   TEXT    NOT NULL,
            author_name TEXT    NOT NULL DEFAULT '',
            body        TEXT    NOT NULL,
            created_at  INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_scope_time
            ON messages(scope_id, created_at DESC, seq DESC);
        CREATE INDEX IF NOT EXISTS idx_messages_created
            ON messages(created_at);",
    )
}
