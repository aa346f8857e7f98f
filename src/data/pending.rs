//! Pending message persistence
//!
//! Message copies this node holds responsibility for are written here until
//! a successful upload (or an arriving delivered copy) clears them. Records
//! survive process restarts when the database is file-backed, which is what
//! lets a node that regains connectivity upload everything it still holds.

use rusqlite::{params, Connection};
use tracing::warn;

use crate::data::current_timestamp;
use crate::message::{Message, MessageId};

/// Store (or replace) a pending record for a message copy.
pub fn add_pending(conn: &Connection, message: &Message) -> rusqlite::Result<()> {
    let record = serde_json::to_string(message).map_err(|e| {
        rusqlite::Error::ToSqlConversionFailure(Box::new(e))
    })?;
    conn.execute(
        "INSERT OR REPLACE INTO pending_messages (message_id, record, created_at)
         VALUES (?1, ?2, ?3)",
        params![message.id, record, current_timestamp()],
    )?;
    Ok(())
}

/// Load every pending record, oldest first.
///
/// Rows whose stored record no longer parses are skipped with a warning;
/// one corrupt row must not block the rest of the backlog.
pub fn list_pending(conn: &Connection) -> rusqlite::Result<Vec<Message>> {
    let mut stmt = conn.prepare(
        "SELECT message_id, record FROM pending_messages ORDER BY created_at ASC, message_id ASC",
    )?;

    let rows = stmt.query_map([], |row| {
        let id: String = row.get(0)?;
        let record: String = row.get(1)?;
        Ok((id, record))
    })?;

    let mut messages = Vec::new();
    for row in rows {
        let (id, record) = row?;
        match serde_json::from_str::<Message>(&record) {
            Ok(message) => messages.push(message),
            Err(e) => {
                warn!(message_id = %id, error = %e, "skipping corrupt pending record");
            }
        }
    }
    Ok(messages)
}

/// Remove a pending record. Returns whether a row was deleted.
pub fn remove_pending(conn: &Connection, id: &MessageId) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM pending_messages WHERE message_id = ?1", [id])?;
    Ok(rows > 0)
}

/// Number of pending records.
pub fn pending_count(conn: &Connection) -> rusqlite::Result<usize> {
    let count: i64 =
        conn.query_row("SELECT COUNT(*) FROM pending_messages", [], |row| row.get(0))?;
    Ok(count as usize)
}
