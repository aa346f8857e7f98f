//! Database schema

use rusqlite::Connection;

/// Create the pending messages table.
///
/// Holds message copies this node is responsible for until a delivered
/// copy (or a successful upload) clears them. The full record is stored
/// as its wire JSON so a restart loses nothing.
pub fn create_pending_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS pending_messages (
            message_id TEXT PRIMARY KEY,
            record     TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// Create all tables.
pub fn create_all_tables(conn: &Connection) -> rusqlite::Result<()> {
    create_pending_table(conn)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_all_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_all_tables(&conn).unwrap();
        create_all_tables(&conn).unwrap();
    }
}
