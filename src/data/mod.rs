//! SQLite persistence
//!
//! Local fallback storage for messages that could not be uploaded yet.
//! All functions are free functions taking `&Connection`; the connection
//! itself is shared behind `Arc<tokio::sync::Mutex<Connection>>` by callers.

pub mod pending;
pub mod schema;

use std::path::Path;

use rusqlite::Connection;
use tracing::info;

pub use pending::{add_pending, list_pending, pending_count, remove_pending};
pub use schema::create_all_tables;

/// Open (or create) the local database and ensure the schema exists.
///
/// With `path = None` an in-memory database is used; state then does not
/// survive a restart, which is only acceptable for tests and demos.
pub fn start_db(path: Option<&Path>) -> rusqlite::Result<Connection> {
    let conn = match path {
        Some(p) => {
            let conn = Connection::open(p)?;
            info!(path = %p.display(), "opened local database");
            conn
        }
        None => {
            info!("opened in-memory local database");
            Connection::open_in_memory()?
        }
    };

    conn.execute("PRAGMA foreign_keys = ON", [])?;
    create_all_tables(&conn)?;
    Ok(conn)
}

/// Current unix timestamp in seconds.
pub fn current_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_db_in_memory() {
        let conn = start_db(None).unwrap();
        // Schema must exist: counting pending rows should succeed
        assert_eq!(pending_count(&conn).unwrap(), 0);
    }

    #[test]
    fn test_current_timestamp_is_recent() {
        let ts = current_timestamp();
        // After 2024-01-01, before 2100
        assert!(ts > 1_704_067_200);
        assert!(ts < 4_102_444_800);
    }
}
