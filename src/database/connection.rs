// src/database/connection.rs

use super::error::QueryResult;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::Duration;

pub struct DbConnection;

impl DbConnection {
    /// Opens an existing database for value lookups only.
    /// The filter engine never writes, so connections are opened read-only.
    pub fn open_read_only(path: &Path) -> QueryResult<Connection> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
                | OpenFlags::SQLITE_OPEN_URI,
        )?;

        // Readers must wait out writers holding the database lock
        conn.busy_timeout(Duration::from_millis(5000))?;

        bevy::log::trace!("Opened read-only connection to {:?}", path.file_name());
        Ok(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_read_only_rejects_missing_file() {
        let dir = std::env::temp_dir().join("skyline_filters_missing_dir_for_test");
        let missing = dir.join("does_not_exist.db");
        assert!(DbConnection::open_read_only(&missing).is_err());
    }
}
