// src/database/test_helpers.rs
// Fixture tables for filter engine tests

#![cfg(test)]

use rusqlite::{params, Connection};

/// Rows of the `Locations` fixture: (Country, State, City, Year).
pub const LOCATION_ROWS: &[(&str, &str, &str, i64)] = &[
    ("US", "CA", "San Francisco", 2020),
    ("US", "CA", "Los Angeles", 2021),
    ("US", "NY", "New York", 2020),
    ("US", "NY", "Buffalo", 2021),
    ("Canada", "ON", "Toronto", 2020),
    ("Canada", "QC", "Montreal", 2021),
];

/// Set up the `Locations` table used by cascade tests.
///
/// Creates a table with:
/// - `Country`, `State`, `City`: text columns forming a natural hierarchy
/// - `Year`: integer column, used for NonText filters
pub fn setup_locations_table(conn: &Connection) {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS Locations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            Country TEXT,
            State TEXT,
            City TEXT,
            Year INTEGER
        )",
        [],
    )
    .unwrap();

    for (country, state, city, year) in LOCATION_ROWS {
        conn.execute(
            "INSERT INTO Locations (Country, State, City, Year) VALUES (?, ?, ?, ?)",
            params![country, state, city, year],
        )
        .unwrap();
    }
}

/// In-memory connection with the `Locations` fixture loaded.
pub fn locations_connection() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    setup_locations_table(&conn);
    conn
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_locations_table_inserts_all_rows() {
        let conn = locations_connection();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM Locations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, LOCATION_ROWS.len() as i64);
    }
}
