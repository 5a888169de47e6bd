// src/database/executor.rs
// Query execution seam between the cascade resolver and a concrete database

use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::connection::DbConnection;
use super::error::{QueryError, QueryResult};

/// Shared flag raised when an in-flight query has been superseded.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs single-column value queries on behalf of the resolver.
///
/// Identifiers in `sql` are already quoted for the executor's dialect and all
/// values arrive through `params`. Implementations may be called from several
/// threads at once for sibling filters.
pub trait QueryExecutor: Send + Sync {
    fn execute(&self, sql: &str, params: &[String]) -> QueryResult<Vec<String>>;

    /// Like [`execute`](Self::execute), but gives up when `cancel` is raised.
    /// The default only checks the flag before starting.
    fn execute_cancellable(
        &self,
        sql: &str,
        params: &[String],
        cancel: &CancellationFlag,
    ) -> QueryResult<Vec<String>> {
        if cancel.is_cancelled() {
            return Err(QueryError::Cancelled);
        }
        self.execute(sql, params)
    }
}

enum SqliteSource {
    /// One connection, used under a lock (in-memory databases, tests).
    Shared(Mutex<Connection>),
    /// A database file; every query opens its own read-only connection.
    File(PathBuf),
}

/// [`QueryExecutor`] backed by SQLite.
pub struct SqliteExecutor {
    source: SqliteSource,
}

impl SqliteExecutor {
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            source: SqliteSource::Shared(Mutex::new(conn)),
        }
    }

    /// Uses the database file at `path`. The file is opened once up front so
    /// a bad path is reported here rather than on the first filter query.
    pub fn open(path: impl Into<PathBuf>) -> QueryResult<Self> {
        let path = path.into();
        DbConnection::open_read_only(&path)?;
        bevy::log::info!("Filter queries will run against {}", path.display());
        Ok(Self {
            source: SqliteSource::File(path),
        })
    }
}

impl QueryExecutor for SqliteExecutor {
    fn execute(&self, sql: &str, params: &[String]) -> QueryResult<Vec<String>> {
        match &self.source {
            SqliteSource::Shared(conn) => {
                let conn = conn
                    .lock()
                    .map_err(|_| QueryError::Other("SQLite connection lock poisoned".into()))?;
                run_values_query(&conn, sql, params)
            }
            SqliteSource::File(path) => {
                let conn = DbConnection::open_read_only(path)?;
                run_values_query(&conn, sql, params)
            }
        }
    }
}

fn run_values_query(conn: &Connection, sql: &str, params: &[String]) -> QueryResult<Vec<String>> {
    bevy::log::trace!("Executing value query: {} {:?}", sql, params);
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params_from_iter(params.iter()), |row| {
            Ok(value_to_string(row.get_ref(0)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows.into_iter().flatten().collect())
}

/// Render a cell as text. NULL has no selectable value.
fn value_to_string(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_helpers::{locations_connection, setup_locations_table};

    #[test]
    fn test_sqlite_executor_binds_params() {
        let executor = SqliteExecutor::from_connection(locations_connection());
        let values = executor
            .execute(
                "SELECT DISTINCT [State] FROM [Locations] WHERE [Country] IN (?) ORDER BY [State]",
                &["US".to_string()],
            )
            .unwrap();
        assert_eq!(values, vec!["CA", "NY"]);
    }

    #[test]
    fn test_numeric_columns_render_as_text_and_nulls_are_skipped() {
        let conn = Connection::open_in_memory().unwrap();
        setup_locations_table(&conn);
        conn.execute(
            "INSERT INTO Locations (Country, State, City, Year) VALUES ('US', 'CA', NULL, NULL)",
            [],
        )
        .unwrap();
        let executor = SqliteExecutor::from_connection(conn);
        let years = executor
            .execute(
                "SELECT DISTINCT Year FROM Locations WHERE Year IS NOT NULL ORDER BY Year",
                &[],
            )
            .unwrap();
        assert_eq!(years, vec!["2020", "2021"]);
        let cities = executor
            .execute("SELECT DISTINCT City FROM Locations WHERE State = ? ORDER BY City", &["CA".to_string()])
            .unwrap();
        assert_eq!(cities, vec!["Los Angeles", "San Francisco"]);
    }

    #[test]
    fn test_invalid_sql_is_a_query_error() {
        let executor = SqliteExecutor::from_connection(locations_connection());
        let err = executor.execute("SELECT nope FROM Missing", &[]).unwrap_err();
        assert!(matches!(err, QueryError::Sqlite(_)));
    }

    #[test]
    fn test_cancelled_flag_prevents_execution() {
        let executor = SqliteExecutor::from_connection(locations_connection());
        let flag = CancellationFlag::new();
        flag.cancel();
        let err = executor
            .execute_cancellable("SELECT DISTINCT Country FROM Locations", &[], &flag)
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
