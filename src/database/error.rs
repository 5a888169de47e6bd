// src/database/error.rs

use std::fmt;

/// Failure reported by a [`QueryExecutor`](super::executor::QueryExecutor).
#[derive(Debug)]
pub enum QueryError {
    Sqlite(rusqlite::Error),
    Io(std::io::Error),
    /// The query was cancelled before it ran because a newer cascade superseded it.
    Cancelled,
    Other(String),
}

pub type QueryResult<T> = Result<T, QueryError>;

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Sqlite(e) => write!(f, "SQLite error: {}", e),
            QueryError::Io(e) => write!(f, "I/O error: {}", e),
            QueryError::Cancelled => write!(f, "Query cancelled"),
            QueryError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QueryError::Sqlite(e) => Some(e),
            QueryError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for QueryError {
    fn from(e: rusqlite::Error) -> Self {
        QueryError::Sqlite(e)
    }
}

impl From<std::io::Error> for QueryError {
    fn from(e: std::io::Error) -> Self {
        QueryError::Io(e)
    }
}

impl QueryError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, QueryError::Cancelled)
    }
}
