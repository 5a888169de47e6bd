// src/database/mod.rs

pub mod connection;
pub mod error;
pub mod executor;
pub mod query_builder;
pub mod quoting;
#[cfg(test)]
pub(crate) mod test_helpers;

pub use connection::DbConnection;
pub use error::{QueryError, QueryResult};
pub use executor::{CancellationFlag, QueryExecutor, SqliteExecutor};
pub use query_builder::{build_distinct_values_query, build_in_predicate, build_placeholders, ValuesQuery};
pub use quoting::{quote_identifier, SqlDialect};
