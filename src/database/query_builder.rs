// src/database/query_builder.rs
// SQL generation for constrained selectable-value queries

use std::collections::BTreeSet;

use super::quoting::{quote_identifier, SqlDialect};
use crate::filters::definitions::FilterDefinition;
use crate::filters::error::FilterResult;

/// A parameterised query. Values are never interpolated into `sql`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuesQuery {
    pub sql: String,
    pub params: Vec<String>,
}

/// Build a comma-separated list of positional placeholders starting at the
/// 1-based index `first`.
///
/// # Example
/// ```
/// use skyline_filters::database::{build_placeholders, SqlDialect};
/// assert_eq!(build_placeholders(SqlDialect::Odbc, 1, 3), "?, ?, ?");
/// assert_eq!(build_placeholders(SqlDialect::Oracle, 2, 2), ":2, :3");
/// ```
pub fn build_placeholders(dialect: SqlDialect, first: usize, count: usize) -> String {
    (first..first + count)
        .map(|index| dialect.placeholder(index))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build `<column> IN (<placeholders>)` for an already-quoted column.
pub fn build_in_predicate(
    dialect: SqlDialect,
    quoted_column: &str,
    first: usize,
    count: usize,
) -> String {
    format!(
        "{} IN ({})",
        quoted_column,
        build_placeholders(dialect, first, count)
    )
}

/// Build the distinct-values query for `target`, constrained by the current
/// selections of its ancestors.
///
/// Each constraint contributes one `IN` predicate over the ancestor's column,
/// evaluated against the target's table. Constraints with no selected values
/// contribute nothing. Callers pass constraints in a deterministic order so
/// equal selections produce identical SQL.
pub fn build_distinct_values_query(
    dialect: SqlDialect,
    target: &FilterDefinition,
    constraints: &[(&FilterDefinition, &BTreeSet<String>)],
) -> FilterResult<ValuesQuery> {
    let table = quote_identifier(dialect, &target.table)?;
    let column = quote_identifier(dialect, &target.column)?;

    let mut predicates = vec![format!("{} IS NOT NULL", column)];
    let mut params = Vec::new();
    for (ancestor, selected) in constraints {
        if selected.is_empty() {
            continue;
        }
        let ancestor_column = quote_identifier(dialect, &ancestor.column)?;
        predicates.push(build_in_predicate(
            dialect,
            &ancestor_column,
            params.len() + 1,
            selected.len(),
        ));
        params.extend(selected.iter().cloned());
    }

    let sql = format!(
        "SELECT DISTINCT {col} FROM {table} WHERE {preds} ORDER BY {col}",
        col = column,
        table = table,
        preds = predicates.join(" AND ")
    );
    Ok(ValuesQuery { sql, params })
}
