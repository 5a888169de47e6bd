// src/database/quoting.rs
// Dialect-specific enbracketing of table and column identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::filters::error::{FilterError, FilterResult};

/// SQL dialects the filter engine can generate queries for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlDialect {
    Odbc,
    Oracle,
    MsAccess,
    MsSqlServer,
    MySql,
    /// Brackets every identifier unconditionally.
    #[default]
    GenericEnbracketAll,
}

#[derive(Debug, Clone, Copy)]
struct QuoteStyle {
    open: char,
    close: char,
    /// Quote every identifier, not only those with reserved characters.
    always: bool,
}

impl SqlDialect {
    pub const ALL: [SqlDialect; 6] = [
        SqlDialect::Odbc,
        SqlDialect::Oracle,
        SqlDialect::MsAccess,
        SqlDialect::MsSqlServer,
        SqlDialect::MySql,
        SqlDialect::GenericEnbracketAll,
    ];

    fn quote_style(self) -> QuoteStyle {
        match self {
            SqlDialect::Odbc => QuoteStyle { open: '"', close: '"', always: false },
            SqlDialect::Oracle => QuoteStyle { open: '"', close: '"', always: true },
            SqlDialect::MsAccess => QuoteStyle { open: '[', close: ']', always: false },
            SqlDialect::MsSqlServer => QuoteStyle { open: '[', close: ']', always: true },
            SqlDialect::MySql => QuoteStyle { open: '`', close: '`', always: false },
            SqlDialect::GenericEnbracketAll => QuoteStyle { open: '[', close: ']', always: true },
        }
    }

    /// Positional parameter marker for the 1-based `index`.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            SqlDialect::Oracle => format!(":{}", index),
            _ => "?".to_string(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SqlDialect::Odbc => "odbc",
            SqlDialect::Oracle => "oracle",
            SqlDialect::MsAccess => "ms_access",
            SqlDialect::MsSqlServer => "ms_sql_server",
            SqlDialect::MySql => "my_sql",
            SqlDialect::GenericEnbracketAll => "generic_enbracket_all",
        }
    }

    pub fn quote(self, identifier: &str) -> FilterResult<String> {
        quote_identifier(self, identifier)
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "odbc" => Ok(SqlDialect::Odbc),
            "oracle" => Ok(SqlDialect::Oracle),
            "ms_access" | "msaccess" | "access" => Ok(SqlDialect::MsAccess),
            "ms_sql_server" | "mssqlserver" | "mssql" | "sqlserver" => Ok(SqlDialect::MsSqlServer),
            "my_sql" | "mysql" => Ok(SqlDialect::MySql),
            "generic_enbracket_all" | "generic" => Ok(SqlDialect::GenericEnbracketAll),
            other => Err(format!(
                "unknown SQL dialect '{}', expected one of: {}",
                other,
                SqlDialect::ALL.map(|d| d.as_str()).join(", ")
            )),
        }
    }
}

/// Characters outside `[A-Za-z0-9_]`, or a leading digit, force quoting
/// in dialects that only quote when needed.
fn has_reserved_characters(identifier: &str) -> bool {
    let starts_with_digit = identifier
        .chars()
        .next()
        .map(|c| c.is_ascii_digit())
        .unwrap_or(false);
    starts_with_digit
        || identifier
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || c == '_'))
}

/// Render a table or column identifier for `dialect`.
///
/// The closing bracket character is escaped by doubling it. The input is
/// taken literally: passing an identifier that is already quoted quotes it
/// again, which is a caller error.
///
/// # Example
/// ```
/// use skyline_filters::database::{quote_identifier, SqlDialect};
/// assert_eq!(quote_identifier(SqlDialect::MySql, "Order Lines").unwrap(), "`Order Lines`");
/// assert_eq!(quote_identifier(SqlDialect::MySql, "orders").unwrap(), "orders");
/// ```
pub fn quote_identifier(dialect: SqlDialect, identifier: &str) -> FilterResult<String> {
    if identifier.is_empty() {
        return Err(FilterError::InvalidIdentifier(
            "identifier must not be empty".to_string(),
        ));
    }
    if identifier.contains('\0') {
        return Err(FilterError::InvalidIdentifier(format!(
            "identifier '{}' contains a NUL character",
            identifier.escape_debug()
        )));
    }

    let style = dialect.quote_style();
    if !style.always && !has_reserved_characters(identifier) {
        return Ok(identifier.to_string());
    }

    let mut quoted = String::with_capacity(identifier.len() + 2);
    quoted.push(style.open);
    for c in identifier.chars() {
        if c == style.close {
            quoted.push(c);
        }
        quoted.push(c);
    }
    quoted.push(style.close);
    Ok(quoted)
}
