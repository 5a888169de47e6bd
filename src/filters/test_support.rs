// src/filters/test_support.rs
// Shared fixtures for resolver and controller tests

#![cfg(test)]

use std::sync::Mutex;

use super::definitions::{FilterDefinition, FilterEdge, FilterKind, HierarchyDescription};
use super::hierarchy::FilterHierarchy;
use crate::database::test_helpers::locations_connection;
use crate::database::{QueryError, QueryExecutor, QueryResult, SqliteExecutor};

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Country -> State -> City, plus the NonText Year hanging off Country.
pub fn location_description() -> HierarchyDescription {
    HierarchyDescription::new(
        vec![
            FilterDefinition::new("Country", FilterKind::Text, "Locations", "Country")
                .with_display_order(1),
            FilterDefinition::new("State", FilterKind::Text, "Locations", "State")
                .with_display_order(2),
            FilterDefinition::new("City", FilterKind::Text, "Locations", "City")
                .with_display_order(3),
            FilterDefinition::new("Year", FilterKind::NonText, "Locations", "Year")
                .with_display_order(4),
        ],
        vec![
            FilterEdge::new("Country", "State"),
            FilterEdge::new("State", "City"),
            FilterEdge::new("Country", "Year"),
        ],
    )
}

pub fn location_hierarchy() -> FilterHierarchy {
    FilterHierarchy::build(&location_description()).unwrap()
}

/// Executor over the `Locations` fixture that records every query it runs
/// and can be told to fail some of them.
pub struct CountingExecutor {
    inner: SqliteExecutor,
    log: Mutex<Vec<String>>,
    failing: Mutex<Option<String>>,
}

impl CountingExecutor {
    pub fn with_locations() -> Self {
        Self {
            inner: SqliteExecutor::from_connection(locations_connection()),
            log: Mutex::new(Vec::new()),
            failing: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub fn calls_containing(&self, fragment: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|sql| sql.contains(fragment))
            .count()
    }

    pub fn last_sql(&self) -> Option<String> {
        self.log.lock().unwrap().last().cloned()
    }

    /// Fail every later query whose SQL contains `fragment`.
    pub fn fail_when_sql_contains(&self, fragment: &str) {
        *self.failing.lock().unwrap() = Some(fragment.to_string());
    }

    pub fn stop_failing(&self) {
        *self.failing.lock().unwrap() = None;
    }
}

impl QueryExecutor for CountingExecutor {
    fn execute(&self, sql: &str, params: &[String]) -> QueryResult<Vec<String>> {
        self.log.lock().unwrap().push(sql.to_string());
        let failing = self.failing.lock().unwrap().clone();
        if let Some(fragment) = failing {
            if sql.contains(&fragment) {
                return Err(QueryError::Other(format!("simulated failure for {}", sql)));
            }
        }
        self.inner.execute(sql, params)
    }
}
