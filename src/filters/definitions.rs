// src/filters/definitions.rs
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::error::FilterResult;

/// How a filter commits its selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FilterKind {
    /// Multi-valued; cascades on every selection change.
    #[default]
    Text,
    /// Single-valued; cascades only when the value is explicitly applied.
    NonText,
}

/// One filter, mapped to a column of a source table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDefinition {
    pub code: String,
    #[serde(default)]
    pub kind: FilterKind,
    pub table: String,
    pub column: String,
    #[serde(default)]
    pub display_order: i32,
}

impl FilterDefinition {
    pub fn new(
        code: impl Into<String>,
        kind: FilterKind,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            kind,
            table: table.into(),
            column: column.into(),
            display_order: 0,
        }
    }

    pub fn with_display_order(mut self, display_order: i32) -> Self {
        self.display_order = display_order;
        self
    }

    pub fn is_non_text(&self) -> bool {
        self.kind == FilterKind::NonText
    }
}

/// `child`'s selectable values are constrained by `parent`'s selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterEdge {
    pub parent: String,
    pub child: String,
}

impl FilterEdge {
    pub fn new(parent: impl Into<String>, child: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
            child: child.into(),
        }
    }
}

/// Declarative hierarchy input, loaded wholesale when filters are (re)loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyDescription {
    pub filters: Vec<FilterDefinition>,
    #[serde(default)]
    pub edges: Vec<FilterEdge>,
}

impl HierarchyDescription {
    pub fn new(filters: Vec<FilterDefinition>, edges: Vec<FilterEdge>) -> Self {
        Self { filters, edges }
    }

    pub fn from_json_str(json: &str) -> FilterResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> FilterResult<Self> {
        let content = fs::read_to_string(path)?;
        let description = Self::from_json_str(&content)?;
        bevy::log::debug!(
            "Loaded hierarchy description from {:?}: {} filters, {} edges",
            path,
            description.filters.len(),
            description.edges.len()
        );
        Ok(description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_defaults() {
        let description = HierarchyDescription::from_json_str(
            r#"{ "filters": [ { "code": "Country", "table": "Locations", "column": "Country" } ] }"#,
        )
        .unwrap();
        assert_eq!(description.filters.len(), 1);
        assert_eq!(description.filters[0].kind, FilterKind::Text);
        assert_eq!(description.filters[0].display_order, 0);
        assert!(description.edges.is_empty());
    }

    #[test]
    fn test_description_with_edges_and_kinds() {
        let description = HierarchyDescription::from_json_str(
            r#"{
                "filters": [
                    { "code": "Country", "kind": "Text", "table": "L", "column": "Country", "display_order": 1 },
                    { "code": "Year", "kind": "NonText", "table": "L", "column": "Year", "display_order": 2 }
                ],
                "edges": [ { "parent": "Country", "child": "Year" } ]
            }"#,
        )
        .unwrap();
        assert!(description.filters[1].is_non_text());
        assert_eq!(description.edges, vec![FilterEdge::new("Country", "Year")]);
    }

    #[test]
    fn test_malformed_description_is_a_parse_error() {
        let err = HierarchyDescription::from_json_str("{ \"filters\": 3 }").unwrap_err();
        assert!(matches!(err, super::super::error::FilterError::Parse(_)));
    }
}
