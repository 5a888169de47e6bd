// src/filters/selection.rs
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use super::hierarchy::FilterHierarchy;

/// Committed selections, keyed by filter code.
///
/// Text filters may hold several values. NonText filters hold at most one,
/// and only once it has been applied.
#[derive(Debug, Clone, Default)]
pub struct FilterSelectionState {
    selected: HashMap<String, BTreeSet<String>>,
}

impl FilterSelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, code: &str) -> Option<&BTreeSet<String>> {
        self.selected.get(code).filter(|values| !values.is_empty())
    }

    pub fn is_empty(&self, code: &str) -> bool {
        self.get(code).is_none()
    }

    pub fn selected_values(&self, code: &str) -> Vec<String> {
        self.get(code)
            .map(|values| values.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Replace the selection. Returns whether it changed.
    pub fn set<I>(&mut self, code: &str, values: I) -> bool
    where
        I: IntoIterator<Item = String>,
    {
        let values: BTreeSet<String> = values.into_iter().collect();
        if values.is_empty() {
            return self.clear(code);
        }
        if self.selected.get(code) == Some(&values) {
            return false;
        }
        self.selected.insert(code.to_string(), values);
        true
    }

    /// Returns whether anything was selected.
    pub fn clear(&mut self, code: &str) -> bool {
        self.selected
            .remove(code)
            .map(|values| !values.is_empty())
            .unwrap_or(false)
    }

    /// Keep only selected values that are still selectable.
    /// Returns whether the selection shrank.
    pub fn retain_available(&mut self, code: &str, available: &[String]) -> bool {
        let Some(values) = self.selected.get_mut(code) else {
            return false;
        };
        let before = values.len();
        values.retain(|v| available.contains(v));
        let shrank = values.len() != before;
        if values.is_empty() {
            self.selected.remove(code);
        }
        shrank
    }

    pub fn reset(&mut self) {
        self.selected.clear();
    }
}

/// Order-independent encoding of the selections of a filter's full ancestor
/// chain. Ancestors with an empty selection constrain nothing and are left
/// out, so two signatures are equal exactly when they yield the same query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SelectionSignature(Vec<(String, Vec<String>)>);

impl SelectionSignature {
    pub fn of(hierarchy: &FilterHierarchy, selections: &FilterSelectionState, code: &str) -> Self {
        // BTreeSet iteration gives codes and values in sorted order
        let entries = hierarchy
            .ancestors(code)
            .into_iter()
            .filter_map(|ancestor| {
                let values = selections.get(&ancestor)?;
                Some((ancestor, values.iter().cloned().collect()))
            })
            .collect();
        Self(entries)
    }

    pub fn entries(&self) -> &[(String, Vec<String>)] {
        &self.0
    }

    pub fn is_unconstrained(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `code`'s selection is part of this signature.
    pub fn embeds(&self, code: &str) -> bool {
        self.0.iter().any(|(ancestor, _)| ancestor == code)
    }
}

impl fmt::Display for SelectionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("{}");
        }
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(code, values)| format!("{}={:?}", code, values))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}
