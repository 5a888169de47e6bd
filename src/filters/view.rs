// src/filters/view.rs
use std::collections::HashMap;

use super::controller::{FilterValueSet, NonTextFilterApplication, ResolutionState};
use super::error::FilterResult;
use super::hierarchy::FilterHierarchy;

/// Receives state pushed by the controller. Never read back from.
pub trait FilterView {
    fn load_non_text_filters(&mut self, filters: &[FilterValueSet]);
    fn load_filters(&mut self, filters: &[FilterValueSet], hierarchy: &FilterHierarchy);
    fn update_filters(&mut self, filters: &[FilterValueSet]);
}

/// The two entry points a view calls on user interaction.
pub trait FilterPresenter {
    fn filter_selection_changed(&mut self, filter_code: &str, selected: Vec<String>) -> FilterResult<()>;
    fn non_text_filter_applied(&mut self, application: NonTextFilterApplication) -> FilterResult<()>;
}

/// Keeps the latest value set of every filter.
#[derive(Debug, Default, Clone)]
pub struct SnapshotView {
    order: Vec<String>,
    sets: HashMap<String, FilterValueSet>,
    non_text: Vec<String>,
}

impl SnapshotView {
    pub fn value_set(&self, code: &str) -> Option<&FilterValueSet> {
        self.sets.get(code)
    }

    pub fn values(&self, code: &str) -> Vec<String> {
        self.sets
            .get(code)
            .map(|set| set.values.clone())
            .unwrap_or_default()
    }

    pub fn state(&self, code: &str) -> Option<ResolutionState> {
        self.sets.get(code).map(|set| set.state)
    }

    /// Value sets in the order they were loaded.
    pub fn value_sets(&self) -> Vec<&FilterValueSet> {
        self.order.iter().filter_map(|code| self.sets.get(code)).collect()
    }

    pub fn non_text_codes(&self) -> Vec<String> {
        self.non_text.clone()
    }

    fn replace_all(&mut self, filters: &[FilterValueSet]) {
        self.order = filters.iter().map(|set| set.filter_code.clone()).collect();
        self.sets = filters
            .iter()
            .map(|set| (set.filter_code.clone(), set.clone()))
            .collect();
    }
}

impl FilterView for SnapshotView {
    fn load_non_text_filters(&mut self, filters: &[FilterValueSet]) {
        self.non_text = filters.iter().map(|set| set.filter_code.clone()).collect();
    }

    fn load_filters(&mut self, filters: &[FilterValueSet], _hierarchy: &FilterHierarchy) {
        self.replace_all(filters);
    }

    fn update_filters(&mut self, filters: &[FilterValueSet]) {
        for set in filters {
            if !self.sets.contains_key(&set.filter_code) {
                self.order.push(set.filter_code.clone());
            }
            self.sets.insert(set.filter_code.clone(), set.clone());
        }
    }
}
