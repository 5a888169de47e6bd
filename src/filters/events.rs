// src/filters/events.rs
use bevy::prelude::Event;
use std::sync::Arc;

use super::controller::{FilterValueSet, NonTextFilterApplication};
use super::definitions::{FilterDefinition, HierarchyDescription};
use super::hierarchy::FilterHierarchy;

/// (Re)load the hierarchy. Discards all selections and cached values.
#[derive(Event, Debug, Clone)]
pub struct RequestLoadFilters {
    pub description: HierarchyDescription,
}

/// Replace the filter definitions, keeping edges between surviving filters.
#[derive(Event, Debug, Clone)]
pub struct RequestUpdateFilters {
    pub filters: Vec<FilterDefinition>,
}

#[derive(Event, Debug, Clone)]
pub struct FilterSelectionChanged {
    pub filter_code: String,
    pub selected: Vec<String>,
}

#[derive(Event, Debug, Clone)]
pub struct NonTextFilterApplied {
    pub application: NonTextFilterApplication,
}

/// State pushed to whatever renders the filters.
#[derive(Event, Debug, Clone)]
pub enum FilterViewUpdate {
    LoadNonTextFilters(Vec<FilterValueSet>),
    LoadFilters {
        filters: Vec<FilterValueSet>,
        hierarchy: Arc<FilterHierarchy>,
    },
    UpdateFilters(Vec<FilterValueSet>),
}

#[derive(Event, Debug, Clone)]
pub struct FilterOperationFeedback {
    pub message: String,
    pub is_error: bool,
}
