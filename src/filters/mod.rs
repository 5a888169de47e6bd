// src/filters/mod.rs
// Cascading filter engine: hierarchy, cache, resolver, controller and the
// Bevy plumbing around them

pub mod cache;
pub mod controller;
pub mod definitions;
pub mod error;
pub mod events;
pub mod hierarchy;
pub mod plugin;
pub mod resolver;
pub mod selection;
pub mod session;
pub mod systems;
pub mod view;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::{CacheEntry, SelectableValuesCache};
pub use controller::{
    CascadeController, FilterValueSet, NonTextFilterApplication, NonTextState, ResolutionState,
};
pub use definitions::{FilterDefinition, FilterEdge, FilterKind, HierarchyDescription};
pub use error::{FilterError, FilterResult, ResolutionFailedError};
pub use events::{
    FilterOperationFeedback, FilterSelectionChanged, FilterViewUpdate, NonTextFilterApplied,
    RequestLoadFilters, RequestUpdateFilters,
};
pub use hierarchy::FilterHierarchy;
pub use plugin::{FilterCascadePlugin, FilterSystemSet};
pub use resolver::{
    execute_concurrently, CascadeOutcome, CascadeResolver, CascadeRun, Completion, Resolution,
    ResolutionJob,
};
pub use selection::{FilterSelectionState, SelectionSignature};
pub use session::CascadeSession;
pub use systems::{FilterCascadeSession, QueryWorker};
pub use view::{FilterPresenter, FilterView, SnapshotView};
