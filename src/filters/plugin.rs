// src/filters/plugin.rs
use bevy::prelude::*;
use std::sync::Arc;

use super::events::{
    FilterOperationFeedback, FilterSelectionChanged, FilterViewUpdate, NonTextFilterApplied,
    RequestLoadFilters, RequestUpdateFilters,
};
use super::systems::{self, FilterCascadeSession, QueryWorker};
use crate::database::{QueryExecutor, SqlDialect};

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterSystemSet {
    UserInput,    // Presenter events from the view
    ApplyResults, // Finished queries and view updates
}

/// Cascading filters as events and resources.
pub struct FilterCascadePlugin {
    dialect: SqlDialect,
    executor: Option<Arc<dyn QueryExecutor>>,
}

impl FilterCascadePlugin {
    pub fn new(dialect: SqlDialect) -> Self {
        Self {
            dialect,
            executor: None,
        }
    }

    /// Without an executor, every query fails with "no database configured"
    /// and its filter turns stale until a [`QueryWorker`] resource is
    /// inserted and the filters are loaded again.
    pub fn with_executor(mut self, executor: Arc<dyn QueryExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }
}

impl Plugin for FilterCascadePlugin {
    fn build(&self, app: &mut App) {
        app.configure_sets(
            Update,
            (
                FilterSystemSet::UserInput,
                FilterSystemSet::ApplyResults.after(FilterSystemSet::UserInput),
            ),
        );

        app.insert_resource(FilterCascadeSession::new(self.dialect));
        if let Some(executor) = &self.executor {
            app.insert_resource(QueryWorker::new(Arc::clone(executor)));
        }

        app.add_event::<RequestLoadFilters>()
            .add_event::<RequestUpdateFilters>()
            .add_event::<FilterSelectionChanged>()
            .add_event::<NonTextFilterApplied>()
            .add_event::<FilterViewUpdate>()
            .add_event::<FilterOperationFeedback>();

        app.add_systems(
            Update,
            (
                systems::handle_load_requests,
                systems::handle_update_requests,
                systems::handle_selection_changes,
                systems::handle_non_text_applications,
            )
                .chain()
                .in_set(FilterSystemSet::UserInput),
        );
        app.add_systems(
            Update,
            (systems::poll_query_results, systems::forward_view_updates)
                .chain()
                .in_set(FilterSystemSet::ApplyResults),
        );

        info!("FilterCascadePlugin initialized ({})", self.dialect);
    }
}
