// src/filters/session.rs
use std::sync::Arc;

use super::controller::{CascadeController, NonTextFilterApplication};
use super::definitions::{FilterDefinition, HierarchyDescription};
use super::error::FilterResult;
use super::view::{FilterPresenter, FilterView};
use crate::database::{QueryExecutor, SqlDialect};

/// Synchronous presenter: every call runs its cascade to completion before
/// returning, with sibling queries in parallel.
pub struct CascadeSession<V: FilterView> {
    controller: CascadeController,
    executor: Arc<dyn QueryExecutor>,
    view: V,
}

impl<V: FilterView> CascadeSession<V> {
    pub fn new(dialect: SqlDialect, executor: Arc<dyn QueryExecutor>, view: V) -> Self {
        Self {
            controller: CascadeController::new(dialect),
            executor,
            view,
        }
    }

    pub fn load_filters(&mut self, description: HierarchyDescription) -> FilterResult<()> {
        let jobs = self.controller.load_filters(description, &mut self.view)?;
        self.controller
            .run_jobs(self.executor.as_ref(), jobs, &mut self.view)
    }

    pub fn update_filters(&mut self, filters: Vec<FilterDefinition>) -> FilterResult<()> {
        let jobs = self.controller.update_filters(filters, &mut self.view)?;
        self.controller
            .run_jobs(self.executor.as_ref(), jobs, &mut self.view)
    }

    pub fn controller(&self) -> &CascadeController {
        &self.controller
    }

    pub fn view(&self) -> &V {
        &self.view
    }
}

impl<V: FilterView> FilterPresenter for CascadeSession<V> {
    fn filter_selection_changed(&mut self, filter_code: &str, selected: Vec<String>) -> FilterResult<()> {
        let jobs = self
            .controller
            .filter_selection_changed(filter_code, selected, &mut self.view)?;
        self.controller
            .run_jobs(self.executor.as_ref(), jobs, &mut self.view)
    }

    fn non_text_filter_applied(&mut self, application: NonTextFilterApplication) -> FilterResult<()> {
        let jobs = self
            .controller
            .non_text_filter_applied(application, &mut self.view)?;
        self.controller
            .run_jobs(self.executor.as_ref(), jobs, &mut self.view)
    }
}
