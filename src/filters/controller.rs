// src/filters/controller.rs
// Cascade controller: owns selections, the cache and per-filter state, and
// turns presenter events into resolution jobs and view updates

use bevy::log::{debug, info, warn};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use super::definitions::{FilterDefinition, FilterKind, HierarchyDescription};
use super::error::{FilterError, FilterResult};
use super::hierarchy::FilterHierarchy;
use super::resolver::{
    execute_concurrently, CascadeOutcome, CascadeResolver, CascadeRun, Resolution, ResolutionJob,
};
use super::selection::FilterSelectionState;
use super::view::FilterView;
use crate::database::{QueryExecutor, QueryResult, SqlDialect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionState {
    /// A parent has nothing selected.
    AwaitingParent,
    /// A query is in flight.
    Resolving,
    Resolved,
    /// An ancestor changed, or the last refresh failed.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NonTextState {
    /// Chosen, not applied yet. Descendants are unaffected.
    Pending,
    Applied,
}

/// Explicit commit of a NonText filter's value. `None` clears it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonTextFilterApplication {
    pub filter_code: String,
    pub applied_value: Option<String>,
}

impl NonTextFilterApplication {
    pub fn new(filter_code: impl Into<String>, applied_value: Option<String>) -> Self {
        Self {
            filter_code: filter_code.into(),
            applied_value,
        }
    }
}

/// Everything the view gets to know about one filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterValueSet {
    pub filter_code: String,
    pub kind: FilterKind,
    pub values: Vec<String>,
    /// Committed selection.
    pub selected: Vec<String>,
    /// NonText value chosen but not applied.
    pub pending: Option<String>,
    pub state: ResolutionState,
    /// `None` for Text filters and for NonText filters with nothing chosen.
    pub non_text_state: Option<NonTextState>,
    /// Set when the last refresh failed; `values` are then the previous ones.
    pub refresh_error: Option<String>,
}

impl FilterValueSet {
    fn initial(definition: &FilterDefinition, state: ResolutionState) -> Self {
        Self {
            filter_code: definition.code.clone(),
            kind: definition.kind,
            values: Vec::new(),
            selected: Vec::new(),
            pending: None,
            state,
            non_text_state: None,
            refresh_error: None,
        }
    }

    pub fn is_selected(&self, value: &str) -> bool {
        self.selected.iter().any(|v| v == value)
    }
}

/// State that only exists once a hierarchy has been loaded.
struct LoadedFilters {
    description: HierarchyDescription,
    resolver: CascadeResolver,
    selections: FilterSelectionState,
    value_sets: HashMap<String, FilterValueSet>,
    runs: Vec<CascadeRun>,
    /// Root loads, keyed by code and epoch; not part of any cascade.
    standalone: HashSet<(String, u64)>,
}

impl LoadedFilters {
    fn hierarchy(&self) -> &Arc<FilterHierarchy> {
        self.resolver.hierarchy()
    }

    fn set_state(&mut self, code: &str, state: ResolutionState) {
        if let Some(set) = self.value_sets.get_mut(code) {
            set.state = state;
        }
    }

    /// Plan levels of every run in `pending`, starting cascades for any
    /// filter whose selection got pruned after a newer cascade overtook it.
    fn advance_runs(
        &mut self,
        mut pending: Vec<CascadeRun>,
        outcome: &mut CascadeOutcome,
    ) -> Vec<ResolutionJob> {
        let mut jobs = Vec::new();
        while let Some(mut run) = pending.pop() {
            jobs.extend(
                self.resolver
                    .advance_cascade(&mut run, &mut self.selections, outcome),
            );
            for restart in self.resolver.take_restarts(outcome) {
                debug!(
                    "Restarting cascade from pruned filter '{}'",
                    restart.changed_filter()
                );
                self.mark_descendants_stale(restart.changed_filter());
                pending.push(restart);
            }
            if !run.is_finished() {
                self.runs.push(run);
            }
        }
        for job in &jobs {
            self.set_state(&job.filter_code, ResolutionState::Resolving);
        }
        jobs
    }

    fn mark_descendants_stale(&mut self, code: &str) {
        let descendants = self.hierarchy().descendants(code);
        for descendant in descendants {
            self.set_state(&descendant, ResolutionState::Stale);
        }
    }

    fn finish_standalone(
        &mut self,
        job: ResolutionJob,
        result: QueryResult<Vec<String>>,
        outcome: &mut CascadeOutcome,
    ) {
        let code = job.filter_code.clone();
        match self.resolver.complete(job, result) {
            Ok(completion) if completion.applied => {
                self.selections.retain_available(&code, &completion.values);
                outcome.resolved.push((code, completion.values));
            }
            Ok(_) => debug!("Dropping superseded load result for '{}'", code),
            Err(e) => outcome.failed.push(e),
        }
    }

    /// Fold `outcome` into the value sets. Returns the codes it touched.
    fn apply_outcome(&mut self, outcome: CascadeOutcome) -> BTreeSet<String> {
        let mut touched = BTreeSet::new();

        for (code, values) in outcome.resolved {
            let selected = self.selections.selected_values(&code);
            if let Some(set) = self.value_sets.get_mut(&code) {
                if let Some(pending) = &set.pending {
                    if !values.contains(pending) {
                        set.pending = None;
                    }
                }
                set.non_text_state = non_text_state_of(set.kind, &set.pending, &selected);
                set.values = values;
                set.selected = selected;
                set.state = ResolutionState::Resolved;
                set.refresh_error = None;
            }
            touched.insert(code);
        }

        for code in outcome.cleared {
            if let Some(set) = self.value_sets.get_mut(&code) {
                set.values.clear();
                set.selected.clear();
                set.pending = None;
                set.non_text_state = None;
                set.state = ResolutionState::AwaitingParent;
                set.refresh_error = None;
            }
            touched.insert(code);
        }

        for failure in outcome.failed {
            if let Some(set) = self.value_sets.get_mut(&failure.filter_code) {
                set.state = ResolutionState::Stale;
                set.refresh_error = Some(failure.cause.to_string());
            }
            touched.insert(failure.filter_code);
        }

        for code in outcome.blocked {
            self.set_state(&code, ResolutionState::Stale);
            touched.insert(code);
        }

        touched
    }

    /// Push the value sets of `codes` to the view, in display order.
    fn push_updates(&self, view: &mut dyn FilterView, codes: &BTreeSet<String>) {
        if codes.is_empty() {
            return;
        }
        let sets: Vec<FilterValueSet> = self
            .hierarchy()
            .definitions()
            .iter()
            .filter(|definition| codes.contains(&definition.code))
            .filter_map(|definition| self.value_sets.get(&definition.code).cloned())
            .collect();
        view.update_filters(&sets);
    }

    fn ordered_value_sets(&self) -> Vec<FilterValueSet> {
        self.hierarchy()
            .definitions()
            .iter()
            .filter_map(|definition| self.value_sets.get(&definition.code).cloned())
            .collect()
    }

    /// Invalidate below `code`, mark its descendants stale and start
    /// resolving the first level.
    fn start_cascade(
        &mut self,
        code: &str,
        view: &mut dyn FilterView,
    ) -> FilterResult<Vec<ResolutionJob>> {
        let run = self.resolver.begin_cascade(code)?;
        self.mark_descendants_stale(code);

        let mut outcome = CascadeOutcome::default();
        let jobs = self.advance_runs(vec![run], &mut outcome);
        self.apply_outcome(outcome);

        let mut affected = self.hierarchy().descendants(code);
        affected.insert(code.to_string());
        self.push_updates(view, &affected);
        Ok(jobs)
    }
}

fn non_text_state_of(
    kind: FilterKind,
    pending: &Option<String>,
    selected: &[String],
) -> Option<NonTextState> {
    if kind != FilterKind::NonText {
        None
    } else if pending.is_some() {
        Some(NonTextState::Pending)
    } else if !selected.is_empty() {
        Some(NonTextState::Applied)
    } else {
        None
    }
}

/// Cascade controller for one editing session.
///
/// Every entry point returns the [`ResolutionJob`]s that have to run; their
/// results come back through [`complete_job`](Self::complete_job), which may
/// hand out the jobs of the next cascade level. [`run_jobs`](Self::run_jobs)
/// drives that loop synchronously.
pub struct CascadeController {
    dialect: SqlDialect,
    loaded: Option<LoadedFilters>,
    last_epoch: u64,
}

impl CascadeController {
    pub fn new(dialect: SqlDialect) -> Self {
        Self {
            dialect,
            loaded: None,
            last_epoch: 0,
        }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    fn loaded(&self) -> FilterResult<&LoadedFilters> {
        self.loaded.as_ref().ok_or(FilterError::NotLoaded)
    }

    fn loaded_mut(&mut self) -> FilterResult<&mut LoadedFilters> {
        self.loaded.as_mut().ok_or(FilterError::NotLoaded)
    }

    pub fn hierarchy(&self) -> Option<&Arc<FilterHierarchy>> {
        self.loaded.as_ref().map(|loaded| loaded.hierarchy())
    }

    pub fn selections(&self) -> Option<&FilterSelectionState> {
        self.loaded.as_ref().map(|loaded| &loaded.selections)
    }

    pub fn value_set(&self, code: &str) -> Option<&FilterValueSet> {
        self.loaded.as_ref()?.value_sets.get(code)
    }

    /// All value sets in display order.
    pub fn value_sets(&self) -> Vec<FilterValueSet> {
        self.loaded
            .as_ref()
            .map(LoadedFilters::ordered_value_sets)
            .unwrap_or_default()
    }

    /// No cascade is running and no load is outstanding.
    pub fn is_idle(&self) -> bool {
        self.loaded
            .as_ref()
            .map(|loaded| loaded.runs.is_empty() && loaded.standalone.is_empty())
            .unwrap_or(true)
    }

    /// Build the hierarchy and reset all state. Fails before touching the
    /// current state when the description is malformed.
    fn initialize(&mut self, description: HierarchyDescription) -> FilterResult<Vec<ResolutionJob>> {
        let hierarchy = Arc::new(FilterHierarchy::build(&description)?);

        if let Some(previous) = self.loaded.take() {
            self.last_epoch = self.last_epoch.max(previous.resolver.last_epoch());
        }
        let resolver =
            CascadeResolver::new(Arc::clone(&hierarchy), self.dialect).with_epoch_base(self.last_epoch);

        let value_sets = hierarchy
            .definitions()
            .iter()
            .map(|definition| {
                let state = if hierarchy.is_root(&definition.code) {
                    ResolutionState::Resolving
                } else {
                    ResolutionState::AwaitingParent
                };
                (definition.code.clone(), FilterValueSet::initial(definition, state))
            })
            .collect();

        let mut loaded = LoadedFilters {
            description,
            resolver,
            selections: FilterSelectionState::new(),
            value_sets,
            runs: Vec::new(),
            standalone: HashSet::new(),
        };

        let roots: Vec<String> = hierarchy.roots().map(|d| d.code.clone()).collect();
        let mut jobs = Vec::with_capacity(roots.len());
        for code in roots {
            match loaded.resolver.plan_fresh(&code, &loaded.selections)? {
                Resolution::Pending(job) => {
                    loaded.standalone.insert((code, job.epoch));
                    jobs.push(job);
                }
                Resolution::Ready(values) => {
                    if let Some(set) = loaded.value_sets.get_mut(&code) {
                        set.values = values;
                        set.state = ResolutionState::Resolved;
                    }
                }
                Resolution::Cleared => loaded.set_state(&code, ResolutionState::AwaitingParent),
            }
        }

        info!(
            "Loaded {} filters ({} roots queried eagerly)",
            hierarchy.definitions().len(),
            jobs.len()
        );
        self.loaded = Some(loaded);
        Ok(jobs)
    }

    /// (Re)initialize from `description`. The cache, selections and any
    /// running cascades are discarded.
    pub fn load_filters(
        &mut self,
        description: HierarchyDescription,
        view: &mut dyn FilterView,
    ) -> FilterResult<Vec<ResolutionJob>> {
        let jobs = self.initialize(description)?;
        let loaded = self.loaded()?;
        let sets = loaded.ordered_value_sets();
        let non_text: Vec<FilterValueSet> = sets
            .iter()
            .filter(|set| set.kind == FilterKind::NonText)
            .cloned()
            .collect();
        view.load_non_text_filters(&non_text);
        view.load_filters(&sets, loaded.hierarchy());
        Ok(jobs)
    }

    /// Replace the filter definitions, keeping the edges whose filters still
    /// exist, and reset all state.
    pub fn update_filters(
        &mut self,
        filters: Vec<FilterDefinition>,
        view: &mut dyn FilterView,
    ) -> FilterResult<Vec<ResolutionJob>> {
        let codes: HashSet<&str> = filters.iter().map(|f| f.code.as_str()).collect();
        let edges = self
            .loaded()?
            .description
            .edges
            .iter()
            .filter(|edge| codes.contains(edge.parent.as_str()) && codes.contains(edge.child.as_str()))
            .cloned()
            .collect();
        let description = HierarchyDescription::new(filters, edges);

        let jobs = self.initialize(description)?;
        let sets = self.loaded()?.ordered_value_sets();
        view.update_filters(&sets);
        Ok(jobs)
    }

    /// Selection change coming from the view.
    ///
    /// Text filters commit and cascade at once; an empty list clears the
    /// filter and its dependents. NonText filters only record the first
    /// value as pending until [`non_text_filter_applied`](Self::non_text_filter_applied).
    pub fn filter_selection_changed(
        &mut self,
        code: &str,
        selected: Vec<String>,
        view: &mut dyn FilterView,
    ) -> FilterResult<Vec<ResolutionJob>> {
        let loaded = self.loaded_mut()?;
        let definition = loaded.hierarchy().require(code)?.clone();

        if definition.is_non_text() {
            let pending = selected.into_iter().next();
            if let Some(set) = loaded.value_sets.get_mut(code) {
                set.pending = pending;
                set.non_text_state = non_text_state_of(set.kind, &set.pending, &set.selected);
            }
            debug!("Recorded pending value for NonText filter '{}'", code);
            loaded.push_updates(view, &BTreeSet::from([code.to_string()]));
            return Ok(Vec::new());
        }

        if !loaded.selections.set(code, selected) {
            debug!("Selection of '{}' unchanged; no cascade", code);
            return Ok(Vec::new());
        }
        let committed = loaded.selections.selected_values(code);
        if let Some(set) = loaded.value_sets.get_mut(code) {
            set.selected = committed;
        }
        loaded.start_cascade(code, view)
    }

    /// Commit a NonText filter's value and cascade as for a selection change.
    pub fn non_text_filter_applied(
        &mut self,
        application: NonTextFilterApplication,
        view: &mut dyn FilterView,
    ) -> FilterResult<Vec<ResolutionJob>> {
        let loaded = self.loaded_mut()?;
        let code = application.filter_code.as_str();
        if !loaded.hierarchy().require(code)?.is_non_text() {
            return Err(FilterError::NotNonText(code.to_string()));
        }

        let changed = loaded.selections.set(code, application.applied_value.clone());
        let committed = loaded.selections.selected_values(code);
        if let Some(set) = loaded.value_sets.get_mut(code) {
            set.pending = None;
            set.non_text_state = non_text_state_of(set.kind, &None, &committed);
            set.selected = committed;
        }
        info!(
            "Applied NonText filter '{}' = {:?}",
            code, application.applied_value
        );

        if !changed {
            loaded.push_updates(view, &BTreeSet::from([code.to_string()]));
            return Ok(Vec::new());
        }
        loaded.start_cascade(code, view)
    }

    /// Feed back the result of a job handed out earlier. Returns the jobs
    /// that became ready because of it.
    ///
    /// Results of jobs from before the last (re)load are ignored.
    pub fn complete_job(
        &mut self,
        job: ResolutionJob,
        result: QueryResult<Vec<String>>,
        view: &mut dyn FilterView,
    ) -> FilterResult<Vec<ResolutionJob>> {
        let loaded = self.loaded_mut()?;
        let mut outcome = CascadeOutcome::default();
        let code = job.filter_code.clone();

        let jobs = if let Some(index) = loaded.runs.iter().position(|run| run.is_waiting_on(&job)) {
            let mut run = loaded.runs.swap_remove(index);
            loaded
                .resolver
                .finish_job(&mut run, job, result, &mut loaded.selections, &mut outcome);
            loaded.advance_runs(vec![run], &mut outcome)
        } else if loaded.standalone.remove(&(code.clone(), job.epoch)) {
            loaded.finish_standalone(job, result, &mut outcome);
            Vec::new()
        } else {
            warn!(
                "Ignoring result for '{}' from epoch {}: no longer tracked",
                code, job.epoch
            );
            return Ok(Vec::new());
        };

        let mut touched = loaded.apply_outcome(outcome);
        touched.extend(jobs.iter().map(|job| job.filter_code.clone()));
        loaded.push_updates(view, &touched);
        Ok(jobs)
    }

    /// Execute `jobs` and everything they lead to, running each batch of
    /// sibling queries concurrently.
    pub fn run_jobs(
        &mut self,
        executor: &dyn QueryExecutor,
        jobs: Vec<ResolutionJob>,
        view: &mut dyn FilterView,
    ) -> FilterResult<()> {
        let mut batch = jobs;
        while !batch.is_empty() {
            let mut next = Vec::new();
            for (job, result) in execute_concurrently(executor, batch) {
                next.extend(self.complete_job(job, result, view)?);
            }
            batch = next;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::QueryError;
    use crate::filters::test_support::{location_description, strings, CountingExecutor};
    use crate::filters::view::SnapshotView;

    fn loaded_controller(
        executor: &CountingExecutor,
        view: &mut SnapshotView,
    ) -> CascadeController {
        let mut controller = CascadeController::new(SqlDialect::GenericEnbracketAll);
        let jobs = controller.load_filters(location_description(), view).unwrap();
        controller.run_jobs(executor, jobs, view).unwrap();
        controller
    }

    fn select(
        controller: &mut CascadeController,
        executor: &CountingExecutor,
        view: &mut SnapshotView,
        code: &str,
        values: &[&str],
    ) {
        let jobs = controller
            .filter_selection_changed(code, strings(values), view)
            .unwrap();
        controller.run_jobs(executor, jobs, view).unwrap();
    }

    #[test]
    fn test_initial_states() {
        let executor = CountingExecutor::with_locations();
        let mut view = SnapshotView::default();
        let controller = loaded_controller(&executor, &mut view);

        let country = controller.value_set("Country").unwrap();
        assert_eq!(country.state, ResolutionState::Resolved);
        assert_eq!(country.values, strings(&["Canada", "US"]));
        for code in ["State", "City", "Year"] {
            assert_eq!(
                controller.value_set(code).unwrap().state,
                ResolutionState::AwaitingParent
            );
        }
        assert_eq!(view.non_text_codes(), strings(&["Year"]));
        assert!(controller.is_idle());
        assert_eq!(executor.calls(), 1);
    }

    #[test]
    fn test_events_before_load_fail() {
        let mut controller = CascadeController::new(SqlDialect::GenericEnbracketAll);
        let mut view = SnapshotView::default();
        let err = controller
            .filter_selection_changed("Country", strings(&["US"]), &mut view)
            .unwrap_err();
        assert!(matches!(err, FilterError::NotLoaded));
    }

    #[test]
    fn test_unknown_code_is_rejected() {
        let executor = CountingExecutor::with_locations();
        let mut view = SnapshotView::default();
        let mut controller = loaded_controller(&executor, &mut view);
        let err = controller
            .filter_selection_changed("Planet", strings(&["Earth"]), &mut view)
            .unwrap_err();
        assert!(matches!(err, FilterError::UnknownFilter(code) if code == "Planet"));
    }

    #[test]
    fn test_selection_cascades_to_children() {
        let executor = CountingExecutor::with_locations();
        let mut view = SnapshotView::default();
        let mut controller = loaded_controller(&executor, &mut view);

        select(&mut controller, &executor, &mut view, "Country", &["US"]);
        assert_eq!(view.values("State"), strings(&["CA", "NY"]));
        assert_eq!(view.values("Year"), strings(&["2020", "2021"]));
        assert_eq!(view.state("City"), Some(ResolutionState::AwaitingParent));

        select(&mut controller, &executor, &mut view, "State", &["CA"]);
        assert_eq!(view.values("City"), strings(&["Los Angeles", "San Francisco"]));
        assert_eq!(view.state("City"), Some(ResolutionState::Resolved));
        assert!(controller.is_idle());
    }

    #[test]
    fn test_clearing_a_selection_clears_descendants_immediately() {
        let executor = CountingExecutor::with_locations();
        let mut view = SnapshotView::default();
        let mut controller = loaded_controller(&executor, &mut view);
        select(&mut controller, &executor, &mut view, "Country", &["US"]);
        select(&mut controller, &executor, &mut view, "State", &["NY"]);
        select(&mut controller, &executor, &mut view, "City", &["Buffalo"]);

        let calls = executor.calls();
        let jobs = controller
            .filter_selection_changed("Country", Vec::new(), &mut view)
            .unwrap();
        assert!(jobs.is_empty());
        assert_eq!(executor.calls(), calls);
        for code in ["State", "City", "Year"] {
            let set = view.value_set(code).unwrap();
            assert_eq!(set.state, ResolutionState::AwaitingParent);
            assert!(set.values.is_empty() && set.selected.is_empty());
        }
    }

    #[test]
    fn test_changing_parent_prunes_child_selection() {
        let executor = CountingExecutor::with_locations();
        let mut view = SnapshotView::default();
        let mut controller = loaded_controller(&executor, &mut view);
        select(&mut controller, &executor, &mut view, "Country", &["US", "Canada"]);
        select(&mut controller, &executor, &mut view, "State", &["CA", "ON"]);
        select(&mut controller, &executor, &mut view, "Country", &["Canada"]);

        let state = controller.value_set("State").unwrap();
        assert_eq!(state.values, strings(&["ON", "QC"]));
        assert_eq!(state.selected, strings(&["ON"]));
        assert_eq!(view.values("City"), strings(&["Toronto"]));
    }

    #[test]
    fn test_non_text_value_waits_for_apply() {
        let executor = CountingExecutor::with_locations();
        let mut view = SnapshotView::default();
        let description = HierarchyDescription::new(
            vec![
                FilterDefinition::new("Year", FilterKind::NonText, "Locations", "Year"),
                FilterDefinition::new("City", FilterKind::Text, "Locations", "City"),
            ],
            vec![crate::filters::definitions::FilterEdge::new("Year", "City")],
        );
        let mut controller = CascadeController::new(SqlDialect::GenericEnbracketAll);
        let jobs = controller.load_filters(description, &mut view).unwrap();
        controller.run_jobs(&executor, jobs, &mut view).unwrap();

        let jobs = controller
            .filter_selection_changed("Year", strings(&["2020"]), &mut view)
            .unwrap();
        assert!(jobs.is_empty());
        let year = view.value_set("Year").unwrap();
        assert_eq!(year.pending.as_deref(), Some("2020"));
        assert_eq!(year.non_text_state, Some(NonTextState::Pending));
        assert_eq!(view.state("City"), Some(ResolutionState::AwaitingParent));

        let jobs = controller
            .non_text_filter_applied(
                NonTextFilterApplication::new("Year", Some("2020".to_string())),
                &mut view,
            )
            .unwrap();
        controller.run_jobs(&executor, jobs, &mut view).unwrap();
        assert_eq!(
            view.values("City"),
            strings(&["New York", "San Francisco", "Toronto"])
        );
        let year = view.value_set("Year").unwrap();
        assert_eq!(year.non_text_state, Some(NonTextState::Applied));
        assert_eq!(year.selected, strings(&["2020"]));
    }

    #[test]
    fn test_apply_on_text_filter_fails() {
        let executor = CountingExecutor::with_locations();
        let mut view = SnapshotView::default();
        let mut controller = loaded_controller(&executor, &mut view);
        let err = controller
            .non_text_filter_applied(
                NonTextFilterApplication::new("Country", Some("US".to_string())),
                &mut view,
            )
            .unwrap_err();
        assert!(matches!(err, FilterError::NotNonText(code) if code == "Country"));
    }

    #[test]
    fn test_failed_refresh_keeps_previous_values() {
        let executor = CountingExecutor::with_locations();
        let mut view = SnapshotView::default();
        let mut controller = loaded_controller(&executor, &mut view);
        select(&mut controller, &executor, &mut view, "Country", &["US"]);
        select(&mut controller, &executor, &mut view, "State", &["NY"]);
        assert_eq!(view.values("City"), strings(&["Buffalo", "New York"]));

        executor.fail_when_sql_contains("SELECT DISTINCT [City]");
        select(&mut controller, &executor, &mut view, "State", &["CA"]);
        let city = view.value_set("City").unwrap();
        assert_eq!(city.state, ResolutionState::Stale);
        assert_eq!(city.values, strings(&["Buffalo", "New York"]));
        assert!(city.refresh_error.is_some());

        // The next selection change is the retry
        executor.stop_failing();
        select(&mut controller, &executor, &mut view, "State", &["CA", "NY"]);
        let city = view.value_set("City").unwrap();
        assert_eq!(city.state, ResolutionState::Resolved);
        assert!(city.refresh_error.is_none());
        assert_eq!(city.values.len(), 4);
    }

    #[test]
    fn test_overlapping_cascades_apply_newest_selection() {
        let mut view = SnapshotView::default();
        let executor = CountingExecutor::with_locations();
        let mut controller = loaded_controller(&executor, &mut view);

        let first = controller
            .filter_selection_changed("Country", strings(&["US"]), &mut view)
            .unwrap();
        let second = controller
            .filter_selection_changed("Country", strings(&["Canada"]), &mut view)
            .unwrap();
        assert!(first.iter().all(|job| job.cancel.is_cancelled()));

        // Newer results first, then the stale ones
        for job in second {
            let result = job.execute(&executor);
            controller.complete_job(job, result, &mut view).unwrap();
        }
        for job in first {
            controller
                .complete_job(job, Ok(strings(&["CA", "NY"])), &mut view)
                .unwrap();
        }
        assert_eq!(view.values("State"), strings(&["ON", "QC"]));
        assert!(controller.is_idle());
    }

    #[test]
    fn test_pruned_selection_restarts_overtaken_descendants() {
        let executor = CountingExecutor::with_locations();
        let mut view = SnapshotView::default();
        let mut controller = loaded_controller(&executor, &mut view);
        select(&mut controller, &executor, &mut view, "Country", &["US", "Canada"]);
        select(&mut controller, &executor, &mut view, "State", &["CA", "ON"]);

        let older = controller
            .filter_selection_changed("Country", strings(&["Canada"]), &mut view)
            .unwrap();
        let newer = controller
            .filter_selection_changed("State", strings(&["CA", "ON", "NY"]), &mut view)
            .unwrap();
        controller.run_jobs(&executor, newer, &mut view).unwrap();
        let city_queries = executor.calls_containing("DISTINCT [City]");

        // The older State result prunes CA and NY after City already resolved
        let mut follow_ups = Vec::new();
        for job in older {
            let result = job.execute(&executor);
            follow_ups.extend(controller.complete_job(job, result, &mut view).unwrap());
        }
        controller.run_jobs(&executor, follow_ups, &mut view).unwrap();

        assert_eq!(
            controller.selections().unwrap().selected_values("State"),
            strings(&["ON"])
        );
        assert_eq!(executor.calls_containing("DISTINCT [City]"), city_queries + 1);
        assert_eq!(view.values("City"), strings(&["Toronto"]));
        assert_eq!(view.state("City"), Some(ResolutionState::Resolved));
        assert!(controller.is_idle());
    }

    #[test]
    fn test_results_from_before_reload_are_ignored() {
        let executor = CountingExecutor::with_locations();
        let mut view = SnapshotView::default();
        let mut controller = CascadeController::new(SqlDialect::GenericEnbracketAll);
        let stale_jobs = controller
            .load_filters(location_description(), &mut view)
            .unwrap();
        let fresh_jobs = controller
            .load_filters(location_description(), &mut view)
            .unwrap();

        for job in stale_jobs {
            controller
                .complete_job(job, Err(QueryError::Other("late".into())), &mut view)
                .unwrap();
        }
        assert_eq!(view.state("Country"), Some(ResolutionState::Resolving));
        controller.run_jobs(&executor, fresh_jobs, &mut view).unwrap();
        assert_eq!(view.values("Country"), strings(&["Canada", "US"]));
    }

    #[test]
    fn test_update_filters_resets_state_and_drops_orphaned_edges() {
        let executor = CountingExecutor::with_locations();
        let mut view = SnapshotView::default();
        let mut controller = loaded_controller(&executor, &mut view);
        select(&mut controller, &executor, &mut view, "Country", &["US"]);

        let filters = vec![
            FilterDefinition::new("Country", FilterKind::Text, "Locations", "Country"),
            FilterDefinition::new("City", FilterKind::Text, "Locations", "City"),
        ];
        let jobs = controller.update_filters(filters, &mut view).unwrap();
        controller.run_jobs(&executor, jobs, &mut view).unwrap();

        let hierarchy = controller.hierarchy().unwrap();
        assert!(hierarchy.edges().is_empty());
        assert!(controller.selections().unwrap().is_empty("Country"));
        // Both are roots now
        assert_eq!(view.values("City").len(), 6);
    }

    #[test]
    fn test_malformed_hierarchy_keeps_controller_unloaded() {
        let mut controller = CascadeController::new(SqlDialect::GenericEnbracketAll);
        let mut view = SnapshotView::default();
        let description = HierarchyDescription::new(
            vec![FilterDefinition::new("A", FilterKind::Text, "T", "A")],
            vec![crate::filters::definitions::FilterEdge::new("A", "Ghost")],
        );
        assert!(controller.load_filters(description, &mut view).is_err());
        assert!(!controller.is_loaded());
        assert!(view.value_set("A").is_none());
    }
}
