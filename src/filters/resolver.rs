// src/filters/resolver.rs
// Resolution of selectable values, singly and as breadth-first cascades

use bevy::log::{debug, info, warn};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::thread;

use super::cache::SelectableValuesCache;
use super::definitions::FilterDefinition;
use super::error::{FilterResult, ResolutionFailedError};
use super::hierarchy::FilterHierarchy;
use super::selection::{FilterSelectionState, SelectionSignature};
use crate::database::{
    build_distinct_values_query, CancellationFlag, QueryExecutor, QueryResult, SqlDialect,
    ValuesQuery,
};

/// A value query that has to run before a filter can be resolved.
#[derive(Debug, Clone)]
pub struct ResolutionJob {
    pub filter_code: String,
    pub signature: SelectionSignature,
    /// Epoch the result is stamped with when stored.
    pub epoch: u64,
    pub query: ValuesQuery,
    pub cancel: CancellationFlag,
}

impl ResolutionJob {
    pub fn execute(&self, executor: &dyn QueryExecutor) -> QueryResult<Vec<String>> {
        executor.execute_cancellable(&self.query.sql, &self.query.params, &self.cancel)
    }
}

#[derive(Debug)]
pub enum Resolution {
    /// Served from the cache.
    Ready(Vec<String>),
    /// A parent has nothing selected; the filter has no selectable values.
    Cleared,
    Pending(ResolutionJob),
}

/// Result of feeding a finished job back into the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub filter_code: String,
    pub values: Vec<String>,
    /// False when a newer resolution or invalidation overtook this one.
    pub applied: bool,
}

/// What a cascade (or one step of it) did, per filter.
#[derive(Debug, Default)]
pub struct CascadeOutcome {
    pub resolved: Vec<(String, Vec<String>)>,
    pub cleared: Vec<String>,
    pub failed: Vec<ResolutionFailedError>,
    /// Descendants of a failed filter, left with their previous values.
    pub blocked: Vec<String>,
    /// Filters taken over by a newer cascade.
    pub superseded: Vec<String>,
    /// Filters whose selection shrank after a newer cascade already
    /// resolved their descendants; each needs a cascade of its own.
    pub reselected: Vec<String>,
}

impl CascadeOutcome {
    pub fn values_of(&self, code: &str) -> Option<&[String]> {
        self.resolved
            .iter()
            .rev()
            .find(|(c, _)| c == code)
            .map(|(_, values)| values.as_slice())
    }
}

/// Progress of one cascade: the levels still to resolve and the jobs of the
/// current level that have not come back yet.
#[derive(Debug)]
pub struct CascadeRun {
    changed: String,
    epoch: u64,
    levels: VecDeque<Vec<String>>,
    in_flight: HashSet<String>,
    blocked: HashSet<String>,
}

impl CascadeRun {
    pub fn changed_filter(&self) -> &str {
        &self.changed
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_finished(&self) -> bool {
        self.levels.is_empty() && self.in_flight.is_empty()
    }

    pub fn is_waiting_on(&self, job: &ResolutionJob) -> bool {
        job.epoch == self.epoch && self.in_flight.contains(&job.filter_code)
    }
}

pub struct CascadeResolver {
    hierarchy: Arc<FilterHierarchy>,
    dialect: SqlDialect,
    cache: SelectableValuesCache,
    last_epoch: u64,
    in_flight: HashMap<String, Vec<(u64, CancellationFlag)>>,
}

impl CascadeResolver {
    pub fn new(hierarchy: Arc<FilterHierarchy>, dialect: SqlDialect) -> Self {
        Self {
            hierarchy,
            dialect,
            cache: SelectableValuesCache::new(),
            last_epoch: 0,
            in_flight: HashMap::new(),
        }
    }

    /// Continue numbering epochs after `last_epoch`, so jobs issued by a
    /// previous resolver can never be mistaken for this one's.
    pub fn with_epoch_base(mut self, last_epoch: u64) -> Self {
        self.last_epoch = self.last_epoch.max(last_epoch);
        self
    }

    pub fn last_epoch(&self) -> u64 {
        self.last_epoch
    }

    pub fn hierarchy(&self) -> &Arc<FilterHierarchy> {
        &self.hierarchy
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    pub fn cache(&self) -> &SelectableValuesCache {
        &self.cache
    }

    fn next_epoch(&mut self) -> u64 {
        self.last_epoch += 1;
        self.last_epoch
    }

    /// Decide how `code` gets its values under the current selections,
    /// stamping any query that has to run with `epoch`.
    pub fn plan(
        &mut self,
        code: &str,
        selections: &FilterSelectionState,
        epoch: u64,
    ) -> FilterResult<Resolution> {
        let target = self.hierarchy.require(code)?;

        let parents = self.hierarchy.parents(code);
        if parents.iter().any(|parent| selections.is_empty(parent)) {
            debug!("'{}' is waiting on a parent selection", code);
            return Ok(Resolution::Cleared);
        }

        let signature = SelectionSignature::of(&self.hierarchy, selections, code);
        if let Some(values) = self.cache.get(code, &signature) {
            debug!("Cache hit for '{}' under {}", code, signature);
            return Ok(Resolution::Ready(values.to_vec()));
        }

        let constraints: Vec<(&FilterDefinition, &BTreeSet<String>)> = signature
            .entries()
            .iter()
            .filter_map(|(ancestor, _)| {
                Some((self.hierarchy.definition(ancestor)?, selections.get(ancestor)?))
            })
            .collect();
        let query = build_distinct_values_query(self.dialect, target, &constraints)?;

        let cancel = CancellationFlag::new();
        self.in_flight
            .entry(code.to_string())
            .or_default()
            .push((epoch, cancel.clone()));
        debug!("Resolving '{}' under {} at epoch {}", code, signature, epoch);
        Ok(Resolution::Pending(ResolutionJob {
            filter_code: code.to_string(),
            signature,
            epoch,
            query,
            cancel,
        }))
    }

    /// Store the result of `job`. Results overtaken by a newer invalidation
    /// are discarded, as are failures of such results; any other failure is
    /// returned and leaves the cache untouched.
    pub fn complete(
        &mut self,
        job: ResolutionJob,
        result: QueryResult<Vec<String>>,
    ) -> Result<Completion, ResolutionFailedError> {
        self.release(&job);
        let superseded = self.cache.is_superseded(&job.filter_code, job.epoch);
        match result {
            Ok(values) if !superseded => {
                let applied =
                    self.cache
                        .put(&job.filter_code, &job.signature, values.clone(), job.epoch);
                if !applied {
                    debug!(
                        "A newer result for '{}' under {} is already cached",
                        job.filter_code, job.signature
                    );
                }
                Ok(Completion {
                    filter_code: job.filter_code,
                    values,
                    applied,
                })
            }
            Ok(values) => {
                debug!(
                    "Discarding superseded result for '{}' from epoch {}",
                    job.filter_code, job.epoch
                );
                Ok(Completion {
                    filter_code: job.filter_code,
                    values,
                    applied: false,
                })
            }
            Err(e) if superseded || e.is_cancelled() => {
                debug!(
                    "Ignoring failure of superseded query for '{}': {}",
                    job.filter_code, e
                );
                Ok(Completion {
                    filter_code: job.filter_code,
                    values: Vec::new(),
                    applied: false,
                })
            }
            Err(cause) => {
                warn!("Could not resolve '{}': {}", job.filter_code, cause);
                Err(ResolutionFailedError {
                    filter_code: job.filter_code,
                    cause,
                })
            }
        }
    }

    fn release(&mut self, job: &ResolutionJob) {
        if let Some(flags) = self.in_flight.get_mut(&job.filter_code) {
            flags.retain(|(epoch, _)| *epoch != job.epoch);
            if flags.is_empty() {
                self.in_flight.remove(&job.filter_code);
            }
        }
    }

    /// Raise the cancellation flag of every in-flight job for `code` issued
    /// before `epoch`.
    fn cancel_older(&mut self, code: &str, epoch: u64) {
        if let Some(flags) = self.in_flight.get_mut(code) {
            flags.retain(|(issued, flag)| {
                if *issued < epoch {
                    flag.cancel();
                    false
                } else {
                    true
                }
            });
        }
    }

    /// Resolve a single filter, running its query inline on a cache miss.
    pub fn resolve(
        &mut self,
        code: &str,
        selections: &FilterSelectionState,
        executor: &dyn QueryExecutor,
    ) -> FilterResult<Vec<String>> {
        let epoch = self.next_epoch();
        match self.plan(code, selections, epoch)? {
            Resolution::Ready(values) => Ok(values),
            Resolution::Cleared => Ok(Vec::new()),
            Resolution::Pending(job) => {
                let result = job.execute(executor);
                Ok(self.complete(job, result)?.values)
            }
        }
    }

    /// Resolve a freshly issued job for `code` without a cascade, e.g. a root
    /// filter right after loading. Returns the planned resolution.
    pub fn plan_fresh(
        &mut self,
        code: &str,
        selections: &FilterSelectionState,
    ) -> FilterResult<Resolution> {
        let epoch = self.next_epoch();
        self.plan(code, selections, epoch)
    }

    /// Start a cascade for a selection change of `changed`: invalidate the
    /// cache for its descendants before anything is recomputed, and cancel
    /// their older in-flight queries.
    pub fn begin_cascade(&mut self, changed: &str) -> FilterResult<CascadeRun> {
        self.hierarchy.require(changed)?;
        let epoch = self.next_epoch();
        self.cache.invalidate_descendants(&self.hierarchy, changed, epoch);
        for descendant in self.hierarchy.descendants(changed) {
            self.cancel_older(&descendant, epoch);
        }

        let levels: VecDeque<Vec<String>> = self.hierarchy.cascade_levels(changed).into();
        info!(
            "Cascade from '{}' at epoch {} over {} level(s)",
            changed,
            epoch,
            levels.len()
        );
        Ok(CascadeRun {
            changed: changed.to_string(),
            epoch,
            levels,
            in_flight: HashSet::new(),
            blocked: HashSet::new(),
        })
    }

    /// Plan levels of `run` until one needs queries or none are left.
    /// Filters resolvable without a query are settled immediately.
    pub fn advance_cascade(
        &mut self,
        run: &mut CascadeRun,
        selections: &mut FilterSelectionState,
        outcome: &mut CascadeOutcome,
    ) -> Vec<ResolutionJob> {
        let mut jobs = Vec::new();
        while run.in_flight.is_empty() {
            let Some(level) = run.levels.pop_front() else {
                break;
            };
            for code in level {
                let parent_blocked = self
                    .hierarchy
                    .parents(&code)
                    .iter()
                    .any(|parent| run.blocked.contains(parent));
                if parent_blocked {
                    run.blocked.insert(code.clone());
                    outcome.blocked.push(code);
                    continue;
                }
                if self.cache.is_superseded(&code, run.epoch) {
                    run.blocked.insert(code.clone());
                    outcome.superseded.push(code);
                    continue;
                }

                match self.plan(&code, selections, run.epoch) {
                    Ok(Resolution::Ready(values)) => {
                        self.apply_values(run, &code, values, selections, outcome)
                    }
                    Ok(Resolution::Cleared) => {
                        selections.clear(&code);
                        outcome.cleared.push(code);
                    }
                    Ok(Resolution::Pending(job)) => {
                        run.in_flight.insert(code);
                        jobs.push(job);
                    }
                    Err(e) => {
                        bevy::log::error!("Cannot plan resolution for '{}': {}", code, e);
                        run.blocked.insert(code.clone());
                        outcome.blocked.push(code);
                    }
                }
            }
        }
        jobs
    }

    /// Feed the result of one of `run`'s jobs back in.
    pub fn finish_job(
        &mut self,
        run: &mut CascadeRun,
        job: ResolutionJob,
        result: QueryResult<Vec<String>>,
        selections: &mut FilterSelectionState,
        outcome: &mut CascadeOutcome,
    ) {
        let code = job.filter_code.clone();
        run.in_flight.remove(&code);
        match self.complete(job, result) {
            Ok(completion) if completion.applied => {
                self.apply_values(run, &code, completion.values, selections, outcome)
            }
            Ok(_) => {
                run.blocked.insert(code.clone());
                outcome.superseded.push(code);
            }
            Err(e) => {
                run.blocked.insert(code);
                outcome.failed.push(e);
            }
        }
    }

    fn apply_values(
        &self,
        run: &CascadeRun,
        code: &str,
        values: Vec<String>,
        selections: &mut FilterSelectionState,
        outcome: &mut CascadeOutcome,
    ) {
        if selections.retain_available(code, &values) {
            debug!("Selection of '{}' pruned to still-selectable values", code);
            let overtaken = self
                .hierarchy
                .descendants(code)
                .iter()
                .any(|d| self.cache.is_superseded(d, run.epoch));
            if overtaken {
                outcome.reselected.push(code.to_string());
            }
        }
        outcome.resolved.push((code.to_string(), values));
    }

    /// Begin a cascade for every filter listed in `outcome.reselected`.
    pub fn take_restarts(&mut self, outcome: &mut CascadeOutcome) -> Vec<CascadeRun> {
        let codes: Vec<String> = outcome.reselected.drain(..).collect();
        codes
            .iter()
            .filter_map(|code| self.begin_cascade(code).ok())
            .collect()
    }

    /// Invalidate the descendants of `changed` and re-resolve them level by
    /// level, running the queries of each level concurrently.
    pub fn resolve_cascade(
        &mut self,
        changed: &str,
        selections: &mut FilterSelectionState,
        executor: &dyn QueryExecutor,
    ) -> FilterResult<CascadeOutcome> {
        let mut outcome = CascadeOutcome::default();
        let mut runs = VecDeque::from([self.begin_cascade(changed)?]);
        while let Some(mut run) = runs.pop_front() {
            loop {
                let jobs = self.advance_cascade(&mut run, selections, &mut outcome);
                runs.extend(self.take_restarts(&mut outcome));
                if jobs.is_empty() {
                    break;
                }
                for (job, result) in execute_concurrently(executor, jobs) {
                    self.finish_job(&mut run, job, result, selections, &mut outcome);
                }
                runs.extend(self.take_restarts(&mut outcome));
            }
        }
        info!(
            "Cascade from '{}' finished: {} resolved, {} cleared, {} failed",
            changed,
            outcome.resolved.len(),
            outcome.cleared.len(),
            outcome.failed.len()
        );
        Ok(outcome)
    }
}

/// Run `jobs` against `executor`, one scoped thread per job when there is
/// more than one. Results come back in job order.
pub fn execute_concurrently(
    executor: &dyn QueryExecutor,
    jobs: Vec<ResolutionJob>,
) -> Vec<(ResolutionJob, QueryResult<Vec<String>>)> {
    if jobs.len() < 2 {
        return jobs
            .into_iter()
            .map(|job| {
                let result = job.execute(executor);
                (job, result)
            })
            .collect();
    }
    thread::scope(|scope| {
        let handles: Vec<_> = jobs
            .into_iter()
            .map(|job| {
                scope.spawn(move || {
                    let result = job.execute(executor);
                    (job, result)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect()
    })
}
