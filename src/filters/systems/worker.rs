// src/filters/systems/worker.rs

use bevy::prelude::*;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::database::{QueryExecutor, QueryResult, SqlDialect};
use crate::filters::controller::{CascadeController, FilterValueSet};
use crate::filters::events::FilterViewUpdate;
use crate::filters::hierarchy::FilterHierarchy;
use crate::filters::resolver::ResolutionJob;
use crate::filters::view::FilterView;

type JobResult = (ResolutionJob, QueryResult<Vec<String>>);

/// Buffers view calls until they are forwarded as [`FilterViewUpdate`] events.
#[derive(Default)]
pub struct BufferedView {
    pending: Vec<FilterViewUpdate>,
}

impl BufferedView {
    pub fn take(&mut self) -> Vec<FilterViewUpdate> {
        std::mem::take(&mut self.pending)
    }
}

impl FilterView for BufferedView {
    fn load_non_text_filters(&mut self, filters: &[FilterValueSet]) {
        self.pending
            .push(FilterViewUpdate::LoadNonTextFilters(filters.to_vec()));
    }

    fn load_filters(&mut self, filters: &[FilterValueSet], hierarchy: &FilterHierarchy) {
        self.pending.push(FilterViewUpdate::LoadFilters {
            filters: filters.to_vec(),
            hierarchy: Arc::new(hierarchy.clone()),
        });
    }

    fn update_filters(&mut self, filters: &[FilterValueSet]) {
        self.pending
            .push(FilterViewUpdate::UpdateFilters(filters.to_vec()));
    }
}

/// The session's controller plus the view updates it produced this frame.
#[derive(Resource)]
pub struct FilterCascadeSession {
    pub controller: CascadeController,
    pub view: BufferedView,
}

impl FilterCascadeSession {
    pub fn new(dialect: SqlDialect) -> Self {
        Self {
            controller: CascadeController::new(dialect),
            view: BufferedView::default(),
        }
    }
}

/// Runs resolution jobs on background threads and hands results back to
/// the poller.
#[derive(Resource)]
pub struct QueryWorker {
    executor: Arc<dyn QueryExecutor>,
    result_tx: Sender<JobResult>,
    result_rx: Arc<Mutex<Receiver<JobResult>>>,
    in_flight: usize,
}

impl QueryWorker {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        let (result_tx, result_rx) = channel();
        Self {
            executor,
            result_tx,
            result_rx: Arc::new(Mutex::new(result_rx)),
            in_flight: 0,
        }
    }

    pub fn dispatch(&mut self, jobs: Vec<ResolutionJob>) {
        for job in jobs {
            self.in_flight += 1;
            let executor = Arc::clone(&self.executor);
            let tx = self.result_tx.clone();
            thread::spawn(move || {
                let result = job.execute(executor.as_ref());
                // The receiver only goes away with the app
                let _ = tx.send((job, result));
            });
        }
    }

    /// Results that have arrived since the last call.
    pub fn drain(&mut self) -> Vec<JobResult> {
        let results: Vec<JobResult> = match self.result_rx.lock() {
            Ok(rx) => rx.try_iter().collect(),
            Err(_) => {
                error!("Query result channel lock poisoned");
                Vec::new()
            }
        };
        self.in_flight = self.in_flight.saturating_sub(results.len());
        results
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}
