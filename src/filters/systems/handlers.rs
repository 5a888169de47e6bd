// src/filters/systems/handlers.rs
// Presenter entry points: turn view events into controller calls

use bevy::prelude::*;

use super::worker::{FilterCascadeSession, QueryWorker};
use crate::filters::error::FilterResult;
use crate::filters::events::{
    FilterOperationFeedback, FilterSelectionChanged, NonTextFilterApplied, RequestLoadFilters,
    RequestUpdateFilters,
};
use crate::database::QueryError;
use crate::filters::resolver::ResolutionJob;

/// Send the jobs of a successful call to the worker, or report the error.
/// Without a worker the jobs fail right away so their filters turn stale.
fn dispatch_or_report(
    action: &str,
    result: FilterResult<Vec<ResolutionJob>>,
    session: &mut FilterCascadeSession,
    worker: &mut Option<ResMut<QueryWorker>>,
    feedback_writer: &mut EventWriter<FilterOperationFeedback>,
) {
    match result {
        Ok(jobs) if jobs.is_empty() => {}
        Ok(jobs) => match worker.as_mut() {
            Some(worker) => worker.dispatch(jobs),
            None => {
                error!("{}: no database configured for filter queries", action);
                feedback_writer.write(FilterOperationFeedback {
                    message: format!("{}: no database configured", action),
                    is_error: true,
                });
                fail_jobs(session, jobs);
            }
        },
        Err(e) => {
            error!("{} failed: {}", action, e);
            feedback_writer.write(FilterOperationFeedback {
                message: format!("{} failed: {}", action, e),
                is_error: true,
            });
        }
    }
}

fn fail_jobs(session: &mut FilterCascadeSession, mut jobs: Vec<ResolutionJob>) {
    let FilterCascadeSession { controller, view } = session;
    while let Some(job) = jobs.pop() {
        let code = job.filter_code.clone();
        let result = Err(QueryError::Other("no database configured".into()));
        match controller.complete_job(job, result, view) {
            Ok(follow_ups) => jobs.extend(follow_ups),
            Err(e) => warn!("Could not fail query for '{}': {}", code, e),
        }
    }
}

pub fn handle_load_requests(
    mut events: EventReader<RequestLoadFilters>,
    mut session: ResMut<FilterCascadeSession>,
    mut worker: Option<ResMut<QueryWorker>>,
    mut feedback_writer: EventWriter<FilterOperationFeedback>,
) {
    for event in events.read() {
        let FilterCascadeSession { controller, view } = &mut *session;
        let result = controller.load_filters(event.description.clone(), view);
        if result.is_ok() {
            feedback_writer.write(FilterOperationFeedback {
                message: format!("Loaded {} filters", event.description.filters.len()),
                is_error: false,
            });
        }
        dispatch_or_report(
            "Loading filters",
            result,
            &mut session,
            &mut worker,
            &mut feedback_writer,
        );
    }
}

pub fn handle_update_requests(
    mut events: EventReader<RequestUpdateFilters>,
    mut session: ResMut<FilterCascadeSession>,
    mut worker: Option<ResMut<QueryWorker>>,
    mut feedback_writer: EventWriter<FilterOperationFeedback>,
) {
    for event in events.read() {
        let FilterCascadeSession { controller, view } = &mut *session;
        let result = controller.update_filters(event.filters.clone(), view);
        dispatch_or_report(
            "Updating filters",
            result,
            &mut session,
            &mut worker,
            &mut feedback_writer,
        );
    }
}

pub fn handle_selection_changes(
    mut events: EventReader<FilterSelectionChanged>,
    mut session: ResMut<FilterCascadeSession>,
    mut worker: Option<ResMut<QueryWorker>>,
    mut feedback_writer: EventWriter<FilterOperationFeedback>,
) {
    for event in events.read() {
        debug!(
            "Selection of '{}' changed to {:?}",
            event.filter_code, event.selected
        );
        let FilterCascadeSession { controller, view } = &mut *session;
        let result =
            controller.filter_selection_changed(&event.filter_code, event.selected.clone(), view);
        let action = format!("Selecting '{}'", event.filter_code);
        dispatch_or_report(&action, result, &mut session, &mut worker, &mut feedback_writer);
    }
}

pub fn handle_non_text_applications(
    mut events: EventReader<NonTextFilterApplied>,
    mut session: ResMut<FilterCascadeSession>,
    mut worker: Option<ResMut<QueryWorker>>,
    mut feedback_writer: EventWriter<FilterOperationFeedback>,
) {
    for event in events.read() {
        let FilterCascadeSession { controller, view } = &mut *session;
        let result = controller.non_text_filter_applied(event.application.clone(), view);
        let action = format!("Applying '{}'", event.application.filter_code);
        dispatch_or_report(&action, result, &mut session, &mut worker, &mut feedback_writer);
    }
}
