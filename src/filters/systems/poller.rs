// src/filters/systems/poller.rs

use bevy::prelude::*;

use super::worker::{FilterCascadeSession, QueryWorker};
use crate::filters::controller::ResolutionState;
use crate::filters::events::{FilterOperationFeedback, FilterViewUpdate};

/// Feed finished queries back into the controller and dispatch whatever
/// cascade level they unlocked.
pub fn poll_query_results(
    mut session: ResMut<FilterCascadeSession>,
    worker: Option<ResMut<QueryWorker>>,
    mut feedback_writer: EventWriter<FilterOperationFeedback>,
) {
    let Some(mut worker) = worker else {
        return;
    };
    let results = worker.drain();
    if results.is_empty() {
        return;
    }

    let FilterCascadeSession { controller, view } = &mut *session;
    let mut follow_ups = Vec::new();
    for (job, result) in results {
        match controller.complete_job(job, result, view) {
            Ok(jobs) => follow_ups.extend(jobs),
            Err(e) => {
                error!("Failed to apply query result: {}", e);
                feedback_writer.write(FilterOperationFeedback {
                    message: format!("Failed to apply query result: {}", e),
                    is_error: true,
                });
            }
        }
    }
    if !follow_ups.is_empty() {
        trace!("Dispatching {} follow-up queries", follow_ups.len());
        worker.dispatch(follow_ups);
    }
}

/// Emit the view updates buffered this frame, with feedback for filters
/// that could not refresh.
pub fn forward_view_updates(
    mut session: ResMut<FilterCascadeSession>,
    mut update_writer: EventWriter<FilterViewUpdate>,
    mut feedback_writer: EventWriter<FilterOperationFeedback>,
) {
    for update in session.view.take() {
        if let FilterViewUpdate::UpdateFilters(sets) = &update {
            for set in sets {
                if let (ResolutionState::Stale, Some(error)) = (set.state, &set.refresh_error) {
                    feedback_writer.write(FilterOperationFeedback {
                        message: format!("Could not refresh '{}': {}", set.filter_code, error),
                        is_error: true,
                    });
                }
            }
        }
        update_writer.write(update);
    }
}
