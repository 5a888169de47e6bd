// src/filters/systems/mod.rs

mod handlers;
mod poller;
mod worker;

pub use handlers::{
    handle_load_requests, handle_non_text_applications, handle_selection_changes,
    handle_update_requests,
};
pub use poller::{forward_view_updates, poll_query_results};
pub use worker::{BufferedView, FilterCascadeSession, QueryWorker};
