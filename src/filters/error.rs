// src/filters/error.rs

use thiserror::Error;

use crate::database::QueryError;

/// A query for one filter's selectable values failed.
/// Recoverable: previously cached values for the filter stay usable.
#[derive(Error, Debug)]
#[error("Failed to resolve values for filter '{filter_code}': {cause}")]
pub struct ResolutionFailedError {
    pub filter_code: String,
    #[source]
    pub cause: QueryError,
}

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Cycle detected in filter hierarchy: {}", path.join(" -> "))]
    CycleDetected { path: Vec<String> },
    #[error("Unknown filter code '{0}'")]
    UnknownFilter(String),
    #[error("Filter code '{0}' is declared more than once")]
    DuplicateFilter(String),
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error(transparent)]
    ResolutionFailed(#[from] ResolutionFailedError),
    #[error("No filter hierarchy has been loaded")]
    NotLoaded,
    #[error("Filter '{0}' is not a NonText filter")]
    NotNonText(String),
    #[error("Failed to read hierarchy description: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse hierarchy description: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type FilterResult<T> = Result<T, FilterError>;
