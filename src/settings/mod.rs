pub mod io;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::database::SqlDialect;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct FilterSettings {
    pub dialect: SqlDialect,
    pub database_path: Option<PathBuf>,
    pub hierarchy_path: Option<PathBuf>,
    /// `tracing` filter directive for the binary's log output.
    pub log_filter: String,
    /// How many frames a headless run waits for outstanding queries.
    pub max_poll_frames: u32,
    pub poll_interval_ms: u64,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            dialect: SqlDialect::default(),
            database_path: None,
            hierarchy_path: None,
            log_filter: "info".to_string(),
            max_poll_frames: 2000,
            poll_interval_ms: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let settings: FilterSettings =
            serde_json::from_str(r#"{ "dialect": "oracle", "max_poll_frames": 10 }"#).unwrap();
        assert_eq!(settings.dialect, SqlDialect::Oracle);
        assert_eq!(settings.max_poll_frames, 10);
        assert_eq!(settings.log_filter, "info");
        assert!(settings.database_path.is_none());
    }
}
