use bevy::log::{debug, error};
use directories_next::ProjectDirs;
use std::fs;
use std::io::{self, BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use super::FilterSettings;

const QUALIFIER: &str = "com";
const ORGANIZATION: &str = "SkylineOrg";
const APPLICATION: &str = "SkylineFilters";
const CONFIG_FILE: &str = "filter_settings.json";

/// `filter_settings.json` in the platform config directory.
pub fn default_config_path() -> io::Result<PathBuf> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
        .ok_or_else(|| {
            io::Error::new(
                ErrorKind::NotFound,
                "Could not determine project directories for filter settings.",
            )
        })
}

/// Missing file yields defaults; an unparsable one is `InvalidData`.
pub fn load_settings(config_file: &Path) -> io::Result<FilterSettings> {
    let file = match fs::File::open(config_file) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No filter settings at {:?}, using defaults", config_file);
            return Ok(FilterSettings::default());
        }
        Err(e) => {
            error!("Failed to open filter settings {:?}: {}", config_file, e);
            return Err(e);
        }
    };
    serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        error!("Failed to parse filter settings {:?}: {}", config_file, e);
        io::Error::new(ErrorKind::InvalidData, format!("Failed to parse settings file: {}", e))
    })
}
