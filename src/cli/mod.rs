// src/cli/mod.rs
// Command line front end for checking hierarchies and resolving filters

pub mod check_hierarchy;
pub mod resolve_filters;

use bevy::log::{Level, LogPlugin};
use bevy::prelude::*;
use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::database::{QueryError, SqlDialect};
use crate::filters::FilterError;
use crate::settings::{io as settings_io, FilterSettings};

#[derive(Parser)]
#[command(name = "skyline-filters")]
#[command(about = "Skyline Filters - cascading filter engine over SQL tables", long_about = None)]
pub struct Cli {
    /// Settings file to use instead of the one in the config directory
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a hierarchy description and show how cascades would run
    Check {
        /// Path to the hierarchy description (JSON)
        hierarchy: PathBuf,
    },

    /// Load filters, replay selections and print every filter's values
    Resolve(resolve_filters::ResolveArgs),

    /// Print the effective settings
    Config,
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("Missing {0}: pass it on the command line or set it in the settings file")]
    MissingArgument(&'static str),
    #[error("Filter queries still running after {0} frames")]
    Timeout(u32),
    #[error("{0}")]
    Rejected(String),
}

pub type CliResult<T> = Result<T, CliError>;

/// `code=v1,v2`; an empty right-hand side selects nothing.
pub fn parse_selection(arg: &str) -> Result<(String, Vec<String>), String> {
    let (code, values) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected code=value[,value...], got '{}'", arg))?;
    let code = code.trim();
    if code.is_empty() {
        return Err(format!("missing filter code in '{}'", arg));
    }
    let values = values
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    Ok((code.to_string(), values))
}

/// `code=value`; an empty value clears the filter.
pub fn parse_application(arg: &str) -> Result<(String, Option<String>), String> {
    let (code, values) = parse_selection(arg)?;
    if values.len() > 1 {
        return Err(format!("a NonText filter takes a single value, got '{}'", arg));
    }
    Ok((code, values.into_iter().next()))
}

pub fn load_settings(config: Option<&PathBuf>) -> CliResult<FilterSettings> {
    match config {
        Some(path) => Ok(settings_io::load_settings(path)?),
        None => match settings_io::default_config_path() {
            Ok(path) => Ok(settings_io::load_settings(&path)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(FilterSettings::default()),
            Err(e) => Err(e.into()),
        },
    }
}

/// App with the log subscriber installed from `settings`.
pub fn logging_app(settings: &FilterSettings) -> App {
    let mut app = App::new();
    app.add_plugins(LogPlugin {
        level: Level::INFO,
        filter: settings.log_filter.clone(),
        ..default()
    });
    app
}

pub fn run(cli: Cli) -> CliResult<()> {
    let settings = load_settings(cli.config.as_ref())?;
    let app = logging_app(&settings);
    match cli.command {
        Commands::Check { hierarchy } => check_hierarchy::run(&hierarchy),
        Commands::Resolve(args) => resolve_filters::run(app, args, &settings),
        Commands::Config => {
            if cli.config.is_none() {
                if let Ok(path) = settings_io::default_config_path() {
                    println!("# {}", path.display());
                }
            }
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
    }
}

pub fn parse_dialect(arg: &str) -> Result<SqlDialect, String> {
    arg.parse()
}
