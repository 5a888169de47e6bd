// src/cli/resolve_filters.rs
use bevy::prelude::*;
use clap::Args;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::{parse_application, parse_dialect, parse_selection, CliError, CliResult};
use crate::database::{QueryExecutor, SqlDialect, SqliteExecutor};
use crate::export::write_filter_values_csv;
use crate::filters::{
    FilterCascadePlugin, FilterCascadeSession, FilterHierarchy, FilterOperationFeedback,
    FilterSelectionChanged, FilterSystemSet, FilterValueSet, HierarchyDescription,
    NonTextFilterApplication, NonTextFilterApplied, QueryWorker, RequestLoadFilters,
};
use crate::settings::FilterSettings;

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// SQLite database holding the filter tables
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Hierarchy description (JSON)
    #[arg(long)]
    pub hierarchy: Option<PathBuf>,

    /// Identifier quoting dialect
    #[arg(long, value_parser = parse_dialect)]
    pub dialect: Option<SqlDialect>,

    /// Select values of a Text filter: code=v1,v2 (repeatable, replayed in order)
    #[arg(long, value_parser = parse_selection)]
    pub select: Vec<(String, Vec<String>)>,

    /// Apply a NonText filter: code=value (repeatable, replayed after --select)
    #[arg(long, value_parser = parse_application)]
    pub apply: Vec<(String, Option<String>)>,

    /// Print CSV instead of a table
    #[arg(long)]
    pub csv: bool,
}

/// Error feedback seen since the last check.
#[derive(Resource, Default)]
struct FeedbackLog {
    errors: Vec<String>,
}

fn collect_feedback(
    mut events: EventReader<FilterOperationFeedback>,
    mut log: ResMut<FeedbackLog>,
) {
    for event in events.read() {
        if event.is_error {
            warn!("{}", event.message);
            log.errors.push(event.message.clone());
        } else {
            info!("{}", event.message);
        }
    }
}

fn is_settled(world: &World) -> bool {
    let idle = world.resource::<FilterCascadeSession>().controller.is_idle();
    let in_flight = world
        .get_resource::<QueryWorker>()
        .map(QueryWorker::in_flight)
        .unwrap_or(0);
    idle && in_flight == 0
}

/// Run frames until every outstanding query has been applied.
fn settle(app: &mut App, settings: &FilterSettings) -> CliResult<()> {
    for _ in 0..settings.max_poll_frames {
        app.update();
        let errors = std::mem::take(&mut app.world_mut().resource_mut::<FeedbackLog>().errors);
        if let Some(first) = errors.into_iter().next() {
            return Err(CliError::Rejected(first));
        }
        if is_settled(app.world()) {
            return Ok(());
        }
        thread::sleep(Duration::from_millis(settings.poll_interval_ms));
    }
    Err(CliError::Timeout(settings.max_poll_frames))
}

pub fn run(mut app: App, args: ResolveArgs, settings: &FilterSettings) -> CliResult<()> {
    let db = args
        .db
        .or_else(|| settings.database_path.clone())
        .ok_or(CliError::MissingArgument("database path (--db)"))?;
    let hierarchy_path = args
        .hierarchy
        .or_else(|| settings.hierarchy_path.clone())
        .ok_or(CliError::MissingArgument("hierarchy path (--hierarchy)"))?;
    let dialect = args.dialect.unwrap_or(settings.dialect);

    let description = HierarchyDescription::load(&hierarchy_path)?;
    // Fail on a malformed hierarchy before any query runs
    FilterHierarchy::build(&description)?;
    let executor: Arc<dyn QueryExecutor> = Arc::new(SqliteExecutor::open(&db)?);

    app.add_plugins(FilterCascadePlugin::new(dialect).with_executor(executor))
        .init_resource::<FeedbackLog>()
        .add_systems(Update, collect_feedback.after(FilterSystemSet::ApplyResults));

    app.world_mut().send_event(RequestLoadFilters { description });
    settle(&mut app, settings)?;

    for (filter_code, selected) in args.select {
        app.world_mut().send_event(FilterSelectionChanged {
            filter_code,
            selected,
        });
        settle(&mut app, settings)?;
    }
    for (filter_code, applied_value) in args.apply {
        app.world_mut().send_event(NonTextFilterApplied {
            application: NonTextFilterApplication::new(filter_code, applied_value),
        });
        settle(&mut app, settings)?;
    }

    let sets = app
        .world()
        .resource::<FilterCascadeSession>()
        .controller
        .value_sets();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.csv {
        write_filter_values_csv(&mut out, &sets)?;
    } else {
        print_table(&mut out, &sets)?;
    }
    out.flush()?;
    Ok(())
}

fn print_table<W: Write>(out: &mut W, sets: &[FilterValueSet]) -> io::Result<()> {
    writeln!(out, "{:<16} {:<16} {}", "Filter", "State", "Values (* = selected)")?;
    writeln!(out, "{}", "-".repeat(80))?;
    for set in sets {
        let values: Vec<String> = set
            .values
            .iter()
            .map(|v| if set.is_selected(v) { format!("*{}", v) } else { v.clone() })
            .collect();
        writeln!(out, "{:<16} {:<16} {}", set.filter_code, format!("{:?}", set.state), values.join(", "))?;
        if let Some(pending) = &set.pending {
            writeln!(out, "{:<16} {:<16} pending: {}", "", "", pending)?;
        }
        if let Some(error) = &set.refresh_error {
            writeln!(out, "{:<16} {:<16} could not refresh: {}", "", "", error)?;
        }
    }
    Ok(())
}
