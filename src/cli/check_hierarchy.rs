// src/cli/check_hierarchy.rs
use std::path::Path;

use super::CliResult;
use crate::filters::{FilterHierarchy, FilterKind, HierarchyDescription};

pub fn run(path: &Path) -> CliResult<()> {
    println!("Checking: {}\n", path.display());

    let description = HierarchyDescription::load(path)?;
    let hierarchy = FilterHierarchy::build(&description)?;

    println!("{:<20} {:<8} {:<30} {}", "Filter", "Kind", "Source", "Parents");
    println!("{}", "-".repeat(80));
    for definition in hierarchy.definitions() {
        let kind = match definition.kind {
            FilterKind::Text => "Text",
            FilterKind::NonText => "NonText",
        };
        println!(
            "{:<20} {:<8} {:<30} {}",
            definition.code,
            kind,
            format!("{}.{}", definition.table, definition.column),
            hierarchy.parents(&definition.code).join(", ")
        );
    }

    let roots: Vec<&str> = hierarchy.roots().map(|d| d.code.as_str()).collect();
    println!("\nRoots: {}", roots.join(", "));

    println!("\n=== Cascades ===\n");
    for definition in hierarchy.definitions() {
        let levels = hierarchy.cascade_levels(&definition.code);
        if levels.is_empty() {
            continue;
        }
        let rendered: Vec<String> = levels
            .iter()
            .map(|level| format!("[{}]", level.join(", ")))
            .collect();
        println!("  {} -> {}", definition.code, rendered.join(" -> "));
    }

    println!("\nOK: {} filters, {} edges", hierarchy.definitions().len(), hierarchy.edges().len());
    Ok(())
}
