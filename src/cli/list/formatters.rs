use colored::Colorize;
use std::collections::BTreeMap;

use crate::core::InstallMode;
use crate::handlers::{ListReport, ListedResource};
use crate::state::InstalledRecord;

/// Entries grouped by consumer, one table per consumer.
pub fn print_listing(report: &ListReport) {
    if report.entries.is_empty() && report.errors.is_empty() {
        println!("{}", "No installed resources found".yellow());
        return;
    }

    let mut by_consumer: BTreeMap<&str, Vec<&ListedResource>> = BTreeMap::new();
    for entry in &report.entries {
        by_consumer.entry(entry.consumer_id.as_str()).or_default().push(entry);
    }

    for (consumer, entries) in by_consumer {
        println!("{} ({})", consumer.bold(), entries.len());
        let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
        for entry in entries {
            let version = entry.version.as_deref().unwrap_or("-");
            let mode = match entry.mode {
                InstallMode::Copy => "",
                InstallMode::Link => " →",
            };
            println!(
                "  {:<8} {:<width$} {:<10}{} {}",
                entry.kind.dimmed(),
                entry.name,
                version,
                mode.cyan(),
                entry.description.dimmed(),
            );
        }
        println!();
    }

    for error in &report.errors {
        let place = error.path.as_ref().map(|p| format!(" {}", p.display())).unwrap_or_default();
        println!("{} {}{}: {}", "error:".red(), error.consumer_id, place, error.message);
    }
}

pub fn print_records(records: &[InstalledRecord]) {
    if records.is_empty() {
        println!("{}", "No tracked resources".yellow());
        return;
    }
    for record in records {
        println!(
            "{:<8} {} {} {}",
            record.kind().dimmed(),
            record.name.bold(),
            record.version.as_deref().unwrap_or("-"),
            record.origin.dimmed()
        );
        for location in &record.installed_for {
            println!("    {} ({}) {}", location.consumer_id, location.scope, location.path.display());
        }
        if !record.history.is_empty() {
            println!("    {} earlier versions", record.history.len());
        }
    }
}
