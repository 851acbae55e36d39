//! `agsync discover`: show what an origin contains without installing.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::{CommandContext, print_json};
use crate::naming::NamingStrategy;
use crate::sync::DiscoverReport;

#[derive(Args, Debug)]
pub struct DiscoverCommand {
    /// Origin to inspect
    origin: String,

    /// Only discover these kinds; repeatable
    #[arg(short, long = "kind")]
    kinds: Vec<String>,

    /// Naming strategy used to compute install names
    #[arg(long, default_value = "smart-disambiguation")]
    naming: NamingStrategy,
}

impl DiscoverCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let service = ctx.service()?;
        let kinds = (!self.kinds.is_empty()).then_some(self.kinds.as_slice());
        let report = service.discover(&self.origin, self.naming, kinds).await?;

        if ctx.is_json() {
            return print_json(&report);
        }
        print_report(&report);
        Ok(())
    }
}

fn print_report(report: &DiscoverReport) {
    println!("{} {} ({})", "Origin:".bold(), report.origin, report.fetched_from.dimmed());
    for warning in &report.warnings {
        println!("{} {}", "warning:".yellow(), warning);
    }
    if report.items.is_empty() {
        println!("{}", "No resources found".yellow());
        return;
    }

    for item in &report.items {
        let marker = if item.validation.valid {
            "✓".green()
        } else {
            "✗".red()
        };
        let renamed = if item.name == item.original_name {
            String::new()
        } else {
            format!(" (from {})", item.original_name)
        };
        println!(
            "  {} {:<8} {}{}  {}",
            marker,
            item.kind,
            item.name.bold(),
            renamed.dimmed(),
            item.description.dimmed()
        );
        if item.file_count > 1 {
            println!("      {} files", item.file_count);
        }
        for error in &item.validation.errors {
            println!("      {} {}", "error:".red(), error);
        }
        for warning in &item.validation.warnings {
            println!("      {} {}", "warning:".yellow(), warning);
        }
    }
}
