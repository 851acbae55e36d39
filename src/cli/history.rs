//! `agsync history` and `agsync rollback`.
//!
//! Rollback restores the recorded state only. Files on disk are left as they
//! are; re-adding the restored origin with `--force` reinstalls it.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::{CommandContext, print_json};

#[derive(Args, Debug)]
pub struct HistoryCommand {
    /// Installed name of the resource
    name: String,
}

impl HistoryCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let service = ctx.service()?;
        let history = service.history(&self.name)?;

        if ctx.is_json() {
            return print_json(&history);
        }
        if history.is_empty() {
            println!("{}", format!("No earlier versions of '{}'", self.name).yellow());
            return Ok(());
        }
        println!("{} {}", "History of".cyan(), self.name.bold());
        for (i, entry) in history.iter().enumerate() {
            println!(
                "  {:>2}. {} {} {}",
                i + 1,
                entry.version.as_deref().unwrap_or("-").bold(),
                entry.origin,
                entry.updated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string().dimmed()
            );
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct RollbackCommand {
    /// Installed name of the resource
    name: String,
}

impl RollbackCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let service = ctx.service()?;
        let record = service.rollback(&self.name)?;

        if ctx.is_json() {
            return print_json(&record);
        }
        println!(
            "{} {} to {} ({})",
            "Rolled back".green(),
            record.name.bold(),
            record.version.as_deref().unwrap_or("unversioned"),
            record.origin
        );
        println!(
            "{}",
            format!("Run `agsync add {} --only {} --force` to reinstall its files", record.origin, record.name)
                .dimmed()
        );
        Ok(())
    }
}
