//! `agsync list`: show installed resources.
//!
//! By default the consumer directories are re-scanned, so the output reflects
//! what is actually on disk even when the state file disagrees. `--tracked`
//! shows the state file's records instead.
//!
//! ```bash
//! agsync list
//! agsync list --global
//! agsync list --kind skill --consumer cursor
//! agsync list --tracked --format json
//! ```

mod formatters;

use anyhow::{Result, anyhow};
use clap::Args;

use super::common::{CommandContext, print_json, scope_of};

#[derive(Args, Debug)]
pub struct ListCommand {
    /// List the global scope instead of the project
    #[arg(short, long)]
    global: bool,

    /// Only show this kind
    #[arg(short, long)]
    kind: Option<String>,

    /// Only show this consumer
    #[arg(long)]
    consumer: Option<String>,

    /// Show state records instead of scanning consumer directories
    #[arg(long)]
    tracked: bool,
}

impl ListCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let service = ctx.service()?;

        if self.tracked {
            let mut records = service.records()?;
            records.retain(|r| self.kind.as_deref().is_none_or(|k| r.kind() == k));
            records.retain(|r| {
                self.consumer
                    .as_deref()
                    .is_none_or(|c| r.installed_for.iter().any(|l| l.consumer_id == c))
            });
            if ctx.is_json() {
                return print_json(&records);
            }
            formatters::print_records(&records);
            return Ok(());
        }

        let mut report = service.list(scope_of(self.global)).await;
        report.entries.retain(|e| self.kind.as_deref().is_none_or(|k| e.kind == k));
        report.entries.retain(|e| self.consumer.as_deref().is_none_or(|c| e.consumer_id == c));

        if ctx.is_json() {
            print_json(&report)?;
        } else {
            formatters::print_listing(&report);
        }

        if report.errors.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("{} locations could not be listed", report.errors.len()))
        }
    }
}
