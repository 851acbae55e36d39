//! `agsync remove`: uninstall a recorded resource.

use anyhow::{Result, anyhow};
use clap::Args;
use colored::Colorize;

use super::common::{CommandContext, print_json, print_targets};
use crate::core::Scope;
use crate::sync::TargetState;

#[derive(Args, Debug)]
pub struct RemoveCommand {
    /// Installed name of the resource
    name: String,

    /// Only remove from these consumers; repeatable
    #[arg(long = "consumer")]
    consumers: Vec<String>,

    /// Only remove from this scope
    #[arg(long)]
    scope: Option<Scope>,
}

impl RemoveCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let service = ctx.service()?;
        let consumers = (!self.consumers.is_empty()).then_some(self.consumers.as_slice());
        let report = service.remove(&self.name, consumers, self.scope).await?;

        if ctx.is_json() {
            print_json(&report)?;
        } else {
            println!("{} {} {}", "Removing".cyan(), report.kind.dimmed(), report.name.bold());
            print_targets(&report.targets);
            if report.record_removed {
                println!("{}", "Record removed from state".green());
            }
        }

        let failed = report.targets.iter().filter(|t| t.state == TargetState::Failed).count();
        if failed > 0 {
            return Err(anyhow!("Failed to remove '{}' from {failed} targets", report.name));
        }
        Ok(())
    }
}
