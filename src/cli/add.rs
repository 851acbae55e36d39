//! `agsync add`: install every item found at an origin.

use anyhow::{Result, anyhow};
use clap::Args;
use colored::Colorize;

use super::common::{CommandContext, parse_target, print_json, print_targets, scope_of};
use crate::core::{InstallMode, InstallTarget};
use crate::naming::NamingStrategy;
use crate::sync::{AddOptions, AddReport, ItemStatus};

#[derive(Args, Debug)]
pub struct AddCommand {
    /// Origin: owner/name[@ref], a GitHub/GitLab/tarball URL, a local path, or registry:<package>
    origin: String,

    /// Install target as consumer[:scope]; repeatable. Defaults to the project's preferred consumers
    #[arg(short = 't', long = "target", value_name = "CONSUMER[:SCOPE]")]
    targets: Vec<String>,

    /// Use the global scope for targets that do not name one
    #[arg(short, long)]
    global: bool,

    /// Only discover these kinds (skill, agent, command); repeatable
    #[arg(short, long = "kind")]
    kinds: Vec<String>,

    /// Only install items with these names; repeatable
    #[arg(long)]
    only: Vec<String>,

    /// Naming strategy for install names
    #[arg(long, default_value = "smart-disambiguation")]
    naming: NamingStrategy,

    /// Symlink to the staged source instead of copying
    #[arg(long)]
    link: bool,

    /// Replace existing installs and allow duplicate names
    #[arg(short, long)]
    force: bool,
}

impl AddCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let mode = if self.link {
            InstallMode::Link
        } else {
            InstallMode::Copy
        };
        let default_scope = scope_of(self.global);
        let targets = self
            .targets
            .iter()
            .map(|raw| parse_target(raw, default_scope, mode))
            .collect::<Result<Vec<_>, _>>()?;

        let service = ctx.service()?;
        let mut options = AddOptions {
            targets,
            kinds: (!self.kinds.is_empty()).then_some(self.kinds),
            only: (!self.only.is_empty()).then_some(self.only),
            naming: self.naming,
            force: self.force,
            link: self.link,
        };
        if options.targets.is_empty() && self.global {
            // Preferred consumers, but at global scope
            let config = service.store().config()?;
            options.targets = config
                .preferred_consumers
                .iter()
                .map(|c| InstallTarget::new(c.clone(), default_scope, mode))
                .collect();
        }

        if !ctx.is_json() {
            println!("{} {}", "Adding from".cyan(), self.origin.bold());
        }
        let report = service.add(&self.origin, &options).await?;

        if ctx.is_json() {
            print_json(&report)?;
        } else {
            print_report(&report);
        }

        let failed = report.count(ItemStatus::Failed) + report.count(ItemStatus::Partial);
        if failed > 0 {
            return Err(anyhow!("{failed} of {} items were not fully installed", report.items.len()));
        }
        Ok(())
    }
}

fn print_report(report: &AddReport) {
    for warning in &report.warnings {
        println!("{} {}", "warning:".yellow(), warning);
    }
    if report.items.is_empty() {
        println!("{}", "No resources found".yellow());
        return;
    }

    for item in &report.items {
        let version = item.version.as_deref().map(|v| format!(" @ {v}")).unwrap_or_default();
        let status = match item.status {
            ItemStatus::Installed => "installed".green(),
            ItemStatus::Partial => "partial".yellow(),
            ItemStatus::Failed => "failed".red(),
        };
        println!("  {} {}{} [{}]", item.kind.dimmed(), item.name.bold(), version.dimmed(), status);
        if let Some(error) = &item.error {
            println!("    {} {}", "✗".red(), error.red());
        }
        for warning in &item.warnings {
            println!("    {} {}", "!".yellow(), warning.yellow());
        }
        print_targets(&item.targets);
    }

    println!(
        "\n{} installed, {} partial, {} failed",
        report.count(ItemStatus::Installed).to_string().green(),
        report.count(ItemStatus::Partial).to_string().yellow(),
        report.count(ItemStatus::Failed).to_string().red()
    );
}
