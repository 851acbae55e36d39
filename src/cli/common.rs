//! Pieces shared by every subcommand.

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

use crate::config::GlobalConfig;
use crate::core::{AgsyncError, InstallMode, InstallTarget, Scope};
use crate::sync::{SyncService, TargetReport, TargetState};

/// Output style of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable, colored
    #[default]
    Text,
    /// Pretty-printed JSON on stdout
    Json,
}

/// Everything a subcommand needs to run.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: GlobalConfig,
    pub project_root: PathBuf,
    pub format: OutputFormat,
}

impl CommandContext {
    pub fn service(&self) -> Result<SyncService> {
        SyncService::from_config(&self.config, &self.project_root)
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

/// Parse `consumer` or `consumer:scope` (`claude-code`, `cursor:global`).
pub fn parse_target(raw: &str, default_scope: Scope, mode: InstallMode) -> Result<InstallTarget, AgsyncError> {
    let (consumer, scope) = match raw.split_once(':') {
        Some((consumer, scope)) => (consumer, scope.parse()?),
        None => (raw, default_scope),
    };
    if consumer.trim().is_empty() {
        return Err(AgsyncError::Config {
            message: format!("invalid target '{raw}', expected consumer[:scope]"),
        });
    }
    Ok(InstallTarget::new(consumer.trim(), scope, mode))
}

pub fn scope_of(global: bool) -> Scope {
    if global {
        Scope::Global
    } else {
        Scope::Project
    }
}

/// One indented line per target.
pub fn print_targets(targets: &[TargetReport]) {
    for target in targets {
        let place = target
            .path
            .as_ref()
            .map_or_else(|| format!("{} ({})", target.consumer_id, target.scope), |p| p.display().to_string());
        match target.state {
            TargetState::Done => println!("    {} {}", "✓".green(), place),
            TargetState::Warning => println!(
                "    {} {} {}",
                "!".yellow(),
                place,
                target.message.as_deref().unwrap_or_default().yellow()
            ),
            TargetState::Failed => println!(
                "    {} {} {}",
                "✗".red(),
                place,
                target.message.as_deref().unwrap_or_default().red()
            ),
        }
    }
}
