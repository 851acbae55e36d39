//! `agsync config`: project settings and the global configuration file.
//!
//! ```bash
//! agsync config show
//! agsync config set history-limit 5
//! agsync config set preferred-consumers claude-code,cursor
//! agsync config path
//! agsync config init
//! ```

use anyhow::{Result, anyhow};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

use super::common::{CommandContext, print_json};
use crate::config::GlobalConfig;
use crate::core::AgsyncError;
use crate::state::StateConfig;

#[derive(Args, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Subcommand, Debug)]
enum ConfigSubcommand {
    /// Show project settings and the effective global configuration
    Show,
    /// Change a project setting
    Set {
        /// preferred-consumers, default-scope, history-limit or update-strategy
        key: String,
        value: String,
    },
    /// Print the global configuration file path
    Path,
    /// Write the default global configuration file if none exists
    Init,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigView<'a> {
    project: &'a StateConfig,
    global: &'a GlobalConfig,
}

impl ConfigCommand {
    pub async fn execute(self, ctx: &CommandContext, config_path: Option<PathBuf>) -> Result<()> {
        match self.command {
            ConfigSubcommand::Show => show(ctx),
            ConfigSubcommand::Set {
                key,
                value,
            } => set(ctx, &key, &value),
            ConfigSubcommand::Path => {
                let path = match config_path {
                    Some(path) => path,
                    None => GlobalConfig::default_path()?,
                };
                println!("{}", path.display());
                Ok(())
            }
            ConfigSubcommand::Init => {
                let path = match config_path {
                    Some(path) => path,
                    None => GlobalConfig::default_path()?,
                };
                if path.exists() {
                    return Err(anyhow!("Configuration already exists at {}", path.display()));
                }
                GlobalConfig::default().save_to(&path).await?;
                println!("{} {}", "Created".green(), path.display());
                Ok(())
            }
        }
    }
}

fn show(ctx: &CommandContext) -> Result<()> {
    let project = ctx.service()?.store().config()?;
    if ctx.is_json() {
        return print_json(&ConfigView {
            project: &project,
            global: &ctx.config,
        });
    }

    println!("{}", "Project settings".bold());
    println!("  preferred-consumers  {}", project.preferred_consumers.join(", "));
    println!("  default-scope        {}", project.default_scope);
    println!("  history-limit        {}", project.history_limit);
    println!("  update-strategy      {}", project.update_strategy);
    println!();
    println!("{}", "Global configuration".bold());
    println!("  registry-url         {}", ctx.config.registry_url);
    println!("  cache-dir            {}", ctx.config.cache_dir()?.display());
    println!("  retry                {} attempts", ctx.config.retry.max_attempts);
    let consumers = ctx.config.consumer_registry();
    println!("  consumers            {}", consumers.ids().collect::<Vec<_>>().join(", "));
    Ok(())
}

fn set(ctx: &CommandContext, key: &str, value: &str) -> Result<()> {
    let service = ctx.service()?;
    let mut config = service.store().config()?;
    apply_setting(&mut config, key, value)?;

    let known = ctx.config.consumer_registry();
    for consumer in &config.preferred_consumers {
        known.get(consumer)?;
    }

    let saved = service.store().set_config(config)?;
    if ctx.is_json() {
        return print_json(&saved);
    }
    println!("{} {key} = {value}", "Set".green());
    Ok(())
}

fn apply_setting(config: &mut StateConfig, key: &str, value: &str) -> Result<(), AgsyncError> {
    match key {
        "preferred-consumers" => {
            let consumers: Vec<String> =
                value.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect();
            if consumers.is_empty() {
                return Err(AgsyncError::Config {
                    message: "preferred-consumers needs at least one consumer".to_string(),
                });
            }
            config.preferred_consumers = consumers;
        }
        "default-scope" => config.default_scope = value.parse()?,
        "history-limit" => {
            config.history_limit = value.parse().map_err(|_| AgsyncError::Config {
                message: format!("history-limit must be a non-negative integer, got '{value}'"),
            })?;
        }
        "update-strategy" => config.update_strategy = value.parse()?,
        other => {
            return Err(AgsyncError::Config {
                message: format!(
                    "unknown setting '{other}', expected preferred-consumers, default-scope, history-limit or update-strategy"
                ),
            });
        }
    }
    Ok(())
}
