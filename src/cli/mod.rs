//! Command-line interface for agsync.
//!
//! # Commands
//!
//! - `add` - install every resource found at an origin
//! - `discover` - list what an origin contains without installing
//! - `remove` - uninstall a tracked resource
//! - `list` - show installed resources (disk scan, or `--tracked` records)
//! - `history` - show earlier recorded versions of a resource
//! - `rollback` - restore the previous recorded version of a resource
//! - `config` - show or change project settings
//!
//! # Global options
//!
//! - `--verbose` / `-v`: debug logging
//! - `--quiet` / `-q`: errors only
//! - `--config <PATH>`: global configuration file (env `AGSYNC_CONFIG`)
//! - `--project-dir <PATH>`: project root (defaults to the current directory)
//! - `--format text|json`: output style
//!
//! Logs go to stderr so `--format json` output on stdout stays parseable.

mod add;
pub mod common;
mod config;
mod discover;
mod history;
mod list;
mod remove;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::config::GlobalConfig;
use common::{CommandContext, OutputFormat};

/// Settings derived from global flags before a command runs.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Tracing filter directive, `None` to keep `RUST_LOG` or the default
    pub log_level: Option<String>,
    pub config_path: Option<PathBuf>,
    pub project_dir: Option<PathBuf>,
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
#[command(
    name = "agsync",
    about = "Synchronize skills, agents and commands into every coding tool's layout",
    version,
    long_about = "agsync fetches resources from GitHub/GitLab repositories, tarball URLs, \
                  package registries or local directories and installs them into the \
                  directories each consuming tool reads, recording every install with \
                  history and rollback."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the global configuration file
    #[arg(long, global = true, env = "AGSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Project root (defaults to the current directory)
    #[arg(long, global = true, env = "AGSYNC_PROJECT_DIR")]
    project_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install resources from an origin
    Add(add::AddCommand),
    /// Show what an origin contains without installing
    Discover(discover::DiscoverCommand),
    /// Uninstall a tracked resource
    Remove(remove::RemoveCommand),
    /// List installed resources
    List(list::ListCommand),
    /// Show earlier versions of a resource
    History(history::HistoryCommand),
    /// Restore the previous recorded version of a resource
    Rollback(history::RollbackCommand),
    /// Show or change settings
    Config(config::ConfigCommand),
}

impl Cli {
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            Some("error".to_string())
        } else {
            None
        };
        CliConfig {
            log_level,
            config_path: self.config.clone(),
            project_dir: self.project_dir.clone(),
            format: self.format,
        }
    }

    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        let project_root = match config.project_dir.clone() {
            Some(dir) => dir,
            None => std::env::current_dir().context("Failed to determine current directory")?,
        };
        let global = GlobalConfig::load_with_optional(config.config_path.clone()).await?;
        debug!("Project root: {}", project_root.display());

        let ctx = CommandContext {
            config: global,
            project_root,
            format: config.format,
        };

        match self.command {
            Commands::Add(cmd) => cmd.execute(&ctx).await,
            Commands::Discover(cmd) => cmd.execute(&ctx).await,
            Commands::Remove(cmd) => cmd.execute(&ctx).await,
            Commands::List(cmd) => cmd.execute(&ctx).await,
            Commands::History(cmd) => cmd.execute(&ctx).await,
            Commands::Rollback(cmd) => cmd.execute(&ctx).await,
            Commands::Config(cmd) => cmd.execute(&ctx, config.config_path).await,
        }
    }
}
