//! User-wide configuration stored at `~/.agsync/config.toml`.
//!
//! ```toml
//! registry-url = "https://registry.npmjs.org"
//! cache-dir = "~/.agsync/cache"
//! ignore-patterns = ["*.bak", "drafts"]
//!
//! [retry]
//! max-attempts = 5
//! initial-delay-ms = 500
//!
//! [audit]
//! sink = "file"
//! path = "~/.agsync/audit.jsonl"
//!
//! [consumers.windsurf]
//! display-name = "Windsurf"
//! dirs.skill = { project = ".windsurf/skills", global = ".windsurf/skills" }
//! ```
//!
//! A missing file is not an error; every field has a default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

use crate::acquire::{AcquirerConfig, RetryPolicy};
use crate::audit::{AuditSink, AuditTrail, JsonLinesSink, NoopSink, PathRedactor, TracingSink};
use crate::constants::{AGSYNC_DIR, DEFAULT_REGISTRY_URL, GITHUB_ARCHIVE_URL, GITLAB_URL};
use crate::consumers::{ConsumerDefinition, ConsumerRegistry};
use crate::core::AgsyncError;

const CONFIG_FILE_NAME: &str = "config.toml";
const CACHE_DIR_NAME: &str = "cache";
const AUDIT_LOG_NAME: &str = "audit.jsonl";

/// Where audit records go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSinkKind {
    None,
    /// Log lines through `tracing` (target `agsync::audit`)
    #[default]
    Console,
    /// Append JSON lines to a file
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AuditConfig {
    pub sink: AuditSinkKind,
    /// Log file for the `file` sink; defaults to `~/.agsync/audit.jsonl`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Global configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GlobalConfig {
    /// npm-compatible registry used for `registry:` origins
    pub registry_url: String,
    /// Base URL for GitHub tarballs
    pub github_archive_url: String,
    pub gitlab_url: String,
    /// Staging directory parent; defaults to `~/.agsync/cache`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,
    pub retry: RetryPolicy,
    pub audit: AuditConfig,
    /// Glob patterns skipped when walking local origins, on top of the built-in deny-list
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ignore_patterns: Vec<String>,
    /// Additional consumers, or per-kind overrides of built-in ones
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub consumers: BTreeMap<String, ConsumerDefinition>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            github_archive_url: GITHUB_ARCHIVE_URL.to_string(),
            gitlab_url: GITLAB_URL.to_string(),
            cache_dir: None,
            retry: RetryPolicy::default(),
            audit: AuditConfig::default(),
            ignore_patterns: Vec::new(),
            consumers: BTreeMap::new(),
        }
    }
}

fn expand(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

impl GlobalConfig {
    /// Load from the default location, or defaults when the file does not exist.
    pub async fn load() -> Result<Self> {
        Self::load_with_optional(None).await
    }

    /// Load from `path` if given, else from the default location.
    ///
    /// A missing file yields the defaults. An explicitly given path that does
    /// not exist is treated the same way so a fresh machine can point at a
    /// config it has not written yet.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        if path.exists() {
            Self::load_from(&path).await
        } else {
            Ok(Self::default())
        }
    }

    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read global config from {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse global config from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as TOML, owner-readable only on Unix.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize global config")?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write global config to {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut perms = fs::metadata(path)
                .await
                .with_context(|| format!("Failed to read permissions for {}", path.display()))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms).await.with_context(|| {
                format!("Failed to set permissions on {}", path.display())
            })?;
        }

        Ok(())
    }

    /// `~/.agsync`, home of the config file, cache and audit log.
    pub fn data_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(AGSYNC_DIR))
            .ok_or_else(|| {
                AgsyncError::Config {
                    message: "unable to determine home directory".to_string(),
                }
                .into()
            })
    }

    /// `~/.agsync/config.toml`. The CLI also honors `AGSYNC_CONFIG`.
    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join(CONFIG_FILE_NAME))
    }

    fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(AgsyncError::Config {
                message: "retry.max-attempts must be at least 1".to_string(),
            }
            .into());
        }
        for (id, consumer) in &self.consumers {
            for (kind, dirs) in &consumer.dirs {
                if dirs.project.trim().is_empty() || Path::new(&dirs.project).is_absolute() {
                    return Err(AgsyncError::Config {
                        message: format!(
                            "consumer '{id}' declares an invalid project directory for '{kind}': '{}'",
                            dirs.project
                        ),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(raw) => Ok(expand(raw)),
            None => Ok(Self::data_dir()?.join(CACHE_DIR_NAME)),
        }
    }

    pub fn to_acquirer_config(&self) -> Result<AcquirerConfig> {
        let mut config = AcquirerConfig::new(self.cache_dir()?);
        config.registry_url.clone_from(&self.registry_url);
        config.github_archive_url.clone_from(&self.github_archive_url);
        config.gitlab_url.clone_from(&self.gitlab_url);
        config.retry = self.retry.clone();
        config.extra_ignore_patterns.clone_from(&self.ignore_patterns);
        Ok(config)
    }

    /// Built-in consumers merged with the `[consumers]` table.
    #[must_use]
    pub fn consumer_registry(&self) -> ConsumerRegistry {
        ConsumerRegistry::with_overrides(&self.consumers)
    }

    /// Audit trail for `project_root` writing to the configured sink.
    pub fn audit_trail(&self, project_root: &Path) -> Result<AuditTrail> {
        let sink: Arc<dyn AuditSink> = match self.audit.sink {
            AuditSinkKind::None => Arc::new(NoopSink),
            AuditSinkKind::Console => Arc::new(TracingSink),
            AuditSinkKind::File => {
                let path = match &self.audit.path {
                    Some(raw) => expand(raw),
                    None => Self::data_dir()?.join(AUDIT_LOG_NAME),
                };
                Arc::new(JsonLinesSink::new(path))
            }
        };
        Ok(AuditTrail::new(sink, PathRedactor::for_project(project_root)))
    }
}
