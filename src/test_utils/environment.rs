//! Isolated project, home, cache and source directories for tests.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::audit::{AuditTrail, MemorySink, PathRedactor};
use crate::config::{AuditConfig, AuditSinkKind, GlobalConfig};
use crate::consumers::TargetContext;
use crate::sync::SyncService;

/// Temporary directory tree holding a project, a fake home, a cache and sources.
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub project_dir: PathBuf,
    pub home_dir: PathBuf,
    pub sources_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        super::init_test_logging(None);

        let temp_dir = TempDir::new()?;
        let project_dir = temp_dir.path().join("project");
        let home_dir = temp_dir.path().join("home");
        let sources_dir = temp_dir.path().join("sources");
        let cache_dir = temp_dir.path().join("cache");

        for dir in [&project_dir, &home_dir, &sources_dir, &cache_dir] {
            fs::create_dir_all(dir)?;
        }

        Ok(Self {
            temp_dir,
            project_dir,
            home_dir,
            sources_dir,
            cache_dir,
        })
    }

    pub fn project_path(&self) -> &Path {
        &self.project_dir
    }

    pub fn sources_path(&self) -> &Path {
        &self.sources_dir
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_dir
    }

    /// Global configuration pointing at this environment's cache, with audit
    /// records appended to `audit.jsonl` inside the temp directory.
    pub fn config(&self) -> GlobalConfig {
        GlobalConfig {
            cache_dir: Some(self.cache_dir.display().to_string()),
            audit: AuditConfig {
                sink: AuditSinkKind::File,
                path: Some(self.audit_log_path().display().to_string()),
            },
            ..GlobalConfig::default()
        }
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.temp_dir.path().join("audit.jsonl")
    }

    /// Write `config` as TOML and return its path, for `--config`.
    pub fn write_config(&self, config: &GlobalConfig) -> Result<PathBuf> {
        let path = self.temp_dir.path().join("config.toml");
        let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Service rooted at this project and fake home, recording audit events in memory.
    pub fn service(&self, config: &GlobalConfig) -> Result<(SyncService, Arc<MemorySink>)> {
        let sink = Arc::new(MemorySink::default());
        let redactor = PathRedactor::new(Some(self.project_dir.clone()), None, Some(self.home_dir.clone()));
        let audit = AuditTrail::new(sink.clone(), redactor);
        let targets = TargetContext::new(&self.project_dir, &self.home_dir);
        let service = SyncService::with_audit(config, targets, audit)?;
        Ok((service, sink))
    }

    /// Create a file relative to the project directory.
    pub fn create_file(&self, path: impl AsRef<Path>, content: &str) -> Result<PathBuf> {
        let full_path = self.project_dir.join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full_path, content)?;
        Ok(full_path)
    }

    /// Read a file relative to the project directory.
    pub fn read_file(&self, path: impl AsRef<Path>) -> Result<String> {
        let full_path = self.project_dir.join(path);
        fs::read_to_string(&full_path).with_context(|| format!("Failed to read {}", full_path.display()))
    }

    pub fn file_exists(&self, path: impl AsRef<Path>) -> bool {
        self.project_dir.join(path).exists()
    }
}
