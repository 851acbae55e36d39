//! Loading, saving and mutating the state file.
//!
//! Every mutating method loads the file, changes it in memory and rewrites it
//! atomically. Nothing is cached between calls.
//!
//! There is no cross-process lock: two agsync processes mutating the same
//! project race, and the last save wins.

use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{HistoryEntry, InstallLocation, InstalledRecord, PluginRecord, StateConfig, StateFile};
use crate::audit::{AuditAction, AuditEvent, AuditTrail};
use crate::constants::{AGSYNC_DIR, STATE_FILE_NAME, STATE_SCHEMA_VERSION};
use crate::core::{AgsyncError, FileOperation, FileResultExt};
use crate::utils::fs::atomic_write;

/// Handle on one state file.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    audit: AuditTrail,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>, audit: AuditTrail) -> Self {
        Self {
            path: path.into(),
            audit,
        }
    }

    /// Store at `<project_root>/.agsync/state.json`.
    pub fn for_project(project_root: &Path, audit: AuditTrail) -> Self {
        Self::new(project_root.join(AGSYNC_DIR).join(STATE_FILE_NAME), audit)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the state file, or defaults when it does not exist yet.
    ///
    /// A file written under another schema version is refused with
    /// [`AgsyncError::SchemaVersionMismatch`]; it is never migrated.
    pub fn load(&self) -> Result<StateFile> {
        if !self.path.exists() {
            debug!("No state file at {}, starting from defaults", self.path.display());
            return Ok(StateFile::default());
        }

        let content = fs::read_to_string(&self.path).with_file_context(
            FileOperation::Read,
            &self.path,
            "loading state file",
        )?;
        let value: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("State file {} is not valid JSON", self.path.display()))?;

        let found = value.get("schemaVersion");
        if found.and_then(serde_json::Value::as_u64) != Some(u64::from(STATE_SCHEMA_VERSION)) {
            return Err(AgsyncError::SchemaVersionMismatch {
                path: self.path.display().to_string(),
                expected: STATE_SCHEMA_VERSION,
                found: found.map_or_else(|| "missing".to_string(), ToString::to_string),
            }
            .into());
        }

        serde_json::from_value(value)
            .with_context(|| format!("Failed to parse state file {}", self.path.display()))
    }

    /// Stamp `lastUpdated` and write `state` atomically.
    pub fn save(&self, state: &mut StateFile) -> Result<()> {
        state.schema_version = STATE_SCHEMA_VERSION;
        state.last_updated = Utc::now();
        let json = serde_json::to_vec_pretty(state).context("Failed to serialize state")?;
        atomic_write(&self.path, &json)
            .with_context(|| format!("Failed to write state file {}", self.path.display()))
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut StateFile) -> Result<T>) -> Result<T> {
        let mut state = self.load()?;
        let result = f(&mut state)?;
        self.save(&mut state)?;
        Ok(result)
    }

    fn state_event(&self, name: &str, kind: &str, details: impl Into<String>) {
        self.audit.emit(
            AuditEvent::new(AuditAction::StateUpdate, name, kind)
                .target(&self.path)
                .details(details),
        );
    }

    /// Insert or replace a record.
    ///
    /// When a record with the same name exists, its current state is pushed
    /// onto the front of the history (trimmed to `historyLimit`), its
    /// `installedAt` is kept and its install locations are merged with the new
    /// ones.
    pub fn add(&self, mut record: InstalledRecord) -> Result<InstalledRecord> {
        let stored = self.mutate(|state| {
            let limit = state.config.history_limit;
            let locations = std::mem::take(&mut record.installed_for);

            if let Some(existing) = state.resources.remove(&record.name) {
                record.history = std::iter::once(existing.snapshot()).chain(existing.history).collect();
                record.installed_at = existing.installed_at;
                record.installed_for = existing.installed_for;
            } else {
                record.history.clear();
            }
            record.history.truncate(limit);
            for location in locations {
                record.add_location(location);
            }
            record.updated_at = Utc::now();

            state.resources.insert(record.name.clone(), record.clone());
            Ok(record)
        })?;

        self.state_event(
            &stored.name,
            stored.kind(),
            format!(
                "recorded version {} ({} history entries)",
                stored.version.as_deref().unwrap_or("unversioned"),
                stored.history.len()
            ),
        );
        Ok(stored)
    }

    pub fn get(&self, name: &str) -> Result<Option<InstalledRecord>> {
        Ok(self.load()?.resources.remove(name))
    }

    /// Every record, ordered by name.
    pub fn list(&self) -> Result<Vec<InstalledRecord>> {
        Ok(self.load()?.resources.into_values().collect())
    }

    /// Delete a record.
    pub fn remove(&self, name: &str) -> Result<InstalledRecord> {
        let removed = self.mutate(|state| {
            state.resources.remove(name).ok_or_else(|| not_found(name).into())
        })?;
        self.state_event(name, removed.kind(), "record removed");
        Ok(removed)
    }

    /// Drop install locations from a record, deleting it when none remain.
    ///
    /// Returns the surviving record, or `None` when it was deleted.
    pub fn remove_targets(
        &self,
        name: &str,
        locations: &[InstallLocation],
    ) -> Result<Option<InstalledRecord>> {
        let (kind, remaining) = self.mutate(|state| {
            let record = state.resources.get_mut(name).ok_or_else(|| not_found(name))?;
            record.installed_for.retain(|l| !locations.contains(l));
            let kind = record.kind().to_string();

            if record.installed_for.is_empty() {
                state.resources.remove(name);
                Ok((kind, None))
            } else {
                record.updated_at = Utc::now();
                Ok((kind, Some(record.clone())))
            }
        })?;

        let details = match &remaining {
            Some(r) => format!("{} install locations remain", r.installed_for.len()),
            None => "record removed".to_string(),
        };
        self.state_event(name, &kind, details);
        Ok(remaining)
    }

    /// Restore the most recent history entry.
    ///
    /// The current state takes the popped entry's place at the front of the
    /// history, so rolling back twice returns to where it started.
    pub fn rollback(&self, name: &str) -> Result<InstalledRecord> {
        let restored = self.mutate(|state| {
            let record = state.resources.get_mut(name).ok_or_else(|| not_found(name))?;
            if record.history.is_empty() {
                return Err(AgsyncError::NotFound {
                    what: format!("history for resource '{name}'"),
                }
                .into());
            }

            let previous = record.history.remove(0);
            let current = record.snapshot();
            record.history.insert(0, current);
            record.apply(previous);
            Ok(record.clone())
        })?;

        self.audit.emit(
            AuditEvent::new(AuditAction::Rollback, name, restored.kind())
                .target(&self.path)
                .details(format!(
                    "restored version {} from {}",
                    restored.version.as_deref().unwrap_or("unversioned"),
                    restored.origin
                )),
        );
        Ok(restored)
    }

    /// History of `name`, most recent first.
    pub fn history(&self, name: &str) -> Result<Vec<HistoryEntry>> {
        self.get(name)?.map(|r| r.history).ok_or_else(|| not_found(name).into())
    }

    pub fn config(&self) -> Result<StateConfig> {
        Ok(self.load()?.config)
    }

    /// Replace the project settings. A lower `historyLimit` trims existing histories.
    pub fn set_config(&self, config: StateConfig) -> Result<StateConfig> {
        let saved = self.mutate(|state| {
            for record in state.resources.values_mut() {
                record.history.truncate(config.history_limit);
            }
            state.config = config;
            Ok(state.config.clone())
        })?;
        self.state_event("config", "config", "project settings updated");
        Ok(saved)
    }

    /// Record a third-party handler, replacing any previous entry with the same id.
    pub fn register_plugin(&self, plugin: PluginRecord) -> Result<()> {
        let id = plugin.handler_id.clone();
        let kind = plugin.kind.clone();
        self.mutate(|state| {
            state.plugins.insert(plugin.handler_id.clone(), plugin);
            Ok(())
        })?;
        self.state_event(&id, &kind, "plugin registered");
        Ok(())
    }

    pub fn unregister_plugin(&self, handler_id: &str) -> Result<PluginRecord> {
        let removed = self.mutate(|state| {
            state.plugins.remove(handler_id).ok_or_else(|| {
                AgsyncError::NotFound {
                    what: format!("plugin '{handler_id}'"),
                }
                .into()
            })
        })?;
        self.state_event(handler_id, &removed.kind, "plugin unregistered");
        Ok(removed)
    }
}

fn not_found(name: &str) -> AgsyncError {
    AgsyncError::NotFound {
        what: format!("resource '{name}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{MemorySink, PathRedactor};
    use crate::core::{KindMetadata, Scope};
    use crate::source::OriginKind;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn store(dir: &Path) -> StateStore {
        StateStore::for_project(dir, AuditTrail::noop())
    }

    fn record(name: &str, version: &str) -> InstalledRecord {
        let now = Utc::now();
        InstalledRecord {
            details: KindMetadata::Command {
                argument_hint: None,
            },
            handler_id: "command".to_string(),
            name: name.to_string(),
            version: Some(version.to_string()),
            description: String::new(),
            origin: format!("acme/commands#{version}"),
            origin_kind: OriginKind::RemoteArchive,
            origin_url: format!("https://github.com/acme/commands/tree/{version}"),
            installed_at: now,
            updated_at: now,
            installed_for: vec![InstallLocation {
                consumer_id: "claude-code".to_string(),
                scope: Scope::Project,
                path: PathBuf::from(format!("/p/.claude/commands/{name}.md")),
            }],
            history: Vec::new(),
        }
    }

    #[test]
    fn test_load_missing_file_returns_defaults_without_writing() {
        let temp = TempDir::new().unwrap();
        let store = store(temp.path());
        let state = store.load().unwrap();
        assert_eq!(state.schema_version, STATE_SCHEMA_VERSION);
        assert!(state.resources.is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_history_is_bounded_most_recent_first() {
        let temp = TempDir::new().unwrap();
        let store = store(temp.path());
        store
            .set_config(StateConfig {
                history_limit: 2,
                ..StateConfig::default()
            })
            .unwrap();

        for v in ["v1", "v2", "v3", "v4", "v5"] {
            store.add(record("deploy", v)).unwrap();
        }

        let history = store.history("deploy").unwrap();
        let versions: Vec<_> = history.iter().map(|h| h.version.as_deref().unwrap()).collect();
        assert_eq!(versions, vec!["v4", "v3"]);
        assert_eq!(store.get("deploy").unwrap().unwrap().version.as_deref(), Some("v5"));
    }

    #[test]
    fn test_add_keeps_installed_at_and_merges_locations() {
        let temp = TempDir::new().unwrap();
        let store = store(temp.path());
        let first = store.add(record("deploy", "v1")).unwrap();

        let mut second = record("deploy", "v2");
        second.installed_for.push(InstallLocation {
            consumer_id: "cursor".to_string(),
            scope: Scope::Project,
            path: PathBuf::from("/p/.cursor/commands/deploy.md"),
        });
        let stored = store.add(second).unwrap();

        assert_eq!(stored.installed_at, first.installed_at);
        assert_eq!(stored.installed_for.len(), 2);
    }

    #[test]
    fn test_rollback_restores_and_is_reversible() {
        let temp = TempDir::new().unwrap();
        let store = store(temp.path());
        store.add(record("deploy", "v1")).unwrap();
        store.add(record("deploy", "v2")).unwrap();
        let before = store.get("deploy").unwrap().unwrap();

        let rolled = store.rollback("deploy").unwrap();
        assert_eq!(rolled.version.as_deref(), Some("v1"));
        assert_eq!(rolled.origin, "acme/commands#v1");
        assert_eq!(rolled.history[0].version.as_deref(), Some("v2"));

        let back = store.rollback("deploy").unwrap();
        assert_eq!(back, before);
    }

    #[test]
    fn test_rollback_without_history_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = store(temp.path());
        store.add(record("deploy", "v1")).unwrap();
        let err = store.rollback("deploy").unwrap_err();
        assert!(matches!(err.downcast_ref::<AgsyncError>(), Some(AgsyncError::NotFound { .. })));
        assert!(store.rollback("ghost").is_err());
    }

    #[test]
    fn test_schema_mismatch_refuses_and_does_not_mutate() {
        let temp = TempDir::new().unwrap();
        let store = store(temp.path());
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        let original = r#"{"schemaVersion": 2, "lastUpdated": "2024-01-01T00:00:00Z"}"#;
        fs::write(store.path(), original).unwrap();

        let err = store.add(record("deploy", "v1")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AgsyncError>(),
            Some(AgsyncError::SchemaVersionMismatch { found, .. }) if found == "2"
        ));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), original);

        fs::write(store.path(), "{}").unwrap();
        let err = store.load().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AgsyncError>(),
            Some(AgsyncError::SchemaVersionMismatch { found, .. }) if found == "missing"
        ));
    }

    #[test]
    fn test_remove_returns_record_and_unknown_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = store(temp.path());
        store.add(record("deploy", "v1")).unwrap();
        store.add(record("lint", "v1")).unwrap();

        let removed = store.remove("deploy").unwrap();
        assert_eq!(removed.name, "deploy");
        assert_eq!(store.list().unwrap().len(), 1);

        let err = store.remove("deploy").unwrap_err();
        assert!(matches!(err.downcast_ref::<AgsyncError>(), Some(AgsyncError::NotFound { .. })));
        assert!(store.get("lint").unwrap().is_some());
    }

    #[test]
    fn test_remove_targets_deletes_record_when_empty() {
        let temp = TempDir::new().unwrap();
        let store = store(temp.path());
        let stored = store.add(record("deploy", "v1")).unwrap();

        let remaining = store.remove_targets("deploy", &stored.installed_for).unwrap();
        assert!(remaining.is_none());
        assert!(store.get("deploy").unwrap().is_none());
        assert!(store.remove("deploy").is_err());
    }

    #[test]
    fn test_plugins_and_audit() {
        let temp = TempDir::new().unwrap();
        let sink = Arc::new(MemorySink::default());
        let store = StateStore::for_project(
            temp.path(),
            AuditTrail::new(sink.clone(), PathRedactor::for_project(temp.path())),
        );
        store
            .register_plugin(PluginRecord {
                handler_id: "workflow".to_string(),
                kind: "workflow".to_string(),
                display_name: "Workflow".to_string(),
                version: None,
                source: None,
                registered_at: Utc::now(),
            })
            .unwrap();
        assert!(store.load().unwrap().plugins.contains_key("workflow"));
        assert_eq!(store.unregister_plugin("workflow").unwrap().kind, "workflow");
        assert!(store.unregister_plugin("workflow").is_err());

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.action == AuditAction::StateUpdate));
        assert_eq!(records[0].target_path.as_deref(), Some("<project>/.agsync/state.json"));
    }
}
