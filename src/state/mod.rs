//! The persisted record of what is installed where.
//!
//! The state file (`.agsync/state.json`) is the single source of truth for
//! installed resources, their targets and their history. It is JSON with
//! camelCase keys:
//!
//! ```json
//! {
//!   "schemaVersion": 1,
//!   "lastUpdated": "2025-01-01T00:00:00Z",
//!   "config": {
//!     "preferredConsumers": ["claude-code"],
//!     "defaultScope": "project",
//!     "historyLimit": 10,
//!     "updateStrategy": "manual"
//!   },
//!   "plugins": {},
//!   "resources": {
//!     "pdf": {
//!       "kind": "skill",
//!       "fileCount": 3,
//!       "totalSize": 2048,
//!       "handlerId": "skill",
//!       "name": "pdf",
//!       "version": "v1.2.0",
//!       "origin": "acme/skills#v1.2.0",
//!       "originKind": "remote-archive",
//!       "originUrl": "https://github.com/acme/skills/tree/v1.2.0",
//!       "installedAt": "...",
//!       "updatedAt": "...",
//!       "installedFor": [{ "consumerId": "claude-code", "scope": "project", "path": "..." }],
//!       "history": []
//!     }
//!   }
//! }
//! ```
//!
//! Kind-specific fields ride on the record through [`KindMetadata`], keyed by
//! `kind`. Every mutating call is a full load-mutate-save cycle; see
//! [`StateStore`].

mod store;

pub use store::StateStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::constants::{DEFAULT_HISTORY_LIMIT, STATE_SCHEMA_VERSION};
use crate::core::{AgsyncError, KindMetadata, Scope};
use crate::source::OriginKind;

/// When installed resources should be refreshed from their origins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStrategy {
    #[default]
    Manual,
    Notify,
    Auto,
}

impl std::fmt::Display for UpdateStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateStrategy::Manual => write!(f, "manual"),
            UpdateStrategy::Notify => write!(f, "notify"),
            UpdateStrategy::Auto => write!(f, "auto"),
        }
    }
}

impl std::str::FromStr for UpdateStrategy {
    type Err = AgsyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(UpdateStrategy::Manual),
            "notify" => Ok(UpdateStrategy::Notify),
            "auto" => Ok(UpdateStrategy::Auto),
            _ => Err(AgsyncError::Config {
                message: format!("invalid update strategy '{s}', expected manual, notify or auto"),
            }),
        }
    }
}

/// Project-level settings stored in the state file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StateConfig {
    pub preferred_consumers: Vec<String>,
    pub default_scope: Scope,
    /// Maximum history entries kept per resource
    pub history_limit: usize,
    pub update_strategy: UpdateStrategy,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            preferred_consumers: vec!["claude-code".to_string()],
            default_scope: Scope::Project,
            history_limit: DEFAULT_HISTORY_LIMIT,
            update_strategy: UpdateStrategy::Manual,
        }
    }
}

/// A registered third-party handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginRecord {
    pub handler_id: String,
    pub kind: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Where the handler was loaded from, as reported by the embedding application
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub registered_at: DateTime<Utc>,
}

/// One place a resource is installed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallLocation {
    pub consumer_id: String,
    pub scope: Scope,
    pub path: PathBuf,
}

/// Snapshot of a record before it was replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub origin: String,
    pub origin_kind: OriginKind,
    pub origin_url: String,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub details: KindMetadata,
}

/// A resource installed by agsync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledRecord {
    #[serde(flatten)]
    pub details: KindMetadata,
    /// Kind of the handler that installed the resource
    pub handler_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Origin string as given by the user
    pub origin: String,
    pub origin_kind: OriginKind,
    pub origin_url: String,
    pub installed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub installed_for: Vec<InstallLocation>,
    /// Prior states, most recent first
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl InstalledRecord {
    #[must_use]
    pub fn kind(&self) -> &str {
        self.details.kind()
    }

    /// The record's current state as a history entry.
    #[must_use]
    pub fn snapshot(&self) -> HistoryEntry {
        HistoryEntry {
            version: self.version.clone(),
            origin: self.origin.clone(),
            origin_kind: self.origin_kind,
            origin_url: self.origin_url.clone(),
            updated_at: self.updated_at,
            details: self.details.clone(),
        }
    }

    /// Overwrite the live fields with those of `entry`.
    pub fn apply(&mut self, entry: HistoryEntry) {
        self.version = entry.version;
        self.origin = entry.origin;
        self.origin_kind = entry.origin_kind;
        self.origin_url = entry.origin_url;
        self.updated_at = entry.updated_at;
        self.details = entry.details;
    }

    /// Add `location` unless the same `(consumer, scope, path)` is already recorded.
    pub fn add_location(&mut self, location: InstallLocation) -> bool {
        if self.installed_for.contains(&location) {
            return false;
        }
        self.installed_for.push(location);
        true
    }
}

/// Root of the state file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateFile {
    pub schema_version: u32,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub config: StateConfig,
    #[serde(default)]
    pub plugins: BTreeMap<String, PluginRecord>,
    #[serde(default)]
    pub resources: BTreeMap<String, InstalledRecord>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            schema_version: STATE_SCHEMA_VERSION,
            last_updated: Utc::now(),
            config: StateConfig::default(),
            plugins: BTreeMap::new(),
            resources: BTreeMap::new(),
        }
    }
}
