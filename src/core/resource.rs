//! Resource abstractions for agsync
//!
//! This module defines the resource kinds agsync knows about and the data that
//! flows between discovery, installation and the state store.
//!
//! # Resource Model
//!
//! - **Skills** are directories: a `SKILL.md` marker plus any supporting files.
//! - **Agents** and **commands** are single files marked by `AGENT.md` /
//!   `COMMAND.md`.
//!
//! Kind-specific metadata is carried by [`KindMetadata`], a sum type keyed by
//! `kind`, so every place that reads or writes metadata matches exhaustively.
//!
//! # Examples
//!
//! ```rust
//! use agsync_cli::core::ResourceKind;
//!
//! let kind: ResourceKind = "skill".parse().unwrap();
//! assert_eq!(kind.to_string(), "skill");
//! assert!(kind.is_multi_file());
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::core::AgsyncError;

/// Built-in resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Multi-file directory resource
    Skill,
    /// Single-file agent definition
    Agent,
    /// Single-file command/prompt
    Command,
}

impl ResourceKind {
    /// All built-in kinds in display order.
    pub const ALL: [ResourceKind; 3] = [ResourceKind::Skill, ResourceKind::Agent, ResourceKind::Command];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Skill => "skill",
            ResourceKind::Agent => "agent",
            ResourceKind::Command => "command",
        }
    }

    #[must_use]
    pub const fn plural(&self) -> &'static str {
        match self {
            ResourceKind::Skill => "skills",
            ResourceKind::Agent => "agents",
            ResourceKind::Command => "commands",
        }
    }

    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            ResourceKind::Skill => "Skill",
            ResourceKind::Agent => "Agent",
            ResourceKind::Command => "Command",
        }
    }

    /// Whether items of this kind are installed as directories.
    #[must_use]
    pub const fn is_multi_file(&self) -> bool {
        matches!(self, ResourceKind::Skill)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = AgsyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skill" | "skills" => Ok(ResourceKind::Skill),
            "agent" | "agents" => Ok(ResourceKind::Agent),
            "command" | "commands" => Ok(ResourceKind::Command),
            _ => Err(AgsyncError::UnknownKind {
                kind: s.to_string(),
            }),
        }
    }
}

/// Whether an install target is project-local or user-global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Project,
    Global,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Project => write!(f, "project"),
            Scope::Global => write!(f, "global"),
        }
    }
}

impl std::str::FromStr for Scope {
    type Err = AgsyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "project" => Ok(Scope::Project),
            "global" | "user" => Ok(Scope::Global),
            _ => Err(AgsyncError::Config {
                message: format!("invalid scope '{s}', expected 'project' or 'global'"),
            }),
        }
    }
}

/// How content is placed at an install target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallMode {
    /// Materialize file contents
    #[default]
    Copy,
    /// Symlink to the staged source
    Link,
}

/// One `(consumer, scope, mode)` destination for an install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallTarget {
    pub consumer_id: String,
    pub scope: Scope,
    pub mode: InstallMode,
}

impl InstallTarget {
    pub fn new(consumer_id: impl Into<String>, scope: Scope, mode: InstallMode) -> Self {
        Self {
            consumer_id: consumer_id.into(),
            scope,
            mode,
        }
    }
}

/// Kind-specific metadata, keyed by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum KindMetadata {
    Skill {
        file_count: usize,
        total_size: u64,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        allowed_tools: Vec<String>,
    },
    Agent {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tools: Vec<String>,
    },
    Command {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        argument_hint: Option<String>,
    },
    /// Metadata produced by a third-party handler
    Plugin {
        plugin_kind: String,
        #[serde(default)]
        data: serde_json::Value,
    },
}

impl KindMetadata {
    /// The kind identifier this metadata belongs to.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            KindMetadata::Skill {
                ..
            } => ResourceKind::Skill.as_str(),
            KindMetadata::Agent {
                ..
            } => ResourceKind::Agent.as_str(),
            KindMetadata::Command {
                ..
            } => ResourceKind::Command.as_str(),
            KindMetadata::Plugin {
                plugin_kind,
                ..
            } => plugin_kind,
        }
    }

    /// Built-in kind, if this is not plugin metadata.
    #[must_use]
    pub fn builtin_kind(&self) -> Option<ResourceKind> {
        match self {
            KindMetadata::Skill {
                ..
            } => Some(ResourceKind::Skill),
            KindMetadata::Agent {
                ..
            } => Some(ResourceKind::Agent),
            KindMetadata::Command {
                ..
            } => Some(ResourceKind::Command),
            KindMetadata::Plugin {
                ..
            } => None,
        }
    }
}

/// A file read from an acquisition root or an item directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Path relative to the acquisition root or the item directory
    pub relative_path: PathBuf,
    pub content: Vec<u8>,
    /// Unix permission bits as staged
    pub mode: u32,
}

/// A resource found in an acquisition, ready for validation and install.
///
/// Recomputed on every discovery pass and never persisted directly.
#[derive(Debug, Clone)]
pub struct DiscoveredItem {
    /// Name before resolution (frontmatter name, heading, or directory name)
    pub original_name: String,
    /// Collision-resistant install name
    pub name: String,
    pub version: Option<String>,
    pub description: String,
    /// Directory segments between the root and the item, containers removed
    pub category_path: Vec<String>,
    /// Directory segments between the root and the item, unfiltered
    pub full_path: Vec<String>,
    /// Item directory relative to the acquisition root
    pub relative_dir: PathBuf,
    /// Absolute staged path: the item directory for multi-file kinds, the marker file otherwise
    pub source_path: PathBuf,
    pub files: Vec<StagedFile>,
    /// Relative path of the marker file, when one was found
    pub marker: Option<PathBuf>,
    /// Directories of same-kind items nested below this one, relative to the
    /// acquisition root. Their files are not part of `files`.
    pub nested_items: Vec<PathBuf>,
    pub details: KindMetadata,
}

impl DiscoveredItem {
    #[must_use]
    pub fn kind(&self) -> &str {
        self.details.kind()
    }
}
