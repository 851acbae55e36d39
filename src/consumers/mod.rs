//! Target directory layouts of consuming tools.
//!
//! Each consumer declares, per resource kind, a project-relative directory and
//! optionally a directory under the user's home. Resolving
//! `(consumer, scope, kind)` to a path fails loudly when the consumer does not
//! declare what was asked for; nothing is silently skipped.
//!
//! | consumer      | skill                | agent            | command              |
//! |---------------|----------------------|------------------|----------------------|
//! | `claude-code` | `.claude/skills`     | `.claude/agents` | `.claude/commands`   |
//! | `cursor`      | `.cursor/skills`     | `.cursor/agents` | `.cursor/commands`   |
//! | `codex`       | `.codex/skills`      | -                | `.codex/prompts`     |
//! | `opencode`    | `.opencode/skill`    | `.opencode/agent`| `.opencode/command`  |
//! | `copilot`     | `.github/skills`     | `.github/agents` | -                    |
//!
//! Additional consumers, or overrides of the built-ins, come from the
//! `[consumers]` table of the global configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::{AgsyncError, Scope};

/// Directories for one resource kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindDirs {
    /// Relative to the project root
    pub project: String,
    /// Relative to the home directory (`~/` prefix optional), or absolute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global: Option<String>,
}

impl KindDirs {
    fn new(project: &str, global: Option<&str>) -> Self {
        Self {
            project: project.to_string(),
            global: global.map(str::to_string),
        }
    }
}

/// A consuming tool and the directories it reads resources from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConsumerDefinition {
    #[serde(default)]
    pub display_name: String,
    /// Resource kind -> directories
    #[serde(default)]
    pub dirs: BTreeMap<String, KindDirs>,
}

/// Roots that relative layout entries resolve against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetContext {
    pub project_root: PathBuf,
    pub home_dir: PathBuf,
}

impl TargetContext {
    pub fn new(project_root: impl Into<PathBuf>, home_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            home_dir: home_dir.into(),
        }
    }

    /// Context for `project_root` with the current user's home directory.
    pub fn for_project(project_root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| AgsyncError::Config {
            message: "unable to determine home directory".to_string(),
        })?;
        Ok(Self::new(project_root, home))
    }
}

/// All known consumers, keyed by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerRegistry {
    consumers: BTreeMap<String, ConsumerDefinition>,
}

impl Default for ConsumerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ConsumerRegistry {
    /// The built-in consumer layouts.
    #[must_use]
    pub fn builtin() -> Self {
        let mut consumers = BTreeMap::new();
        let mut add = |id: &str, display: &str, entries: &[(&str, &str, Option<&str>)]| {
            let dirs = entries
                .iter()
                .map(|(kind, project, global)| ((*kind).to_string(), KindDirs::new(project, *global)))
                .collect();
            consumers.insert(
                id.to_string(),
                ConsumerDefinition {
                    display_name: display.to_string(),
                    dirs,
                },
            );
        };

        add(
            "claude-code",
            "Claude Code",
            &[
                ("skill", ".claude/skills", Some(".claude/skills")),
                ("agent", ".claude/agents", Some(".claude/agents")),
                ("command", ".claude/commands", Some(".claude/commands")),
            ],
        );
        add(
            "cursor",
            "Cursor",
            &[
                ("skill", ".cursor/skills", Some(".cursor/skills")),
                ("agent", ".cursor/agents", None),
                ("command", ".cursor/commands", Some(".cursor/commands")),
            ],
        );
        add(
            "codex",
            "Codex",
            &[
                ("skill", ".codex/skills", Some(".codex/skills")),
                ("command", ".codex/prompts", Some(".codex/prompts")),
            ],
        );
        add(
            "opencode",
            "OpenCode",
            &[
                ("skill", ".opencode/skill", Some(".config/opencode/skill")),
                ("agent", ".opencode/agent", Some(".config/opencode/agent")),
                ("command", ".opencode/command", Some(".config/opencode/command")),
            ],
        );
        add(
            "copilot",
            "GitHub Copilot",
            &[
                ("skill", ".github/skills", Some(".copilot/skills")),
                ("agent", ".github/agents", None),
            ],
        );

        Self {
            consumers,
        }
    }

    /// Built-ins with `custom` layered on top; per-kind entries replace built-in ones.
    #[must_use]
    pub fn with_overrides(custom: &BTreeMap<String, ConsumerDefinition>) -> Self {
        let mut registry = Self::builtin();
        for (id, definition) in custom {
            match registry.consumers.get_mut(id) {
                Some(existing) => {
                    if !definition.display_name.is_empty() {
                        existing.display_name.clone_from(&definition.display_name);
                    }
                    for (kind, dirs) in &definition.dirs {
                        existing.dirs.insert(kind.clone(), dirs.clone());
                    }
                }
                None => {
                    let mut definition = definition.clone();
                    if definition.display_name.is_empty() {
                        definition.display_name.clone_from(id);
                    }
                    registry.consumers.insert(id.clone(), definition);
                }
            }
        }
        registry
    }

    pub fn get(&self, consumer: &str) -> Result<&ConsumerDefinition, AgsyncError> {
        self.consumers.get(consumer).ok_or_else(|| AgsyncError::UnknownConsumer {
            consumer: consumer.to_string(),
        })
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.consumers.keys().map(String::as_str)
    }

    /// Consumers declaring a directory for `kind`.
    pub fn supporting(&self, kind: &str) -> impl Iterator<Item = &str> {
        self.consumers
            .iter()
            .filter(move |(_, def)| def.dirs.contains_key(kind))
            .map(|(id, _)| id.as_str())
    }

    /// Resolve the install directory for `(consumer, scope, kind)`.
    pub fn resolve_dir(
        &self,
        consumer: &str,
        scope: Scope,
        kind: &str,
        ctx: &TargetContext,
    ) -> Result<PathBuf, AgsyncError> {
        let definition = self.get(consumer)?;
        let dirs = definition.dirs.get(kind).ok_or_else(|| AgsyncError::UnsupportedKind {
            consumer: consumer.to_string(),
            kind: kind.to_string(),
        })?;

        match scope {
            Scope::Project => Ok(join_relative(&ctx.project_root, &dirs.project)),
            Scope::Global => {
                let global = dirs.global.as_deref().ok_or_else(|| AgsyncError::UnsupportedScope {
                    consumer: consumer.to_string(),
                    kind: kind.to_string(),
                    scope: scope.to_string(),
                })?;
                Ok(join_relative(&ctx.home_dir, global.trim_start_matches("~/")))
            }
        }
    }
}

fn join_relative(base: &Path, dir: &str) -> PathBuf {
    let path = Path::new(dir);
    if path.is_absolute() { path.to_path_buf() } else { base.join(path) }
}
