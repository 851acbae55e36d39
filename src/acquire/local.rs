//! Indexing of local directories and staged trees.

use anyhow::{Context, Result};
use glob::Pattern;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::constants::{DEFAULT_IGNORED_NAMES, DEFAULT_IGNORED_PATTERNS};
use crate::core::{AgsyncError, FileOperation, FileResultExt, StagedFile};
use crate::utils::fs::file_mode;
use crate::utils::security::is_path_blacklisted;

/// Names and glob patterns excluded from local walks.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    names: Vec<String>,
    patterns: Vec<Pattern>,
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self::with_extra(&[])
    }
}

impl IgnoreRules {
    /// Default deny-list plus `extra` glob patterns. Invalid patterns are logged and dropped.
    #[must_use]
    pub fn with_extra(extra: &[String]) -> Self {
        let patterns = DEFAULT_IGNORED_PATTERNS
            .iter()
            .map(|p| (*p).to_string())
            .chain(extra.iter().cloned())
            .filter_map(|p| match Pattern::new(&p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("Ignoring invalid ignore pattern '{p}': {e}");
                    None
                }
            })
            .collect();
        Self {
            names: DEFAULT_IGNORED_NAMES.iter().map(|n| (*n).to_string()).collect(),
            patterns,
        }
    }

    /// No exclusions; used for staged archive trees.
    #[must_use]
    pub fn none() -> Self {
        Self {
            names: Vec::new(),
            patterns: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_ignored(&self, file_name: &str) -> bool {
        self.names.iter().any(|n| n == file_name) || self.patterns.iter().any(|p| p.matches(file_name))
    }
}

/// Validate a local origin path and return its canonical form.
pub fn resolve_local_root(raw: &Path) -> Result<PathBuf> {
    let expanded = PathBuf::from(shellexpand::tilde(&raw.to_string_lossy()).into_owned());

    if is_path_blacklisted(&expanded) {
        return Err(AgsyncError::PathSecurityViolation {
            entry: expanded.display().to_string(),
            reason: "access to system directories is not allowed".to_string(),
        }
        .into());
    }
    if !expanded.exists() {
        return Err(AgsyncError::NotFound {
            what: format!("local origin {}", expanded.display()),
        }
        .into());
    }
    if !expanded.is_dir() {
        return Err(AgsyncError::InvalidOrigin {
            origin: expanded.display().to_string(),
            reason: "not a directory".to_string(),
        }
        .into());
    }

    let canonical = expanded.canonicalize().with_file_context(
        FileOperation::Canonicalize,
        &expanded,
        "resolving local origin",
    )?;
    if is_path_blacklisted(&canonical) {
        return Err(AgsyncError::PathSecurityViolation {
            entry: canonical.display().to_string(),
            reason: "access to system directories is not allowed".to_string(),
        }
        .into());
    }
    Ok(canonical)
}

/// Collected files plus anything skipped along the way.
#[derive(Debug, Default)]
pub struct CollectedTree {
    pub files: Vec<StagedFile>,
    pub warnings: Vec<AgsyncError>,
}

/// Read every regular file under `root` into memory.
///
/// Symlinks are never followed; they are skipped with a warning. Blocking; call
/// from `spawn_blocking`.
pub fn collect_files(root: &Path, rules: &IgnoreRules, max_files: usize) -> Result<CollectedTree> {
    let mut tree = CollectedTree::default();

    let walker = WalkDir::new(root).follow_links(false).sort_by_file_name().into_iter();
    let walker = walker.filter_entry(|e| {
        e.depth() == 0 || !rules.is_ignored(&e.file_name().to_string_lossy())
    });

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        let relative = match entry.path().strip_prefix(root) {
            Ok(r) if !r.as_os_str().is_empty() => r.to_path_buf(),
            _ => continue,
        };

        if entry.file_type().is_symlink() {
            tree.warnings.push(AgsyncError::PathSecurityViolation {
                entry: relative.display().to_string(),
                reason: "symbolic links are not collected".to_string(),
            });
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        if tree.files.len() >= max_files {
            anyhow::bail!("{} contains more than {max_files} files", root.display());
        }

        let content = fs::read(entry.path()).with_file_context(
            FileOperation::Read,
            entry.path(),
            "collecting origin files",
        )?;
        let mode = entry.metadata().map(|m| file_mode(&m)).unwrap_or(0o644);
        tree.files.push(StagedFile {
            relative_path: relative,
            content,
            mode,
        });
    }

    debug!("Collected {} files under {}", tree.files.len(), root.display());
    Ok(tree)
}
