//! Install-name resolution
//!
//! Discovered items are named after their frontmatter (or directory) and the
//! directories they were found under. Two unrelated repos can both ship a
//! `patterns` skill, so the final install name folds in path-derived
//! categories according to a [`NamingStrategy`].
//!
//! Every strategy funnels through [`sanitize`], so an install name is always a
//! single safe filesystem segment. Uniqueness inside a batch is *not*
//! guaranteed here; the sync layer checks for duplicates before installing.
//!
//! # Examples
//!
//! ```rust
//! use agsync_cli::naming::{NamingStrategy, resolve_name};
//!
//! let cats = vec!["frontend".to_string(), "react".to_string()];
//! assert_eq!(resolve_name("patterns", &cats, NamingStrategy::SmartDisambiguation), "frontend-react-patterns");
//! assert_eq!(resolve_name("patterns", &cats, NamingStrategy::CategoryPrefix), "react-patterns");
//! ```

use serde::{Deserialize, Serialize};

use crate::constants::{CONTAINER_SEGMENTS, MAX_NAME_LENGTH};

/// Rule used to derive an install name from a name and its category path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NamingStrategy {
    /// Prefix every category segment
    #[default]
    SmartDisambiguation,
    /// Prefix every directory segment of the source path, containers included
    FullPathPrefix,
    /// Prefix only the last category segment
    CategoryPrefix,
    /// Sanitized original name, no prefix
    OriginalName,
}

impl NamingStrategy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            NamingStrategy::SmartDisambiguation => "smart-disambiguation",
            NamingStrategy::FullPathPrefix => "full-path-prefix",
            NamingStrategy::CategoryPrefix => "category-prefix",
            NamingStrategy::OriginalName => "original-name",
        }
    }
}

impl std::fmt::Display for NamingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NamingStrategy {
    type Err = crate::core::AgsyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "smart-disambiguation" | "smart" => Ok(NamingStrategy::SmartDisambiguation),
            "full-path-prefix" | "full-path" => Ok(NamingStrategy::FullPathPrefix),
            "category-prefix" | "category" => Ok(NamingStrategy::CategoryPrefix),
            "original-name" | "original" => Ok(NamingStrategy::OriginalName),
            other => Err(crate::core::AgsyncError::Config {
                message: format!("unknown naming strategy '{other}'"),
            }),
        }
    }
}

/// Make `name` a safe single path segment.
///
/// Characters outside `[A-Za-z0-9._-]` become `-`, runs of `-` collapse,
/// leading `.`/`-` and trailing `-` are stripped, and the result is capped at
/// [`MAX_NAME_LENGTH`] characters. Idempotent. May return an empty string,
/// which validation rejects.
#[must_use]
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        let mapped = if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
            ch
        } else {
            '-'
        };
        if mapped == '-' && out.ends_with('-') {
            continue;
        }
        out.push(mapped);
    }

    let trimmed = out.trim_start_matches(['.', '-']).trim_end_matches('-');
    let mut result = trimmed.to_string();
    if result.len() > MAX_NAME_LENGTH {
        result.truncate(MAX_NAME_LENGTH);
        let kept = result.trim_end_matches('-').len();
        result.truncate(kept);
    }
    result
}

/// Directory segments of an item's location, split into categories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryPaths {
    /// Segments with container directories removed
    pub categories: Vec<String>,
    /// Every segment between the root and the item directory
    pub full_path: Vec<String>,
}

/// Split the segments between the root and an item directory (exclusive) into
/// categories and the full path.
#[must_use]
pub fn category_paths(segments: &[String]) -> CategoryPaths {
    let categories = segments
        .iter()
        .filter(|s| !is_container_segment(s))
        .cloned()
        .collect();
    CategoryPaths {
        categories,
        full_path: segments.to_vec(),
    }
}

fn is_container_segment(segment: &str) -> bool {
    CONTAINER_SEGMENTS.iter().any(|c| c.eq_ignore_ascii_case(segment))
}

/// Resolve an install name from the name, its categories and its full source
/// path.
#[must_use]
pub fn resolve(original_name: &str, paths: &CategoryPaths, strategy: NamingStrategy) -> String {
    let base = sanitize(original_name);
    let prefix: Vec<String> = match strategy {
        NamingStrategy::SmartDisambiguation => paths.categories.iter().map(|s| sanitize(s)).collect(),
        NamingStrategy::FullPathPrefix => paths.full_path.iter().map(|s| sanitize(s)).collect(),
        NamingStrategy::CategoryPrefix => {
            paths.categories.last().map(|s| vec![sanitize(s)]).unwrap_or_default()
        }
        NamingStrategy::OriginalName => Vec::new(),
    };

    let mut parts: Vec<String> = prefix.into_iter().filter(|s| !s.is_empty()).collect();
    parts.push(base);
    sanitize(&parts.join("-"))
}

/// Resolve with the category path doubling as the full path.
#[must_use]
pub fn resolve_name(original_name: &str, categories: &[String], strategy: NamingStrategy) -> String {
    resolve(
        original_name,
        &CategoryPaths {
            categories: categories.to_vec(),
            full_path: categories.to_vec(),
        },
        strategy,
    )
}
