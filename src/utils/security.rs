//! Security utilities for path validation and access control
//!
//! Local origins are refused when they point into sensitive system
//! directories, and staged archive entries must stay inside their staging
//! root.

use std::path::{Component, Path};

use super::fs::normalize_path;

/// Security blacklist for local origins
/// Prevents reading sensitive system directories while allowing normal development paths
pub static BLACKLISTED_PATHS: &[&str] = &[
    "/etc",
    "/sys",
    "/proc",
    "/dev",
    "/boot",
    "/bin",
    "/sbin",
    "/usr/bin",
    "/usr/sbin",
    "/System",
    "/Library",
    "/private/etc",
    "/private/var/db",
    "C:\\Windows",
    "C:\\Program Files",
    "C:\\Program Files (x86)",
    "C:\\ProgramData",
    "C:\\Windows\\System32",
];

/// Check if a path points into a sensitive system directory
///
/// # Examples
/// ```
/// use agsync_cli::utils::security::is_path_blacklisted;
/// use std::path::Path;
///
/// assert!(is_path_blacklisted(Path::new("/etc/passwd")));
/// assert!(!is_path_blacklisted(Path::new("/home/user/project")));
/// ```
#[must_use]
pub fn is_path_blacklisted(path: &Path) -> bool {
    BLACKLISTED_PATHS.iter().any(|blacklisted| path.starts_with(blacklisted))
}

/// Reason an archive entry name is unsafe, if any.
///
/// Rejects absolute paths, drive prefixes, and any `..` segment.
#[must_use]
pub fn unsafe_entry_reason(entry: &Path) -> Option<&'static str> {
    if entry.is_absolute() {
        return Some("absolute path");
    }
    for component in entry.components() {
        match component {
            Component::ParentDir => return Some("parent directory segment"),
            Component::RootDir => return Some("absolute path"),
            Component::Prefix(_) => return Some("path prefix"),
            _ => {}
        }
    }
    None
}

/// Whether `relative`, joined onto `root`, stays strictly inside `root`.
///
/// Purely lexical; callers that also need to defend against symlinks on disk
/// should compare canonicalized parents as well.
#[must_use]
pub fn stays_within(root: &Path, relative: &Path) -> bool {
    let root = normalize_path(root);
    let joined = normalize_path(&root.join(relative));
    joined != root && joined.starts_with(&root)
}
