//! File system helpers shared by the acquirer, the handlers and the state store.
//!
//! Writes that must never be observed half-done (the state file, installed
//! files) go through [`atomic_write`]: content lands in a sibling temp file,
//! is synced, then renamed over the destination.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::core::{FileOperation, FileResultExt};

/// Create a directory and all of its parents.
///
/// Succeeds when the directory already exists; fails when the path exists but
/// is not a directory.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).with_file_context(
            FileOperation::CreateDir,
            path,
            "preparing directory",
        )?;
    } else if !path.is_dir() {
        return Err(anyhow::anyhow!("Path exists but is not a directory: {}", path.display()));
    }
    Ok(())
}

/// Write `content` to `path` atomically.
///
/// Parent directories are created as needed. The file either holds the old
/// content or the new content, never a partial write.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let temp_path = temp_sibling(path);
    {
        let mut file = fs::File::create(&temp_path).with_file_context(
            FileOperation::Write,
            &temp_path,
            "creating temporary file",
        )?;
        file.write_all(content)
            .with_file_context(FileOperation::Write, &temp_path, "writing temporary file")?;
        file.sync_all().with_context(|| "Failed to sync file to disk")?;
    }

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Remove whatever sits at `path`: a file, a symlink, or a directory tree.
///
/// Symlinks are removed without following them. Returns `false` when nothing
/// existed.
pub fn remove_path(path: &Path) -> Result<bool> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            Err(e).with_file_context(FileOperation::Metadata, path, "checking install target")?
        }
    };

    if metadata.is_dir() {
        fs::remove_dir_all(path).with_file_context(
            FileOperation::Remove,
            path,
            "removing directory",
        )?;
    } else {
        fs::remove_file(path).with_file_context(FileOperation::Remove, path, "removing file")?;
    }
    Ok(true)
}

/// Whether anything (including a dangling symlink) exists at `path`.
#[must_use]
pub fn path_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Apply Unix permission bits to a file. No-op elsewhere.
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if mode != 0 {
            fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o777)).with_file_context(
                FileOperation::Write,
                path,
                "applying file mode",
            )?;
        }
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
    }
    Ok(())
}

/// Unix permission bits of `metadata`, or `0o644` where unavailable.
#[must_use]
pub fn file_mode(metadata: &fs::Metadata) -> u32 {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o777
    }
    #[cfg(not(unix))]
    {
        let _ = metadata;
        0o644
    }
}

/// Lexically normalize a path, resolving `.` and `..` without touching disk.
///
/// A `..` that would climb above the start of a relative path is kept, so the
/// caller can still detect the escape.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Render a relative path with `/` separators on every platform.
#[must_use]
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_creates_parents_and_replaces() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a/b/state.json");

        atomic_write(&path, b"one").unwrap();
        atomic_write(&path, b"two").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
        assert!(!temp.path().join("a/b/state.json.tmp").exists());
    }

    #[test]
    fn test_ensure_dir_rejects_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file");
        fs::write(&file, "x").unwrap();
        assert!(ensure_dir(&file).is_err());
        assert!(ensure_dir(&temp.path().join("new/dir")).is_ok());
    }

    #[test]
    fn test_remove_path_handles_missing_file_and_dir() {
        let temp = TempDir::new().unwrap();
        assert!(!remove_path(&temp.path().join("missing")).unwrap());

        let dir = temp.path().join("skill");
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("nested/x.txt"), "x").unwrap();
        assert!(remove_path(&dir).unwrap());
        assert!(!dir.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_remove_path_does_not_follow_symlink() {
        let temp = TempDir::new().unwrap();
        let real = temp.path().join("real");
        fs::create_dir_all(&real).unwrap();
        fs::write(real.join("keep.txt"), "x").unwrap();
        let link = temp.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        assert!(remove_path(&link).unwrap());
        assert!(real.join("keep.txt").exists());
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("a/./b/../c")), PathBuf::from("a/c"));
        assert_eq!(normalize_path(Path::new("../x")), PathBuf::from("../x"));
        assert_eq!(normalize_path(Path::new("a/../../x")), PathBuf::from("../x"));
        assert_eq!(normalize_path(Path::new("/root/../etc")), PathBuf::from("/etc"));
    }

    #[test]
    fn test_to_slash() {
        assert_eq!(to_slash(&Path::new("a").join("b").join("c.md")), "a/b/c.md");
    }
}
