//! Defensive tarball extraction.
//!
//! Extraction happens in two passes with independent checks:
//!
//! 1. Every tar entry is unpacked into an isolated temp directory. Entries with
//!    a `..` segment, an absolute path, or a non-regular type (symlink, hard
//!    link, device) are skipped.
//! 2. The extracted tree is re-walked into the staging directory. Each
//!    destination must stay strictly inside the staging root, both lexically
//!    and after resolving its parent on disk.
//!
//! Skipped entries become [`AgsyncError::PathSecurityViolation`] warnings; the
//! remaining entries are still staged.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tar::{Archive, EntryType};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::core::{AgsyncError, FileOperation, FileResultExt};
use crate::utils::fs::{ensure_dir, remove_path};
use crate::utils::security::{stays_within, unsafe_entry_reason};

/// Limits applied while unpacking.
#[derive(Debug, Clone, Copy)]
pub struct ExtractLimits {
    pub max_files: usize,
    pub max_unpacked_bytes: u64,
}

fn violation(entry: &Path, reason: impl Into<String>) -> AgsyncError {
    let err = AgsyncError::PathSecurityViolation {
        entry: entry.to_string_lossy().into_owned(),
        reason: reason.into(),
    };
    warn!("Skipping archive entry: {err}");
    err
}

/// Unpack a gzip-compressed tarball into `dest`, returning skipped-entry warnings.
pub fn extract_tar_gz(data: &[u8], dest: &Path, limits: ExtractLimits) -> Result<Vec<AgsyncError>> {
    let decoder = GzDecoder::new(data);
    let mut archive = Archive::new(decoder);
    let mut warnings = Vec::new();
    let mut files = 0usize;
    let mut unpacked = 0u64;

    for entry in archive.entries().context("Failed to read archive")? {
        let mut entry = entry.context("Corrupt archive entry")?;
        let path: PathBuf = entry.path().context("Archive entry has an unreadable path")?.into_owned();

        if let Some(reason) = unsafe_entry_reason(&path) {
            warnings.push(violation(&path, reason));
            continue;
        }

        match entry.header().entry_type() {
            EntryType::Directory => {
                ensure_dir(&dest.join(&path))?;
            }
            EntryType::Regular | EntryType::Continuous => {
                files += 1;
                unpacked = unpacked.saturating_add(entry.size());
                if files > limits.max_files {
                    anyhow::bail!("Archive contains more than {} files", limits.max_files);
                }
                if unpacked > limits.max_unpacked_bytes {
                    anyhow::bail!(
                        "Archive expands beyond {} MiB",
                        limits.max_unpacked_bytes / (1024 * 1024)
                    );
                }

                let target = dest.join(&path);
                if let Some(parent) = target.parent() {
                    ensure_dir(parent)?;
                }
                let mut content = Vec::new();
                entry.read_to_end(&mut content).context("Failed to read archive entry")?;
                fs::write(&target, &content).with_file_context(
                    FileOperation::Write,
                    &target,
                    "extracting archive",
                )?;
                if let Ok(mode) = entry.header().mode() {
                    crate::utils::fs::set_mode(&target, mode)?;
                }
            }
            EntryType::Symlink | EntryType::Link => {
                warnings.push(violation(&path, "links are not extracted"));
            }
            EntryType::Char | EntryType::Block | EntryType::Fifo => {
                warnings.push(violation(&path, "device entries are not extracted"));
            }
            other => {
                debug!("Ignoring archive entry {} of type {other:?}", path.display());
            }
        }
    }

    Ok(warnings)
}

/// Copy the extracted tree at `from` into a fresh `staging` directory.
///
/// Any previous staging content is removed first.
pub fn stage_tree(from: &Path, staging: &Path) -> Result<Vec<AgsyncError>> {
    remove_path(staging)?;
    ensure_dir(staging)?;
    let canonical_staging = staging.canonicalize().with_file_context(
        FileOperation::Canonicalize,
        staging,
        "resolving staging directory",
    )?;

    let mut warnings = Vec::new();
    for entry in WalkDir::new(from).follow_links(false).min_depth(1) {
        let entry = entry.context("Failed to walk extracted archive")?;
        let Ok(relative) = entry.path().strip_prefix(from) else {
            continue;
        };
        let relative = relative.to_path_buf();
        let file_type = entry.file_type();

        if file_type.is_symlink() {
            warnings.push(violation(&relative, "symbolic link in extracted tree"));
            continue;
        }
        if !stays_within(staging, &relative) {
            warnings.push(violation(&relative, "resolves outside the staging directory"));
            continue;
        }

        let dest = staging.join(&relative);
        if file_type.is_dir() {
            ensure_dir(&dest)?;
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        let Some(parent) = dest.parent() else {
            continue;
        };
        ensure_dir(parent)?;
        let inside = parent
            .canonicalize()
            .map(|p| p.starts_with(&canonical_staging))
            .unwrap_or(false);
        if !inside {
            warnings.push(violation(&relative, "parent directory resolves outside the staging directory"));
            continue;
        }

        fs::copy(entry.path(), &dest).with_file_context(
            FileOperation::Write,
            &dest,
            "staging extracted file",
        )?;
    }

    Ok(warnings)
}

/// If `dir` holds exactly one entry and it is a directory, return it.
///
/// GitHub and npm tarballs wrap everything in a single `repo-ref/` or
/// `package/` folder.
pub fn collapse_single_top_level(dir: &Path) -> Result<PathBuf> {
    let mut entries = fs::read_dir(dir)
        .with_file_context(FileOperation::ReadDir, dir, "inspecting staged archive")?
        .filter_map(std::result::Result::ok);

    let first = entries.next();
    if entries.next().is_some() {
        return Ok(dir.to_path_buf());
    }
    match first {
        Some(only) if only.file_type().map(|t| t.is_dir()).unwrap_or(false) => Ok(only.path()),
        _ => Ok(dir.to_path_buf()),
    }
}
