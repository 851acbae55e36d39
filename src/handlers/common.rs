//! Discovery, install, removal and listing shared by the built-in handlers.
//!
//! Built-in kinds differ only in their marker files, their on-disk layout and
//! the kind-specific metadata they extract. Those differences are captured in a
//! [`KindSpec`]; everything else lives here.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::acquire::Acquisition;
use crate::audit::{AuditAction, AuditEvent, AuditTrail};
use crate::consumers::{ConsumerRegistry, TargetContext};
use crate::core::{
    AgsyncError, DiscoveredItem, FileOperation, FileResultExt, InstallMode, InstallTarget,
    KindMetadata, ResourceKind, Scope, StagedFile,
};
use crate::markdown::{ResourceMetadata, parse_metadata};
use crate::naming::{NamingStrategy, category_paths, resolve, sanitize};
use crate::utils::fs::{atomic_write, ensure_dir, path_occupied, remove_path, set_mode};
use crate::utils::security::{stays_within, unsafe_entry_reason};

/// Collaborators every built-in handler needs.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub consumers: Arc<ConsumerRegistry>,
    pub targets: TargetContext,
    pub audit: AuditTrail,
}

impl HandlerContext {
    pub fn new(consumers: Arc<ConsumerRegistry>, targets: TargetContext, audit: AuditTrail) -> Self {
        Self {
            consumers,
            targets,
            audit,
        }
    }
}

/// How an installed item occupies its consumer directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallLayout {
    /// `<dir>/<name>.md`
    SingleFile,
    /// `<dir>/<name>/`
    Directory,
}

impl InstallLayout {
    #[must_use]
    pub fn entry_path(self, dir: &Path, name: &str) -> PathBuf {
        match self {
            InstallLayout::SingleFile => dir.join(format!("{name}.md")),
            InstallLayout::Directory => dir.join(name),
        }
    }
}

/// What distinguishes one built-in kind from another.
#[derive(Debug, Clone, Copy)]
pub struct KindSpec {
    pub kind: ResourceKind,
    pub layout: InstallLayout,
    /// Whether a file name marks an item of this kind
    pub is_marker: fn(&str) -> bool,
    /// Kind metadata from parsed frontmatter, file count and total size
    pub details: fn(&ResourceMetadata, usize, u64) -> KindMetadata,
}

/// Options for [`crate::handlers::ResourceHandler::install`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Replace whatever already occupies a target path
    pub force: bool,
}

/// Result of validating one item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    #[must_use]
    pub fn from_findings(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// The blocking errors as a single [`AgsyncError::Validation`].
    #[must_use]
    pub fn to_error(&self, name: &str) -> Option<AgsyncError> {
        (!self.valid).then(|| AgsyncError::Validation {
            name: name.to_string(),
            reasons: self.errors.clone(),
        })
    }
}

/// Per-target result of an install or removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetStatus {
    Succeeded,
    /// Acceptable end state reached with a caveat (e.g. already removed)
    Warning(AgsyncError),
    Failed(AgsyncError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOutcome {
    pub target: InstallTarget,
    /// Resolved install path, when resolution got that far
    pub path: Option<PathBuf>,
    pub status: TargetStatus,
}

impl TargetOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self.status, TargetStatus::Failed(_))
    }

    #[must_use]
    pub fn error(&self) -> Option<&AgsyncError> {
        match &self.status {
            TargetStatus::Failed(e) | TargetStatus::Warning(e) => Some(e),
            TargetStatus::Succeeded => None,
        }
    }
}

/// An item found in a consumer directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedResource {
    pub name: String,
    pub kind: String,
    pub consumer_id: String,
    pub scope: Scope,
    pub path: PathBuf,
    pub mode: InstallMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub description: String,
    pub details: KindMetadata,
}

/// A consumer directory, or an entry in it, that could not be listed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListError {
    pub consumer_id: String,
    pub scope: Scope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub message: String,
    #[serde(skip)]
    pub error: Option<AgsyncError>,
}

impl ListError {
    fn new(consumer_id: &str, scope: Scope, path: Option<PathBuf>, error: AgsyncError) -> Self {
        Self {
            consumer_id: consumer_id.to_string(),
            scope,
            path,
            message: error.to_string(),
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListReport {
    pub entries: Vec<ListedResource>,
    pub errors: Vec<ListError>,
}

impl ListReport {
    pub fn merge(&mut self, other: ListReport) {
        self.entries.extend(other.entries);
        self.errors.extend(other.errors);
    }
}

/// The [`AgsyncError`] inside `err`, or an [`AgsyncError::Other`] carrying its full chain.
#[must_use]
pub fn to_agsync_error(err: &anyhow::Error) -> AgsyncError {
    err.chain()
        .find_map(|e| e.downcast_ref::<AgsyncError>())
        .cloned()
        .unwrap_or_else(|| AgsyncError::Other {
            message: format!("{err:#}"),
        })
}

// Discovery

/// Find every item of `spec.kind` among the acquisition's files.
///
/// An item is the directory holding a marker file. Directory items own every
/// file beneath them except those owned by a deeper item.
#[must_use]
pub fn discover_items(
    acquisition: &Acquisition,
    spec: &KindSpec,
    naming: NamingStrategy,
) -> Vec<DiscoveredItem> {
    let mut markers: BTreeMap<PathBuf, &StagedFile> = BTreeMap::new();
    for file in &acquisition.files {
        let Some(file_name) = file.relative_path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if (spec.is_marker)(file_name) {
            let dir = file.relative_path.parent().map(Path::to_path_buf).unwrap_or_default();
            markers.entry(dir).or_insert(file);
        }
    }

    let item_dirs: Vec<PathBuf> = markers.keys().cloned().collect();
    let root_name = acquisition
        .root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "resource".to_string());

    markers
        .iter()
        .map(|(dir, marker)| {
            let segments = normal_segments(dir);
            let (parents, fallback) = match segments.split_last() {
                Some((last, parents)) => (parents.to_vec(), last.clone()),
                None => (Vec::new(), root_name.clone()),
            };

            let meta = parse_metadata(&String::from_utf8_lossy(&marker.content));
            let original_name = meta.name.clone().unwrap_or(fallback);
            let paths = category_paths(&parents);
            let name = resolve(&original_name, &paths, naming);

            let marker_name = marker.relative_path.file_name().map(PathBuf::from).unwrap_or_default();
            let nested: Vec<PathBuf> = match spec.layout {
                InstallLayout::Directory => {
                    item_dirs.iter().filter(|d| *d != dir && d.starts_with(dir)).cloned().collect()
                }
                InstallLayout::SingleFile => Vec::new(),
            };
            let (files, source_path) = match spec.layout {
                InstallLayout::Directory => {
                    (owned_files(&acquisition.files, dir, &nested), acquisition.root.join(dir))
                }
                InstallLayout::SingleFile => (
                    vec![StagedFile {
                        relative_path: marker_name.clone(),
                        content: marker.content.clone(),
                        mode: marker.mode,
                    }],
                    acquisition.root.join(&marker.relative_path),
                ),
            };
            let total_size = files.iter().map(|f| f.content.len() as u64).sum();
            let details = (spec.details)(&meta, files.len(), total_size);

            debug!(
                "Discovered {} '{}' as '{name}' at {}",
                spec.kind,
                original_name,
                dir.display()
            );

            DiscoveredItem {
                original_name,
                name,
                version: meta.version.clone().or_else(|| acquisition.resolved_version.clone()),
                description: meta.description.clone().unwrap_or_default(),
                category_path: paths.categories,
                full_path: paths.full_path,
                relative_dir: dir.clone(),
                source_path,
                files,
                marker: Some(marker_name),
                nested_items: nested,
                details,
            }
        })
        .collect()
}

fn normal_segments(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

fn owned_files(files: &[StagedFile], dir: &Path, nested: &[PathBuf]) -> Vec<StagedFile> {
    files
        .iter()
        .filter(|f| !nested.iter().any(|n| f.relative_path.starts_with(n)))
        .filter_map(|f| {
            let relative = f.relative_path.strip_prefix(dir).ok()?;
            Some(StagedFile {
                relative_path: relative.to_path_buf(),
                content: f.content.clone(),
                mode: f.mode,
            })
        })
        .collect()
}

// Validation

/// Checks every kind shares: a name, at least one file, a description and a marker.
#[must_use]
pub fn base_findings(item: &DiscoveredItem) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if item.name.trim().is_empty() {
        errors.push("name is empty".to_string());
    } else if sanitize(&item.name) != item.name {
        errors.push(format!("name '{}' is not a safe file name", item.name));
    }
    if item.files.is_empty() {
        errors.push("no files".to_string());
    }
    if item.description.trim().is_empty() {
        warnings.push("missing description".to_string());
    }
    if item.marker.is_none() {
        warnings.push("missing marker file".to_string());
    }
    (errors, warnings)
}

// Install

fn resolve_entry_path(
    ctx: &HandlerContext,
    kind: &str,
    layout: InstallLayout,
    name: &str,
    target: &InstallTarget,
) -> Result<PathBuf, AgsyncError> {
    if name.is_empty() || sanitize(name) != name {
        return Err(AgsyncError::PathSecurityViolation {
            entry: name.to_string(),
            reason: "not a safe install name".to_string(),
        });
    }
    let dir = ctx.consumers.resolve_dir(&target.consumer_id, target.scope, kind, &ctx.targets)?;
    Ok(layout.entry_path(&dir, name))
}

/// Install `item` to every target, one outcome per target.
pub async fn install_item(
    ctx: &HandlerContext,
    spec: &KindSpec,
    item: &DiscoveredItem,
    targets: &[InstallTarget],
    options: InstallOptions,
) -> Vec<TargetOutcome> {
    let shared = Arc::new(item.clone());
    let mut outcomes = Vec::with_capacity(targets.len());

    for target in targets {
        let event = AuditEvent::new(AuditAction::Install, &item.name, spec.kind.as_str());
        let path = match resolve_entry_path(ctx, spec.kind.as_str(), spec.layout, &item.name, target) {
            Ok(path) => path,
            Err(e) => {
                ctx.audit.emit(event.details(target_label(target)).failed(&e));
                outcomes.push(TargetOutcome {
                    target: target.clone(),
                    path: None,
                    status: TargetStatus::Failed(e),
                });
                continue;
            }
        };

        let task_item = Arc::clone(&shared);
        let task_path = path.clone();
        let layout = spec.layout;
        let mode = target.mode;
        let result = tokio::task::spawn_blocking(move || {
            place(&task_item, layout, &task_path, mode, options.force)
        })
        .await
        .context("Install task panicked")
        .and_then(|r| r);

        let event = event.target(&path).details(target_label(target));
        let status = match result {
            Ok(()) => {
                debug!("Installed {} '{}' to {}", spec.kind, item.name, path.display());
                ctx.audit.emit(event);
                TargetStatus::Succeeded
            }
            Err(e) => {
                let err = to_agsync_error(&e);
                warn!("Failed to install {} '{}' to {}: {e:#}", spec.kind, item.name, path.display());
                ctx.audit.emit(event.failed(&err));
                TargetStatus::Failed(err)
            }
        };
        outcomes.push(TargetOutcome {
            target: target.clone(),
            path: Some(path),
            status,
        });
    }
    outcomes
}

fn target_label(target: &InstallTarget) -> String {
    let mode = match target.mode {
        InstallMode::Copy => "copy",
        InstallMode::Link => "link",
    };
    format!("consumer={} scope={} mode={mode}", target.consumer_id, target.scope)
}

/// Place one item at `dest`. Blocking.
fn place(
    item: &DiscoveredItem,
    layout: InstallLayout,
    dest: &Path,
    mode: InstallMode,
    force: bool,
) -> Result<()> {
    // A link would expose the nested items' files as part of this one
    if mode == InstallMode::Link && !item.nested_items.is_empty() {
        return Err(AgsyncError::Validation {
            name: item.name.clone(),
            reasons: vec![format!(
                "contains {} nested item(s); install it in copy mode",
                item.nested_items.len()
            )],
        }
        .into());
    }
    if mode == InstallMode::Link && !item.source_path.exists() {
        return Err(AgsyncError::LinkSourceMissing {
            source_path: item.source_path.display().to_string(),
            target: dest.display().to_string(),
        }
        .into());
    }

    if path_occupied(dest) {
        if !force {
            return Err(AgsyncError::AlreadyExists {
                path: dest.display().to_string(),
            }
            .into());
        }
        remove_path(dest)?;
    }
    if let Some(parent) = dest.parent() {
        ensure_dir(parent)?;
    }

    match (mode, layout) {
        (InstallMode::Link, _) => create_symlink(&item.source_path, dest),
        (InstallMode::Copy, InstallLayout::SingleFile) => {
            let file = item.files.first().ok_or_else(|| AgsyncError::Validation {
                name: item.name.clone(),
                reasons: vec!["no files".to_string()],
            })?;
            atomic_write(dest, &file.content)?;
            set_mode(dest, file.mode)
        }
        (InstallMode::Copy, InstallLayout::Directory) => {
            let result = materialize_dir(&item.files, dest);
            if result.is_err() {
                if let Err(cleanup) = remove_path(dest) {
                    warn!("Failed to clean up partial install at {}: {cleanup:#}", dest.display());
                }
            }
            result
        }
    }
}

fn materialize_dir(files: &[StagedFile], dest: &Path) -> Result<()> {
    ensure_dir(dest)?;
    for file in files {
        if let Some(reason) = unsafe_entry_reason(&file.relative_path) {
            return Err(AgsyncError::PathSecurityViolation {
                entry: file.relative_path.display().to_string(),
                reason: reason.to_string(),
            }
            .into());
        }
        if !stays_within(dest, &file.relative_path) {
            return Err(AgsyncError::PathSecurityViolation {
                entry: file.relative_path.display().to_string(),
                reason: "resolves outside the install directory".to_string(),
            }
            .into());
        }

        let path = dest.join(&file.relative_path);
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        fs::write(&path, &file.content).with_file_context(
            FileOperation::Write,
            &path,
            "installing resource file",
        )?;
        set_mode(&path, file.mode)?;
    }
    Ok(())
}

fn create_symlink(source: &Path, link: &Path) -> Result<()> {
    #[cfg(unix)]
    let result = std::os::unix::fs::symlink(source, link);
    #[cfg(windows)]
    let result = if source.is_dir() {
        std::os::windows::fs::symlink_dir(source, link)
    } else {
        std::os::windows::fs::symlink_file(source, link)
    };
    result.with_file_context(FileOperation::Link, link, "linking staged resource")?;
    Ok(())
}

// Removal

/// Remove the installed item `name` from every target.
pub async fn remove_item(
    ctx: &HandlerContext,
    spec: &KindSpec,
    name: &str,
    targets: &[InstallTarget],
) -> Vec<TargetOutcome> {
    let mut outcomes = Vec::with_capacity(targets.len());

    for target in targets {
        let event = AuditEvent::new(AuditAction::Remove, name, spec.kind.as_str());
        let path = match resolve_entry_path(ctx, spec.kind.as_str(), spec.layout, name, target) {
            Ok(path) => path,
            Err(e) => {
                ctx.audit.emit(event.details(target_label(target)).failed(&e));
                outcomes.push(TargetOutcome {
                    target: target.clone(),
                    path: None,
                    status: TargetStatus::Failed(e),
                });
                continue;
            }
        };

        let task_path = path.clone();
        let result = tokio::task::spawn_blocking(move || remove_path(&task_path))
            .await
            .context("Remove task panicked")
            .and_then(|r| r);

        let event = event.target(&path);
        let status = match result {
            Ok(true) => {
                ctx.audit.emit(event.details(target_label(target)));
                TargetStatus::Succeeded
            }
            Ok(false) => {
                let missing = AgsyncError::NotFound {
                    what: format!("{} '{name}' for {}", spec.kind, target.consumer_id),
                };
                ctx.audit.emit(event.warning(missing.to_string()));
                TargetStatus::Warning(missing)
            }
            Err(e) => {
                let err = to_agsync_error(&e);
                ctx.audit.emit(event.details(target_label(target)).failed(&err));
                TargetStatus::Failed(err)
            }
        };
        outcomes.push(TargetOutcome {
            target: target.clone(),
            path: Some(path),
            status,
        });
    }
    outcomes
}

// Listing

/// Scan every consumer directory declared for `spec.kind` in `scope`.
///
/// A directory that does not exist contributes nothing. A directory that
/// cannot be read contributes one error and the scan moves on.
pub async fn list_installed(ctx: &HandlerContext, spec: &KindSpec, scope: Scope) -> ListReport {
    let mut report = ListReport::default();
    let consumers: Vec<String> =
        ctx.consumers.supporting(spec.kind.as_str()).map(str::to_string).collect();

    for consumer in consumers {
        let dir = match ctx.consumers.resolve_dir(&consumer, scope, spec.kind.as_str(), &ctx.targets) {
            Ok(dir) => dir,
            Err(AgsyncError::UnsupportedScope {
                ..
            }) => continue,
            Err(e) => {
                report.errors.push(ListError::new(&consumer, scope, None, e));
                continue;
            }
        };

        let task_spec = *spec;
        let task_dir = dir.clone();
        let task_consumer = consumer.clone();
        let scanned = tokio::task::spawn_blocking(move || {
            scan_dir(&task_spec, &task_consumer, scope, &task_dir)
        })
        .await
        .context("Listing task panicked")
        .and_then(|r| r);

        match scanned {
            Ok(part) => report.merge(part),
            Err(e) => {
                report.errors.push(ListError::new(&consumer, scope, Some(dir), to_agsync_error(&e)))
            }
        }
    }
    report
}

/// Blocking scan of one consumer directory.
fn scan_dir(spec: &KindSpec, consumer: &str, scope: Scope, dir: &Path) -> Result<ListReport> {
    let mut report = ListReport::default();
    if !path_occupied(dir) {
        return Ok(report);
    }

    let mut entries: Vec<_> = fs::read_dir(dir)
        .with_file_context(FileOperation::ReadDir, dir, "listing installed resources")?
        .filter_map(std::result::Result::ok)
        .collect();
    entries.sort_by_key(fs::DirEntry::file_name);

    for entry in entries {
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if file_name.starts_with('.') {
            continue;
        }

        let name = match spec.layout {
            InstallLayout::SingleFile => match file_name.strip_suffix(".md") {
                Some(stem) => stem.to_string(),
                None => continue,
            },
            InstallLayout::Directory => file_name.clone(),
        };
        if sanitize(&name) != name {
            report.errors.push(ListError::new(
                consumer,
                scope,
                Some(path),
                AgsyncError::PathSecurityViolation {
                    entry: file_name,
                    reason: "not a valid install name".to_string(),
                },
            ));
            continue;
        }

        match read_installed(spec, &path) {
            Ok(Some((meta, file_count, total_size))) => {
                let is_link = fs::symlink_metadata(&path).is_ok_and(|m| m.file_type().is_symlink());
                report.entries.push(ListedResource {
                    name,
                    kind: spec.kind.to_string(),
                    consumer_id: consumer.to_string(),
                    scope,
                    path,
                    mode: if is_link { InstallMode::Link } else { InstallMode::Copy },
                    version: meta.version.clone(),
                    description: meta.description.clone().unwrap_or_default(),
                    details: (spec.details)(&meta, file_count, total_size),
                });
            }
            Ok(None) => debug!("Skipping {}: not a {} item", path.display(), spec.kind),
            Err(e) => report.errors.push(ListError::new(consumer, scope, Some(path), to_agsync_error(&e))),
        }
    }
    Ok(report)
}

/// Parse an installed entry. `None` when the entry is not an item of this kind.
fn read_installed(spec: &KindSpec, path: &Path) -> Result<Option<(ResourceMetadata, usize, u64)>> {
    if fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink()) && !path.exists() {
        return Err(AgsyncError::LinkSourceMissing {
            source_path: fs::read_link(path).map(|p| p.display().to_string()).unwrap_or_default(),
            target: path.display().to_string(),
        }
        .into());
    }

    match spec.layout {
        InstallLayout::SingleFile => {
            if !path.is_file() {
                return Ok(None);
            }
            let content = fs::read_to_string(path).with_file_context(
                FileOperation::Read,
                path,
                "reading installed resource",
            )?;
            let size = content.len() as u64;
            Ok(Some((parse_metadata(&content), 1, size)))
        }
        InstallLayout::Directory => {
            if !path.is_dir() {
                return Ok(None);
            }
            let marker = fs::read_dir(path)
                .with_file_context(FileOperation::ReadDir, path, "reading installed resource")?
                .filter_map(std::result::Result::ok)
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .find(|p| p.file_name().and_then(|n| n.to_str()).is_some_and(spec.is_marker));
            let Some(marker) = marker else {
                return Ok(None);
            };

            let content = fs::read_to_string(&marker).with_file_context(
                FileOperation::Read,
                &marker,
                "reading installed resource",
            )?;
            let (file_count, total_size) = walkdir::WalkDir::new(path)
                .follow_links(false)
                .into_iter()
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().is_file())
                .fold((0usize, 0u64), |(count, size), e| {
                    (count + 1, size + e.metadata().map(|m| m.len()).unwrap_or(0))
                });
            Ok(Some((parse_metadata(&content), file_count, total_size)))
        }
    }
}
