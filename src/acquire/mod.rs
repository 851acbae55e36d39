//! Materializing origins into local staging directories.
//!
//! The [`Acquirer`] turns an [`OriginDescriptor`] into an [`Acquisition`]: a
//! root directory on disk plus a flat in-memory list of the files under it.
//! Downstream discovery does not care whether the files came from a tarball
//! or an existing directory.
//!
//! # Remote origins
//!
//! Repository archives, plain tarball URLs and registry packages are
//! downloaded with bounded retry ([`fetch`]), extracted defensively
//! ([`archive`]) and staged under
//! `<cache>/staging/<origin>-<hash>`. Staging directories persist after the
//! process exits so that `link` installs keep pointing at real files; each
//! acquisition of the same origin replaces the previous staging content.
//!
//! # Local origins
//!
//! Local directories are indexed in place ([`local`]); nothing is copied.

pub mod archive;
pub mod fetch;
pub mod local;

pub use fetch::{Fetcher, RetryPolicy};
pub use local::IgnoreRules;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::audit::{AuditAction, AuditEvent, AuditTrail};
use crate::constants::{
    DEFAULT_REGISTRY_URL, GITHUB_ARCHIVE_URL, GITLAB_URL, MAX_ACQUIRED_FILES, MAX_ARCHIVE_BYTES,
    MAX_UNPACKED_BYTES, STAGING_DIR_NAME,
};
use crate::core::{AgsyncError, StagedFile};
use crate::naming::sanitize;
use crate::source::{OriginDescriptor, Provider};
use crate::utils::security::unsafe_entry_reason;

/// Registry metadata documents are small; anything bigger is suspicious.
const MAX_REGISTRY_METADATA_BYTES: u64 = 16 * 1024 * 1024;

/// Settings for [`Acquirer`].
#[derive(Debug, Clone)]
pub struct AcquirerConfig {
    /// Parent of the persistent staging directories
    pub cache_dir: PathBuf,
    /// npm-compatible registry base URL
    pub registry_url: String,
    /// Base URL for GitHub tarballs (codeload)
    pub github_archive_url: String,
    /// Base URL for GitLab
    pub gitlab_url: String,
    pub retry: RetryPolicy,
    pub max_archive_bytes: u64,
    pub max_files: usize,
    /// Extra glob patterns excluded from local walks
    pub extra_ignore_patterns: Vec<String>,
}

impl AcquirerConfig {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            github_archive_url: GITHUB_ARCHIVE_URL.to_string(),
            gitlab_url: GITLAB_URL.to_string(),
            retry: RetryPolicy::default(),
            max_archive_bytes: MAX_ARCHIVE_BYTES,
            max_files: MAX_ACQUIRED_FILES,
            extra_ignore_patterns: Vec::new(),
        }
    }
}

/// An origin materialized on local disk.
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub origin: OriginDescriptor,
    /// Directory discovery starts from (after collapsing and subpath selection)
    pub root: PathBuf,
    /// Every collected file, relative to `root`
    pub files: Vec<StagedFile>,
    pub file_count: usize,
    pub total_size: u64,
    /// Entries skipped for safety reasons
    pub warnings: Vec<AgsyncError>,
    /// Version implied by the origin (git ref or resolved package version)
    pub resolved_version: Option<String>,
    /// URL actually fetched, or the canonical local path
    pub fetched_from: String,
}

impl Acquisition {
    fn new(
        origin: &OriginDescriptor,
        root: PathBuf,
        files: Vec<StagedFile>,
        warnings: Vec<AgsyncError>,
        resolved_version: Option<String>,
        fetched_from: String,
    ) -> Self {
        let total_size = files.iter().map(|f| f.content.len() as u64).sum();
        Self {
            origin: origin.clone(),
            root,
            file_count: files.len(),
            total_size,
            files,
            warnings,
            resolved_version,
            fetched_from,
        }
    }
}

/// Downloads, extracts and indexes origins.
#[derive(Debug, Clone)]
pub struct Acquirer {
    config: AcquirerConfig,
    fetcher: Fetcher,
    audit: AuditTrail,
}

impl Acquirer {
    pub fn new(config: AcquirerConfig, audit: AuditTrail) -> Result<Self> {
        let fetcher = Fetcher::new(config.retry.clone())?;
        Ok(Self {
            config,
            fetcher,
            audit,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AcquirerConfig {
        &self.config
    }

    /// Materialize `origin`. Skipped entries are reported in [`Acquisition::warnings`].
    pub async fn acquire(&self, origin: &OriginDescriptor) -> Result<Acquisition> {
        let label = origin.display_url();
        debug!("Acquiring {label}");

        let result = match origin {
            OriginDescriptor::Local {
                path,
            } => self.acquire_local(origin, path).await,
            _ => self.acquire_archive(origin).await,
        };

        match &result {
            Ok(acquisition) => {
                for warning in &acquisition.warnings {
                    self.audit.emit(
                        AuditEvent::new(AuditAction::SecurityViolation, &label, "origin")
                            .warning(warning.to_string()),
                    );
                }
                self.audit.emit(
                    AuditEvent::new(AuditAction::Acquire, &label, "origin")
                        .target(&acquisition.root)
                        .details(format!(
                            "{} files, {} bytes, {} skipped",
                            acquisition.file_count,
                            acquisition.total_size,
                            acquisition.warnings.len()
                        )),
                );
                info!(
                    "Acquired {label}: {} files ({} bytes)",
                    acquisition.file_count, acquisition.total_size
                );
            }
            Err(e) => {
                self.audit.emit(AuditEvent::new(AuditAction::Acquire, &label, "origin").failed(format!("{e:#}")));
            }
        }
        result.with_context(|| format!("Failed to acquire {label}"))
    }

    async fn acquire_local(&self, origin: &OriginDescriptor, path: &Path) -> Result<Acquisition> {
        let path = path.to_path_buf();
        let rules = IgnoreRules::with_extra(&self.config.extra_ignore_patterns);
        let max_files = self.config.max_files;

        let (root, tree) = tokio::task::spawn_blocking(move || -> Result<_> {
            let root = local::resolve_local_root(&path)?;
            let tree = local::collect_files(&root, &rules, max_files)?;
            Ok((root, tree))
        })
        .await
        .context("Local acquisition task panicked")??;

        let fetched_from = root.display().to_string();
        Ok(Acquisition::new(origin, root, tree.files, tree.warnings, None, fetched_from))
    }

    async fn acquire_archive(&self, origin: &OriginDescriptor) -> Result<Acquisition> {
        let (url, version) = self.archive_location(origin).await?;
        let bytes = self.fetcher.fetch_bytes(&url, self.config.max_archive_bytes, "archive download").await?;
        debug!("Downloaded {} bytes from {url}", bytes.len());

        let staging = self.staging_dir(origin);
        let subpath = match origin {
            OriginDescriptor::RemoteArchive {
                subpath,
                ..
            } => subpath.clone(),
            _ => None,
        };
        let limits = archive::ExtractLimits {
            max_files: self.config.max_files,
            max_unpacked_bytes: MAX_UNPACKED_BYTES,
        };
        let max_files = self.config.max_files;
        let staging_for_task = staging.clone();

        let (root, files, warnings) = tokio::task::spawn_blocking(move || -> Result<_> {
            let temp = tempfile::TempDir::new().context("Failed to create extraction directory")?;
            let mut warnings = archive::extract_tar_gz(&bytes, temp.path(), limits)?;
            warnings.extend(archive::stage_tree(temp.path(), &staging_for_task)?);

            let mut root = archive::collapse_single_top_level(&staging_for_task)?;
            if let Some(sub) = subpath.as_deref() {
                root = select_subpath(&root, sub)?;
            }

            let tree = local::collect_files(&root, &IgnoreRules::none(), max_files)?;
            warnings.extend(tree.warnings);
            Ok((root, tree.files, warnings))
        })
        .await
        .context("Archive extraction task panicked")??;

        self.audit.emit(
            AuditEvent::new(AuditAction::Extract, origin.display_url(), "origin")
                .target(&staging)
                .details(format!("staged {} files", files.len())),
        );

        Ok(Acquisition::new(origin, root, files, warnings, version, url))
    }

    /// Tarball URL and implied version for a remote origin.
    async fn archive_location(&self, origin: &OriginDescriptor) -> Result<(String, Option<String>)> {
        match origin {
            OriginDescriptor::RemoteArchive {
                provider,
                owner,
                name,
                reference,
                ..
            } => {
                if owner.is_empty() || name.is_empty() {
                    return Err(AgsyncError::InvalidOrigin {
                        origin: origin.display_url(),
                        reason: "expected owner/name".to_string(),
                    }
                    .into());
                }
                let git_ref = reference.as_deref().unwrap_or("HEAD");
                let url = match provider {
                    Provider::GitHub => format!(
                        "{}/{owner}/{name}/tar.gz/{git_ref}",
                        self.config.github_archive_url.trim_end_matches('/')
                    ),
                    Provider::GitLab => format!(
                        "{}/{owner}/{name}/-/archive/{git_ref}/{name}-{git_ref}.tar.gz",
                        self.config.gitlab_url.trim_end_matches('/')
                    ),
                };
                Ok((url, origin.version_hint().map(str::to_string)))
            }
            OriginDescriptor::UrlArchive {
                url,
            } => Ok((url.clone(), None)),
            OriginDescriptor::Registry {
                id,
                version,
            } => {
                let (tarball, resolved) = self.resolve_registry(id, version.as_deref()).await?;
                Ok((tarball, Some(resolved)))
            }
            OriginDescriptor::Local {
                ..
            } => Err(AgsyncError::InvalidOrigin {
                origin: origin.display_url(),
                reason: "local origins are not archives".to_string(),
            }
            .into()),
        }
    }

    /// Look up `id` in the registry and return `(tarball_url, version)`.
    pub async fn resolve_registry(&self, id: &str, version: Option<&str>) -> Result<(String, String)> {
        let url = format!(
            "{}/{}",
            self.config.registry_url.trim_end_matches('/'),
            encode_package_id(id)
        );
        let metadata = self
            .fetcher
            .fetch_json(&url, MAX_REGISTRY_METADATA_BYTES, "registry lookup")
            .await?;

        let resolved = match version {
            Some(v) => v.to_string(),
            None => metadata["dist-tags"]["latest"]
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| AgsyncError::NotFound {
                    what: format!("latest version of package '{id}'"),
                })?,
        };

        let tarball = metadata["versions"][resolved.as_str()]["dist"]["tarball"]
            .as_str()
            .ok_or_else(|| AgsyncError::NotFound {
                what: format!("version {resolved} of package '{id}'"),
            })?;
        Ok((tarball.to_string(), resolved))
    }

    /// Persistent staging directory for `origin`.
    #[must_use]
    pub fn staging_dir(&self, origin: &OriginDescriptor) -> PathBuf {
        let label = origin.display_url();
        let digest = hex::encode(Sha256::digest(label.as_bytes()));
        let mut readable = sanitize(label.trim_start_matches("https://").trim_start_matches("http://"));
        readable.truncate(48);
        let readable = readable.trim_end_matches(['-', '.']).to_string();
        self.config
            .cache_dir
            .join(STAGING_DIR_NAME)
            .join(format!("{readable}-{}", &digest[..12]))
    }
}

/// `@scope/name` becomes `@scope%2Fname`.
fn encode_package_id(id: &str) -> String {
    id.replace('/', "%2F")
}

fn select_subpath(root: &Path, subpath: &str) -> Result<PathBuf> {
    let sub = Path::new(subpath.trim_matches('/'));
    if let Some(reason) = unsafe_entry_reason(sub) {
        return Err(AgsyncError::InvalidOrigin {
            origin: subpath.to_string(),
            reason: format!("subpath has {reason}"),
        }
        .into());
    }
    let selected = root.join(sub);
    if !selected.is_dir() {
        return Err(AgsyncError::NotFound {
            what: format!("subpath '{subpath}' in archive"),
        }
        .into());
    }
    Ok(selected)
}
