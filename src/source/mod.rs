//! Origin classification
//!
//! Users hand agsync a free-form origin string. [`classify`] turns it into a
//! typed [`OriginDescriptor`] without touching the network or the disk.
//!
//! # Precedence
//!
//! 1. `./`, `../`, `/`, `~/` (or a bare `.`/`~`) - local directory
//! 2. `http(s)://` URLs - GitHub/GitLab repository shapes become
//!    [`OriginDescriptor::RemoteArchive`], anything else is fetched verbatim
//! 3. `owner/name[@ref]` (or `#ref`) shorthand - GitHub repository archive
//! 4. `registry:<id>`, `npm:<id>` or a bare `@scope/name[@version]` - registry package
//! 5. Anything else is split at the first `/` into owner and name so callers
//!    always get a descriptor to report against
//!
//! # Examples
//!
//! ```rust
//! use agsync_cli::source::{OriginDescriptor, classify};
//!
//! assert!(matches!(classify("./skills"), OriginDescriptor::Local { .. }));
//! assert!(matches!(classify("anthropics/skills"), OriginDescriptor::RemoteArchive { .. }));
//! assert!(matches!(classify("@acme/skills@1.2.0"), OriginDescriptor::Registry { .. }));
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Hosting provider for repository archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    GitHub,
    GitLab,
}

impl Provider {
    #[must_use]
    pub const fn host(&self) -> &'static str {
        match self {
            Provider::GitHub => "github.com",
            Provider::GitLab => "gitlab.com",
        }
    }
}

/// Persisted label for where a resource came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OriginKind {
    RemoteArchive,
    UrlArchive,
    Local,
    Registry,
}

impl std::fmt::Display for OriginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OriginKind::RemoteArchive => "remote-archive",
            OriginKind::UrlArchive => "url-archive",
            OriginKind::Local => "local",
            OriginKind::Registry => "registry",
        };
        f.write_str(s)
    }
}

/// Typed origin, immutable once classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum OriginDescriptor {
    /// Repository archive addressed by coordinates
    RemoteArchive {
        provider: Provider,
        owner: String,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reference: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subpath: Option<String>,
    },
    /// Tarball fetched from an arbitrary URL
    UrlArchive {
        url: String,
    },
    /// Existing directory on this machine
    Local {
        path: PathBuf,
    },
    /// Package in an npm-compatible registry
    Registry {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<String>,
    },
}

impl OriginDescriptor {
    #[must_use]
    pub fn kind(&self) -> OriginKind {
        match self {
            OriginDescriptor::RemoteArchive {
                ..
            } => OriginKind::RemoteArchive,
            OriginDescriptor::UrlArchive {
                ..
            } => OriginKind::UrlArchive,
            OriginDescriptor::Local {
                ..
            } => OriginKind::Local,
            OriginDescriptor::Registry {
                ..
            } => OriginKind::Registry,
        }
    }

    /// Human-facing URL (or path) recorded as the resource's `originUrl`.
    #[must_use]
    pub fn display_url(&self) -> String {
        match self {
            OriginDescriptor::RemoteArchive {
                provider,
                owner,
                name,
                reference,
                subpath,
            } => {
                let mut url = format!("https://{}/{owner}/{name}", provider.host());
                if reference.is_some() || subpath.is_some() {
                    let sep = match provider {
                        Provider::GitHub => "/tree/",
                        Provider::GitLab => "/-/tree/",
                    };
                    url.push_str(sep);
                    url.push_str(reference.as_deref().unwrap_or("HEAD"));
                    if let Some(sub) = subpath {
                        url.push('/');
                        url.push_str(sub);
                    }
                }
                url
            }
            OriginDescriptor::UrlArchive {
                url,
            } => url.clone(),
            OriginDescriptor::Local {
                path,
            } => path.display().to_string(),
            OriginDescriptor::Registry {
                id,
                version,
            } => match version {
                Some(v) => format!("registry:{id}@{v}"),
                None => format!("registry:{id}"),
            },
        }
    }

    /// Version hint carried by the origin itself (git ref or package version).
    #[must_use]
    pub fn version_hint(&self) -> Option<&str> {
        match self {
            OriginDescriptor::RemoteArchive {
                reference,
                ..
            } => reference.as_deref(),
            OriginDescriptor::Registry {
                version,
                ..
            } => version.as_deref(),
            _ => None,
        }
    }
}

impl std::fmt::Display for OriginDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display_url())
    }
}

fn shorthand_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+)(?:[@#](.+))?$").ok()).as_ref()
}

fn scoped_package_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^@[a-z0-9~][a-z0-9._~-]*/[a-z0-9~][a-z0-9._~-]*(?:@[^@/\s]+)?$").ok()
    })
    .as_ref()
}

/// Classify a raw origin string. Never fails; see the module docs for precedence.
#[must_use]
pub fn classify(raw: &str) -> OriginDescriptor {
    let input = raw.trim();

    if is_local_path(input) {
        return OriginDescriptor::Local {
            path: PathBuf::from(input.strip_prefix("file://").unwrap_or(input)),
        };
    }

    if input.starts_with("http://") || input.starts_with("https://") {
        return classify_url(input);
    }

    if let Some(caps) = shorthand_regex().and_then(|re| re.captures(input)) {
        let owner = &caps[1];
        if !owner.starts_with('@') && owner != "." && owner != ".." {
            return OriginDescriptor::RemoteArchive {
                provider: Provider::GitHub,
                owner: owner.to_string(),
                name: strip_git_suffix(&caps[2]),
                reference: caps.get(3).map(|m| m.as_str().to_string()),
                subpath: None,
            };
        }
    }

    for prefix in ["registry:", "npm:"] {
        if let Some(rest) = input.strip_prefix(prefix) {
            return registry_descriptor(rest);
        }
    }
    if scoped_package_regex().is_some_and(|re| re.is_match(input)) {
        return registry_descriptor(input);
    }

    match input.split_once('/') {
        Some((owner, name)) => OriginDescriptor::RemoteArchive {
            provider: Provider::GitHub,
            owner: owner.to_string(),
            name: name.to_string(),
            reference: None,
            subpath: None,
        },
        None => OriginDescriptor::RemoteArchive {
            provider: Provider::GitHub,
            owner: String::new(),
            name: input.to_string(),
            reference: None,
            subpath: None,
        },
    }
}

fn is_local_path(input: &str) -> bool {
    matches!(input, "." | ".." | "~")
        || input.starts_with("./")
        || input.starts_with("../")
        || input.starts_with('/')
        || input.starts_with("~/")
        || input.starts_with("file://")
}

fn strip_git_suffix(name: &str) -> String {
    name.strip_suffix(".git").unwrap_or(name).to_string()
}

/// Split `id[@version]`, keeping a leading `@scope` intact.
fn registry_descriptor(spec: &str) -> OriginDescriptor {
    let spec = spec.trim();
    let split_at = spec.rfind('@').filter(|&idx| idx > 0);
    match split_at {
        Some(idx) => OriginDescriptor::Registry {
            id: spec[..idx].to_string(),
            version: Some(spec[idx + 1..].to_string()).filter(|v| !v.is_empty()),
        },
        None => OriginDescriptor::Registry {
            id: spec.to_string(),
            version: None,
        },
    }
}

fn classify_url(input: &str) -> OriginDescriptor {
    let verbatim = || OriginDescriptor::UrlArchive {
        url: input.to_string(),
    };

    let Ok(url) = reqwest::Url::parse(input) else {
        return verbatim();
    };
    let host = url.host_str().unwrap_or_default().trim_start_matches("www.").to_ascii_lowercase();
    let segments: Vec<String> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();

    let descriptor = match host.as_str() {
        "github.com" => github_shape(&segments),
        "gitlab.com" => gitlab_shape(&segments),
        _ => None,
    };
    descriptor.unwrap_or_else(verbatim)
}

/// `/owner/repo[.git]` or `/owner/repo/(tree|blob)/ref[/subpath...]`
fn github_shape(segments: &[String]) -> Option<OriginDescriptor> {
    let (owner, repo) = (segments.first()?, segments.get(1)?);
    let (reference, subpath) = match segments.get(2).map(String::as_str) {
        None => (None, None),
        Some("tree" | "blob") => {
            let reference = segments.get(3)?.clone();
            let rest = &segments[4..];
            (Some(reference), (!rest.is_empty()).then(|| rest.join("/")))
        }
        Some(_) => return None,
    };
    Some(OriginDescriptor::RemoteArchive {
        provider: Provider::GitHub,
        owner: owner.clone(),
        name: strip_git_suffix(repo),
        reference,
        subpath,
    })
}

/// `/group[/subgroup]/repo[.git]` or `.../repo/-/(tree|blob)/ref[/subpath...]`
fn gitlab_shape(segments: &[String]) -> Option<OriginDescriptor> {
    let marker = segments.iter().position(|s| s == "-");
    let repo_segments = &segments[..marker.unwrap_or(segments.len())];
    if repo_segments.len() < 2 {
        return None;
    }
    let (name, owner) = repo_segments.split_last()?;

    let (reference, subpath) = match marker {
        None => (None, None),
        Some(idx) => match segments.get(idx + 1).map(String::as_str) {
            Some("tree" | "blob") => {
                let reference = segments.get(idx + 2)?.clone();
                let rest = &segments[(idx + 3).min(segments.len())..];
                (Some(reference), (!rest.is_empty()).then(|| rest.join("/")))
            }
            _ => return None,
        },
    };

    Some(OriginDescriptor::RemoteArchive {
        provider: Provider::GitLab,
        owner: owner.join("/"),
        name: strip_git_suffix(name),
        reference,
        subpath,
    })
}
