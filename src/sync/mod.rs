//! End-to-end synchronization of an origin into consumer directories.
//!
//! [`SyncService`] composes the pipeline:
//!
//! ```text
//! origin string
//!   -> classify            (source)
//!   -> acquire             (acquire)
//!   -> discover            (every selected handler)
//!   -> batch name check    (duplicate install names are rejected unless forced)
//!   -> validate            (invalid items never reach a target)
//!   -> install             (per target, partial failure reported per target)
//!   -> state update        (one record per installed item)
//! ```
//!
//! A failing item never aborts the batch. The only fatal errors are an
//! unusable origin, an unreadable state file and unknown handler kinds.

mod report;

pub use report::{
    AddReport, DiscoverReport, DiscoveredSummary, ItemReport, ItemStatus, RemoveReport,
    TargetReport, TargetState,
};

use anyhow::Result;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::acquire::{Acquirer, Acquisition};
use crate::audit::AuditTrail;
use crate::config::GlobalConfig;
use crate::consumers::TargetContext;
use crate::core::{AgsyncError, DiscoveredItem, InstallMode, InstallTarget, Scope};
use crate::handlers::{
    HandlerContext, HandlerRegistry, InstallOptions, ListReport, ResourceHandler, TargetStatus,
};
use crate::naming::NamingStrategy;
use crate::source::{OriginDescriptor, classify};
use crate::state::{
    HistoryEntry, InstallLocation, InstalledRecord, PluginRecord, StateConfig, StateStore,
};

/// Options for [`SyncService::add`].
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    /// Where to install; empty means the project's preferred consumers at its default scope
    pub targets: Vec<InstallTarget>,
    /// Restrict discovery to these kinds
    pub kinds: Option<Vec<String>>,
    /// Install only items whose resolved or original name is listed
    pub only: Option<Vec<String>>,
    pub naming: NamingStrategy,
    pub force: bool,
    /// Symlink to the staged source instead of copying
    pub link: bool,
}

type Found = (Arc<dyn ResourceHandler>, DiscoveredItem);

/// Orchestrates acquisition, handlers and the state store for one project.
#[derive(Debug)]
pub struct SyncService {
    acquirer: Acquirer,
    handlers: HandlerRegistry,
    store: StateStore,
}

impl SyncService {
    pub fn new(acquirer: Acquirer, handlers: HandlerRegistry, store: StateStore) -> Self {
        Self {
            acquirer,
            handlers,
            store,
        }
    }

    /// Wire every component for `project_root` from the global configuration.
    pub fn from_config(config: &GlobalConfig, project_root: &Path) -> Result<Self> {
        let audit = config.audit_trail(project_root)?;
        Self::with_audit(config, TargetContext::for_project(project_root)?, audit)
    }

    /// Like [`Self::from_config`] with explicit roots and audit trail.
    pub fn with_audit(config: &GlobalConfig, targets: TargetContext, audit: AuditTrail) -> Result<Self> {
        let store = StateStore::for_project(&targets.project_root, audit.clone());
        let ctx = HandlerContext::new(Arc::new(config.consumer_registry()), targets, audit.clone());
        let handlers = HandlerRegistry::with_builtins(&ctx);
        let acquirer = Acquirer::new(config.to_acquirer_config()?, audit)?;
        Ok(Self::new(acquirer, handlers, store))
    }

    #[must_use]
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    #[must_use]
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Add a handler for a new kind and record it in the state file.
    ///
    /// Built-in handlers are registered without a plugin record.
    pub fn register_handler(&mut self, handler: Arc<dyn ResourceHandler>, source: Option<String>) -> Result<()> {
        let meta = handler.metadata();
        if !meta.is_built_in {
            self.store.register_plugin(PluginRecord {
                handler_id: meta.kind.clone(),
                kind: meta.kind.clone(),
                display_name: meta.display_name.clone(),
                version: None,
                source,
                registered_at: Utc::now(),
            })?;
        }
        if self.handlers.register(handler).is_some() {
            debug!("Replaced handler for kind '{}'", meta.kind);
        }
        Ok(())
    }

    /// Drop the handler for `kind`, and its plugin record if it has one.
    pub fn unregister_handler(&mut self, kind: &str) -> Result<()> {
        let handler = self.handlers.unregister(kind).ok_or_else(|| AgsyncError::UnknownKind {
            kind: kind.to_string(),
        })?;
        if !handler.metadata().is_built_in {
            self.store.unregister_plugin(kind)?;
        }
        Ok(())
    }

    fn select_handlers(&self, kinds: Option<&[String]>) -> Result<Vec<Arc<dyn ResourceHandler>>> {
        match kinds {
            Some(kinds) => kinds.iter().map(|k| self.handlers.get(k).map_err(Into::into)).collect(),
            None => Ok(self.handlers.handlers().cloned().collect()),
        }
    }

    async fn discover_all(
        &self,
        acquisition: &Acquisition,
        handlers: &[Arc<dyn ResourceHandler>],
        naming: NamingStrategy,
    ) -> Result<Vec<Found>> {
        let mut found = Vec::new();
        for handler in handlers {
            let items = handler.discover(acquisition, naming).await?;
            debug!("Handler '{}' discovered {} items", handler.metadata().kind, items.len());
            found.extend(items.into_iter().map(|item| (handler.clone(), item)));
        }
        Ok(found)
    }

    /// Acquire `origin`, discover and validate its items without installing anything.
    pub async fn discover(&self, origin: &str, naming: NamingStrategy, kinds: Option<&[String]>) -> Result<DiscoverReport> {
        let descriptor = classify(origin);
        let handlers = self.select_handlers(kinds)?;
        let acquisition = self.acquirer.acquire(&descriptor).await?;
        let found = self.discover_all(&acquisition, &handlers, naming).await?;

        let items = found
            .iter()
            .map(|(handler, item)| DiscoveredSummary {
                name: item.name.clone(),
                original_name: item.original_name.clone(),
                kind: item.kind().to_string(),
                version: item.version.clone(),
                description: item.description.clone(),
                category_path: item.category_path.clone(),
                file_count: item.files.len(),
                validation: handler.validate(item),
            })
            .collect();

        Ok(DiscoverReport {
            origin: origin.to_string(),
            origin_kind: descriptor.kind(),
            fetched_from: acquisition.fetched_from.clone(),
            items,
            warnings: acquisition.warnings.iter().map(ToString::to_string).collect(),
        })
    }

    /// Install every item found at `origin`.
    ///
    /// Per-item and per-target failures are reported in the returned
    /// [`AddReport`]; the call itself only fails when the state file cannot be
    /// loaded, a requested kind has no handler, or the origin cannot be
    /// acquired.
    pub async fn add(&self, origin: &str, options: &AddOptions) -> Result<AddReport> {
        // Refuse early on an unreadable or incompatible state file
        let state_config = self.store.config()?;
        let existing: BTreeMap<String, String> = self
            .store
            .list()?
            .into_iter()
            .map(|r| (r.name.clone(), r.kind().to_string()))
            .collect();

        let descriptor = classify(origin);
        let handlers = self.select_handlers(options.kinds.as_deref())?;
        let targets = resolve_targets(&options.targets, &state_config, options.link);
        let acquisition = self.acquirer.acquire(&descriptor).await?;
        let mut found = self.discover_all(&acquisition, &handlers, options.naming).await?;

        let mut warnings: Vec<String> = acquisition.warnings.iter().map(ToString::to_string).collect();
        if let Some(only) = &options.only {
            found.retain(|(_, item)| only.iter().any(|n| n == &item.name || n == &item.original_name));
            for name in only {
                if !found.iter().any(|(_, i)| &i.name == name || &i.original_name == name) {
                    warnings.push(format!("No item named '{name}' found at {origin}"));
                }
            }
        }

        let duplicates = duplicate_names(&found);
        let mut items = Vec::with_capacity(found.len());
        for (handler, item) in &found {
            let kind = item.kind();

            if !options.force && duplicates.contains(item.name.as_str()) {
                warn!("Skipping '{}': install name used by more than one item", item.name);
                items.push(ItemReport::failed(
                    &item.name,
                    kind,
                    item.version.clone(),
                    format!(
                        "install name '{}' is shared by several items in this origin; choose another naming strategy or use --force",
                        item.name
                    ),
                ));
                continue;
            }

            if let Some(other_kind) = existing.get(&item.name) {
                if other_kind != kind && !options.force {
                    items.push(ItemReport::failed(
                        &item.name,
                        kind,
                        item.version.clone(),
                        AgsyncError::AlreadyExists {
                            path: format!("state record '{}' ({other_kind})", item.name),
                        },
                    ));
                    continue;
                }
            }

            items.push(
                self.install_one(handler.as_ref(), item, &descriptor, origin, &targets, options.force)
                    .await,
            );
        }

        let report = AddReport {
            origin: origin.to_string(),
            origin_kind: descriptor.kind(),
            fetched_from: acquisition.fetched_from.clone(),
            items,
            warnings,
        };
        info!(
            "Added from {origin}: {} installed, {} partial, {} failed",
            report.count(ItemStatus::Installed),
            report.count(ItemStatus::Partial),
            report.count(ItemStatus::Failed)
        );
        Ok(report)
    }

    async fn install_one(
        &self,
        handler: &dyn ResourceHandler,
        item: &DiscoveredItem,
        descriptor: &OriginDescriptor,
        origin: &str,
        targets: &[InstallTarget],
        force: bool,
    ) -> ItemReport {
        let kind = item.kind().to_string();
        let validation = handler.validate(item);
        if let Some(err) = validation.to_error(&item.name) {
            warn!("{err}");
            let mut report = ItemReport::failed(&item.name, &kind, item.version.clone(), err);
            report.warnings = validation.warnings;
            return report;
        }

        let outcomes = handler
            .install(item, targets, InstallOptions {
                force,
            })
            .await;
        let locations: Vec<InstallLocation> = outcomes
            .iter()
            .filter(|o| matches!(o.status, TargetStatus::Succeeded))
            .filter_map(|o| {
                o.path.as_ref().map(|path| InstallLocation {
                    consumer_id: o.target.consumer_id.clone(),
                    scope: o.target.scope,
                    path: path.clone(),
                })
            })
            .collect();

        let mut report = ItemReport {
            name: item.name.clone(),
            kind: kind.clone(),
            version: item.version.clone(),
            status: match locations.len() {
                0 => ItemStatus::Failed,
                n if n == outcomes.len() => ItemStatus::Installed,
                _ => ItemStatus::Partial,
            },
            error: None,
            warnings: validation.warnings,
            targets: outcomes.iter().map(TargetReport::from).collect(),
        };
        if locations.is_empty() {
            return report;
        }

        let now = Utc::now();
        let record = InstalledRecord {
            details: item.details.clone(),
            handler_id: handler.metadata().kind,
            name: item.name.clone(),
            version: item.version.clone(),
            description: item.description.clone(),
            origin: origin.to_string(),
            origin_kind: descriptor.kind(),
            origin_url: descriptor.display_url(),
            installed_at: now,
            updated_at: now,
            installed_for: locations,
            history: Vec::new(),
        };
        if let Err(e) = self.store.add(record) {
            warn!("Installed '{}' but could not record it: {e:#}", item.name);
            report.error = Some(format!("installed but not recorded in state: {e:#}"));
        }
        report
    }

    /// Remove `name` from its recorded install locations, or only from `consumers`.
    ///
    /// Targets that are already gone count as removed. The state record is
    /// deleted once no install locations remain.
    pub async fn remove(&self, name: &str, consumers: Option<&[String]>, scope: Option<Scope>) -> Result<RemoveReport> {
        let record = self.store.get(name)?.ok_or_else(|| AgsyncError::NotFound {
            what: format!("installed resource '{name}'"),
        })?;
        let handler = self.handlers.get(&record.handler_id)?;

        let selected: Vec<InstallLocation> = record
            .installed_for
            .iter()
            .filter(|l| consumers.is_none_or(|c| c.contains(&l.consumer_id)))
            .filter(|l| scope.is_none_or(|s| s == l.scope))
            .cloned()
            .collect();
        if selected.is_empty() {
            return Err(AgsyncError::NotFound {
                what: format!("install location of '{name}' matching the requested targets"),
            }
            .into());
        }

        let targets: Vec<InstallTarget> = selected
            .iter()
            .map(|l| InstallTarget::new(l.consumer_id.clone(), l.scope, InstallMode::Copy))
            .collect();
        let outcomes = handler.remove(name, &targets).await;

        let removed: Vec<InstallLocation> = selected
            .iter()
            .zip(&outcomes)
            .filter(|(_, o)| o.is_success())
            .map(|(l, _)| l.clone())
            .collect();
        let record_removed = if removed.is_empty() {
            false
        } else {
            self.store.remove_targets(name, &removed)?.is_none()
        };

        Ok(RemoveReport {
            name: name.to_string(),
            kind: record.kind().to_string(),
            targets: outcomes.iter().map(TargetReport::from).collect(),
            record_removed,
        })
    }

    /// What is on disk right now, across every handler and consumer.
    pub async fn list(&self, scope: Scope) -> ListReport {
        let mut report = ListReport::default();
        for handler in self.handlers.handlers() {
            report.merge(handler.list(scope).await);
        }
        report.entries.sort_by(|a, b| {
            (a.kind.as_str(), a.name.as_str(), a.consumer_id.as_str())
                .cmp(&(b.kind.as_str(), b.name.as_str(), b.consumer_id.as_str()))
        });
        report
    }

    /// Records in the state file.
    pub fn records(&self) -> Result<Vec<InstalledRecord>> {
        self.store.list()
    }

    pub fn rollback(&self, name: &str) -> Result<InstalledRecord> {
        self.store.rollback(name)
    }

    pub fn history(&self, name: &str) -> Result<Vec<HistoryEntry>> {
        self.store.history(name)
    }
}

/// Explicit targets, or one per preferred consumer at the default scope.
fn resolve_targets(explicit: &[InstallTarget], config: &StateConfig, link: bool) -> Vec<InstallTarget> {
    let mode = if link {
        InstallMode::Link
    } else {
        InstallMode::Copy
    };
    if explicit.is_empty() {
        return config
            .preferred_consumers
            .iter()
            .map(|c| InstallTarget::new(c.clone(), config.default_scope, mode))
            .collect();
    }
    explicit
        .iter()
        .map(|t| InstallTarget {
            mode: if link {
                InstallMode::Link
            } else {
                t.mode
            },
            ..t.clone()
        })
        .collect()
}

/// Install names claimed by more than one item.
fn duplicate_names(found: &[Found]) -> BTreeSet<&str> {
    let mut seen = BTreeSet::new();
    let mut duplicates = BTreeSet::new();
    for (_, item) in found {
        if !seen.insert(item.name.as_str()) {
            duplicates.insert(item.name.as_str());
        }
    }
    duplicates
}
