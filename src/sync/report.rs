//! Serializable results of [`super::SyncService`] operations.

use serde::Serialize;
use std::path::PathBuf;

use crate::core::{InstallMode, Scope};
use crate::handlers::{TargetOutcome, TargetStatus, ValidationReport};
use crate::source::OriginKind;

/// How one target ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetState {
    Done,
    Warning,
    Failed,
}

/// Per-target line of an [`ItemReport`] or [`RemoveReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetReport {
    pub consumer_id: String,
    pub scope: Scope,
    pub mode: InstallMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub state: TargetState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&TargetOutcome> for TargetReport {
    fn from(outcome: &TargetOutcome) -> Self {
        let (state, message) = match &outcome.status {
            TargetStatus::Succeeded => (TargetState::Done, None),
            TargetStatus::Warning(e) => (TargetState::Warning, Some(e.to_string())),
            TargetStatus::Failed(e) => (TargetState::Failed, Some(e.to_string())),
        };
        Self {
            consumer_id: outcome.target.consumer_id.clone(),
            scope: outcome.target.scope,
            mode: outcome.target.mode,
            path: outcome.path.clone(),
            state,
            message,
        }
    }
}

/// Overall result for one discovered item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Every target succeeded
    Installed,
    /// Some targets succeeded
    Partial,
    /// Nothing was installed
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReport {
    pub name: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub status: ItemStatus,
    /// Why nothing was installed, when the item never reached its targets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub warnings: Vec<String>,
    pub targets: Vec<TargetReport>,
}

impl ItemReport {
    pub(super) fn failed(name: &str, kind: &str, version: Option<String>, error: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            version,
            status: ItemStatus::Failed,
            error: Some(error.to_string()),
            warnings: Vec::new(),
            targets: Vec::new(),
        }
    }
}

/// Result of [`super::SyncService::add`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddReport {
    pub origin: String,
    pub origin_kind: OriginKind,
    pub fetched_from: String,
    pub items: Vec<ItemReport>,
    /// Skipped archive entries and unmatched `only` filters
    pub warnings: Vec<String>,
}

impl AddReport {
    pub fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }

    /// True when every item was installed to every target.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.items.iter().all(|i| i.status == ItemStatus::Installed)
    }
}

/// One item as seen by [`super::SyncService::discover`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredSummary {
    pub name: String,
    pub original_name: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub description: String,
    pub category_path: Vec<String>,
    pub file_count: usize,
    pub validation: ValidationReport,
}

/// Result of [`super::SyncService::discover`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverReport {
    pub origin: String,
    pub origin_kind: OriginKind,
    pub fetched_from: String,
    pub items: Vec<DiscoveredSummary>,
    pub warnings: Vec<String>,
}

/// Result of [`super::SyncService::remove`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveReport {
    pub name: String,
    pub kind: String,
    pub targets: Vec<TargetReport>,
    /// The state record was deleted because no install locations remain
    pub record_removed: bool,
}
