//! Handler for single-file kinds (`agent`, `command`).

use anyhow::Result;
use async_trait::async_trait;

use super::common::{
    self, HandlerContext, InstallLayout, InstallOptions, KindSpec, ListReport, TargetOutcome,
    ValidationReport,
};
use super::{HandlerMetadata, ResourceHandler};
use crate::acquire::Acquisition;
use crate::constants::{AGENT_MARKER, COMMAND_MARKER};
use crate::core::{DiscoveredItem, InstallTarget, KindMetadata, ResourceKind, Scope};
use crate::markdown::ResourceMetadata;
use crate::naming::NamingStrategy;

fn is_agent_marker(file_name: &str) -> bool {
    file_name == AGENT_MARKER
}

fn is_command_marker(file_name: &str) -> bool {
    file_name == COMMAND_MARKER
}

fn agent_details(meta: &ResourceMetadata, _files: usize, _size: u64) -> KindMetadata {
    KindMetadata::Agent {
        model: meta.model.clone(),
        tools: meta.tools.clone(),
    }
}

fn command_details(meta: &ResourceMetadata, _files: usize, _size: u64) -> KindMetadata {
    KindMetadata::Command {
        argument_hint: meta.argument_hint.clone(),
    }
}

/// Handler for kinds whose items are one markdown file, installed as `<dir>/<name>.md`.
#[derive(Debug, Clone)]
pub struct SingleFileHandler {
    spec: KindSpec,
    ctx: HandlerContext,
}

impl SingleFileHandler {
    /// Handler for `agent` items (`AGENT.md`).
    #[must_use]
    pub fn agent(ctx: HandlerContext) -> Self {
        Self {
            spec: KindSpec {
                kind: ResourceKind::Agent,
                layout: InstallLayout::SingleFile,
                is_marker: is_agent_marker,
                details: agent_details,
            },
            ctx,
        }
    }

    /// Handler for `command` items (`COMMAND.md`).
    #[must_use]
    pub fn command(ctx: HandlerContext) -> Self {
        Self {
            spec: KindSpec {
                kind: ResourceKind::Command,
                layout: InstallLayout::SingleFile,
                is_marker: is_command_marker,
                details: command_details,
            },
            ctx,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.spec.kind
    }
}

#[async_trait]
impl ResourceHandler for SingleFileHandler {
    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata {
            kind: self.spec.kind.to_string(),
            display_name: self.spec.kind.display_name().to_string(),
            is_built_in: true,
        }
    }

    async fn discover(
        &self,
        acquisition: &Acquisition,
        naming: NamingStrategy,
    ) -> Result<Vec<DiscoveredItem>> {
        Ok(common::discover_items(acquisition, &self.spec, naming))
    }

    fn validate(&self, item: &DiscoveredItem) -> ValidationReport {
        let (mut errors, warnings) = common::base_findings(item);
        if item.files.len() > 1 {
            errors.push(format!("expected a single file, found {}", item.files.len()));
        }
        ValidationReport::from_findings(errors, warnings)
    }

    async fn install(
        &self,
        item: &DiscoveredItem,
        targets: &[InstallTarget],
        options: InstallOptions,
    ) -> Vec<TargetOutcome> {
        common::install_item(&self.ctx, &self.spec, item, targets, options).await
    }

    async fn remove(&self, name: &str, targets: &[InstallTarget]) -> Vec<TargetOutcome> {
        common::remove_item(&self.ctx, &self.spec, name, targets).await
    }

    async fn list(&self, scope: Scope) -> ListReport {
        common::list_installed(&self.ctx, &self.spec, scope).await
    }
}
